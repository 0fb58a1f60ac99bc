//! The graphics API surface consumed by the render loop and particle fields.
//!
//! [`GraphicsContext`] is deliberately small: clear, viewport, enable/disable,
//! blend function, buffer create/upload/delete, program create/delete, draw and
//! present. Two implementations ship with the crate:
//!
//! - [`WgpuContext`] records commands during a frame and flushes them into a
//!   single render pass on [`GraphicsContext::present`].
//! - [`RecordingContext`](crate::headless::RecordingContext) keeps a log of
//!   every command for tests and headless runs.

mod context;
mod mesh;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::camera::Camera;
use crate::error::GpuError;

pub use context::WgpuContext;
pub use mesh::{Mesh, MeshBuffers, Vertex};

/// Handle to a buffer owned by a [`GraphicsContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// Handle to a compiled program owned by a [`GraphicsContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// What a buffer is bound as when drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Per-vertex mesh attributes.
    Vertex,
    /// `u16` triangle indices.
    Index,
    /// Per-instance attributes (one `mat4` per instance).
    Instance,
}

/// Fixed-function state toggled with `enable` / `disable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    DepthTest,
    Blend,
}

/// Blend factor applied to the source or destination term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

/// Separate RGB and alpha blend factors, as in `blendFuncSeparate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendFunc {
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

impl BlendFunc {
    /// Blending for semi-transparent geometry drawn onto a transparent target.
    ///
    /// Color uses `src-alpha, 1-src-alpha`; alpha uses `1, 1-src-alpha` so the
    /// destination alpha accumulates coverage instead of being squared.
    pub const TRANSPARENT_TARGET: Self = Self {
        src_rgb: BlendFactor::SrcAlpha,
        dst_rgb: BlendFactor::OneMinusSrcAlpha,
        src_alpha: BlendFactor::One,
        dst_alpha: BlendFactor::OneMinusSrcAlpha,
    };
}

impl Default for BlendFunc {
    fn default() -> Self {
        Self {
            src_rgb: BlendFactor::One,
            dst_rgb: BlendFactor::Zero,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
        }
    }
}

/// Vertex inputs a program expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexLayout {
    /// Mesh vertices in slot 0 and one `mat4` per instance in slot 1.
    Instanced,
    /// Mesh vertices only; the world transform comes from the uniforms.
    PerObject,
}

/// Source and layout for [`GraphicsContext::create_program`].
///
/// `source` is WGSL holding both a `vs_main` and an `fs_main` entry point.
#[derive(Debug, Clone, Copy)]
pub struct ProgramDesc<'a> {
    pub label: &'a str,
    pub source: &'a str,
    pub layout: VertexLayout,
}

/// Uniform block bound for every draw.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct DrawUniforms {
    pub view: [[f32; 4]; 4],
    pub view_projection: [[f32; 4]; 4],
    pub world: [[f32; 4]; 4],
}

impl DrawUniforms {
    /// Snapshot the camera's current matrices together with a world transform.
    pub fn new(camera: &Camera, world: Mat4) -> Self {
        Self {
            view: camera.view().to_cols_array_2d(),
            view_projection: camera.view_projection().to_cols_array_2d(),
            world: world.to_cols_array_2d(),
        }
    }
}

/// One draw operation.
#[derive(Debug, Clone, Copy)]
pub struct DrawCall {
    pub program: ProgramId,
    pub mesh: MeshBuffers,
    /// Per-instance transform buffer, for [`VertexLayout::Instanced`] programs.
    pub instances: Option<BufferId>,
    pub instance_count: u32,
    pub uniforms: DrawUniforms,
}

/// Commands the core issues against a drawable surface.
pub trait GraphicsContext {
    /// Set the viewport rectangle in pixels.
    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32);

    /// Clear the color buffer at the start of the frame.
    fn clear(&mut self, color: [f32; 4]);

    fn enable(&mut self, capability: Capability);

    fn disable(&mut self, capability: Capability);

    fn blend_func_separate(&mut self, func: BlendFunc);

    /// Create a buffer initialised with `data`.
    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> Result<BufferId, GpuError>;

    /// Overwrite part of a buffer. Writes past the end are rejected.
    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), GpuError>;

    fn delete_buffer(&mut self, buffer: BufferId);

    /// Compile and link a program.
    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId, GpuError>;

    fn delete_program(&mut self, program: ProgramId);

    /// Issue a draw with the current blend/depth state.
    fn draw(&mut self, call: &DrawCall) -> Result<(), GpuError>;

    /// Submit everything issued since the last present.
    fn present(&mut self) -> Result<(), GpuError>;

    /// Release the underlying device. Best effort: returns `false` when the
    /// backend has no way to do so.
    fn lose_context(&mut self) -> bool;
}
