//! # Shimmer
//!
//! A perspective camera and a GPU-instanced particle field, animated once per
//! display refresh. Built to sit behind a web page as a decorative background,
//! and just as happy in a native window or with no display at all.
//!
//! ## Quick Start
//!
//! ```ignore
//! use shimmer::prelude::*;
//!
//! fn main() -> Result<(), shimmer::error::HostError> {
//!     let config = SceneConfig::home().with_particle_count(10_000);
//!     shimmer::window::run(config, 42, None)
//! }
//! ```
//!
//! In the browser, `mount_home_scene(canvas)` does the same and returns a
//! handle whose `dispose()` tears everything down.
//!
//! ## Core Concepts
//!
//! ### The render loop
//!
//! [`RenderLoop`](render_loop::RenderLoop) owns the graphics context and runs
//! one frame per callback from the host's
//! [`FrameScheduler`](host::FrameScheduler): resize to the window, refresh
//! the camera, let the scene animate, present, schedule the next frame.
//! `dispose()` stops it for good.
//!
//! ### Cameras
//!
//! [`Camera`](camera::Camera) looks at the origin from a fixed eye;
//! [`OrbitCamera`](camera::OrbitCamera) circles it. Both implement
//! [`Renderable3D`](camera::Renderable3D).
//!
//! ### Particle fields
//!
//! | Field | Draws per frame | Suited to |
//! |-------|-----------------|-----------|
//! | [`InstancedField`](particles::InstancedField) | 1 | 10,000+ particles |
//! | [`PooledField`](particles::PooledField) | one per particle | ~1,000 particles |
//!
//! Fields share their compiled program through a
//! [`ProgramCache`](programs::ProgramCache) scoped to the render loop.
//!
//! ### Hosts
//!
//! | Host | Surface | Scheduler |
//! |------|---------|-----------|
//! | browser (`wasm32`) | `<canvas>` | `requestAnimationFrame` |
//! | native | winit window | `request_redraw` |
//! | [`headless`] | in-memory | driven by hand |

pub mod assets;
pub mod camera;
pub mod config;
pub mod error;
pub mod gpu;
pub mod headless;
pub mod host;
pub mod particles;
pub mod programs;
pub mod render_loop;
pub mod scenes;
pub mod time;

#[cfg(not(target_arch = "wasm32"))]
pub mod window;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use glam::{Mat4, Vec3};

/// Everything needed to build and drive a scene.
pub mod prelude {
    pub use crate::assets::{PointCloud, ShaderLibrary};
    pub use crate::camera::{Camera, OrbitCamera, Renderable3D};
    pub use crate::config::{FieldConfig, SceneConfig, SceneKind};
    pub use crate::error::{GpuError, SceneError};
    pub use crate::gpu::GraphicsContext;
    pub use crate::headless::{HeadlessSurface, ManualScheduler, RecordingContext};
    pub use crate::host::{FrameHandle, FrameScheduler, Surface};
    pub use crate::particles::{AnyField, FieldMode, InstancedField, ParticleField, PooledField};
    pub use crate::programs::{ProgramCache, ProgramKind};
    pub use crate::render_loop::{FrameOutcome, RenderLoop};
    pub use crate::scenes::{AnyScene, HomeScene, Scene, SparkleScene};
    pub use crate::time::FrameTimer;
    pub use glam::{Mat4, Vec3};
    pub use std::time::Duration;
}
