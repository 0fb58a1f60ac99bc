//! Error types for Shimmer.
//!
//! Construction failures (no context, bad dataset, bad config) are fatal and
//! surface as [`SceneError`]. Per-frame GPU failures surface as [`GpuError`]
//! and are logged by the render loop rather than retried.

use thiserror::Error;

use crate::gpu::{BufferId, ProgramId};

/// Errors raised by a [`GraphicsContext`](crate::gpu::GraphicsContext).
#[derive(Debug, Error)]
pub enum GpuError {
    /// No compatible GPU adapter found.
    #[error("no compatible GPU adapter found; WebGPU, WebGL2, Vulkan, Metal or DX12 is required")]
    NoAdapter,
    /// Failed to create a surface for rendering.
    #[error("failed to create GPU surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),
    /// Failed to create GPU device.
    #[error("failed to create GPU device: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),
    /// Failed to acquire the next frame from the surface.
    #[error("failed to acquire surface texture: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    /// The buffer handle does not belong to this context, or was deleted.
    #[error("unknown buffer {0:?}")]
    UnknownBuffer(BufferId),
    /// The program handle does not belong to this context, or was deleted.
    #[error("unknown program {0:?}")]
    UnknownProgram(ProgramId),
    /// A write would run past the end of the buffer.
    #[error("write of {len} bytes at offset {offset} overflows buffer {buffer:?} of {size} bytes")]
    BufferOverflow {
        buffer: BufferId,
        offset: u64,
        len: usize,
        size: u64,
    },
    /// The context was released; no further commands are accepted.
    #[error("graphics context has been lost")]
    ContextLost,
    /// The shader source was rejected.
    #[error("shader `{label}` failed to compile: {message}")]
    ShaderCompilation { label: String, message: String },
}

/// Errors loading the static point-cloud dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Failed to read the dataset from disk.
    #[error("failed to read point cloud: {0}")]
    Io(#[from] std::io::Error),
    /// The dataset is not a JSON array of numbers.
    #[error("failed to parse point cloud: {0}")]
    Parse(#[from] serde_json::Error),
    /// The number of floats is not a multiple of three.
    #[error("point cloud has {len} floats, expected a multiple of 3")]
    Ragged { len: usize },
    /// The dataset holds no points.
    #[error("point cloud is empty")]
    Empty,
}

/// Errors loading or validating a [`SceneConfig`](crate::config::SceneConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Fatal errors constructing a scene or its render loop.
#[derive(Debug, Error)]
pub enum SceneError {
    /// The surface could not produce a rendering context.
    #[error("unable to initialize a rendering context: {0}")]
    NoContext(String),
    /// The surface type cannot host a rendering context at all.
    #[error("surface does not support rendering")]
    UnsupportedSurface,
    /// GPU resource creation failed.
    #[error("GPU error: {0}")]
    Gfx(#[from] GpuError),
    /// The point-cloud dataset could not be loaded.
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),
    /// The scene configuration is invalid.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors running the native window host.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Error)]
pub enum HostError {
    /// The winit event loop could not be created or failed while running.
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    /// The window could not be created.
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    /// The scene failed to start.
    #[error(transparent)]
    Scene(#[from] SceneError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_error_wraps_gpu_error() {
        let err: SceneError = GpuError::NoAdapter.into();
        assert!(matches!(err, SceneError::Gfx(GpuError::NoAdapter)));
        assert!(err.to_string().contains("no compatible GPU adapter"));
    }

    #[test]
    fn test_buffer_overflow_message() {
        let err = GpuError::BufferOverflow {
            buffer: BufferId(3),
            offset: 8,
            len: 64,
            size: 32,
        };
        let msg = err.to_string();
        assert!(msg.contains("64 bytes"));
        assert!(msg.contains("32 bytes"));
    }
}
