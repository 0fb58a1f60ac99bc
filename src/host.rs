//! Collaborators supplied by whatever hosts the render loop.
//!
//! A host provides two things: a [`Surface`] that can be sized and can hand
//! out a graphics context, and a [`FrameScheduler`] that calls back before the
//! next display refresh. The browser, a winit window and the headless test
//! doubles all implement these.

use std::time::Duration;

use crate::error::SceneError;
use crate::gpu::GraphicsContext;

/// A drawable 2D surface, like a canvas element.
pub trait Surface {
    /// The context type this surface renders through.
    type Context: GraphicsContext;

    /// Obtain a rendering context. Failing here is fatal for the loop.
    fn create_context(&mut self) -> Result<Self::Context, SceneError>;

    /// Drawing-buffer size in pixels.
    fn size(&self) -> (u32, u32);

    /// Resize the drawing buffer.
    fn set_size(&mut self, width: u32, height: u32);

    /// Size the surface is laid out at on the page.
    fn client_size(&self) -> (u32, u32);

    /// Size of the host window the surface tracks every frame.
    fn window_size(&self) -> (u32, u32);
}

/// Opaque handle for a scheduled frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Schedules the render loop's next frame.
///
/// The host invokes [`RenderLoop::on_frame`](crate::render_loop::RenderLoop::on_frame)
/// when a requested frame fires.
pub trait FrameScheduler {
    /// Current host time on the same clock passed to `on_frame`.
    fn now(&self) -> Duration;

    /// Ask for a callback before the next display refresh.
    fn request_frame(&mut self) -> FrameHandle;

    /// Cancel a previously requested callback. Unknown handles are ignored.
    fn cancel_frame(&mut self, handle: FrameHandle);
}
