//! Native host: a winit window stands in for the page's canvas.
//!
//! [`WindowSurface`] hands the render loop a [`WgpuContext`] bound to the
//! window, and [`RedrawScheduler`] turns frame requests into
//! `request_redraw` calls. The [`App`] handler forwards each
//! `RedrawRequested` event to [`RenderLoop::on_frame`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::assets::{PointCloud, ShaderLibrary};
use crate::config::SceneConfig;
use crate::error::{HostError, SceneError};
use crate::gpu::WgpuContext;
use crate::host::{FrameHandle, FrameScheduler, Surface};
use crate::render_loop::RenderLoop;
use crate::scenes::{clamp_size, AnyScene};

/// A window's drawable area.
pub struct WindowSurface {
    window: Arc<Window>,
    size: (u32, u32),
}

impl WindowSurface {
    pub fn new(window: Arc<Window>) -> Self {
        let size = clamp_size(window.inner_size().into());
        Self { window, size }
    }
}

impl Surface for WindowSurface {
    type Context = WgpuContext;

    fn create_context(&mut self) -> Result<WgpuContext, SceneError> {
        let (width, height) = self.size;
        pollster::block_on(WgpuContext::new(self.window.clone(), width, height))
            .map_err(|e| SceneError::NoContext(e.to_string()))
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn client_size(&self) -> (u32, u32) {
        self.window.inner_size().into()
    }

    fn window_size(&self) -> (u32, u32) {
        self.window.inner_size().into()
    }
}

/// Schedules frames by asking winit for a redraw.
pub struct RedrawScheduler {
    window: Arc<Window>,
    start: Instant,
    next_handle: u64,
}

impl RedrawScheduler {
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            start: Instant::now(),
            next_handle: 0,
        }
    }
}

impl FrameScheduler for RedrawScheduler {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn request_frame(&mut self) -> FrameHandle {
        self.next_handle += 1;
        self.window.request_redraw();
        FrameHandle(self.next_handle)
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        // winit has no way to withdraw a redraw request; the loop ignores
        // the event once it has no pending frame.
        log::trace!("frame {:?} cancelled", handle);
    }
}

type NativeLoop = RenderLoop<WindowSurface, RedrawScheduler, AnyScene>;

/// winit application running one scene until the window closes.
pub struct App {
    config: SceneConfig,
    seed: u64,
    shape: Option<PointCloud>,
    window: Option<Arc<Window>>,
    render_loop: Option<NativeLoop>,
    error: Option<HostError>,
}

impl App {
    pub fn new(config: SceneConfig, seed: u64, shape: Option<PointCloud>) -> Self {
        Self {
            config,
            seed,
            shape,
            window: None,
            render_loop: None,
            error: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<(), HostError> {
        let window_attrs = Window::default_attributes()
            .with_title(format!("Shimmer - {}", self.config.scene))
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720))
            .with_transparent(true);
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let config = &self.config;
        let seed = self.seed;
        let shape = self.shape.as_ref();
        let mut render_loop = RenderLoop::new(
            WindowSurface::new(window.clone()),
            RedrawScheduler::new(window.clone()),
            ShaderLibrary::builtin(),
            |gfx, programs, size| AnyScene::build(gfx, programs, config, seed, shape, size),
        )?;
        render_loop.set_clear_color(config.clear_color);

        self.window = Some(window);
        self.render_loop = Some(render_loop);
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            self.error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(render_loop) = &mut self.render_loop {
                    render_loop.dispose();
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                if let Some(render_loop) = &mut self.render_loop {
                    let now = render_loop.scheduler().now();
                    render_loop.on_frame(now);
                }
            }
            _ => {}
        }
    }
}

/// Open a window and animate the configured scene until it is closed.
pub fn run(config: SceneConfig, seed: u64, shape: Option<PointCloud>) -> Result<(), HostError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config, seed, shape);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
