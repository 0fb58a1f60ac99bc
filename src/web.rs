//! Browser host: a `<canvas>` and `requestAnimationFrame`.
//!
//! JavaScript mounts a scene on a canvas and keeps the returned handle for as
//! long as the view is shown:
//!
//! ```ignore
//! import init, { mount_home_scene } from "./pkg/shimmer.js";
//!
//! await init();
//! const scene = await mount_home_scene(document.querySelector("canvas"));
//! // navigating away
//! scene.dispose();
//! ```
//!
//! The wgpu context has to be created asynchronously, so it is built before
//! the render loop and handed over through [`CanvasSurface`].

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::HtmlCanvasElement;

use crate::assets::ShaderLibrary;
use crate::config::SceneConfig;
use crate::error::SceneError;
use crate::gpu::WgpuContext;
use crate::host::{FrameHandle, FrameScheduler, Surface};
use crate::render_loop::RenderLoop;
use crate::scenes::{clamp_size, AnyScene};

type WebLoop = RenderLoop<CanvasSurface, AnimationFrameScheduler, AnyScene>;
type FrameCallback = Closure<dyn FnMut(f64)>;

/// A canvas element plus the context created for it.
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    context: Option<WgpuContext>,
}

impl CanvasSurface {
    /// Create a wgpu context for `canvas`.
    pub async fn new(canvas: HtmlCanvasElement) -> Result<Self, SceneError> {
        let (width, height) = clamp_size((canvas.width(), canvas.height()));
        let context = WgpuContext::new(wgpu::SurfaceTarget::Canvas(canvas.clone()), width, height)
            .await
            .map_err(|e| SceneError::NoContext(e.to_string()))?;
        Ok(Self {
            canvas,
            context: Some(context),
        })
    }
}

impl Surface for CanvasSurface {
    type Context = WgpuContext;

    fn create_context(&mut self) -> Result<WgpuContext, SceneError> {
        self.context
            .take()
            .ok_or_else(|| SceneError::NoContext("canvas context already taken".into()))
    }

    fn size(&self) -> (u32, u32) {
        (self.canvas.width(), self.canvas.height())
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.canvas.set_width(width);
        self.canvas.set_height(height);
    }

    fn client_size(&self) -> (u32, u32) {
        (
            self.canvas.client_width().max(0) as u32,
            self.canvas.client_height().max(0) as u32,
        )
    }

    fn window_size(&self) -> (u32, u32) {
        let Some(window) = web_sys::window() else {
            return self.size();
        };
        let dimension = |value: Result<JsValue, JsValue>| {
            value.ok().and_then(|v| v.as_f64()).unwrap_or(0.0) as u32
        };
        (dimension(window.inner_width()), dimension(window.inner_height()))
    }
}

/// `requestAnimationFrame` / `cancelAnimationFrame`.
pub struct AnimationFrameScheduler {
    window: web_sys::Window,
    callback: Rc<RefCell<Option<FrameCallback>>>,
}

impl FrameScheduler for AnimationFrameScheduler {
    fn now(&self) -> Duration {
        let millis = self.window.performance().map_or(0.0, |p| p.now());
        Duration::from_secs_f64(millis.max(0.0) / 1000.0)
    }

    fn request_frame(&mut self) -> FrameHandle {
        let callback = self.callback.borrow();
        let Some(callback) = callback.as_ref() else {
            return FrameHandle(0);
        };
        match self
            .window
            .request_animation_frame(callback.as_ref().unchecked_ref())
        {
            Ok(id) => FrameHandle(id as u64),
            Err(e) => {
                log::warn!("requestAnimationFrame failed: {e:?}");
                FrameHandle(0)
            }
        }
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if let Err(e) = self.window.cancel_animation_frame(handle.0 as i32) {
            log::warn!("cancelAnimationFrame failed: {e:?}");
        }
    }
}

/// Handle to a mounted scene. Dropping it, or calling `dispose`, stops the
/// animation and releases the GPU context.
#[wasm_bindgen]
pub struct SceneHandle {
    render_loop: Rc<RefCell<Option<WebLoop>>>,
}

#[wasm_bindgen]
impl SceneHandle {
    /// Stop animating and release the canvas. Safe to call more than once.
    pub fn dispose(&self) {
        let render_loop = self.render_loop.borrow_mut().take();
        if let Some(mut render_loop) = render_loop {
            render_loop.dispose();
        }
    }

    /// Whether the scene is still animating.
    #[wasm_bindgen(getter)]
    pub fn active(&self) -> bool {
        self.render_loop
            .borrow()
            .as_ref()
            .is_some_and(|l| l.is_active())
    }
}

/// Mount the home scene: 10,000 cubes assembling into the built-in shape.
#[wasm_bindgen]
pub async fn mount_home_scene(canvas: HtmlCanvasElement) -> Result<SceneHandle, JsError> {
    mount(canvas, SceneConfig::home()).await
}

/// Mount the sparkle scene: a fixed camera over tumbling cubes.
#[wasm_bindgen]
pub async fn mount_sparkle_scene(canvas: HtmlCanvasElement) -> Result<SceneHandle, JsError> {
    mount(canvas, SceneConfig::sparkle()).await
}

async fn mount(canvas: HtmlCanvasElement, config: SceneConfig) -> Result<SceneHandle, JsError> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();

    let window = web_sys::window().ok_or_else(|| JsError::new("no global window"))?;
    let surface = CanvasSurface::new(canvas).await?;
    let seed = config.seed.unwrap_or_else(random_seed);

    let cell: Rc<RefCell<Option<WebLoop>>> = Rc::new(RefCell::new(None));
    let callback: Rc<RefCell<Option<FrameCallback>>> = Rc::new(RefCell::new(None));
    *callback.borrow_mut() = Some(frame_callback(Rc::downgrade(&cell)));

    let scheduler = AnimationFrameScheduler {
        window,
        callback,
    };
    let mut render_loop = RenderLoop::new(surface, scheduler, ShaderLibrary::builtin(), |gfx, programs, size| {
        AnyScene::build(gfx, programs, &config, seed, None, size)
    })?;
    render_loop.set_clear_color(config.clear_color);
    *cell.borrow_mut() = Some(render_loop);

    Ok(SceneHandle { render_loop: cell })
}

fn frame_callback(render_loop: Weak<RefCell<Option<WebLoop>>>) -> FrameCallback {
    Closure::new(move |timestamp: f64| {
        let Some(cell) = render_loop.upgrade() else {
            return;
        };
        // A frame already queued when the scene was disposed lands here with
        // an empty cell.
        if let Some(render_loop) = cell.borrow_mut().as_mut() {
            render_loop.on_frame(Duration::from_secs_f64(timestamp.max(0.0) / 1000.0));
        }
    })
}

fn random_seed() -> u64 {
    (js_sys::Math::random() * u64::MAX as f64) as u64
}
