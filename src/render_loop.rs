//! The per-frame driver.
//!
//! [`RenderLoop`] owns the graphics context, the program cache and a
//! [`Scene`], and runs the scene once per display refresh. It is an explicit
//! two-state machine:
//!
//! ```text
//!            on_frame (re-schedules)
//!              ┌──────┐
//!              ▼      │
//!  new ──▶  Active ───┘ ──dispose──▶ Disposed
//!                                      │  ▲
//!                                      └──┘ on_frame / dispose: no-op
//! ```
//!
//! The loop never calls itself. The host's [`FrameScheduler`] fires a
//! callback, the host calls [`RenderLoop::on_frame`], and `on_frame` asks the
//! scheduler for the next one. Disposing cancels the pending callback and
//! clears the context, so a callback that was already queued returns without
//! touching anything.
//!
//! # Example
//!
//! ```ignore
//! use shimmer::prelude::*;
//!
//! let config = SceneConfig::home().with_seed(42);
//! let mut render_loop = RenderLoop::new(
//!     HeadlessSurface::new(800, 600),
//!     ManualScheduler::new(),
//!     ShaderLibrary::builtin(),
//!     |gfx, programs, size| AnyScene::build(gfx, programs, &config, 42, None, size),
//! )?;
//!
//! render_loop.scheduler_mut().advance(Duration::from_millis(16));
//! let now = render_loop.scheduler().now();
//! render_loop.on_frame(now);
//! render_loop.dispose();
//! ```

use std::time::Duration;

use crate::assets::ShaderLibrary;
use crate::error::SceneError;
use crate::gpu::{BlendFunc, Capability, GraphicsContext};
use crate::host::{FrameHandle, FrameScheduler, Surface};
use crate::programs::ProgramCache;
use crate::scenes::{clamp_size, Scene};
use crate::time::FrameTimer;

/// What a call to [`RenderLoop::on_frame`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame was drawn and the next one scheduled.
    Rendered,
    /// The loop is disposed, or no frame was pending; nothing happened.
    Skipped,
}

/// Drives a [`Scene`] on a [`Surface`] at the pace of a [`FrameScheduler`].
pub struct RenderLoop<S, H, Sc>
where
    S: Surface,
    H: FrameScheduler,
    Sc: Scene<S::Context>,
{
    surface: S,
    scheduler: H,
    /// `Some` while active.
    gfx: Option<S::Context>,
    scene: Sc,
    programs: ProgramCache,
    timer: FrameTimer,
    pending: Option<FrameHandle>,
    clear_color: [f32; 4],
}

impl<S, H, Sc> RenderLoop<S, H, Sc>
where
    S: Surface,
    H: FrameScheduler,
    Sc: Scene<S::Context>,
{
    /// Acquire a context from `surface`, build the scene and schedule the
    /// first frame.
    ///
    /// `build` receives the fresh context, the loop's program cache and the
    /// surface's client size. If the context cannot be created, or `build`
    /// fails, the error is returned and no frame is ever scheduled. Programs
    /// compiled before a build failure are deleted, the surface is shrunk to
    /// 1×1 and the context is released.
    pub fn new<F>(mut surface: S, mut scheduler: H, shaders: ShaderLibrary, build: F) -> Result<Self, SceneError>
    where
        F: FnOnce(&mut S::Context, &mut ProgramCache, (u32, u32)) -> Result<Sc, SceneError>,
    {
        let mut gfx = surface.create_context()?;
        let mut programs = ProgramCache::new(shaders);

        let scene = match build(&mut gfx, &mut programs, clamp_size(surface.client_size())) {
            Ok(scene) => scene,
            Err(e) => {
                programs.release_all(&mut gfx);
                surface.set_size(1, 1);
                gfx.lose_context();
                return Err(e);
            }
        };

        let timer = FrameTimer::new(scheduler.now());
        let pending = Some(scheduler.request_frame());
        let (width, height) = surface.size();
        log::info!("render loop started on a {width}x{height} surface");

        Ok(Self {
            surface,
            scheduler,
            gfx: Some(gfx),
            scene,
            programs,
            timer,
            pending,
            clear_color: [0.0; 4],
        })
    }

    /// Run one frame at host time `now`.
    ///
    /// Resizes the surface to the window, refreshes the camera, lets the
    /// scene animate, presents, then schedules the next frame. A failed
    /// animate or present is logged and the loop carries on.
    pub fn on_frame(&mut self, now: Duration) -> FrameOutcome {
        let Some(gfx) = self.gfx.as_mut() else {
            return FrameOutcome::Skipped;
        };
        if self.pending.take().is_none() {
            return FrameOutcome::Skipped;
        }

        let (width, height) = clamp_size(self.surface.window_size());
        self.surface.set_size(width, height);
        gfx.viewport(0, 0, width, height);

        let (width, height) = clamp_size(self.surface.size());
        self.scene.camera_mut().set_aspect_ratio(width, height);

        gfx.clear(self.clear_color);
        gfx.disable(Capability::DepthTest);
        gfx.enable(Capability::Blend);
        gfx.blend_func_separate(BlendFunc::TRANSPARENT_TARGET);

        self.scene.camera_mut().render();

        let dt = self.timer.tick(now);
        if let Err(e) = self.scene.animate(gfx, dt) {
            log::warn!("frame {}: animate failed: {e}", self.timer.frame());
        }
        if let Err(e) = gfx.present() {
            log::warn!("frame {}: present failed: {e}", self.timer.frame());
        }

        self.pending = Some(self.scheduler.request_frame());
        FrameOutcome::Rendered
    }

    /// Stop the loop and release everything it holds.
    ///
    /// Cancels the pending frame, releases the scene's buffers and every
    /// program, shrinks the surface to 1×1 and loses the context. Calling it
    /// again does nothing.
    pub fn dispose(&mut self) {
        let Some(mut gfx) = self.gfx.take() else {
            return;
        };
        if let Some(handle) = self.pending.take() {
            self.scheduler.cancel_frame(handle);
        }

        self.scene.release(&mut gfx, &mut self.programs);
        self.programs.release_all(&mut gfx);
        self.surface.set_size(1, 1);
        if !gfx.lose_context() {
            log::warn!("context loss is not supported; leaving cleanup to drop");
        }
        log::info!("render loop disposed after {} frames", self.timer.frame());
    }

    /// `true` until [`dispose`](Self::dispose).
    pub fn is_active(&self) -> bool {
        self.gfx.is_some()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn scheduler(&self) -> &H {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut H {
        &mut self.scheduler
    }

    /// The graphics context, `None` once disposed.
    pub fn context(&self) -> Option<&S::Context> {
        self.gfx.as_ref()
    }

    pub fn scene(&self) -> &Sc {
        &self.scene
    }

    pub fn programs(&self) -> &ProgramCache {
        &self.programs
    }

    pub fn timer(&self) -> &FrameTimer {
        &self.timer
    }

    /// Handle of the frame callback currently scheduled.
    pub fn pending_frame(&self) -> Option<FrameHandle> {
        self.pending
    }

    /// RGBA color the surface is cleared to each frame. Defaults to transparent.
    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }
}

impl<S, H, Sc> Drop for RenderLoop<S, H, Sc>
where
    S: Surface,
    H: FrameScheduler,
    Sc: Scene<S::Context>,
{
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;
    use crate::headless::{Command, HeadlessSurface, ManualScheduler, RecordingContext};
    use crate::scenes::AnyScene;

    type TestLoop = RenderLoop<HeadlessSurface, ManualScheduler, AnyScene>;

    fn start(config: SceneConfig) -> TestLoop {
        RenderLoop::new(
            HeadlessSurface::new(800, 600),
            ManualScheduler::new(),
            ShaderLibrary::builtin(),
            |gfx, programs, size| AnyScene::build(gfx, programs, &config, 7, None, size),
        )
        .unwrap()
    }

    fn frame(render_loop: &mut TestLoop, ms: u64) -> FrameOutcome {
        render_loop.scheduler_mut().advance(Duration::from_millis(ms));
        let now = render_loop.scheduler().now();
        render_loop.on_frame(now)
    }

    fn gfx(render_loop: &TestLoop) -> &RecordingContext {
        render_loop.context().unwrap()
    }

    #[test]
    fn test_frame_sequence() {
        let mut render_loop = start(SceneConfig::sparkle().with_particle_count(5));
        render_loop.surface_mut().resize_window(1024, 768);

        assert_eq!(frame(&mut render_loop, 16), FrameOutcome::Rendered);
        assert_eq!(render_loop.surface().size(), (1024, 768));

        let commands = gfx(&render_loop).commands();
        let first = commands
            .iter()
            .position(|c| matches!(c, Command::Viewport { .. }))
            .unwrap();
        assert_eq!(
            &commands[first..first + 5],
            &[
                Command::Viewport { x: 0, y: 0, width: 1024, height: 768 },
                Command::Clear([0.0; 4]),
                Command::Disable(Capability::DepthTest),
                Command::Enable(Capability::Blend),
                Command::BlendFunc(BlendFunc::TRANSPARENT_TARGET),
            ]
        );
        assert_eq!(commands.last(), Some(&Command::Present));
    }

    #[test]
    fn test_each_frame_reschedules() {
        let mut render_loop = start(SceneConfig::sparkle().with_particle_count(5));
        assert_eq!(render_loop.scheduler().requested().len(), 1);
        for i in 0..3 {
            frame(&mut render_loop, 16);
            assert_eq!(render_loop.scheduler().requested().len(), i + 2);
        }
        assert_eq!(render_loop.timer().frame(), 3);
        assert!((render_loop.timer().delta() - 0.016).abs() < 1e-6);
    }

    #[test]
    fn test_zero_window_is_clamped() {
        let mut render_loop = start(SceneConfig::sparkle().with_particle_count(5));
        render_loop.surface_mut().resize_window(0, 0);
        frame(&mut render_loop, 16);
        assert_eq!(render_loop.surface().size(), (1, 1));
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut render_loop = start(SceneConfig::home().with_particle_count(5));
        render_loop.dispose();
        render_loop.dispose();
        assert!(!render_loop.is_active());
        assert_eq!(render_loop.scheduler().cancelled().len(), 1);
        assert_eq!(frame(&mut render_loop, 16), FrameOutcome::Skipped);
    }

    #[test]
    fn test_failed_build_cleans_up() {
        let surface = HeadlessSurface::new(800, 600);
        let log = surface.log();
        let result: Result<TestLoop, _> = RenderLoop::new(
            surface,
            ManualScheduler::new(),
            ShaderLibrary::builtin(),
            |gfx, programs, _| {
                programs.acquire(gfx, crate::programs::ProgramKind::PooledQuad)?;
                Err(SceneError::UnsupportedSurface)
            },
        );
        assert!(matches!(result, Err(SceneError::UnsupportedSurface)));

        let commands = log.commands();
        let deleted = commands
            .iter()
            .position(|c| matches!(c, Command::DeleteProgram(_)))
            .expect("program deleted");
        let lost = commands
            .iter()
            .position(|c| *c == Command::LoseContext)
            .expect("context lost");
        assert!(deleted < lost);
        assert_eq!(log.live_programs(), 0);
        assert_eq!(log.last_size(), Some((1, 1)));
    }
}
