//! Scenes plugged into the render loop.
//!
//! A [`Scene`] owns a camera and whatever it animates. The render loop
//! refreshes the camera, then hands the scene the context and the frame's
//! delta through [`Scene::animate`].
//!
//! - [`HomeScene`]: orbiting camera, particles assembling into a point cloud.
//! - [`SparkleScene`]: fixed camera, particles tumbling in place.

mod home;
mod sparkle;

use crate::assets::PointCloud;
use crate::camera::Renderable3D;
use crate::config::{SceneConfig, SceneKind};
use crate::error::{GpuError, SceneError};
use crate::gpu::GraphicsContext;
use crate::programs::ProgramCache;

pub use home::HomeScene;
pub use sparkle::SparkleScene;

/// The animated payload of a render loop.
pub trait Scene<G: GraphicsContext + ?Sized> {
    /// Camera refreshed by the loop before `animate` runs.
    fn camera_mut(&mut self) -> &mut dyn Renderable3D;

    /// Advance by `dt` seconds and issue this frame's draws.
    fn animate(&mut self, gfx: &mut G, dt: f32) -> Result<(), GpuError>;

    /// Release GPU resources. Called once from the loop's dispose.
    fn release(&mut self, gfx: &mut G, programs: &mut ProgramCache);
}

/// Either built-in scene.
#[derive(Debug)]
pub enum AnyScene {
    Home(HomeScene),
    Sparkle(SparkleScene),
}

impl AnyScene {
    /// Build the scene named by `config.scene`.
    ///
    /// The home scene loads the built-in point cloud when `shape` is `None`.
    pub fn build<G>(
        gfx: &mut G,
        programs: &mut ProgramCache,
        config: &SceneConfig,
        seed: u64,
        shape: Option<&PointCloud>,
        client_size: (u32, u32),
    ) -> Result<Self, SceneError>
    where
        G: GraphicsContext + ?Sized,
    {
        config.validate()?;
        Ok(match config.scene {
            SceneKind::Home => {
                let builtin;
                let shape = match shape {
                    Some(shape) => shape,
                    None => {
                        builtin = PointCloud::builtin()?;
                        &builtin
                    }
                };
                AnyScene::Home(HomeScene::new(gfx, programs, config, seed, shape, client_size)?)
            }
            SceneKind::Sparkle => {
                AnyScene::Sparkle(SparkleScene::new(gfx, programs, config, seed, client_size)?)
            }
        })
    }

    pub fn kind(&self) -> SceneKind {
        match self {
            AnyScene::Home(_) => SceneKind::Home,
            AnyScene::Sparkle(_) => SceneKind::Sparkle,
        }
    }
}

impl<G: GraphicsContext + ?Sized> Scene<G> for AnyScene {
    fn camera_mut(&mut self) -> &mut dyn Renderable3D {
        match self {
            AnyScene::Home(s) => Scene::<G>::camera_mut(s),
            AnyScene::Sparkle(s) => Scene::<G>::camera_mut(s),
        }
    }

    fn animate(&mut self, gfx: &mut G, dt: f32) -> Result<(), GpuError> {
        match self {
            AnyScene::Home(s) => s.animate(gfx, dt),
            AnyScene::Sparkle(s) => s.animate(gfx, dt),
        }
    }

    fn release(&mut self, gfx: &mut G, programs: &mut ProgramCache) {
        match self {
            AnyScene::Home(s) => s.release(gfx, programs),
            AnyScene::Sparkle(s) => s.release(gfx, programs),
        }
    }
}

/// Clamp a surface size so neither dimension is zero.
#[inline]
pub(crate) fn clamp_size((width, height): (u32, u32)) -> (u32, u32) {
    (width.max(1), height.max(1))
}
