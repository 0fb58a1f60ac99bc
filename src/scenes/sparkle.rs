//! The earlier home page scene: a fixed camera over a shimmering cloud.

use crate::camera::{Camera, Renderable3D};
use crate::config::SceneConfig;
use crate::error::GpuError;
use crate::gpu::GraphicsContext;
use crate::particles::{AnyField, ParticleField};
use crate::programs::ProgramCache;

use super::{clamp_size, Scene};

#[derive(Debug)]
pub struct SparkleScene {
    camera: Camera,
    field: AnyField,
}

impl SparkleScene {
    pub fn new<G>(
        gfx: &mut G,
        programs: &mut ProgramCache,
        config: &SceneConfig,
        seed: u64,
        client_size: (u32, u32),
    ) -> Result<Self, GpuError>
    where
        G: GraphicsContext + ?Sized,
    {
        let (width, height) = clamp_size(client_size);
        let field = AnyField::new(gfx, programs, &config.field, seed, None)?;
        Ok(Self {
            camera: Camera::with_surface_size(width, height),
            field,
        })
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn field(&self) -> &AnyField {
        &self.field
    }
}

impl<G: GraphicsContext + ?Sized> Scene<G> for SparkleScene {
    fn camera_mut(&mut self) -> &mut dyn Renderable3D {
        &mut self.camera
    }

    fn animate(&mut self, gfx: &mut G, dt: f32) -> Result<(), GpuError> {
        self.field.animate(gfx, &self.camera, dt)
    }

    fn release(&mut self, gfx: &mut G, programs: &mut ProgramCache) {
        self.field.release(gfx, programs);
    }
}
