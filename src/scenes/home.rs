//! The home page scene.

use crate::assets::PointCloud;
use crate::camera::{OrbitCamera, Renderable3D};
use crate::config::SceneConfig;
use crate::error::GpuError;
use crate::gpu::GraphicsContext;
use crate::particles::{AnyField, ParticleField};
use crate::programs::ProgramCache;

use super::{clamp_size, Scene};

/// Particles drifting in from a random cloud to form `shape`, watched by a
/// camera that slowly circles the origin.
#[derive(Debug)]
pub struct HomeScene {
    camera: OrbitCamera,
    field: AnyField,
    orbit_speed: f32,
}

impl HomeScene {
    pub fn new<G>(
        gfx: &mut G,
        programs: &mut ProgramCache,
        config: &SceneConfig,
        seed: u64,
        shape: &PointCloud,
        client_size: (u32, u32),
    ) -> Result<Self, GpuError>
    where
        G: GraphicsContext + ?Sized,
    {
        let (width, height) = clamp_size(client_size);
        let mut camera = OrbitCamera::with_surface_size(width, height);
        camera.distance = config.orbit_distance;

        let field = AnyField::new(gfx, programs, &config.field, seed, Some(shape))?;

        Ok(Self {
            camera,
            field,
            orbit_speed: config.orbit_speed,
        })
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn field(&self) -> &AnyField {
        &self.field
    }
}

impl<G: GraphicsContext + ?Sized> Scene<G> for HomeScene {
    fn camera_mut(&mut self) -> &mut dyn Renderable3D {
        &mut self.camera
    }

    fn animate(&mut self, gfx: &mut G, dt: f32) -> Result<(), GpuError> {
        // Takes effect on the next frame's camera refresh.
        self.camera.azimuth += dt * self.orbit_speed;
        self.field.animate(gfx, self.camera.camera(), dt)
    }

    fn release(&mut self, gfx: &mut G, programs: &mut ProgramCache) {
        self.field.release(gfx, programs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::ShaderLibrary;
    use crate::headless::RecordingContext;

    #[test]
    fn test_orbit_advances() {
        let mut gfx = RecordingContext::new();
        let mut programs = ProgramCache::new(ShaderLibrary::builtin());
        let shape = PointCloud::from_flat(&[0.0, 0.0, 0.0]).unwrap();
        let config = SceneConfig::home().with_particle_count(4);
        let mut scene = HomeScene::new(&mut gfx, &mut programs, &config, 1, &shape, (800, 600)).unwrap();

        assert_eq!(scene.camera().distance, 2.5);
        Scene::<RecordingContext>::camera_mut(&mut scene).render();
        scene.animate(&mut gfx, 2.0).unwrap();
        assert!((scene.camera().azimuth - 0.2).abs() < 1e-6);
        assert_eq!(gfx.draw_count(), 1);
    }
}
