//! Pooled particle field: independent quads, one draw each.

use glam::{Mat4, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{spawn_transform, ParticleField};
use crate::camera::Camera;
use crate::config::FieldConfig;
use crate::error::GpuError;
use crate::gpu::{DrawCall, DrawUniforms, GraphicsContext, Mesh, MeshBuffers, ProgramId};
use crate::programs::{ProgramCache, ProgramKind};

/// Upper bound (exclusive) of a particle's spin in radians per second.
pub const MAX_SPIN: f32 = 1.0;
/// Largest drift speed along each axis in units per second.
pub const MAX_DRIFT: f32 = 0.25;

/// One independently drawn particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub transform: Mat4,
    /// Rotation about the particle's local X axis, radians per second.
    pub spin: f32,
    /// World-space velocity.
    pub drift: Vec3,
}

impl Particle {
    /// Apply `dt` seconds of spin and drift.
    #[inline]
    pub fn advance(&mut self, dt: f32) {
        self.transform = Mat4::from_translation(self.drift * dt)
            * self.transform
            * Mat4::from_rotation_x(self.spin * dt);
    }
}

#[derive(Debug, Clone, Copy)]
struct Resources {
    program: ProgramId,
    mesh: MeshBuffers,
}

/// Quads that each carry their own transform and issue their own draw.
#[derive(Debug)]
pub struct PooledField {
    particles: Vec<Particle>,
    resources: Option<Resources>,
}

impl PooledField {
    /// Spawn `config.count` quads with random spin and drift.
    pub fn new<G>(
        gfx: &mut G,
        programs: &mut ProgramCache,
        config: &FieldConfig,
        seed: u64,
    ) -> Result<Self, GpuError>
    where
        G: GraphicsContext + ?Sized,
    {
        let mut rng = StdRng::seed_from_u64(seed);
        let particles: Vec<Particle> = (0..config.count)
            .map(|_| Particle {
                transform: spawn_transform(&mut rng, config.spawn_range),
                spin: rng.gen_range(0.0..MAX_SPIN),
                drift: Vec3::new(
                    rng.gen_range(-MAX_DRIFT..=MAX_DRIFT),
                    rng.gen_range(-MAX_DRIFT..=MAX_DRIFT),
                    rng.gen_range(-MAX_DRIFT..=MAX_DRIFT),
                ),
            })
            .collect();

        let program = programs.acquire(gfx, ProgramKind::PooledQuad)?;
        let mesh = match Mesh::quad(config.mesh_size).upload(gfx) {
            Ok(mesh) => mesh,
            Err(e) => {
                programs.release(gfx, ProgramKind::PooledQuad);
                return Err(e);
            }
        };

        log::debug!("pooled field: {} particles", particles.len());

        Ok(Self {
            particles,
            resources: Some(Resources { program, mesh }),
        })
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }
}

impl ParticleField for PooledField {
    fn len(&self) -> usize {
        self.particles.len()
    }

    fn update(&mut self, dt: f32) {
        for particle in &mut self.particles {
            particle.advance(dt);
        }
    }

    fn draw<G>(&mut self, gfx: &mut G, camera: &Camera) -> Result<(), GpuError>
    where
        G: GraphicsContext + ?Sized,
    {
        let Some(res) = self.resources else {
            return Ok(());
        };
        for particle in &self.particles {
            gfx.draw(&DrawCall {
                program: res.program,
                mesh: res.mesh,
                instances: None,
                instance_count: 1,
                uniforms: DrawUniforms::new(camera, particle.transform),
            })?;
        }
        Ok(())
    }

    fn release<G>(&mut self, gfx: &mut G, programs: &mut ProgramCache)
    where
        G: GraphicsContext + ?Sized,
    {
        if let Some(res) = self.resources.take() {
            res.mesh.release(gfx);
            programs.release(gfx, ProgramKind::PooledQuad);
        }
    }

    fn transform(&self, index: usize) -> Option<Mat4> {
        self.particles.get(index).map(|p| p.transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::ShaderLibrary;
    use crate::headless::RecordingContext;

    fn field(count: usize, seed: u64) -> (RecordingContext, ProgramCache, PooledField) {
        let mut gfx = RecordingContext::new();
        let mut programs = ProgramCache::new(ShaderLibrary::builtin());
        let config = FieldConfig {
            count,
            ..FieldConfig::default()
        };
        let field = PooledField::new(&mut gfx, &mut programs, &config, seed).unwrap();
        (gfx, programs, field)
    }

    #[test]
    fn test_one_draw_per_particle() {
        let (mut gfx, _programs, mut field) = field(25, 1);
        gfx.clear_commands();
        field.animate(&mut gfx, &Camera::new(), 0.016).unwrap();
        assert_eq!(gfx.draw_count(), 25);
    }

    #[test]
    fn test_spin_and_drift_ranges() {
        let (_gfx, _programs, field) = field(500, 2);
        for p in field.particles() {
            assert!((0.0..MAX_SPIN).contains(&p.spin));
            assert!(p.drift.abs().max_element() <= MAX_DRIFT);
        }
    }

    #[test]
    fn test_advance() {
        let mut p = Particle {
            transform: Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)),
            spin: 0.5,
            drift: Vec3::new(0.0, 1.0, 0.0),
        };
        p.advance(2.0);
        let expected = Mat4::from_translation(Vec3::new(1.0, 2.0, 0.0)) * Mat4::from_rotation_x(1.0);
        assert!(p.transform.abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn test_release_shares_program() {
        let mut gfx = RecordingContext::new();
        let mut programs = ProgramCache::new(ShaderLibrary::builtin());
        let config = FieldConfig::default();
        let small = FieldConfig { count: 4, ..config };

        let mut a = PooledField::new(&mut gfx, &mut programs, &small, 1).unwrap();
        let mut b = PooledField::new(&mut gfx, &mut programs, &small, 2).unwrap();
        assert_eq!(programs.ref_count(ProgramKind::PooledQuad), 2);
        assert_eq!(gfx.live_programs(), 1);

        a.release(&mut gfx, &mut programs);
        assert_eq!(gfx.live_programs(), 1);
        b.release(&mut gfx, &mut programs);
        assert_eq!(gfx.live_programs(), 0);
        assert_eq!(gfx.live_buffers(), 0);
    }
}
