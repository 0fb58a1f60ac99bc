//! Animated particle fields.
//!
//! A field owns a set of per-particle world transforms, mutates them every
//! frame, and draws them. Two layouts implement [`ParticleField`]:
//!
//! | Field | GPU layout | Draw calls per frame | Motion |
//! |-------|------------|----------------------|--------|
//! | [`InstancedField`] | one cube mesh + one instance buffer | 1 | steer toward targets, random X tumble |
//! | [`PooledField`] | one quad mesh, transform in uniforms | one per particle | constant spin and drift |
//!
//! The instanced layout is the one to use for large counts (10,000 and up);
//! the pooled layout suits around a thousand particles.
//!
//! # Example
//!
//! ```ignore
//! use shimmer::particles::{InstancedField, ParticleField};
//!
//! let mut field = InstancedField::new(&mut gfx, &mut programs, &config.field, 42, None)?;
//! field.animate(&mut gfx, camera.camera(), 0.016)?;
//! field.release(&mut gfx, &mut programs);
//! ```

mod instanced;
mod pooled;

use std::fmt;
use std::str::FromStr;

use glam::{Mat4, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::assets::PointCloud;
use crate::camera::Camera;
use crate::config::FieldConfig;
use crate::error::GpuError;
use crate::gpu::GraphicsContext;
use crate::programs::ProgramCache;

pub use instanced::InstancedField;
pub use pooled::{Particle, PooledField, MAX_DRIFT, MAX_SPIN};

/// Which field layout to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldMode {
    /// One instanced draw for every particle.
    #[default]
    Instanced,
    /// One draw per particle.
    Pooled,
}

impl FromStr for FieldMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instanced" => Ok(FieldMode::Instanced),
            "pooled" => Ok(FieldMode::Pooled),
            other => Err(format!("unknown field mode `{other}` (expected instanced or pooled)")),
        }
    }
}

impl fmt::Display for FieldMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldMode::Instanced => "instanced",
            FieldMode::Pooled => "pooled",
        })
    }
}

/// A set of particles that can be advanced and drawn.
pub trait ParticleField {
    /// Number of particles.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Advance every particle by `dt` seconds.
    fn update(&mut self, dt: f32);

    /// Draw every particle with the camera's current matrices.
    ///
    /// Drawing a released field does nothing.
    fn draw<G>(&mut self, gfx: &mut G, camera: &Camera) -> Result<(), GpuError>
    where
        G: GraphicsContext + ?Sized;

    /// [`update`](Self::update) then [`draw`](Self::draw).
    fn animate<G>(&mut self, gfx: &mut G, camera: &Camera, dt: f32) -> Result<(), GpuError>
    where
        G: GraphicsContext + ?Sized,
    {
        self.update(dt);
        self.draw(gfx, camera)
    }

    /// Delete the field's buffers and drop its program reference.
    ///
    /// Safe to call more than once.
    fn release<G>(&mut self, gfx: &mut G, programs: &mut ProgramCache)
    where
        G: GraphicsContext + ?Sized;

    /// World transform of particle `index`.
    fn transform(&self, index: usize) -> Option<Mat4>;
}

/// Either field layout, chosen at runtime.
#[derive(Debug)]
pub enum AnyField {
    Instanced(InstancedField),
    Pooled(PooledField),
}

impl AnyField {
    /// Build the layout `config.mode` asks for.
    ///
    /// `targets` only applies to the instanced layout.
    pub fn new<G>(
        gfx: &mut G,
        programs: &mut ProgramCache,
        config: &FieldConfig,
        seed: u64,
        targets: Option<&PointCloud>,
    ) -> Result<Self, GpuError>
    where
        G: GraphicsContext + ?Sized,
    {
        Ok(match config.mode {
            FieldMode::Instanced => {
                AnyField::Instanced(InstancedField::new(gfx, programs, config, seed, targets)?)
            }
            FieldMode::Pooled => AnyField::Pooled(PooledField::new(gfx, programs, config, seed)?),
        })
    }

    pub fn mode(&self) -> FieldMode {
        match self {
            AnyField::Instanced(_) => FieldMode::Instanced,
            AnyField::Pooled(_) => FieldMode::Pooled,
        }
    }
}

impl ParticleField for AnyField {
    fn len(&self) -> usize {
        match self {
            AnyField::Instanced(f) => f.len(),
            AnyField::Pooled(f) => f.len(),
        }
    }

    fn update(&mut self, dt: f32) {
        match self {
            AnyField::Instanced(f) => f.update(dt),
            AnyField::Pooled(f) => f.update(dt),
        }
    }

    fn draw<G>(&mut self, gfx: &mut G, camera: &Camera) -> Result<(), GpuError>
    where
        G: GraphicsContext + ?Sized,
    {
        match self {
            AnyField::Instanced(f) => f.draw(gfx, camera),
            AnyField::Pooled(f) => f.draw(gfx, camera),
        }
    }

    fn release<G>(&mut self, gfx: &mut G, programs: &mut ProgramCache)
    where
        G: GraphicsContext + ?Sized,
    {
        match self {
            AnyField::Instanced(f) => f.release(gfx, programs),
            AnyField::Pooled(f) => f.release(gfx, programs),
        }
    }

    fn transform(&self, index: usize) -> Option<Mat4> {
        match self {
            AnyField::Instanced(f) => f.transform(index),
            AnyField::Pooled(f) => f.transform(index),
        }
    }
}

/// Random spawn transform: translation inside the spawn box, then a random
/// rotation about Z followed by one about X.
pub(crate) fn spawn_transform<R: Rng>(rng: &mut R, range: f32) -> Mat4 {
    let position = Vec3::new(
        rng.gen_range(-range..=range),
        rng.gen_range(-range..=range),
        rng.gen_range(0.0..=range),
    );
    let rot_z = rng.gen_range(0.0..std::f32::consts::TAU);
    let rot_x = rng.gen_range(0.0..std::f32::consts::TAU);
    Mat4::from_translation(position) * Mat4::from_rotation_z(rot_z) * Mat4::from_rotation_x(rot_x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_spawn_inside_box() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1000 {
            let t = spawn_transform(&mut rng, 20.0).w_axis.truncate();
            assert!(t.x.abs() <= 20.0 && t.y.abs() <= 20.0);
            assert!((0.0..=20.0).contains(&t.z));
        }
    }

    #[test]
    fn test_spawn_is_rigid() {
        let mut rng = StdRng::seed_from_u64(2);
        let m = spawn_transform(&mut rng, 5.0);
        assert!((m.determinant() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_field_mode_parse() {
        assert_eq!("pooled".parse::<FieldMode>().unwrap(), FieldMode::Pooled);
        assert!("batched".parse::<FieldMode>().is_err());
        assert_eq!(FieldMode::Instanced.to_string(), "instanced");
    }
}
