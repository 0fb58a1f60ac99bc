//! Instanced particle field: one mesh, one transform buffer, one draw.

use glam::{Mat4, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{spawn_transform, ParticleField};
use crate::assets::PointCloud;
use crate::camera::Camera;
use crate::config::FieldConfig;
use crate::error::GpuError;
use crate::gpu::{
    BufferId, BufferKind, DrawCall, DrawUniforms, GraphicsContext, Mesh, MeshBuffers, ProgramId,
};
use crate::programs::{ProgramCache, ProgramKind};

#[derive(Debug, Clone, Copy)]
struct Resources {
    program: ProgramId,
    mesh: MeshBuffers,
    instances: BufferId,
}

/// Cubes drawn with a single instanced call.
///
/// Transforms live in one contiguous `Vec<Mat4>` and the whole slice is
/// uploaded every frame before the draw.
#[derive(Debug)]
pub struct InstancedField {
    transforms: Vec<Mat4>,
    targets: Option<Vec<Vec3>>,
    rng: StdRng,
    resources: Option<Resources>,
}

impl InstancedField {
    /// Fraction of the remaining distance to the target covered per second.
    pub const CLOSURE_SPEED: f32 = 2.0;

    /// Spawn `config.count` cubes and upload them.
    ///
    /// With `targets`, particle `i` steers toward point `i` of the cloud
    /// (cycling if the cloud is shorter). Any buffer or program acquired
    /// before a failure is released again.
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
        let mut rng = StdRng::seed_from_u64(seed);
        let transforms: Vec<Mat4> = (0..config.count)
            .map(|_| spawn_transform(&mut rng, config.spawn_range))
            .collect();
        let targets = targets.map(|cloud| cloud.targets(config.count));

        let program = programs.acquire(gfx, ProgramKind::InstancedCube)?;
        let mesh = match Mesh::cube(config.mesh_size).upload(gfx) {
            Ok(mesh) => mesh,
            Err(e) => {
                programs.release(gfx, ProgramKind::InstancedCube);
                return Err(e);
            }
        };
        let instances = match gfx.create_buffer(BufferKind::Instance, bytemuck::cast_slice(&transforms)) {
            Ok(id) => id,
            Err(e) => {
                mesh.release(gfx);
                programs.release(gfx, ProgramKind::InstancedCube);
                return Err(e);
            }
        };

        log::debug!(
            "instanced field: {} particles, {} bytes per upload",
            transforms.len(),
            transforms.len() * std::mem::size_of::<Mat4>()
        );

        Ok(Self {
            transforms,
            targets,
            rng,
            resources: Some(Resources {
                program,
                mesh,
                instances,
            }),
        })
    }

    /// Every particle's world transform, in upload order.
    pub fn transforms(&self) -> &[Mat4] {
        &self.transforms
    }

    pub fn targets(&self) -> Option<&[Vec3]> {
        self.targets.as_deref()
    }

    /// Bytes written to the instance buffer each frame.
    pub fn upload_size(&self) -> usize {
        std::mem::size_of_val(self.transforms.as_slice())
    }

    /// The instance buffer, until the field is released.
    pub fn instance_buffer(&self) -> Option<BufferId> {
        self.resources.map(|r| r.instances)
    }
}

impl ParticleField for InstancedField {
    fn len(&self) -> usize {
        self.transforms.len()
    }

    fn update(&mut self, dt: f32) {
        let step = dt * Self::CLOSURE_SPEED;
        for (i, transform) in self.transforms.iter_mut().enumerate() {
            if let Some(targets) = &self.targets {
                let diff = (targets[i] - transform.w_axis.truncate()) * step;
                *transform = Mat4::from_translation(diff) * *transform;
            }
            *transform *= Mat4::from_rotation_x(dt * self.rng.gen::<f32>());
        }
    }

    fn draw<G>(&mut self, gfx: &mut G, camera: &Camera) -> Result<(), GpuError>
    where
        G: GraphicsContext + ?Sized,
    {
        let Some(res) = self.resources else {
            return Ok(());
        };
        gfx.write_buffer(res.instances, 0, bytemuck::cast_slice(&self.transforms))?;
        gfx.draw(&DrawCall {
            program: res.program,
            mesh: res.mesh,
            instances: Some(res.instances),
            instance_count: self.transforms.len() as u32,
            uniforms: DrawUniforms::new(camera, Mat4::IDENTITY),
        })
    }

    fn release<G>(&mut self, gfx: &mut G, programs: &mut ProgramCache)
    where
        G: GraphicsContext + ?Sized,
    {
        if let Some(res) = self.resources.take() {
            gfx.delete_buffer(res.instances);
            res.mesh.release(gfx);
            programs.release(gfx, ProgramKind::InstancedCube);
        }
    }

    fn transform(&self, index: usize) -> Option<Mat4> {
        self.transforms.get(index).copied()
    }
}
