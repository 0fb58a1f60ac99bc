//! Static meshes shared by every particle of a field.

use bytemuck::{Pod, Zeroable};

use super::{BufferId, BufferKind, GraphicsContext};
use crate::error::GpuError;

/// Mesh vertex: position and face normal.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// CPU-side indexed triangle mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
}

// Each face: normal, then the four corners wound counter-clockwise seen from outside.
const CUBE_FACES: [([f32; 3], [[f32; 3]; 4]); 6] = [
    ([1.0, 0.0, 0.0], [[1.0, -1.0, 1.0], [1.0, -1.0, -1.0], [1.0, 1.0, -1.0], [1.0, 1.0, 1.0]]),
    ([-1.0, 0.0, 0.0], [[-1.0, -1.0, -1.0], [-1.0, -1.0, 1.0], [-1.0, 1.0, 1.0], [-1.0, 1.0, -1.0]]),
    ([0.0, 1.0, 0.0], [[-1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, -1.0], [-1.0, 1.0, -1.0]]),
    ([0.0, -1.0, 0.0], [[-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [1.0, -1.0, 1.0], [-1.0, -1.0, 1.0]]),
    ([0.0, 0.0, 1.0], [[-1.0, -1.0, 1.0], [1.0, -1.0, 1.0], [1.0, 1.0, 1.0], [-1.0, 1.0, 1.0]]),
    ([0.0, 0.0, -1.0], [[1.0, -1.0, -1.0], [-1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [1.0, 1.0, -1.0]]),
];

impl Mesh {
    /// Axis-aligned cube centred on the origin with edge length `size`.
    ///
    /// 24 vertices (four per face so normals stay flat) and 36 indices.
    pub fn cube(size: f32) -> Self {
        let half = size * 0.5;
        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);

        for (normal, corners) in CUBE_FACES {
            let base = vertices.len() as u16;
            for corner in corners {
                vertices.push(Vertex {
                    position: [corner[0] * half, corner[1] * half, corner[2] * half],
                    normal,
                });
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self { vertices, indices }
    }

    /// Square in the XY plane facing +Z with edge length `size`.
    pub fn quad(size: f32) -> Self {
        let half = size * 0.5;
        let normal = [0.0, 0.0, 1.0];
        let vertices = vec![
            Vertex { position: [-half, -half, 0.0], normal },
            Vertex { position: [half, -half, 0.0], normal },
            Vertex { position: [half, half, 0.0], normal },
            Vertex { position: [-half, half, 0.0], normal },
        ];
        Self {
            vertices,
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    /// Upload vertices and indices into two new buffers.
    ///
    /// If the index upload fails the vertex buffer is deleted before returning.
    pub fn upload<G: GraphicsContext + ?Sized>(&self, gfx: &mut G) -> Result<MeshBuffers, GpuError> {
        let vertices = gfx.create_buffer(BufferKind::Vertex, bytemuck::cast_slice(&self.vertices))?;
        let indices = match gfx.create_buffer(BufferKind::Index, bytemuck::cast_slice(&self.indices)) {
            Ok(id) => id,
            Err(e) => {
                gfx.delete_buffer(vertices);
                return Err(e);
            }
        };

        Ok(MeshBuffers {
            vertices,
            indices,
            index_count: self.indices.len() as u32,
        })
    }
}

/// GPU-side handles for an uploaded [`Mesh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshBuffers {
    pub vertices: BufferId,
    pub indices: BufferId,
    pub index_count: u32,
}

impl MeshBuffers {
    pub fn release<G: GraphicsContext + ?Sized>(self, gfx: &mut G) {
        gfx.delete_buffer(self.vertices);
        gfx.delete_buffer(self.indices);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_cube_counts() {
        let cube = Mesh::cube(0.01);
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        assert!(cube.indices.iter().all(|&i| (i as usize) < cube.vertices.len()));
    }

    #[test]
    fn test_cube_extent() {
        let cube = Mesh::cube(2.0);
        for v in &cube.vertices {
            for c in v.position {
                assert_eq!(c.abs(), 1.0);
            }
        }
    }

    #[test]
    fn test_cube_winding_faces_outward() {
        let cube = Mesh::cube(1.0);
        for tri in cube.indices.chunks(3) {
            let a = Vec3::from(cube.vertices[tri[0] as usize].position);
            let b = Vec3::from(cube.vertices[tri[1] as usize].position);
            let c = Vec3::from(cube.vertices[tri[2] as usize].position);
            let n = Vec3::from(cube.vertices[tri[0] as usize].normal);
            assert!((b - a).cross(c - a).dot(n) > 0.0);
        }
    }

    #[test]
    fn test_quad() {
        let quad = Mesh::quad(1.0);
        assert_eq!(quad.vertices.len(), 4);
        assert_eq!(quad.indices, vec![0, 1, 2, 0, 2, 3]);
    }
}
