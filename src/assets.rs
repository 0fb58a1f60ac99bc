//! Static inputs: the two particle shader programs and the target point cloud.
//!
//! Both are loaded once at startup and treated as immutable afterwards. The
//! built-in versions are compiled into the binary so a page needs no extra
//! requests to start animating.

use std::borrow::Cow;
use std::path::Path;

use glam::Vec3;

use crate::error::DatasetError;

const INSTANCED_SHADER: &str = include_str!("shaders/instanced.wgsl");
const POOLED_SHADER: &str = include_str!("shaders/pooled.wgsl");
const BUILTIN_SHAPE: &str = include_str!("../assets/shape.json");

/// WGSL sources for the two particle types.
#[derive(Debug, Clone)]
pub struct ShaderLibrary {
    /// Program for instanced cubes (per-instance `mat4` at locations 2..=5).
    pub instanced: Cow<'static, str>,
    /// Program for pooled quads (world transform in the uniforms).
    pub pooled: Cow<'static, str>,
}

impl ShaderLibrary {
    /// The shaders shipped with the crate.
    pub fn builtin() -> Self {
        Self {
            instanced: Cow::Borrowed(INSTANCED_SHADER),
            pooled: Cow::Borrowed(POOLED_SHADER),
        }
    }
}

impl Default for ShaderLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Target positions the particles assemble into.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    points: Vec<Vec3>,
}

impl PointCloud {
    /// Build from a flat `[x, y, z, x, y, z, ...]` slice.
    pub fn from_flat(values: &[f32]) -> Result<Self, DatasetError> {
        if values.is_empty() {
            return Err(DatasetError::Empty);
        }
        if values.len() % 3 != 0 {
            return Err(DatasetError::Ragged { len: values.len() });
        }
        let points = values
            .chunks_exact(3)
            .map(|c| Vec3::new(c[0], c[1], c[2]))
            .collect();
        Ok(Self { points })
    }

    /// Parse a JSON array of numbers.
    pub fn from_json(json: &str) -> Result<Self, DatasetError> {
        let values: Vec<f32> = serde_json::from_str(json)?;
        Self::from_flat(&values)
    }

    /// Read and parse a JSON dataset from disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// The shape shipped with the crate: a jittered torus knot, 10,000 points.
    pub fn builtin() -> Result<Self, DatasetError> {
        Self::from_json(BUILTIN_SHAPE)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// One target per particle, cycling through the cloud when it holds
    /// fewer points than particles.
    pub fn targets(&self, count: usize) -> Vec<Vec3> {
        self.points.iter().copied().cycle().take(count).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flat() {
        let cloud = PointCloud::from_flat(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.points()[1], Vec3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn test_ragged_rejected() {
        let err = PointCloud::from_flat(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, DatasetError::Ragged { len: 2 }));
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(PointCloud::from_json("[]"), Err(DatasetError::Empty)));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            PointCloud::from_json("{\"points\": 1}"),
            Err(DatasetError::Parse(_))
        ));
    }

    #[test]
    fn test_targets_cycle() {
        let cloud = PointCloud::from_flat(&[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]).unwrap();
        let targets = cloud.targets(5);
        assert_eq!(targets.len(), 5);
        assert_eq!(targets[2], Vec3::ZERO);
        assert_eq!(targets[3], Vec3::ONE);
    }

    #[test]
    fn test_builtin_shape() {
        let cloud = PointCloud::builtin().unwrap();
        assert_eq!(cloud.len(), 10_000);
        assert!(cloud.points().iter().all(|p| p.length() < 2.0));
    }

    #[test]
    fn test_builtin_shaders_have_entry_points() {
        let shaders = ShaderLibrary::builtin();
        for src in [&shaders.instanced, &shaders.pooled] {
            assert!(src.contains("fn vs_main"));
            assert!(src.contains("fn fs_main"));
        }
    }
}
