//! Scene configuration.
//!
//! Configs are built in code with the `with_*` methods or loaded from a JSON
//! file in which every field is optional:
//!
//! ```json
//! { "scene": "sparkle", "field": { "mode": "pooled", "count": 1000 } }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use shimmer::config::{SceneConfig, SceneKind};
//! use shimmer::particles::FieldMode;
//!
//! let config = SceneConfig::sparkle()
//!     .with_mode(FieldMode::Pooled)
//!     .with_particle_count(1000)
//!     .with_seed(42);
//! config.validate()?;
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::particles::FieldMode;

/// Which scene to mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneKind {
    /// Orbiting camera, particles assembling into the point cloud.
    #[default]
    Home,
    /// Fixed camera, particles tumbling where they spawned.
    Sparkle,
}

impl FromStr for SceneKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "home" => Ok(SceneKind::Home),
            "sparkle" => Ok(SceneKind::Sparkle),
            other => Err(format!("unknown scene `{other}` (expected home or sparkle)")),
        }
    }
}

impl fmt::Display for SceneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SceneKind::Home => "home",
            SceneKind::Sparkle => "sparkle",
        })
    }
}

/// Particle field parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub mode: FieldMode,
    /// Number of particles.
    pub count: usize,
    /// Half-extent of the spawn box in X and Y; Z spawns in `[0, spawn_range]`.
    pub spawn_range: f32,
    /// Edge length of each particle's mesh.
    pub mesh_size: f32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            mode: FieldMode::Instanced,
            count: 10_000,
            spawn_range: 20.0,
            mesh_size: 0.01,
        }
    }
}

/// Everything needed to build a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub scene: SceneKind,
    pub field: FieldConfig,
    /// RNG seed for particle placement. `None` lets the host pick one.
    pub seed: Option<u64>,
    /// Orbit distance for the home scene.
    pub orbit_distance: f32,
    /// Azimuth advance of the home scene's camera in radians per second.
    pub orbit_speed: f32,
    /// RGBA clear color.
    pub clear_color: [f32; 4],
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self::home()
    }
}

impl SceneConfig {
    /// 10,000 instanced cubes of edge 0.01 assembling into the built-in shape.
    pub fn home() -> Self {
        Self {
            scene: SceneKind::Home,
            field: FieldConfig::default(),
            seed: None,
            orbit_distance: 2.5,
            orbit_speed: 0.1,
            clear_color: [0.0; 4],
        }
    }

    /// 10,000 instanced cubes of edge 0.03 tumbling in place.
    pub fn sparkle() -> Self {
        Self {
            scene: SceneKind::Sparkle,
            field: FieldConfig {
                mesh_size: 0.03,
                ..FieldConfig::default()
            },
            ..Self::home()
        }
    }

    /// Defaults for `kind`.
    pub fn for_scene(kind: SceneKind) -> Self {
        match kind {
            SceneKind::Home => Self::home(),
            SceneKind::Sparkle => Self::sparkle(),
        }
    }

    pub fn with_particle_count(mut self, count: usize) -> Self {
        self.field.count = count;
        self
    }

    pub fn with_mode(mut self, mode: FieldMode) -> Self {
        self.field.mode = mode;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_spawn_range(mut self, range: f32) -> Self {
        self.field.spawn_range = range;
        self
    }

    pub fn with_mesh_size(mut self, size: f32) -> Self {
        self.field.mesh_size = size;
        self
    }

    pub fn with_orbit_distance(mut self, distance: f32) -> Self {
        self.orbit_distance = distance;
        self
    }

    pub fn with_orbit_speed(mut self, speed: f32) -> Self {
        self.orbit_speed = speed;
        self
    }

    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Parse a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Pretty-printed JSON that [`from_json`](Self::from_json) reads back.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a JSON config from disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Reject values the scenes cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.field.count == 0 {
            return Err(ConfigError::Invalid("particle count must be positive"));
        }
        if u32::try_from(self.field.count).is_err() {
            return Err(ConfigError::Invalid("particle count must fit in u32"));
        }
        if !(self.field.spawn_range > 0.0) {
            return Err(ConfigError::Invalid("spawn range must be positive"));
        }
        if !(self.field.mesh_size > 0.0) {
            return Err(ConfigError::Invalid("mesh size must be positive"));
        }
        if !(self.orbit_distance > 0.0) {
            return Err(ConfigError::Invalid("orbit distance must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        SceneConfig::home().validate().unwrap();
        SceneConfig::sparkle().validate().unwrap();
        assert_eq!(SceneConfig::default().field.count, 10_000);
        assert_eq!(SceneConfig::sparkle().field.mesh_size, 0.03);
    }

    #[test]
    fn test_builder() {
        let config = SceneConfig::sparkle()
            .with_mode(FieldMode::Pooled)
            .with_particle_count(1000)
            .with_seed(7);
        assert_eq!(config.field.mode, FieldMode::Pooled);
        assert_eq!(config.field.count, 1000);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.scene, SceneKind::Sparkle);
        assert_eq!(SceneConfig::home().with_orbit_speed(0.3).orbit_speed, 0.3);
    }

    #[test]
    fn test_validate_rejects() {
        assert!(SceneConfig::home().with_particle_count(0).validate().is_err());
        assert!(SceneConfig::home().with_spawn_range(0.0).validate().is_err());
        assert!(SceneConfig::home().with_mesh_size(f32::NAN).validate().is_err());
        assert!(SceneConfig::home().with_orbit_distance(-1.0).validate().is_err());
    }

    #[test]
    fn test_partial_json() {
        let config =
            SceneConfig::from_json(r#"{ "scene": "sparkle", "field": { "mode": "pooled", "count": 1000 } }"#)
                .unwrap();
        assert_eq!(config.scene, SceneKind::Sparkle);
        assert_eq!(config.field.mode, FieldMode::Pooled);
        assert_eq!(config.field.count, 1000);
        assert_eq!(config.field.spawn_range, 20.0);
        assert_eq!(config.orbit_distance, 2.5);
    }

    #[test]
    fn test_json_reloads_builder_output() {
        let config = SceneConfig::sparkle()
            .with_mode(FieldMode::Pooled)
            .with_seed(9)
            .with_orbit_speed(0.5)
            .with_clear_color([0.0, 0.0, 0.0, 1.0]);
        let json = config.to_json().unwrap();
        assert!(json.contains(r#""mode": "pooled""#));
        assert!(json.contains(r#""scene": "sparkle""#));
        assert_eq!(SceneConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(
            SceneConfig::from_json(r#"{ "scene": "lobby" }"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_scene_kind_from_str() {
        assert_eq!("home".parse::<SceneKind>().unwrap(), SceneKind::Home);
        assert!("lobby".parse::<SceneKind>().is_err());
        assert_eq!(SceneKind::Sparkle.to_string(), "sparkle");
    }
}
