//! Scene configuration.
//!
//! Every value has a default matching the stock court scene, so an empty (or missing)
//! `scene.toml` reproduces it exactly. Individual sections or fields can be overridden:
//!
//! ```toml
//! [camera]
//! speed = 0.2
//!
//! [assets]
//! on_failure = { retry = { attempts = 3 } }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub engine: EngineConfig,
    pub assets: AssetsConfig,
    pub gravity: WorldGravity,
    pub physics: PhysicsConfig,
    pub lights: LightsConfig,
    pub camera: CameraConfig,
    pub ball: BallConfig,
    pub ground: GroundConfig,
    pub debug: DebugConfig,
}

impl SceneConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Loads `path` if it exists, otherwise returns the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            log::info!("Loading scene config from {}", path.display());
            Self::load(path)
        } else {
            log::info!("No {} found, using the default scene", path.display());
            Ok(Self::default())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub title: String,
    pub antialias: bool,
    pub msaa_samples: u32,
    pub clear_colour: [f64; 4],
    pub tick_duration_millis: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: "hoop-scene".to_string(),
            antialias: true,
            msaa_samples: 4,
            clear_colour: [0.2, 0.2, 0.3, 1.0],
            tick_duration_millis: 1000,
        }
    }
}

/// What happens when the level asset cannot be loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetFailurePolicy {
    /// Log the failure and keep running without level geometry.
    #[default]
    EmptyLevel,
    /// Fetch again up to `attempts` more times, then continue like `EmptyLevel`.
    Retry { attempts: u32 },
    /// Stop the application.
    Fatal,
}

impl AssetFailurePolicy {
    /// Total number of fetch attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        match self {
            AssetFailurePolicy::Retry { attempts } => attempts.saturating_add(1),
            AssetFailurePolicy::EmptyLevel | AssetFailurePolicy::Fatal => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub root: String,
    pub level: String,
    pub ball_texture: String,
    pub court_texture: String,
    pub on_failure: AssetFailurePolicy,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: "assets".to_string(),
            level: "models/level.glb".to_string(),
            ball_texture: "textures/BasketBall/BasketBallTexture.png".to_string(),
            court_texture: "textures/BasketBall/BasketBallCourtTexture.jpg".to_string(),
            on_failure: AssetFailurePolicy::default(),
        }
    }
}

/// The one gravity constant of the world.
///
/// The rigid-body integrator and the collision sweep integrator each derive their own
/// vector from it: the former per second squared, the latter per rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldGravity {
    /// Vertical acceleration in units/s².
    pub acceleration: f32,
    /// Frame rate the per-frame sweep gravity is expressed at.
    pub frames_per_second: f32,
}

impl WorldGravity {
    pub fn physics_vector(&self) -> cgmath::Vector3<f32> {
        cgmath::Vector3::new(0.0, self.acceleration, 0.0)
    }

    pub fn per_frame_vector(&self) -> cgmath::Vector3<f32> {
        cgmath::Vector3::new(0.0, self.acceleration / self.frames_per_second, 0.0)
    }
}

impl Default for WorldGravity {
    fn default() -> Self {
        Self {
            acceleration: -9.81,
            frames_per_second: 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub solver_iterations: usize,
    /// Step with the measured frame delta instead of a fixed 1/60 s.
    pub use_frame_delta: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            solver_iterations: 10,
            use_frame_delta: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightsConfig {
    pub hemispheric_direction: [f32; 3],
    pub hemispheric_intensity: f32,
    pub directional_direction: [f32; 3],
    pub directional_intensity: f32,
}

impl Default for LightsConfig {
    fn default() -> Self {
        Self {
            hemispheric_direction: [0.0, -1.0, 0.0],
            hemispheric_intensity: 0.7,
            directional_direction: [0.0, -1.0, 0.0],
            directional_intensity: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: [f32; 3],
    pub ellipsoid: [f32; 3],
    pub min_z: f32,
    pub max_z: f32,
    pub fov_y: f32,
    /// Units moved per 60 Hz tick.
    pub speed: f32,
    /// Pointer delta divided by this gives the rotation in radians.
    pub angular_sensibility: f32,
    pub apply_gravity: bool,
    pub check_collisions: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [13.6, 1.0, -5.0],
            ellipsoid: [0.1, 0.1, 0.1],
            min_z: 0.1,
            max_z: 1000.0,
            fov_y: 0.8,
            speed: 0.1,
            angular_sensibility: 2000.0,
            apply_gravity: false,
            check_collisions: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallConfig {
    pub position: [f32; 3],
    pub diameter: f32,
    pub segments: u32,
    pub mass: f32,
    pub restitution: f32,
}

impl Default for BallConfig {
    fn default() -> Self {
        Self {
            position: [13.6, 6.0, 0.0],
            diameter: 0.24,
            segments: 32,
            mass: 0.5,
            restitution: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundConfig {
    pub width: f32,
    pub height: f32,
    pub mass: f32,
    pub restitution: f32,
    pub visible: bool,
}

impl Default for GroundConfig {
    fn default() -> Self {
        Self {
            width: 32.0,
            height: 19.0,
            mass: 0.0,
            restitution: 0.5,
            visible: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub light_gizmos: bool,
    pub gizmo_scale_ratio: f32,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            light_gizmos: false,
            gizmo_scale_ratio: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_the_stock_scene() {
        let config = SceneConfig::from_toml_str("").unwrap();
        assert_eq!(config, SceneConfig::default());
        assert_eq!(config.camera.position, [13.6, 1.0, -5.0]);
        assert_eq!(config.assets.on_failure, AssetFailurePolicy::EmptyLevel);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = SceneConfig::from_toml_str(
            r#"
            [camera]
            speed = 0.25

            [assets]
            on_failure = { retry = { attempts = 3 } }
            "#,
        )
        .unwrap();
        assert_eq!(config.camera.speed, 0.25);
        assert_eq!(config.camera.angular_sensibility, 2000.0);
        assert_eq!(config.assets.level, "models/level.glb");
        assert_eq!(config.assets.on_failure.max_attempts(), 4);
    }

    #[test]
    fn fatal_policy_parses() {
        let config = SceneConfig::from_toml_str("[assets]\non_failure = \"fatal\"").unwrap();
        assert_eq!(config.assets.on_failure, AssetFailurePolicy::Fatal);
        assert_eq!(config.assets.on_failure.max_attempts(), 1);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!(SceneConfig::from_toml_str("[assets]\non_failure = \"sometimes\"").is_err());
    }
}
