//! # Culling Configuration
//!
//! Settings for the visibility core, owned by the caller's settings layer
//! and passed in explicitly. Loadable from TOML or RON through [`Config`].
//!
//! ```toml
//! shadow_map_size = 2048
//! frames_in_flight = 2
//! camera_near = 0.1
//! camera_far = 250.0
//! use_gpu_culling = false
//! auto_calc_splits = true
//!
//! [cascades]
//! num_cascades = 3
//! cascade_end = [0.1, 0.3, 1.0, 1.0]
//! fit_mode = "FitCascade"
//! near_far_fit_mode = "IntersectScene"
//! texel_snapping = true
//! restrict_to_scene = true
//! ```

use serde::{Serialize, Deserialize};

pub use crate::config::{Config, ConfigError};
use crate::shadows::CascadeConfig;

/// Upper bound on frames in flight
pub const MAX_FRAMES_IN_FLIGHT: usize = 8;

/// # Culling Configuration
///
/// Cascade layout, shadow map resolution, camera depth range and the
/// frame-in-flight count the per-slot draw lists are allocated for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullingConfig {
    /// Cascade layout and fitting options
    pub cascades: CascadeConfig,
    /// Recompute split ends from the camera range at startup
    pub auto_calc_splits: bool,
    /// Shadow map resolution in texels (square)
    pub shadow_map_size: u32,
    /// Independent draw-list slots
    pub frames_in_flight: usize,
    /// Camera near plane distance
    pub camera_near: f32,
    /// Camera far plane distance
    pub camera_far: f32,
    /// Build draw lists with the compute mirror instead of the CPU builder
    pub use_gpu_culling: bool,
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            cascades: CascadeConfig::default(),
            auto_calc_splits: true,
            shadow_map_size: 2048,
            frames_in_flight: 2,
            camera_near: 0.1,
            camera_far: 100.0,
            use_gpu_culling: false,
        }
    }
}

impl CullingConfig {
    /// Set the cascade layout
    pub fn with_cascades(mut self, cascades: CascadeConfig) -> Self {
        self.cascades = cascades;
        self
    }

    /// Enable or disable automatic split computation
    pub fn with_auto_calc_splits(mut self, enabled: bool) -> Self {
        self.auto_calc_splits = enabled;
        self
    }

    /// Set the shadow map resolution
    pub fn with_shadow_map_size(mut self, size: u32) -> Self {
        self.shadow_map_size = size;
        self
    }

    /// Set the number of frames in flight
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Set the camera depth range
    pub fn with_camera_range(mut self, near: f32, far: f32) -> Self {
        self.camera_near = near;
        self.camera_far = far;
        self
    }

    /// Choose the GPU compute mirror over the CPU builder
    pub fn with_gpu_culling(mut self, enabled: bool) -> Self {
        self.use_gpu_culling = enabled;
        self
    }

    /// Validate configuration
    ///
    /// With `auto_calc_splits` the stored split ends are replaced at startup,
    /// so only the cascade count is checked.
    pub fn validate(&self) -> Result<(), String> {
        if self.auto_calc_splits {
            self.cascades.validate_count()?;
        } else {
            self.cascades.validate()?;
        }

        if self.shadow_map_size == 0 {
            return Err("shadow_map_size must be non-zero".to_string());
        }
        if self.frames_in_flight == 0 || self.frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            return Err(format!(
                "frames_in_flight must be in 1..={}, got {}",
                MAX_FRAMES_IN_FLIGHT, self.frames_in_flight
            ));
        }
        if !(self.camera_near > 0.0 && self.camera_far > self.camera_near) {
            return Err(format!(
                "camera range must satisfy 0 < near < far, got {}..{}",
                self.camera_near, self.camera_far
            ));
        }
        Ok(())
    }

    /// Load and validate a settings file
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate().map_err(ConfigError::Invalid)?;
        log::info!("Loaded culling configuration from {}", path);
        Ok(config)
    }
}

impl Config for CullingConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shadows::{FitMode, NearFarFitMode};

    #[test]
    fn test_default_is_valid() {
        assert!(CullingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_builder_settings() {
        let config = CullingConfig::default()
            .with_frames_in_flight(3)
            .with_shadow_map_size(1024)
            .with_camera_range(0.5, 300.0)
            .with_gpu_culling(true);

        assert_eq!(config.frames_in_flight, 3);
        assert_eq!(config.shadow_map_size, 1024);
        assert_eq!(config.camera_far, 300.0);
        assert!(config.use_gpu_culling);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(CullingConfig::default().with_frames_in_flight(0).validate().is_err());
        assert!(CullingConfig::default().with_frames_in_flight(9).validate().is_err());
        assert!(CullingConfig::default().with_shadow_map_size(0).validate().is_err());
        assert!(CullingConfig::default().with_camera_range(10.0, 1.0).validate().is_err());

        let bad_cascades = CascadeConfig::default().with_cascade_end(&[0.3, 0.2, 1.0]);
        assert!(CullingConfig::default()
            .with_auto_calc_splits(false)
            .with_cascades(bad_cascades)
            .validate()
            .is_err());
        let too_many = CascadeConfig::default().with_num_cascades(5);
        assert!(CullingConfig::default().with_cascades(too_many).validate().is_err());
    }

    #[test]
    fn test_auto_splits_accept_any_cascade_count() {
        for n in 1..=4 {
            let config = CullingConfig::default().with_cascades(CascadeConfig::default().with_num_cascades(n));
            assert!(config.validate().is_ok(), "{} cascades", n);
        }

        let manual = CullingConfig::default()
            .with_auto_calc_splits(false)
            .with_cascades(CascadeConfig::default().with_num_cascades(4));
        assert!(manual.validate().is_err());
    }

    #[test]
    fn test_toml_with_four_auto_cascades_validates() {
        let text = "auto_calc_splits = true\n\n[cascades]\nnum_cascades = 4\n";
        let parsed = CullingConfig::from_str_with_format(text, "culling.toml").unwrap();
        assert_eq!(parsed.cascades.num_cascades, 4);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip_through_config_trait() {
        let config = CullingConfig::default()
            .with_cascades(
                CascadeConfig::default()
                    .with_cascade_end(&[0.2, 1.0])
                    .with_fit_mode(FitMode::FitScene)
                    .with_near_far_fit_mode(NearFarFitMode::FrustumOnly),
            )
            .with_frames_in_flight(3);

        let text = config.to_string_with_format("culling.toml").unwrap();
        let parsed = CullingConfig::from_str_with_format(&text, "culling.toml").unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let parsed = CullingConfig::from_str_with_format("(shadow_map_size: 512)", "culling.ron").unwrap();
        assert_eq!(parsed.shadow_map_size, 512);
        assert_eq!(parsed.frames_in_flight, 2);
        assert_eq!(parsed.cascades, CascadeConfig::default());
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let result = CullingConfig::from_str_with_format("", "culling.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
