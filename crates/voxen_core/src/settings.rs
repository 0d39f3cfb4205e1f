use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("downscale factor must be a positive integer, got {0}")]
    NonIntegerDownscale(f32),
}

/// Thresholds the interpolation pass uses to decide whether a bilinear
/// estimate from the sparse tile centers is trustworthy. A pixel whose
/// surrounding centers disagree beyond either tolerance is deferred to
/// the full buffer-march pass instead.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeferralConfig {
    /// Maximum relative depth spread across the four source centers.
    pub depth_tolerance: f32,
    /// Minimum dot product between source normals (1.0 = identical).
    pub normal_tolerance: f32,
}

impl Default for DeferralConfig {
    fn default() -> Self {
        Self {
            depth_tolerance: 0.05,
            normal_tolerance: 0.9,
        }
    }
}

/// Host-side renderer configuration, loadable from JSON by the viewer.
///
/// The downscale factor is carried as a float because it arrives from
/// config files and UI sliders, but only whole-number factors divide
/// the surface cleanly; [`RenderSettings::validate`] rejects the rest
/// before any resource is sized from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub downscale: f32,
    pub object_count: u32,
    pub max_march_steps: u32,
    pub deferral: DeferralConfig,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            downscale: 1.0,
            object_count: 8,
            max_march_steps: 256,
            deferral: DeferralConfig::default(),
        }
    }
}

impl RenderSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.downscale < 1.0 || self.downscale.fract() != 0.0 {
            return Err(SettingsError::NonIntegerDownscale(self.downscale));
        }
        Ok(())
    }

    /// Render-target resolution for a given surface size.
    pub fn render_resolution(&self, surface_width: u32, surface_height: u32) -> (u32, u32) {
        let factor = self.downscale.max(1.0) as u32;
        (
            (surface_width / factor).max(1),
            (surface_height / factor).max(1),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(RenderSettings::default().validate().is_ok());
    }

    #[test]
    fn test_non_integer_downscale_rejected() {
        let settings = RenderSettings {
            downscale: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::NonIntegerDownscale(_))
        ));
    }

    #[test]
    fn test_zero_downscale_rejected() {
        let settings = RenderSettings {
            downscale: 0.0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_render_resolution() {
        let settings = RenderSettings {
            downscale: 2.0,
            ..Default::default()
        };
        assert_eq!(settings.render_resolution(1920, 1080), (960, 540));
    }

    #[test]
    fn test_settings_round_trip_json() {
        let settings = RenderSettings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let back: RenderSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.downscale, settings.downscale);
        assert_eq!(back.object_count, settings.object_count);
    }
}
