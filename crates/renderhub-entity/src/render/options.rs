//! Render options carried by a job.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Render quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RenderQuality {
    /// 512px, 64 samples.
    Low,
    /// 1024px, 128 samples.
    #[default]
    Medium,
    /// 2048px, 256 samples.
    High,
}

/// Resolution and sample count for a quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualitySettings {
    /// Square output resolution in pixels.
    pub resolution: u32,
    /// Path-tracing sample count.
    pub samples: u32,
}

impl RenderQuality {
    /// Resolution and sample count for this tier.
    pub fn settings(&self) -> QualitySettings {
        match self {
            Self::Low => QualitySettings {
                resolution: 512,
                samples: 64,
            },
            Self::Medium => QualitySettings {
                resolution: 1024,
                samples: 128,
            },
            Self::High => QualitySettings {
                resolution: 2048,
                samples: 256,
            },
        }
    }

    /// Lowercase string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for RenderQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit material parameters that override the material-type lookup.
///
/// Any field left unset keeps the looked-up value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomMaterial {
    /// RGBA base color, each channel in `0.0..=1.0`.
    #[serde(default)]
    pub base_color: Option<[f32; 4]>,
    /// Metallic factor in `0.0..=1.0`.
    #[serde(default)]
    pub metallic: Option<f32>,
    /// Roughness factor in `0.0..=1.0`.
    #[serde(default)]
    pub roughness: Option<f32>,
}

/// Per-job render options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOptions {
    /// Quality tier.
    #[serde(default)]
    pub quality: RenderQuality,
    /// Include animation data in formats that support it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_animations: Option<bool>,
    /// Carry physics hints into the render metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_physics: Option<bool>,
    /// Explicit material override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_materials: Option<CustomMaterial>,
}

impl RenderOptions {
    /// Options with the given quality and everything else unset.
    pub fn with_quality(quality: RenderQuality) -> Self {
        Self {
            quality,
            ..Default::default()
        }
    }

    /// Whether animations should be exported.
    pub fn animations(&self) -> bool {
        self.include_animations.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_table() {
        assert_eq!(RenderQuality::Low.settings().resolution, 512);
        assert_eq!(RenderQuality::Low.settings().samples, 64);
        assert_eq!(RenderQuality::Medium.settings().resolution, 1024);
        assert_eq!(RenderQuality::Medium.settings().samples, 128);
        assert_eq!(RenderQuality::High.settings().resolution, 2048);
        assert_eq!(RenderQuality::High.settings().samples, 256);
    }

    #[test]
    fn test_options_from_camel_case() {
        let json = r#"{
            "quality": "high",
            "includeAnimations": true,
            "customMaterials": { "baseColor": [0.1, 0.2, 0.3, 1.0], "roughness": 0.4 }
        }"#;
        let opts: RenderOptions = serde_json::from_str(json).expect("parse");
        assert_eq!(opts.quality, RenderQuality::High);
        assert!(opts.animations());
        let custom = opts.custom_materials.expect("custom");
        assert_eq!(custom.base_color, Some([0.1, 0.2, 0.3, 1.0]));
        assert_eq!(custom.metallic, None);
    }

    #[test]
    fn test_missing_quality_defaults_to_medium() {
        let opts: RenderOptions = serde_json::from_str("{}").expect("parse");
        assert_eq!(opts.quality, RenderQuality::Medium);
        assert!(!opts.animations());
    }
}
