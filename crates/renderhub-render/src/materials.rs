//! Material-type lookup.

use serde::{Deserialize, Serialize};

use renderhub_entity::render::CustomMaterial;

/// Principled shader parameters for the product material.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialSpec {
    /// RGBA base color.
    pub base_color: [f32; 4],
    /// Metallic factor.
    pub metallic: f32,
    /// Roughness factor.
    pub roughness: f32,
}

/// Gold.
pub const GOLD: MaterialSpec = MaterialSpec {
    base_color: [1.0, 0.8, 0.2, 1.0],
    metallic: 1.0,
    roughness: 0.1,
};

/// Silver.
pub const SILVER: MaterialSpec = MaterialSpec {
    base_color: [0.9, 0.9, 0.9, 1.0],
    metallic: 1.0,
    roughness: 0.2,
};

/// Steel.
pub const STEEL: MaterialSpec = MaterialSpec {
    base_color: [0.7, 0.7, 0.7, 1.0],
    metallic: 1.0,
    roughness: 0.3,
};

/// Fallback for unknown or missing material types: the stock principled
/// shader (light grey dielectric).
pub const DEFAULT: MaterialSpec = MaterialSpec {
    base_color: [0.8, 0.8, 0.8, 1.0],
    metallic: 0.0,
    roughness: 0.5,
};

impl MaterialSpec {
    /// Look up a material type. Case-insensitive; never fails.
    pub fn for_type(material_type: &str) -> Self {
        match material_type.trim().to_ascii_lowercase().as_str() {
            "gold" => GOLD,
            "silver" => SILVER,
            "steel" => STEEL,
            _ => DEFAULT,
        }
    }

    /// Apply an explicit override. Values are clamped to `0.0..=1.0`.
    pub fn with_override(mut self, custom: &CustomMaterial) -> Self {
        if let Some(color) = custom.base_color {
            self.base_color = color.map(unit);
        }
        if let Some(metallic) = custom.metallic {
            self.metallic = unit(metallic);
        }
        if let Some(roughness) = custom.roughness {
            self.roughness = unit(roughness);
        }
        self
    }

    /// Resolve the material for a design.
    pub fn resolve(material_type: &str, custom: Option<&CustomMaterial>) -> Self {
        let base = Self::for_type(material_type);
        match custom {
            Some(custom) => base.with_override(custom),
            None => base,
        }
    }
}

fn unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_types() {
        assert_eq!(MaterialSpec::for_type("gold"), GOLD);
        assert_eq!(MaterialSpec::for_type("Silver"), SILVER);
        assert_eq!(MaterialSpec::for_type(" STEEL "), STEEL);
    }

    #[test]
    fn test_unknown_types_fall_back() {
        for name in ["", "default", "platinum", "wood", "🙂"] {
            assert_eq!(MaterialSpec::for_type(name), DEFAULT, "{name}");
        }
    }

    #[test]
    fn test_override_is_partial_and_clamped() {
        let custom = CustomMaterial {
            base_color: Some([2.0, -1.0, 0.5, 1.0]),
            metallic: None,
            roughness: Some(f32::NAN),
        };
        let spec = MaterialSpec::resolve("gold", Some(&custom));
        assert_eq!(spec.base_color, [1.0, 0.0, 0.5, 1.0]);
        assert_eq!(spec.metallic, GOLD.metallic);
        assert_eq!(spec.roughness, 0.0);
    }
}
