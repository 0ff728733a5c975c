//! Output format of a render job.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 3D file format a render job exports to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderType {
    /// glTF 2.0.
    Gltf,
    /// Stereolithography mesh.
    Stl,
    /// Wavefront OBJ.
    Obj,
    /// Universal Scene Description (zipped).
    Usdz,
}

impl RenderType {
    /// All render types, in declaration order.
    pub const ALL: [RenderType; 4] = [Self::Gltf, Self::Stl, Self::Obj, Self::Usdz];

    /// File extension of the exported artifact (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Gltf => "gltf",
            Self::Stl => "stl",
            Self::Obj => "obj",
            Self::Usdz => "usdz",
        }
    }

    /// MIME type of the exported artifact.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Gltf => "model/gltf+json",
            Self::Stl => "model/stl",
            Self::Obj => "model/obj",
            Self::Usdz => "model/vnd.usdz+zip",
        }
    }

    /// Whether the pipeline can produce this format.
    ///
    /// USDZ has no native exporter in the render tool and is rejected
    /// rather than approximated.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Usdz)
    }

    /// Name of the artifact the render tool is expected to write.
    pub fn output_file_name(&self) -> String {
        format!("rendered_model.{}", self.extension())
    }

    /// Lowercase string form.
    pub fn as_str(&self) -> &'static str {
        self.extension()
    }
}

impl fmt::Display for RenderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gltf" => Ok(Self::Gltf),
            "stl" => Ok(Self::Stl),
            "obj" => Ok(Self::Obj),
            "usdz" => Ok(Self::Usdz),
            other => Err(format!("unknown render type '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_file_name() {
        assert_eq!(RenderType::Gltf.output_file_name(), "rendered_model.gltf");
        assert_eq!(RenderType::Stl.output_file_name(), "rendered_model.stl");
    }

    #[test]
    fn test_usdz_unsupported() {
        let supported: Vec<_> = RenderType::ALL
            .iter()
            .filter(|t| t.is_supported())
            .collect();
        assert_eq!(supported.len(), 3);
        assert!(!RenderType::Usdz.is_supported());
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("GLTF".parse::<RenderType>(), Ok(RenderType::Gltf));
        assert!("fbx".parse::<RenderType>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&RenderType::Obj).expect("serialize");
        assert_eq!(json, "\"obj\"");
    }
}
