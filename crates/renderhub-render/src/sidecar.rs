//! Files an exported model refers to by relative path.
//!
//! A separate-file glTF points at its `.bin` buffer and texture images, and
//! an OBJ points at its `.mtl` library, which in turn names texture maps.
//! These must be published next to the model under the same relative names
//! or the published model cannot be loaded.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use renderhub_entity::render::RenderType;

use crate::error::RenderError;

/// A file published alongside the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sidecar {
    /// Location in the working directory.
    pub path: PathBuf,
    /// Name relative to the model, as the model references it.
    pub name: String,
}

impl Sidecar {
    /// Content type guessed from the extension.
    pub fn content_type(&self) -> &'static str {
        let ext = Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("png") => "image/png",
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("webp") => "image/webp",
            Some("mtl") => "text/plain",
            _ => "application/octet-stream",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GltfDocument {
    #[serde(default)]
    buffers: Vec<GltfUri>,
    #[serde(default)]
    images: Vec<GltfUri>,
}

#[derive(Debug, Deserialize)]
struct GltfUri {
    uri: Option<String>,
}

/// Find and verify every file the model at `model` refers to.
///
/// A referenced file that was not produced fails with
/// [`RenderError::RenderOutputMissing`].
pub async fn collect_sidecars(
    model: &Path,
    render_type: RenderType,
) -> Result<Vec<Sidecar>, RenderError> {
    let Some(dir) = model.parent() else {
        return Ok(Vec::new());
    };

    let names = match render_type {
        RenderType::Gltf => gltf_references(model).await?,
        RenderType::Obj => obj_references(model, dir).await?,
        RenderType::Stl | RenderType::Usdz => BTreeSet::new(),
    };

    let mut sidecars = Vec::with_capacity(names.len());
    for name in names {
        let path = dir.join(&name);
        if !tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
            return Err(RenderError::RenderOutputMissing {
                path,
                reason: "referenced by the model but not created".to_string(),
            });
        }
        sidecars.push(Sidecar { path, name });
    }
    Ok(sidecars)
}

async fn gltf_references(model: &Path) -> Result<BTreeSet<String>, RenderError> {
    let bytes = tokio::fs::read(model).await?;
    let doc: GltfDocument =
        serde_json::from_slice(&bytes).map_err(|e| RenderError::RenderOutputMissing {
            path: model.to_path_buf(),
            reason: format!("not a valid glTF document: {e}"),
        })?;

    let mut names = BTreeSet::new();
    for uri in doc.buffers.iter().chain(doc.images.iter()) {
        if let Some(uri) = uri.uri.as_deref() {
            if uri.starts_with("data:") {
                continue;
            }
            names.insert(relative_name(model, &percent_decode(uri))?);
        }
    }
    Ok(names)
}

async fn obj_references(model: &Path, dir: &Path) -> Result<BTreeSet<String>, RenderError> {
    let obj = tokio::fs::read(model).await?;
    let obj = String::from_utf8_lossy(&obj);

    let mut names = BTreeSet::new();
    for line in obj.lines() {
        if let Some(rest) = line.trim_start().strip_prefix("mtllib ") {
            for lib in rest.split_whitespace() {
                names.insert(relative_name(model, lib)?);
            }
        }
    }

    let libraries: Vec<String> = names.iter().cloned().collect();
    for lib in libraries {
        // Missing libraries are reported by the caller.
        let Ok(mtl) = tokio::fs::read(dir.join(&lib)).await else {
            continue;
        };
        for line in String::from_utf8_lossy(&mtl).lines() {
            let mut parts = line.split_whitespace();
            let Some(keyword) = parts.next() else {
                continue;
            };
            if is_texture_statement(keyword) {
                // Options precede the file name.
                if let Some(file) = parts.last() {
                    names.insert(relative_name(model, file)?);
                }
            }
        }
    }
    Ok(names)
}

fn is_texture_statement(keyword: &str) -> bool {
    keyword.starts_with("map_") || matches!(keyword, "bump" | "disp" | "decal" | "refl" | "norm")
}

/// Accept only names that stay inside the working directory.
fn relative_name(model: &Path, name: &str) -> Result<String, RenderError> {
    let name = name.replace('\\', "/");
    let escapes = name.is_empty()
        || name.starts_with('/')
        || name.contains("://")
        || name.split('/').any(|part| part == ".." || part.is_empty());
    if escapes {
        return Err(RenderError::RenderOutputMissing {
            path: model.to_path_buf(),
            reason: format!("model references a file outside its folder: {name}"),
        });
    }
    Ok(name.trim_start_matches("./").to_string())
}

fn percent_decode(uri: &str) -> String {
    let bytes = uri.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        tokio::fs::write(&path, body).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_separate_gltf_lists_buffer_and_images() {
        let dir = tempfile::tempdir().unwrap();
        let model = write(
            dir.path(),
            "rendered_model.gltf",
            r#"{
                "buffers": [{"uri": "rendered_model.bin", "byteLength": 4}],
                "images": [{"uri": "design%20image.png"}, {"bufferView": 0}]
            }"#,
        )
        .await;
        write(dir.path(), "rendered_model.bin", "\0\0\0\0").await;
        write(dir.path(), "design image.png", "png").await;

        let sidecars = collect_sidecars(&model, RenderType::Gltf).await.unwrap();
        let names: Vec<&str> = sidecars.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["design image.png", "rendered_model.bin"]);
        assert_eq!(sidecars[0].content_type(), "image/png");
        assert_eq!(sidecars[1].path, dir.path().join("rendered_model.bin"));
    }

    #[tokio::test]
    async fn test_embedded_gltf_has_no_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let model = write(
            dir.path(),
            "rendered_model.gltf",
            r#"{"buffers": [{"uri": "data:application/octet-stream;base64,AAAA"}]}"#,
        )
        .await;
        assert!(collect_sidecars(&model, RenderType::Gltf).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_buffer_is_output_missing() {
        let dir = tempfile::tempdir().unwrap();
        let model = write(
            dir.path(),
            "rendered_model.gltf",
            r#"{"buffers": [{"uri": "rendered_model.bin"}]}"#,
        )
        .await;
        let err = collect_sidecars(&model, RenderType::Gltf).await.unwrap_err();
        assert!(matches!(err, RenderError::RenderOutputMissing { .. }));
    }

    #[tokio::test]
    async fn test_invalid_gltf_is_output_missing() {
        let dir = tempfile::tempdir().unwrap();
        let model = write(dir.path(), "rendered_model.gltf", "not json").await;
        let err = collect_sidecars(&model, RenderType::Gltf).await.unwrap_err();
        assert!(matches!(err, RenderError::RenderOutputMissing { .. }));
    }

    #[tokio::test]
    async fn test_obj_follows_material_library() {
        let dir = tempfile::tempdir().unwrap();
        let model = write(
            dir.path(),
            "rendered_model.obj",
            "# Blender\nmtllib rendered_model.mtl\no Cube\nv 0 0 0\n",
        )
        .await;
        write(
            dir.path(),
            "rendered_model.mtl",
            "newmtl Gold\nKd 1 0.8 0\nmap_Kd -s 1 1 1 design_image.png\n",
        )
        .await;
        write(dir.path(), "design_image.png", "png").await;

        let sidecars = collect_sidecars(&model, RenderType::Obj).await.unwrap();
        let names: Vec<&str> = sidecars.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["design_image.png", "rendered_model.mtl"]);
    }

    #[tokio::test]
    async fn test_escaping_reference_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let model = write(
            dir.path(),
            "rendered_model.gltf",
            r#"{"images": [{"uri": "../secrets.png"}]}"#,
        )
        .await;
        let err = collect_sidecars(&model, RenderType::Gltf).await.unwrap_err();
        assert!(matches!(err, RenderError::RenderOutputMissing { .. }));
    }

    #[tokio::test]
    async fn test_stl_never_has_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let model = write(dir.path(), "rendered_model.stl", "solid x").await;
        assert!(collect_sidecars(&model, RenderType::Stl).await.unwrap().is_empty());
    }
}
