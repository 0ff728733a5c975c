//! Scene and preview script generation for the render tool.
//!
//! Generation is pure: the same inputs always produce byte-identical
//! scripts. Only the `write_*` helpers touch the filesystem.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use renderhub_entity::design::DesignRecord;
use renderhub_entity::render::{RenderOptions, RenderQuality, RenderType};

use crate::error::RenderError;
use crate::materials::MaterialSpec;
use crate::stager::StagedAssets;

/// File name of the generated scene script.
pub const SCENE_SCRIPT_NAME: &str = "render_script.py";
/// File name of the generated preview script.
pub const PREVIEW_SCRIPT_NAME: &str = "preview_script.py";
/// File name of the rendered preview image.
pub const PREVIEW_FILE_NAME: &str = "preview.png";
/// Square resolution of the preview image.
pub const PREVIEW_RESOLUTION: u32 = 512;
/// Sample count of the preview render.
pub const PREVIEW_SAMPLES: u32 = 32;

/// Everything the scene script depends on.
#[derive(Debug, Clone)]
pub struct SceneSpec<'a> {
    /// Job working directory; the export lands here.
    pub work_dir: &'a Path,
    /// Export format.
    pub render_type: RenderType,
    /// Quality tier.
    pub quality: RenderQuality,
    /// Product material.
    pub material: MaterialSpec,
    /// Staged base mesh, if any.
    pub product_model: Option<&'a Path>,
    /// Staged design image, if any.
    pub design_image: Option<&'a Path>,
    /// Export animation data (glTF only).
    pub include_animations: bool,
}

/// Generates scripts for the render tool.
pub struct ScriptGenerator;

impl ScriptGenerator {
    /// Generate and write the scene script for a design.
    pub async fn generate(
        design: &DesignRecord,
        render_type: RenderType,
        options: &RenderOptions,
        assets: &StagedAssets,
        work_dir: &Path,
    ) -> Result<PathBuf, RenderError> {
        let spec = SceneSpec {
            work_dir,
            render_type,
            quality: options.quality,
            material: assets.material,
            product_model: assets.product_model.as_deref(),
            design_image: assets.design_image.as_deref(),
            include_animations: options.animations(),
        };
        let mut script = format!("# design {}\n", design.id);
        script.push_str(&Self::scene_script(&spec)?);
        write_script(&work_dir.join(SCENE_SCRIPT_NAME), &script).await
    }

    /// Build the scene script text.
    pub fn scene_script(spec: &SceneSpec<'_>) -> Result<String, RenderError> {
        if !spec.render_type.is_supported() {
            return Err(RenderError::UnsupportedFormat {
                render_type: spec.render_type,
            });
        }

        let settings = spec.quality.settings();
        let mut s = String::with_capacity(4096);

        s.push_str("import os\n\nimport bpy\n\n");
        let _ = writeln!(s, "work_dir = {}", py_str(path_str(spec.work_dir)?));
        let _ = writeln!(s, "output_format = {}", py_str(spec.render_type.as_str()));
        let _ = writeln!(s, "quality = {}", py_str(spec.quality.as_str()));
        let _ = writeln!(s, "product_model = {}", py_opt_path(spec.product_model)?);
        let _ = writeln!(s, "design_image = {}", py_opt_path(spec.design_image)?);

        s.push_str(
            r#"
# Clear the default scene.
bpy.ops.object.select_all(action='SELECT')
bpy.ops.object.delete(use_global=False)

# Product mesh, or a placeholder block when none was staged.
targets = []
if product_model and os.path.exists(product_model):
    bpy.ops.import_scene.gltf(filepath=product_model)
    targets = [o for o in bpy.context.selected_objects if o.type == 'MESH']
if targets:
    product_obj = targets[0]
else:
    bpy.ops.mesh.primitive_cube_add()
    product_obj = bpy.context.active_object
    product_obj.scale = (2, 1, 0.5)
    targets = [product_obj]
product_obj.name = "Product"

# Material.
material = bpy.data.materials.new(name="ProductMaterial")
material.use_nodes = True
nodes = material.node_tree.nodes
links = material.node_tree.links
nodes.clear()
principled = nodes.new(type='ShaderNodeBsdfPrincipled')
output = nodes.new(type='ShaderNodeOutputMaterial')
links.new(principled.outputs['BSDF'], output.inputs['Surface'])
"#,
        );
        let m = &spec.material;
        let _ = writeln!(
            s,
            "principled.inputs['Base Color'].default_value = ({}, {}, {}, {})",
            py_float(m.base_color[0]),
            py_float(m.base_color[1]),
            py_float(m.base_color[2]),
            py_float(m.base_color[3]),
        );
        let _ = writeln!(
            s,
            "principled.inputs['Metallic'].default_value = {}",
            py_float(m.metallic)
        );
        let _ = writeln!(
            s,
            "principled.inputs['Roughness'].default_value = {}",
            py_float(m.roughness)
        );

        s.push_str(
            r#"
# Design image layered over the base material.
if design_image and os.path.exists(design_image):
    texture = nodes.new(type='ShaderNodeTexImage')
    texture.image = bpy.data.images.load(design_image)
    printed = nodes.new(type='ShaderNodeBsdfPrincipled')
    links.new(texture.outputs['Color'], printed.inputs['Base Color'])
    mix = nodes.new(type='ShaderNodeMixShader')
    links.new(texture.outputs['Alpha'], mix.inputs['Fac'])
    links.new(principled.outputs['BSDF'], mix.inputs[1])
    links.new(printed.outputs['BSDF'], mix.inputs[2])
    links.new(mix.outputs['Shader'], output.inputs['Surface'])

for obj in targets:
    obj.data.materials.clear()
    obj.data.materials.append(material)

# Lights.
bpy.ops.object.light_add(type='SUN', location=(5, 5, 10))
sun = bpy.context.active_object
sun.data.energy = 3
bpy.ops.object.light_add(type='AREA', location=(-5, -5, 8))
area_light = bpy.context.active_object
area_light.data.energy = 2
area_light.data.size = 10

# Camera.
bpy.ops.object.camera_add(location=(7, -7, 5))
camera = bpy.context.active_object
camera.rotation_euler = (1.1, 0, 0.785)
bpy.context.scene.camera = camera

# Render settings.
scene = bpy.context.scene
"#,
        );
        let _ = writeln!(s, "scene.render.resolution_x = {}", settings.resolution);
        let _ = writeln!(s, "scene.render.resolution_y = {}", settings.resolution);
        s.push_str("scene.render.engine = 'CYCLES'\n");
        let _ = writeln!(s, "scene.cycles.samples = {}", settings.samples);
        s.push_str(
            r#"cycles_prefs = bpy.context.preferences.addons['cycles'].preferences
scene.cycles.device = 'GPU' if cycles_prefs.has_active_device() else 'CPU'

# Export.
"#,
        );
        let _ = writeln!(
            s,
            "output_path = os.path.join(work_dir, {})",
            py_str(&spec.render_type.output_file_name())
        );
        s.push_str(&export_block(spec.render_type, spec.include_animations));
        s.push_str("\nprint(f\"Render completed: {output_path}\")\n");

        Ok(s)
    }

    /// Build the preview script text for a rendered model.
    pub fn preview_script(model_path: &Path, work_dir: &Path) -> Result<String, RenderError> {
        let mut s = String::with_capacity(1536);
        s.push_str("import os\n\nimport bpy\n\n");
        let _ = writeln!(s, "work_dir = {}", py_str(path_str(work_dir)?));
        let _ = writeln!(s, "model_path = {}", py_str(path_str(model_path)?));
        let _ = writeln!(
            s,
            "preview_path = os.path.join(work_dir, {})",
            py_str(PREVIEW_FILE_NAME)
        );
        s.push_str(
            r#"
bpy.ops.object.select_all(action='SELECT')
bpy.ops.object.delete(use_global=False)

ext = os.path.splitext(model_path)[1].lower()
if ext in ('.glb', '.gltf'):
    bpy.ops.import_scene.gltf(filepath=model_path)
elif ext == '.obj':
    if hasattr(bpy.ops.wm, 'obj_import'):
        bpy.ops.wm.obj_import(filepath=model_path)
    else:
        bpy.ops.import_scene.obj(filepath=model_path)
elif ext == '.stl':
    if hasattr(bpy.ops.wm, 'stl_import'):
        bpy.ops.wm.stl_import(filepath=model_path)
    else:
        bpy.ops.import_mesh.stl(filepath=model_path)

bpy.ops.object.light_add(type='SUN', location=(5, 5, 10))
bpy.context.active_object.data.energy = 3

bpy.ops.object.camera_add(location=(5, -5, 3))
camera = bpy.context.active_object
camera.rotation_euler = (1.2, 0, 0.785)
bpy.context.scene.camera = camera

scene = bpy.context.scene
"#,
        );
        let _ = writeln!(s, "scene.render.resolution_x = {PREVIEW_RESOLUTION}");
        let _ = writeln!(s, "scene.render.resolution_y = {PREVIEW_RESOLUTION}");
        s.push_str(
            r#"try:
    scene.render.engine = 'BLENDER_EEVEE'
except TypeError:
    scene.render.engine = 'BLENDER_EEVEE_NEXT'
"#,
        );
        let _ = writeln!(s, "scene.eevee.taa_render_samples = {PREVIEW_SAMPLES}");
        s.push_str(
            r#"scene.render.image_settings.file_format = 'PNG'
scene.render.filepath = preview_path
bpy.ops.render.render(write_still=True)

print(f"Preview generated: {preview_path}")
"#,
        );
        Ok(s)
    }

    /// Generate and write the preview script.
    pub async fn write_preview_script(
        model_path: &Path,
        work_dir: &Path,
    ) -> Result<PathBuf, RenderError> {
        let script = Self::preview_script(model_path, work_dir)?;
        write_script(&work_dir.join(PREVIEW_SCRIPT_NAME), &script).await
    }
}

fn export_block(render_type: RenderType, include_animations: bool) -> String {
    match render_type {
        RenderType::Gltf => format!(
            r#"gltf_options = dict(
    filepath=output_path,
    export_materials='EXPORT',
    export_animations={},
    export_cameras=False,
    export_lights=False,
    export_yup=True,
    export_apply=True,
)
try:
    bpy.ops.export_scene.gltf(export_format='GLTF_EMBEDDED', **gltf_options)
except TypeError:
    bpy.ops.export_scene.gltf(export_format='GLTF_SEPARATE', **gltf_options)
"#,
            if include_animations { "True" } else { "False" }
        ),
        RenderType::Stl => r#"if hasattr(bpy.ops.wm, 'stl_export'):
    bpy.ops.wm.stl_export(filepath=output_path)
else:
    bpy.ops.export_mesh.stl(filepath=output_path)
"#
        .to_string(),
        RenderType::Obj => r#"if hasattr(bpy.ops.wm, 'obj_export'):
    bpy.ops.wm.obj_export(filepath=output_path, export_materials=True, path_mode='STRIP')
else:
    bpy.ops.export_scene.obj(filepath=output_path, use_materials=True, path_mode='STRIP')
"#
        .to_string(),
        // Rejected by `scene_script` before we get here.
        RenderType::Usdz => String::new(),
    }
}

async fn write_script(path: &Path, content: &str) -> Result<PathBuf, RenderError> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await?;
    Ok(path.to_path_buf())
}

fn path_str(path: &Path) -> Result<&str, RenderError> {
    path.to_str().ok_or_else(|| RenderError::ScriptGeneration {
        message: format!("path is not valid UTF-8: {}", path.display()),
    })
}

fn py_opt_path(path: Option<&Path>) -> Result<String, RenderError> {
    match path {
        Some(p) => Ok(py_str(path_str(p)?)),
        None => Ok("None".to_string()),
    }
}

/// Quote a string as a Python literal.
fn py_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn py_float(value: f32) -> String {
    format!("{value:?}")
}
