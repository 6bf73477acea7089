#![warn(clippy::all)]

//! glTF 2.0 scene provider.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use glam::{Mat4, Vec3};
use gltf::khr_lights_punctual::Kind;
use renderer::{
    CameraDesc, LightDesc, LightKind, MaterialDesc, MeshData, MeshNode, SceneProvider,
    TextureData,
};

mod animation;
use animation::NodeSamplers;

struct Node {
    parent: Option<usize>,
    local: Mat4,
}

struct PerspectiveCamera {
    node: usize,
    fov_y: f32,
    near: f32,
    far: f32,
}

/// A glTF document flattened into the renderer's scene description.
pub struct GltfScene {
    meshes: Vec<MeshData>,
    materials: Vec<MaterialDesc>,
    mesh_nodes: Vec<MeshNode>,
    lights: Vec<LightDesc>,
    cameras: Vec<PerspectiveCamera>,
    nodes: Vec<Node>,
    samplers: NodeSamplers,
    duration: Duration,
}

impl GltfScene {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (doc, buffers, images) =
            gltf::import(path).map_err(|e| anyhow!("Failed to import {}: {e}", path.display()))?;

        let scene = Self::new(&doc, &buffers, &images)?;
        log::info!("Loaded {}", path.display());
        Ok(scene)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let (doc, buffers, images) = gltf::import_slice(bytes)?;
        Self::new(&doc, &buffers, &images)
    }

    pub fn new(
        doc: &gltf::Document,
        buffers: &[gltf::buffer::Data],
        images: &[gltf::image::Data],
    ) -> Result<Self> {
        let textures = doc
            .textures()
            .map(|texture| {
                let image = images
                    .get(texture.source().index())
                    .ok_or_else(|| anyhow!("Invalid texture image index"))?;
                Ok(Self::build_texture(image))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut materials = Self::build_materials(doc, &textures);
        // primitives without a material
        let default_material = materials.len();
        materials.push(MaterialDesc::default());

        let mut meshes = vec![];
        let mut primitives = vec![];
        for mesh in doc.meshes() {
            let mut mesh_primitives = vec![];
            for primitive in mesh.primitives() {
                if primitive.mode() != gltf::mesh::Mode::Triangles {
                    bail!(
                        "mesh {}: primitive {} is {:?}, only triangle lists are supported",
                        mesh.index(),
                        primitive.index(),
                        primitive.mode()
                    );
                }

                let material = primitive
                    .material()
                    .index()
                    .unwrap_or(default_material);

                mesh_primitives.push((meshes.len(), material));
                meshes.push(Self::build_mesh(&primitive, buffers)?);
            }
            primitives.push(mesh_primitives);
        }

        let mut nodes = doc
            .nodes()
            .map(|node| Node {
                parent: None,
                local: Mat4::from_cols_array_2d(&node.transform().matrix()),
            })
            .collect::<Vec<_>>();
        for node in doc.nodes() {
            for child in node.children() {
                if let Some(child) = nodes.get_mut(child.index()) {
                    child.parent = Some(node.index());
                }
            }
        }

        let mut mesh_nodes = vec![];
        let mut lights = vec![];
        let mut cameras = vec![];

        for node in doc.nodes() {
            if let Some(mesh) = node.mesh() {
                for &(mesh, material) in primitives.get(mesh.index()).into_iter().flatten() {
                    mesh_nodes.push(MeshNode {
                        mesh,
                        material,
                        node: node.index(),
                    });
                }
            }

            if let Some(light) = node.light() {
                let kind = match light.kind() {
                    Kind::Point => LightKind::Point,
                    Kind::Directional => LightKind::Directional,
                    Kind::Spot { .. } => LightKind::Spot,
                };
                lights.push(LightDesc {
                    kind,
                    color: Vec3::from(light.color()),
                    intensity: light.intensity(),
                    node: node.index(),
                });
            }

            if let Some(camera) = node.camera() {
                match camera.projection() {
                    gltf::camera::Projection::Perspective(perspective) => {
                        cameras.push(PerspectiveCamera {
                            node: node.index(),
                            fov_y: perspective.yfov(),
                            near: perspective.znear(),
                            far: perspective.zfar().unwrap_or(CameraDesc::default().far),
                        })
                    }
                    gltf::camera::Projection::Orthographic(_) => {
                        log::warn!("Skipping orthographic camera of node {}", node.index())
                    }
                }
            }
        }

        let samplers = NodeSamplers::new(doc.animations(), buffers)?;
        let duration = samplers.duration();

        Ok(Self {
            meshes,
            materials,
            mesh_nodes,
            lights,
            cameras,
            nodes,
            samplers,
            duration,
        })
    }

    fn build_texture(data: &gltf::image::Data) -> Option<TextureData> {
        use gltf::image::Format;

        let (width, height) = (data.width, data.height);
        let pixels = data.pixels.clone();

        // 3 channels texture formats are not supported by WebGPU, everything goes to RGBA8
        let rgba = match data.format {
            Format::R8G8B8A8 => image::RgbaImage::from_raw(width, height, pixels),
            Format::R8G8B8 => image::RgbImage::from_raw(width, height, pixels)
                .map(|buf| image::DynamicImage::ImageRgb8(buf).to_rgba8()),
            Format::R8 => image::GrayImage::from_raw(width, height, pixels)
                .map(|buf| image::DynamicImage::ImageLuma8(buf).to_rgba8()),
            Format::R8G8 => image::GrayAlphaImage::from_raw(width, height, pixels)
                .map(|buf| image::DynamicImage::ImageLumaA8(buf).to_rgba8()),
            format => {
                log::warn!("Unsupported image format {format:?}, using the default texture");
                None
            }
        }?;

        Some(TextureData {
            width,
            height,
            pixels: rgba.pixels().map(|pixel| pixel.0).collect(),
        })
    }

    fn build_materials(
        doc: &gltf::Document,
        textures: &[Option<TextureData>],
    ) -> Vec<MaterialDesc> {
        let texture = |index: usize| textures.get(index).cloned().flatten();

        doc.materials()
            .map(|material| {
                let pbr = material.pbr_metallic_roughness();
                let [r, g, b, _] = pbr.base_color_factor();

                MaterialDesc {
                    diffuse: pbr
                        .base_color_texture()
                        .and_then(|info| texture(info.texture().index())),
                    bump: material
                        .normal_texture()
                        .and_then(|info| texture(info.texture().index())),
                    specular_power: specular_power(pbr.roughness_factor()),
                    diffuse_color: Vec3::new(r, g, b),
                }
            })
            .collect()
    }

    fn build_mesh(primitive: &gltf::Primitive, buffers: &[gltf::buffer::Data]) -> Result<MeshData> {
        let reader =
            primitive.reader(|buffer| buffers.get(buffer.index()).map(std::ops::Deref::deref));

        let positions = reader
            .read_positions()
            .ok_or_else(|| anyhow!("Missing positions"))?
            .collect();

        Ok(MeshData {
            positions,
            normals: reader.read_normals().map(Iterator::collect).unwrap_or_default(),
            tangents: reader
                .read_tangents()
                .map(Iterator::collect)
                .unwrap_or_default(),
            uvs: reader
                .read_tex_coords(0)
                .map(|uvs| uvs.into_f32().collect())
                .unwrap_or_default(),
            indices: reader.read_indices().map(|i| i.into_u32().collect()),
        })
    }

    fn local_transform(&self, node: usize, time: Duration) -> Mat4 {
        self.samplers
            .get_node_transform(node, time)
            .or_else(|| self.nodes.get(node).map(|node| node.local))
            .unwrap_or(Mat4::IDENTITY)
    }
}

/// Blinn-Phong exponent roughly matching a metallic-roughness roughness.
fn specular_power(roughness: f32) -> f32 {
    let alpha = roughness.clamp(0.0, 1.0).powi(2).max(1e-3);
    (2.0 / (alpha * alpha) - 2.0).clamp(0.0, 255.0)
}

impl SceneProvider for GltfScene {
    fn meshes(&self) -> &[MeshData] {
        &self.meshes
    }

    fn materials(&self) -> &[MaterialDesc] {
        &self.materials
    }

    fn mesh_nodes(&self) -> &[MeshNode] {
        &self.mesh_nodes
    }

    fn lights(&self) -> &[LightDesc] {
        &self.lights
    }

    fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    fn camera(&self, index: usize, time: Duration) -> CameraDesc {
        let Some(camera) = self.cameras.get(index) else {
            return CameraDesc::default();
        };

        let transform = self.node_transform(camera.node, time);
        let position = transform.transform_point3(Vec3::ZERO);

        CameraDesc {
            position,
            target: position + transform.transform_vector3(Vec3::NEG_Z),
            up: transform.transform_vector3(Vec3::Y),
            fov_y: camera.fov_y,
            near: camera.near,
            far: camera.far,
        }
    }

    fn node_transform(&self, node: usize, time: Duration) -> Mat4 {
        let mut transform = self.local_transform(node, time);
        let mut parent = self.nodes.get(node).and_then(|node| node.parent);

        // glTF node hierarchies are trees, the bound guards malformed files
        let mut depth = 0;
        while let Some(index) = parent {
            if depth > self.nodes.len() {
                log::warn!("Cycle in the node hierarchy at node {index}");
                break;
            }
            transform = self.local_transform(index, time) * transform;
            parent = self.nodes.get(index).and_then(|node| node.parent);
            depth += 1;
        }

        transform
    }

    fn duration(&self) -> Duration {
        self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const BUFFER: &str = "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAABAAIAAAAAAAAAAAAAQAAAAAAAAAAAAAAAAAAAgEAAAAAAAAAAAA==";

    fn document() -> String {
        format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "extensionsUsed": ["KHR_lights_punctual"],
  "extensions": {{
    "KHR_lights_punctual": {{
      "lights": [
        {{ "type": "point", "color": [1.0, 0.5, 0.25], "intensity": 2.0 }},
        {{ "type": "spot", "spot": {{ "innerConeAngle": 0.0, "outerConeAngle": 0.7 }} }}
      ]
    }}
  }},
  "scene": 0,
  "scenes": [{{ "nodes": [0, 3, 4] }}],
  "nodes": [
    {{ "translation": [0.0, 1.0, 0.0], "children": [1, 2] }},
    {{ "mesh": 0 }},
    {{ "camera": 0, "translation": [0.0, 0.0, 5.0] }},
    {{ "translation": [0.0, 2.0, 0.0], "extensions": {{ "KHR_lights_punctual": {{ "light": 0 }} }} }},
    {{ "extensions": {{ "KHR_lights_punctual": {{ "light": 1 }} }} }}
  ],
  "cameras": [{{ "type": "perspective", "perspective": {{ "yfov": 0.8, "znear": 0.1, "zfar": 50.0, "aspectRatio": 1.0 }} }}],
  "materials": [{{ "pbrMetallicRoughness": {{ "baseColorFactor": [0.5, 0.5, 0.5, 1.0], "roughnessFactor": 0.5 }} }}],
  "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "indices": 1, "material": 0 }}] }}],
  "animations": [{{
    "channels": [{{ "sampler": 0, "target": {{ "node": 1, "path": "translation" }} }}],
    "samplers": [{{ "input": 2, "output": 3, "interpolation": "LINEAR" }}]
  }}],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }},
    {{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }},
    {{ "bufferView": 2, "componentType": 5126, "count": 2, "type": "SCALAR", "min": [0.0], "max": [2.0] }},
    {{ "bufferView": 3, "componentType": 5126, "count": 2, "type": "VEC3" }}
  ],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 6, "target": 34963 }},
    {{ "buffer": 0, "byteOffset": 44, "byteLength": 8 }},
    {{ "buffer": 0, "byteOffset": 52, "byteLength": 24 }}
  ],
  "buffers": [{{ "byteLength": 76, "uri": "{BUFFER}" }}]
}}"#
        )
    }

    fn scene() -> GltfScene {
        GltfScene::from_slice(document().as_bytes()).unwrap()
    }

    #[test]
    fn flattens_meshes_and_materials() {
        let scene = scene();

        assert_eq!(scene.meshes().len(), 1);
        assert_eq!(scene.meshes()[0].positions.len(), 3);
        assert_eq!(scene.meshes()[0].indices(), &[0, 1, 2]);
        assert_eq!(
            scene.mesh_nodes(),
            &[MeshNode {
                mesh: 0,
                material: 0,
                node: 1
            }]
        );

        // plus the fallback material
        assert_eq!(scene.materials().len(), 2);
        assert_eq!(scene.materials()[0].diffuse_color, Vec3::splat(0.5));
        assert_relative_eq!(scene.materials()[0].specular_power, 30.0, epsilon = 1e-3);
    }

    #[test]
    fn rejects_non_triangle_primitives() {
        let lines = document().replace(
            r#""material": 0 }]"#,
            r#""material": 0, "mode": 1 }]"#,
        );
        assert_ne!(lines, document());

        let error = GltfScene::from_slice(lines.as_bytes())
            .err()
            .expect("line primitives must not load");
        assert!(error.to_string().contains("only triangle lists"), "{error}");
    }

    #[test]
    fn reads_punctual_lights() {
        let scene = scene();
        let lights = scene.lights();

        assert_eq!(lights.len(), 2);
        assert_eq!(lights[0].kind, LightKind::Point);
        assert_eq!(lights[0].color, Vec3::new(1.0, 0.5, 0.25));
        assert_eq!(lights[0].intensity, 2.0);
        assert_eq!(lights[0].node, 3);
        assert_eq!(lights[1].kind, LightKind::Spot);
    }

    #[test]
    fn cameras_follow_the_hierarchy() {
        let scene = scene();
        assert_eq!(scene.camera_count(), 1);

        let camera = scene.camera(0, Duration::ZERO);
        assert_relative_eq!(camera.position, Vec3::new(0.0, 1.0, 5.0));
        assert_relative_eq!(camera.target, Vec3::new(0.0, 1.0, 4.0));
        assert_relative_eq!(camera.up, Vec3::Y);
        assert_eq!(camera.fov_y, 0.8);
        assert_eq!(camera.far, 50.0);
    }

    #[test]
    fn animated_nodes_are_resampled() {
        let scene = scene();
        assert_eq!(scene.duration(), Duration::from_secs(2));

        let position = |secs: f32| {
            scene
                .node_transform(1, Duration::from_secs_f32(secs))
                .transform_point3(Vec3::ZERO)
        };

        assert_relative_eq!(position(0.0), Vec3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(position(1.0), Vec3::new(2.0, 1.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(position(5.0), Vec3::new(4.0, 1.0, 0.0));
    }
}
