use std::time::Duration;

use glam::Mat4;

use crate::{
    Backend, CameraDesc, DirectionalLight, LightDesc, LightKind, LoadError, Material, MaterialDesc,
    MeshData, MeshHandle, PointLight, RendererConfig,
};

/// One drawable: a mesh placed by a scene node, shaded with a material.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshNode {
    pub mesh: usize,
    pub material: usize,
    pub node: usize,
}

/// Source of scene content, addressed by the current animation time.
pub trait SceneProvider {
    fn meshes(&self) -> &[MeshData];

    fn materials(&self) -> &[MaterialDesc];

    fn mesh_nodes(&self) -> &[MeshNode];

    fn lights(&self) -> &[LightDesc];

    fn camera_count(&self) -> usize;

    fn camera(&self, index: usize, time: Duration) -> CameraDesc;

    /// World transform of `node` at `time`.
    fn node_transform(&self, node: usize, time: Duration) -> Mat4;

    /// Length of the scene's animation, zero for static scenes.
    fn duration(&self) -> Duration;
}

/// Static in-memory scene.
#[derive(Clone, Debug, Default)]
pub struct SceneDesc {
    pub meshes: Vec<MeshData>,
    pub materials: Vec<MaterialDesc>,
    pub mesh_nodes: Vec<MeshNode>,
    pub lights: Vec<LightDesc>,
    pub cameras: Vec<CameraDesc>,
    pub nodes: Vec<Mat4>,
}

impl SceneDesc {
    /// Adds a scene node and returns its index.
    pub fn add_node(&mut self, transform: Mat4) -> usize {
        self.nodes.push(transform);
        self.nodes.len() - 1
    }
}

impl SceneProvider for SceneDesc {
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

    fn camera(&self, index: usize, _time: Duration) -> CameraDesc {
        self.cameras.get(index).copied().unwrap_or_default()
    }

    fn node_transform(&self, node: usize, _time: Duration) -> Mat4 {
        self.nodes.get(node).copied().unwrap_or(Mat4::IDENTITY)
    }

    fn duration(&self) -> Duration {
        Duration::ZERO
    }
}

/// A drawable with its resolved handles and per-frame world transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeInstance {
    pub mesh: MeshHandle,
    pub material: usize,
    pub node: usize,
    pub world: Mat4,
}

/// Scene content uploaded to a backend and validated.
#[derive(Clone, Debug)]
pub struct Scene {
    pub instances: Vec<NodeInstance>,
    pub materials: Vec<Material>,
    pub point_lights: Vec<PointLight>,
    pub directional_lights: Vec<DirectionalLight>,
    pub camera_count: usize,
}

impl Scene {
    pub fn load(
        backend: &mut impl Backend,
        provider: &impl SceneProvider,
        config: &RendererConfig,
    ) -> Result<Self, LoadError> {
        if provider.materials().is_empty() {
            return Err(LoadError::NoMaterials);
        }

        for (index, material) in provider.materials().iter().enumerate() {
            material.validate(index)?;
        }

        for (index, mesh) in provider.meshes().iter().enumerate() {
            mesh.validate(index)?;
        }

        let mut point_lights = vec![];
        let mut directional_lights = vec![];
        for (index, light) in provider.lights().iter().enumerate() {
            match light.kind {
                LightKind::Point => point_lights.push(PointLight::new(light, config)),
                LightKind::Directional => {
                    directional_lights.push(DirectionalLight::new(light, config))
                }
                kind @ LightKind::Spot => {
                    return Err(LoadError::UnsupportedLight {
                        light: index,
                        kind: kind.name(),
                    })
                }
            }
        }

        if config.require_lights && point_lights.is_empty() && directional_lights.is_empty() {
            return Err(LoadError::NoLights);
        }

        if provider.camera_count() == 0 {
            return Err(LoadError::MissingCamera);
        }

        let material_count = provider.materials().len();
        for (index, node) in provider.mesh_nodes().iter().enumerate() {
            if node.material >= material_count {
                return Err(LoadError::MissingMaterial {
                    node: index,
                    material: node.material,
                });
            }
            if node.mesh >= provider.meshes().len() {
                return Err(LoadError::UnsupportedGeometry {
                    mesh: node.mesh,
                    reason: "mesh node references a missing mesh",
                });
            }
        }

        let meshes: Vec<MeshHandle> = provider
            .meshes()
            .iter()
            .map(|mesh| backend.upload_mesh(mesh))
            .collect();

        let materials = Material::load_all(backend, provider.materials());

        let instances = provider
            .mesh_nodes()
            .iter()
            .map(|node| NodeInstance {
                mesh: meshes[node.mesh],
                material: node.material,
                node: node.node,
                world: Mat4::IDENTITY,
            })
            .collect::<Vec<_>>();

        log::info!(
            "Loaded scene: {} meshes, {} nodes, {} materials, {} point lights, {} directional lights, {} cameras",
            meshes.len(),
            instances.len(),
            materials.len(),
            point_lights.len(),
            directional_lights.len(),
            provider.camera_count(),
        );

        Ok(Self {
            instances,
            materials,
            point_lights,
            directional_lights,
            camera_count: provider.camera_count(),
        })
    }

    /// Re-samples every node-driven transform at `time`.
    pub fn update(&mut self, provider: &impl SceneProvider, time: Duration) {
        for instance in &mut self.instances {
            instance.world = provider.node_transform(instance.node, time);
        }

        for light in &mut self.point_lights {
            light.transform = provider.node_transform(light.node, time);
        }

        for light in &mut self.directional_lights {
            light.update(provider.node_transform(light.node, time));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{raster::RasterBackend, TextureData};
    use glam::Vec3;

    fn scene() -> SceneDesc {
        let mut scene = SceneDesc {
            meshes: vec![MeshData::quad(1.0)],
            materials: vec![MaterialDesc::default()],
            cameras: vec![CameraDesc::default()],
            ..Default::default()
        };
        let node = scene.add_node(Mat4::IDENTITY);
        scene.mesh_nodes.push(MeshNode {
            mesh: 0,
            material: 0,
            node,
        });
        let light = scene.add_node(Mat4::from_translation(Vec3::Y));
        scene.lights.push(LightDesc::point(light, Vec3::ONE));
        scene
    }

    fn load(scene: &SceneDesc, config: &RendererConfig) -> Result<Scene, LoadError> {
        Scene::load(&mut RasterBackend::new(4, 4), scene, config)
    }

    #[test]
    fn loads_a_valid_scene() {
        let mut loaded = load(&scene(), &RendererConfig::default()).unwrap();
        assert_eq!(loaded.instances.len(), 1);
        assert_eq!(loaded.point_lights.len(), 1);

        loaded.update(&scene(), Duration::ZERO);
        assert_eq!(loaded.point_lights[0].position(), Vec3::Y);
    }

    #[test]
    fn rejects_structural_errors() {
        let config = RendererConfig::default();

        let mut no_camera = scene();
        no_camera.cameras.clear();
        assert_eq!(load(&no_camera, &config).unwrap_err(), LoadError::MissingCamera);

        let mut no_lights = scene();
        no_lights.lights.clear();
        assert_eq!(load(&no_lights, &config).unwrap_err(), LoadError::NoLights);
        let lenient = RendererConfig {
            require_lights: false,
            ..Default::default()
        };
        assert!(load(&no_lights, &lenient).is_ok());

        let mut spot = scene();
        spot.lights[0].kind = LightKind::Spot;
        assert_eq!(
            load(&spot, &config).unwrap_err(),
            LoadError::UnsupportedLight {
                light: 0,
                kind: "spot"
            }
        );

        let mut unindexed = scene();
        unindexed.meshes[0].indices = None;
        assert!(matches!(
            load(&unindexed, &config).unwrap_err(),
            LoadError::UnsupportedGeometry { mesh: 0, .. }
        ));

        let mut no_materials = scene();
        no_materials.materials.clear();
        assert_eq!(load(&no_materials, &config).unwrap_err(), LoadError::NoMaterials);

        let mut bad_texture = scene();
        bad_texture.materials[0].diffuse = Some(TextureData {
            width: 4,
            height: 4,
            pixels: vec![[255; 4]],
        });
        assert!(matches!(
            load(&bad_texture, &config).unwrap_err(),
            LoadError::InvalidTexture { material: 0, .. }
        ));

        let mut bad_material = scene();
        bad_material.mesh_nodes[0].material = 4;
        assert_eq!(
            load(&bad_material, &config).unwrap_err(),
            LoadError::MissingMaterial {
                node: 0,
                material: 4
            }
        );
    }
}
