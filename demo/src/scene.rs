use std::f32::consts::TAU;
use std::time::Duration;

use glam::{Mat4, Quat, Vec3};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tenebra::prelude::*;

const PERIOD: Duration = Duration::from_secs(12);
const ARENA: f32 = 10.0;

/// A light node circling around a fixed center.
struct Orbit {
    node: usize,
    center: Vec3,
    radius: f32,
    phase: f32,
    /// Turns per period, negative for clockwise.
    turns: f32,
}

impl Orbit {
    fn transform(&self, time: Duration) -> Mat4 {
        let t = time.as_secs_f32() / PERIOD.as_secs_f32();
        let angle = self.phase + TAU * self.turns * t;
        let offset = Vec3::new(angle.cos(), 0.0, angle.sin()) * self.radius;

        Mat4::from_translation(self.center + offset)
    }
}

/// Floor, a scatter of crates and colored point lights orbiting between them.
pub struct ProceduralScene {
    desc: SceneDesc,
    orbits: Vec<Orbit>,
}

impl ProceduralScene {
    pub fn new(seed: u64, light_count: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut desc = SceneDesc::default();

        desc.meshes.push(MeshData::quad(ARENA));
        desc.meshes.push(MeshData::cube(0.5));

        desc.materials.push(MaterialDesc {
            diffuse: Some(checker(64, 8, [200, 200, 200, 255], [90, 90, 100, 255])),
            specular_power: 8.0,
            ..Default::default()
        });
        for _ in 0..4 {
            desc.materials.push(MaterialDesc {
                diffuse: Some(checker(16, 4, [255, 255, 255, 255], [180, 180, 180, 255])),
                specular_power: rng.random_range(16.0..64.0),
                diffuse_color: Vec3::new(
                    rng.random_range(0.4..1.0),
                    rng.random_range(0.4..1.0),
                    rng.random_range(0.4..1.0),
                ),
                ..Default::default()
            });
        }

        let floor = desc.add_node(Mat4::IDENTITY);
        desc.mesh_nodes.push(MeshNode {
            mesh: 0,
            material: 0,
            node: floor,
        });

        for _ in 0..24 {
            let scale = rng.random_range(0.6..2.0);
            let position = Vec3::new(
                rng.random_range(-ARENA + 1.0..ARENA - 1.0),
                scale * 0.5,
                rng.random_range(-ARENA + 1.0..ARENA - 1.0),
            );
            let rotation = Quat::from_rotation_y(rng.random_range(0.0..TAU));

            let node = desc.add_node(Mat4::from_scale_rotation_translation(
                Vec3::splat(scale),
                rotation,
                position,
            ));
            desc.mesh_nodes.push(MeshNode {
                mesh: 1,
                material: rng.random_range(1..desc.materials.len()),
                node,
            });
        }

        // dim moonlight so unlit areas keep some shape
        let moon = desc.add_node(Mat4::from_quat(
            Quat::from_rotation_y(0.6) * Quat::from_rotation_x(-1.1),
        ));
        desc.lights
            .push(LightDesc::directional(moon, Vec3::new(0.05, 0.06, 0.1)));

        let mut orbits = Vec::with_capacity(light_count);
        for _ in 0..light_count {
            let node = desc.add_node(Mat4::IDENTITY);
            let color = Vec3::new(
                rng.random_range(0.2..1.0),
                rng.random_range(0.2..1.0),
                rng.random_range(0.2..1.0),
            );

            desc.lights.push(LightDesc {
                intensity: rng.random_range(0.06..0.12),
                ..LightDesc::point(node, color.normalize())
            });

            orbits.push(Orbit {
                node,
                center: Vec3::new(
                    rng.random_range(-ARENA * 0.5..ARENA * 0.5),
                    rng.random_range(0.5..2.5),
                    rng.random_range(-ARENA * 0.5..ARENA * 0.5),
                ),
                radius: rng.random_range(1.0..ARENA * 0.5),
                phase: rng.random_range(0.0..TAU),
                turns: if rng.random_bool(0.5) { 1.0 } else { -2.0 },
            });
        }

        desc.cameras.push(CameraDesc {
            position: Vec3::new(0.0, 12.0, 16.0),
            target: Vec3::ZERO,
            far: 60.0,
            ..Default::default()
        });
        desc.cameras.push(CameraDesc {
            position: Vec3::new(-ARENA, 1.5, -ARENA),
            target: Vec3::new(0.0, 0.5, 0.0),
            far: 60.0,
            ..Default::default()
        });

        log::info!(
            "Generated scene with seed {seed}: {} crates, {} point lights",
            desc.mesh_nodes.len() - 1,
            light_count
        );

        Self { desc, orbits }
    }
}

impl SceneProvider for ProceduralScene {
    fn meshes(&self) -> &[MeshData] {
        self.desc.meshes()
    }

    fn materials(&self) -> &[MaterialDesc] {
        self.desc.materials()
    }

    fn mesh_nodes(&self) -> &[MeshNode] {
        self.desc.mesh_nodes()
    }

    fn lights(&self) -> &[LightDesc] {
        self.desc.lights()
    }

    fn camera_count(&self) -> usize {
        self.desc.camera_count()
    }

    fn camera(&self, index: usize, time: Duration) -> CameraDesc {
        self.desc.camera(index, time)
    }

    fn node_transform(&self, node: usize, time: Duration) -> Mat4 {
        match self.orbits.iter().find(|orbit| orbit.node == node) {
            Some(orbit) => orbit.transform(time),
            None => self.desc.node_transform(node, time),
        }
    }

    fn duration(&self) -> Duration {
        PERIOD
    }
}

fn checker(size: u32, cells: u32, a: [u8; 4], b: [u8; 4]) -> TextureData {
    let cell = (size / cells).max(1);
    let pixels = (0..size * size)
        .map(|i| {
            let (x, y) = (i % size / cell, i / size / cell);
            if (x + y) % 2 == 0 {
                a
            } else {
                b
            }
        })
        .collect();

    TextureData {
        width: size,
        height: size,
        pixels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orbits_loop_over_the_period() {
        let scene = ProceduralScene::new(7, 8);
        assert_eq!(scene.lights().len(), 9);

        for orbit in &scene.orbits {
            let start = scene.node_transform(orbit.node, Duration::ZERO);
            let end = scene.node_transform(orbit.node, PERIOD);
            assert!(start.abs_diff_eq(end, 1e-4));
        }
    }

    #[test]
    fn generated_geometry_is_drawable() {
        let scene = ProceduralScene::new(7, 4);

        for (index, mesh) in scene.meshes().iter().enumerate() {
            assert!(mesh.validate(index).is_ok());
        }
        assert!(scene
            .mesh_nodes()
            .iter()
            .all(|node| node.material < scene.materials().len()));
    }

    #[test]
    fn same_seed_same_scene() {
        let a = ProceduralScene::new(42, 4);
        let b = ProceduralScene::new(42, 4);

        assert_eq!(a.lights(), b.lights());
        assert_eq!(a.materials(), b.materials());
    }
}
