use std::collections::HashMap;

use crate::MeshData;

/// Subdivided icosahedron used as the light volume proxy.
///
/// Vertices sit at radius `1 / 0.9`, so that for `order >= 1` every face lies outside the unit
/// sphere and the proxy encloses the light's influence sphere.
pub struct Icosphere {
    pub vertices: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl Icosphere {
    pub const ORDER: u32 = 1;

    /// Radius of the vertices, i.e. of the circumscribed sphere.
    pub const OUTER_RADIUS: f32 = 1.0 / 0.9;

    #[allow(clippy::many_single_char_names)]
    pub fn new(order: u32) -> Self {
        // set up a 20-triangle icosahedron
        let f = (1.0 + 5.0_f32.sqrt()) / 2.0;

        let mut vertices = vec![
            [-1.0, f, 0.0],
            [1.0, f, 0.0],
            [-1.0, -f, 0.0],
            [1.0, -f, 0.0],
            [0.0, -1.0, f],
            [0.0, 1.0, f],
            [0.0, -1.0, -f],
            [0.0, 1.0, -f],
            [f, 0.0, -1.0],
            [f, 0.0, 1.0],
            [-f, 0.0, -1.0],
            [-f, 0.0, 1.0],
        ];

        #[rustfmt::skip]
        let mut indices: Vec<u32> = vec![
             0, 11,  5,
             0,  5,  1,
             0,  1,  7,
             0,  7, 10,
             0, 10, 11,
            11, 10,  2,
             5, 11,  4,
             1,  5,  9,
             7,  1,  8,
            10,  7,  6,
             3,  9,  4,
             3,  4,  2,
             3,  2,  6,
             3,  6,  8,
             3,  8,  9,
             9,  8,  1,
             4,  9,  5,
             2,  4, 11,
             6,  2, 10,
             8,  6,  7,
        ];

        let mut mid_cache: HashMap<(u32, u32), u32> = HashMap::new();
        let mut add_mid_point = |vertices: &mut Vec<[f32; 3]>, a: u32, b: u32| -> u32 {
            let key = (a.min(b), a.max(b));
            *mid_cache.entry(key).or_insert_with(|| {
                let (va, vb) = (vertices[a as usize], vertices[b as usize]);
                vertices.push([0, 1, 2].map(|k| (va[k] + vb[k]) / 2.0));
                vertices.len() as u32 - 1
            })
        };

        for _ in 0..order {
            // Subdivide each triangle into 4 triangles
            indices = indices
                .chunks(3)
                .flat_map(|triangle| {
                    let [v1, v2, v3] = [triangle[0], triangle[1], triangle[2]];
                    let a = add_mid_point(&mut vertices, v1, v2);
                    let b = add_mid_point(&mut vertices, v2, v3);
                    let c = add_mid_point(&mut vertices, v3, v1);

                    [v1, a, c, v2, b, a, v3, c, b, a, b, c]
                })
                .collect();
        }

        for vertex in &mut vertices {
            let n = glam::Vec3::from(*vertex).length() * 0.9;
            *vertex = vertex.map(|x| x / n);
        }

        Self { vertices, indices }
    }

    pub fn mesh(&self) -> MeshData {
        MeshData {
            positions: self.vertices.clone(),
            normals: self
                .vertices
                .iter()
                .map(|&v| glam::Vec3::from(v).normalize().into())
                .collect(),
            tangents: vec![],
            uvs: vec![],
            indices: Some(self.indices.clone()),
        }
    }
}

impl Default for Icosphere {
    fn default() -> Self {
        Self::new(Self::ORDER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn faces(sphere: &Icosphere) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        sphere
            .indices
            .chunks(3)
            .map(|t| [0, 1, 2].map(|i| Vec3::from(sphere.vertices[t[i] as usize])))
    }

    #[test]
    fn subdivision_counts() {
        let sphere = Icosphere::new(1);
        assert_eq!(sphere.indices.len(), 80 * 3);
        assert_eq!(sphere.vertices.len(), 42);
    }

    #[test]
    fn faces_enclose_unit_sphere() {
        let sphere = Icosphere::default();

        for [a, b, c] in faces(&sphere) {
            let normal = (b - a).cross(c - a).normalize();
            // outward winding, and plane distance beyond the unit sphere
            assert!(normal.dot(a) > 1.0);
        }

        for v in &sphere.vertices {
            approx::assert_relative_eq!(
                Vec3::from(*v).length(),
                Icosphere::OUTER_RADIUS,
                epsilon = 1e-5
            );
        }
    }
}
