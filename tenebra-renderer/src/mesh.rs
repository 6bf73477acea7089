use crate::LoadError;

/// Vertex attributes of one triangle-list mesh. Optional attributes may be left empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    /// xyz tangent, w handedness.
    pub tangents: Vec<[f32; 4]>,
    pub uvs: Vec<[f32; 2]>,
    /// Only indexed geometry can be drawn.
    pub indices: Option<Vec<u32>>,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 4],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x3, // Position
        1 => Float32x3, // Normal
        2 => Float32x4, // Tangent
        3 => Float32x2, // UV
    ];
}

impl MeshData {
    pub fn validate(&self, mesh: usize) -> Result<(), LoadError> {
        let unsupported = |reason| LoadError::UnsupportedGeometry { mesh, reason };

        let indices = self
            .indices
            .as_ref()
            .ok_or_else(|| unsupported("missing index data"))?;

        if indices.len() % 3 != 0 {
            return Err(unsupported("index count is not a multiple of 3"));
        }

        let count = self.positions.len();
        if indices.iter().any(|&i| i as usize >= count) {
            return Err(unsupported("index out of range"));
        }

        let matches = |len: usize| len == 0 || len == count;
        if !matches(self.normals.len()) || !matches(self.tangents.len()) || !matches(self.uvs.len())
        {
            return Err(unsupported("attribute count mismatch"));
        }

        Ok(())
    }

    pub fn indices(&self) -> &[u32] {
        self.indices.as_deref().unwrap_or_default()
    }

    /// Interleaved vertices, filling missing attributes with defaults.
    pub fn vertices(&self) -> Vec<Vertex> {
        (0..self.positions.len())
            .map(|i| Vertex {
                position: self.positions[i],
                normal: self.normals.get(i).copied().unwrap_or([0.0, 0.0, 1.0]),
                tangent: self.tangents.get(i).copied().unwrap_or([1.0, 0.0, 0.0, 1.0]),
                uv: self.uvs.get(i).copied().unwrap_or_default(),
            })
            .collect()
    }

    /// An axis-aligned quad in the XZ plane facing +Y, centered at the origin.
    pub fn quad(half_extent: f32) -> Self {
        let h = half_extent;
        Self {
            positions: vec![[-h, 0.0, h], [h, 0.0, h], [h, 0.0, -h], [-h, 0.0, -h]],
            normals: vec![[0.0, 1.0, 0.0]; 4],
            tangents: vec![[1.0, 0.0, 0.0, 1.0]; 4],
            uvs: vec![[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]],
            indices: Some(vec![0, 1, 2, 0, 2, 3]),
        }
    }

    /// An axis-aligned cube of the given half extent, centered at the origin.
    pub fn cube(half_extent: f32) -> Self {
        let h = half_extent;
        // (normal, tangent) per face
        let faces: [([f32; 3], [f32; 3]); 6] = [
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0]),
        ];

        let mut mesh = Self {
            indices: Some(Vec::with_capacity(36)),
            ..Default::default()
        };

        for (normal, tangent) in faces {
            let n = glam::Vec3::from(normal);
            let t = glam::Vec3::from(tangent);
            let b = n.cross(t);
            let base = mesh.positions.len() as u32;

            for (u, v) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let p = (n + t * u + b * v) * h;
                mesh.positions.push(p.into());
                mesh.normals.push(normal);
                mesh.tangents.push([tangent[0], tangent[1], tangent[2], 1.0]);
                mesh.uvs.push([(u + 1.0) / 2.0, (1.0 - v) / 2.0]);
            }

            if let Some(indices) = mesh.indices.as_mut() {
                indices.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
            }
        }

        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_indexed_geometry_is_rejected() {
        let mesh = MeshData {
            indices: None,
            ..MeshData::quad(1.0)
        };

        assert_eq!(
            mesh.validate(3),
            Err(LoadError::UnsupportedGeometry {
                mesh: 3,
                reason: "missing index data"
            })
        );
    }

    #[test]
    fn mismatched_attributes_are_rejected() {
        let mut mesh = MeshData::quad(1.0);
        mesh.uvs.pop();

        assert!(mesh.validate(0).is_err());

        mesh.uvs.clear();
        assert!(mesh.validate(0).is_ok());
        assert_eq!(mesh.vertices()[2].uv, [0.0, 0.0]);
    }

    #[test]
    fn cube_faces_wind_outward() {
        let cube = MeshData::cube(1.0);
        cube.validate(0).unwrap();

        for triangle in cube.indices().chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|i| glam::Vec3::from(cube.positions[triangle[i] as usize]));
            let normal = (b - a).cross(c - a);
            assert!(normal.dot(a + b + c) > 0.0);
        }
    }
}
