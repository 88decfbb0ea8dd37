use crate::error::Result;
use crate::geometry;
use crate::inversion::obj;

/// An inverted body mesh.
///
/// Buffers are flat `Vec<f32>` / `Vec<u32>` so they cast to `glam::Vec3` and
/// `[u32; 3]` views without copying.
#[derive(Debug, Clone, Default)]
pub struct BodyMesh {
    /// Interleaved positions: [x, y, z, x, y, z, ...]
    pub positions: Vec<f32>,
    /// Interleaved normals: [nx, ny, nz, ...] or empty
    pub normals: Vec<f32>,
    /// Triangle indices, 0-based
    pub indices: Vec<u32>,
}

impl BodyMesh {
    pub fn new(positions: Vec<f32>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            normals: Vec::new(),
            indices,
        }
    }

    /// Number of vertices (positions / 3).
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Number of triangles (indices / 3).
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Compute area-weighted vertex normals.
    pub fn with_normals(mut self) -> Result<Self> {
        self.normals = geometry::create_normals(&self.positions, &self.indices)?;
        Ok(self)
    }

    /// Axis-aligned bounds as `(min, max)`.
    pub fn bounds(&self) -> Option<(glam::Vec3, glam::Vec3)> {
        let verts = geometry::vertices(&self.positions).ok()?;
        let first = *verts.first()?;
        Some(
            verts
                .iter()
                .fold((first, first), |(lo, hi), v| (lo.min(*v), hi.max(*v))),
        )
    }

    /// Wavefront OBJ lines, each ending in `delimiter`.
    pub fn to_obj_lines(&self, delimiter: &str, include_normals: bool) -> Result<Vec<String>> {
        let normals = (include_normals && self.has_normals()).then_some(self.normals.as_slice());
        obj::obj_lines(&self.positions, normals, &self.indices, delimiter)
    }
}
