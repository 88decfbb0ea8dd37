pub mod hull;

use std::collections::HashMap;

use glam::Vec3;

use crate::error::{InversionError, Result};

pub use hull::{closed_perimeter, convex_hull};

/// View a flat `[x, y, z, x, y, z, ...]` buffer as vertices without copying.
pub fn vertices(positions: &[f32]) -> Result<&[Vec3]> {
    if positions.len() % 3 != 0 {
        return Err(InversionError::Input(format!(
            "position buffer length {} is not a multiple of 3",
            positions.len()
        )));
    }
    Ok(bytemuck::cast_slice(positions))
}

/// Mutable counterpart of [`vertices`].
pub fn vertices_mut(positions: &mut [f32]) -> Result<&mut [Vec3]> {
    if positions.len() % 3 != 0 {
        return Err(InversionError::Input(format!(
            "position buffer length {} is not a multiple of 3",
            positions.len()
        )));
    }
    Ok(bytemuck::cast_slice_mut(positions))
}

/// View a flat triangle index buffer as index triples without copying.
pub fn faces(indices: &[u32]) -> Result<&[[u32; 3]]> {
    if indices.len() % 3 != 0 {
        return Err(InversionError::Input(format!(
            "index buffer length {} is not a multiple of 3",
            indices.len()
        )));
    }
    Ok(bytemuck::cast_slice(indices))
}

/// Normalize in place. Zero-length vectors are left untouched.
pub fn normalize_in_place(v: &mut Vec3) {
    let len = v.length();
    if len != 0.0 {
        *v *= 1.0 / len;
    }
}

/// Per-vertex normals: every face adds its unnormalized normal to its three
/// corners, then each sum is normalized once.
///
/// Larger faces therefore weigh more. Vertices not referenced by any face
/// keep a zero normal.
pub fn create_normals(positions: &[f32], indices: &[u32]) -> Result<Vec<f32>> {
    let verts = vertices(positions)?;
    let tris = faces(indices)?;

    let mut out = vec![0.0f32; positions.len()];
    let normals = vertices_mut(&mut out)?;

    for &[a, b, c] in tris {
        let (a, b, c) = (a as usize, b as usize, c as usize);
        if a >= verts.len() || b >= verts.len() || c >= verts.len() {
            return Err(InversionError::Input(format!(
                "face ({a}, {b}, {c}) references a vertex beyond {}",
                verts.len()
            )));
        }
        let e1 = verts[a] - verts[b];
        let e2 = verts[c] - verts[b];
        let n = e2.cross(e1);
        normals[a] += n;
        normals[b] += n;
        normals[c] += n;
    }

    normals.iter_mut().for_each(normalize_in_place);
    Ok(out)
}

/// Ordered one-ring of every vertex of a closed triangle mesh.
///
/// Ring `i` lists the neighbors of vertex `i` so that every consecutive pair
/// `(ring[t], ring[t + 1])` closes a face `(i, ring[t], ring[t + 1])` with the
/// mesh winding. Closed fans repeat their first neighbor at the end.
pub fn vertex_rings(indices: &[u32], vertex_count: usize) -> Result<Vec<Vec<u32>>> {
    let tris = faces(indices)?;

    // Per-vertex map: next[j] = k for every face (i, j, k).
    let mut next: Vec<HashMap<u32, u32>> = vec![HashMap::new(); vertex_count];
    for &[a, b, c] in tris {
        for (i, j, k) in [(a, b, c), (b, c, a), (c, a, b)] {
            let slot = next.get_mut(i as usize).ok_or_else(|| {
                InversionError::Input(format!("face references vertex {i} beyond {vertex_count}"))
            })?;
            if slot.insert(j, k).is_some() {
                return Err(InversionError::Input(format!(
                    "vertex {i} has a non-manifold fan at neighbor {j}"
                )));
            }
        }
    }

    let mut rings = Vec::with_capacity(vertex_count);
    for (i, fan) in next.iter().enumerate() {
        let Some(&start) = fan.keys().min() else {
            rings.push(Vec::new());
            continue;
        };
        // Open fans start at the neighbor nobody points to.
        let targets: Vec<u32> = fan.values().copied().collect();
        let start = fan
            .keys()
            .copied()
            .filter(|j| !targets.contains(j))
            .min()
            .unwrap_or(start);

        let mut ring = Vec::with_capacity(fan.len() + 1);
        ring.push(start);
        let mut current = start;
        while let Some(&k) = fan.get(&current) {
            ring.push(k);
            if k == start || ring.len() > fan.len() + 1 {
                break;
            }
            current = k;
        }
        if ring.len() > fan.len() + 1 {
            return Err(InversionError::Input(format!(
                "vertex {i} has a fan that does not close"
            )));
        }
        rings.push(ring);
    }

    Ok(rings)
}
