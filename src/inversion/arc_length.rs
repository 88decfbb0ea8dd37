use glam::{DVec3, IVec2};
use nalgebra::{Matrix3, SymmetricEigen};
use tracing::debug;

use crate::error::ArcLengthError;
use crate::geometry::{closed_perimeter, convex_hull};
use crate::model::{BodyParts, N_VERTS_INV, N_VERTS_INV_3};

/// Side of the square raster limb sections are drawn into.
const RASTER: f64 = 480.0;
/// Empty margin on the low side of the raster.
const BORDER: f64 = 20.0;
const SPAN: f64 = RASTER - BORDER;

fn point(vertices: &[f32], id: u32) -> DVec3 {
    let i = 3 * id as usize;
    DVec3::new(
        vertices[i] as f64,
        vertices[i + 1] as f64,
        vertices[i + 2] as f64,
    )
}

/// Principal axes of the points, ordered by decreasing variance.
fn principal_axes(points: &[DVec3]) -> Result<[DVec3; 3], ArcLengthError> {
    let n = points.len() as f64;
    let mean = points.iter().copied().sum::<DVec3>() / n;
    let mut cov = Matrix3::<f64>::zeros();
    for p in points {
        let d = *p - mean;
        let d = nalgebra::Vector3::new(d.x, d.y, d.z);
        cov += d * d.transpose();
    }
    cov /= n;
    if cov.iter().any(|v| !v.is_finite()) {
        return Err(ArcLengthError::Numeric("non-finite vertices".into()));
    }

    let eigen = SymmetricEigen::new(cov);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));
    Ok(order.map(|k| {
        let c = eigen.eigenvectors.column(k);
        DVec3::new(c[0], c[1], c[2])
    }))
}

/// Circumference (cm) of one limb section in the plane spanned by `u`, `v`.
fn section_length(
    vertices: &[f32],
    ids: &[u32],
    u: DVec3,
    v: DVec3,
) -> Result<f32, ArcLengthError> {
    let projected: Vec<(f64, f64)> = ids
        .iter()
        .map(|&id| {
            let p = point(vertices, id);
            (u.dot(p), v.dot(p))
        })
        .collect();

    let (min_d, max_d) = projected
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(a, b)| {
            (lo.min(a).min(b), hi.max(a).max(b))
        });
    let range = max_d - min_d;
    if !range.is_finite() || range <= 0.0 {
        return Err(ArcLengthError::Numeric("degenerate projection".into()));
    }

    let pixels: Vec<IVec2> = projected
        .iter()
        .map(|&(a, b)| {
            let px = ((a - min_d) / range * SPAN + BORDER) as f32;
            let py = ((b - min_d) / range * SPAN + BORDER) as f32;
            IVec2::new(px as i32, py as i32)
        })
        .collect();

    let hull = convex_hull(&pixels);
    let scale = range / SPAN;
    Ok((100.0 * scale * closed_perimeter(&hull)) as f32)
}

/// Calf, thigh and upper-arm circumferences in centimeters.
///
/// The three limb sections are projected onto the cross-section plane of
/// the leg (the two minor principal axes of thigh and calf together),
/// rasterized into a 480 px square, and measured along their convex hull.
/// `theta_ra` and `theta_rl` are the right arm and leg pose angles the mesh
/// was generated with; they are recorded but do not change the result.
pub fn arc_length(
    vertices: &[f32],
    parts: &BodyParts,
    theta_ra: f32,
    theta_rl: f32,
) -> Result<[f32; 3], ArcLengthError> {
    if vertices.len() != N_VERTS_INV_3 {
        return Err(ArcLengthError::BufferSize);
    }
    let sections = [&parts.calf, &parts.thigh, &parts.upper_arm];
    if sections.iter().any(|ids| ids.is_empty()) {
        return Err(ArcLengthError::MissingPart);
    }
    if sections
        .iter()
        .flat_map(|ids| ids.iter())
        .any(|&id| id as usize >= N_VERTS_INV)
    {
        return Err(ArcLengthError::Numeric("part vertex out of range".into()));
    }

    let leg: Vec<DVec3> = parts
        .thigh
        .iter()
        .chain(&parts.calf)
        .map(|&id| point(vertices, id))
        .collect();
    let [_, u, v] = principal_axes(&leg)?;

    let mut lengths = [0.0f32; 3];
    for (slot, ids) in lengths.iter_mut().zip(sections) {
        *slot = section_length(vertices, ids, u, v)?;
    }

    debug!(theta_ra, theta_rl, ?lengths, "Limb circumferences");
    if lengths[1] <= 0.0 || lengths[1] > 100.0 {
        return Err(ArcLengthError::ThighOutOfRange);
    }
    Ok(lengths)
}
