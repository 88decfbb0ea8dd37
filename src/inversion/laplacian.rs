//! Anchored cotangent-Laplacian relaxation of the head region.
//!
//! The Laplacian is built on the template mesh restricted to the vertices at
//! or above a height bound, so the relaxed region keeps the template's local
//! detail while its position follows the regressed body through the anchors.

use std::collections::{BTreeMap, BTreeSet};

use glam::DVec3;
use nalgebra::DMatrix;
use tracing::{debug, info};

use crate::error::{InversionError, Result};
use crate::geometry;
use crate::model::VertexRings;

/// Parameters of one relaxation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelaxParams {
    /// Template height (m) from which vertices take part.
    pub bound: f32,
    /// Vertex whose relaxed height separates anchored from free vertices.
    pub ear_vertex: usize,
    /// Rows whose absolute weight sum exceeds this are rescaled down to it.
    pub row_sum_limit: f32,
}

/// How the normal equations were solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveMethod {
    Cholesky,
    Lu,
    /// Nothing to relax.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaxStats {
    pub rows: usize,
    pub columns: usize,
    pub anchors: usize,
    pub method: SolveMethod,
}

impl RelaxStats {
    fn skipped() -> Self {
        Self {
            rows: 0,
            columns: 0,
            anchors: 0,
            method: SolveMethod::Skipped,
        }
    }
}

/// Cotangent of the angle between `u` and `v`, `None` when they are parallel.
fn cot(u: DVec3, v: DVec3) -> Option<f64> {
    let cross = u.cross(v).length();
    (cross > f64::EPSILON).then(|| u.dot(v) / cross)
}

/// Scale `row` so its absolute sum does not exceed `limit`.
pub fn rescale_row(row: &mut [f64], limit: f64) {
    let sum = row.iter().sum::<f64>().abs();
    if sum > limit {
        let s = limit / sum;
        row.iter_mut().for_each(|w| *w *= s);
    }
}

/// Dense cotangent Laplacian over the part of a mesh above a height bound.
#[derive(Debug, Clone)]
pub struct CotangentLaplacian {
    /// Vertex of each row.
    pub rows: Vec<u32>,
    /// Vertex of each column, ascending.
    pub columns: Vec<u32>,
    /// `rows x columns`; every row sums to zero.
    pub weights: DMatrix<f64>,
}

impl CotangentLaplacian {
    /// Build from the template mesh. Returns `None` when no ring triple lies
    /// entirely at or above `bound`.
    pub fn build(
        template: &[f32],
        rings: &VertexRings,
        bound: f32,
        row_sum_limit: f32,
    ) -> Result<Option<Self>> {
        let verts = geometry::vertices(template)?;
        if rings.len() != verts.len() {
            return Err(InversionError::Laplace(format!(
                "{} rings for {} vertices",
                rings.len(),
                verts.len()
            )));
        }
        let above = |v: u32| verts.get(v as usize).is_some_and(|p| p.y >= bound);

        let mut sparse_rows: Vec<(u32, BTreeMap<u32, f64>)> = Vec::new();
        for (i, ring) in rings.iter().enumerate() {
            let i = i as u32;
            if !above(i) {
                continue;
            }
            let vi = verts[i as usize].as_dvec3();
            let mut row = BTreeMap::new();
            let mut counted = false;

            for pair in ring.windows(2) {
                let (j, k) = (pair[0], pair[1]);
                if !above(j) || !above(k) {
                    continue;
                }
                counted = true;
                let vj = verts[j as usize].as_dvec3();
                let vk = verts[k as usize].as_dvec3();

                // Angle at k weighs edge i-j, angle at j weighs edge i-k.
                if let Some(c) = cot(vk - vi, vk - vj) {
                    *row.entry(j).or_insert(0.0) += c;
                }
                if let Some(c) = cot(vj - vi, vj - vk) {
                    *row.entry(k).or_insert(0.0) += c;
                }
            }
            if counted {
                sparse_rows.push((i, row));
            }
        }

        if sparse_rows.is_empty() {
            return Ok(None);
        }

        let columns: Vec<u32> = sparse_rows
            .iter()
            .flat_map(|(i, row)| std::iter::once(*i).chain(row.keys().copied()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let col_of: BTreeMap<u32, usize> =
            columns.iter().enumerate().map(|(c, &v)| (v, c)).collect();

        let mut weights = DMatrix::<f64>::zeros(sparse_rows.len(), columns.len());
        let mut dense = vec![0.0f64; columns.len()];
        for (r, (i, row)) in sparse_rows.iter().enumerate() {
            dense.iter_mut().for_each(|w| *w = 0.0);
            for (v, w) in row {
                dense[col_of[v]] = *w;
            }
            rescale_row(&mut dense, row_sum_limit as f64);
            let sum: f64 = dense.iter().sum();
            dense[col_of[i]] -= sum;
            for (c, w) in dense.iter().enumerate() {
                weights[(r, c)] = *w;
            }
        }

        Ok(Some(Self {
            rows: sparse_rows.into_iter().map(|(i, _)| i).collect(),
            columns,
            weights,
        }))
    }

    /// Column vertex positions of `positions` as a `columns x 3` matrix.
    pub fn gather(&self, positions: &[f32]) -> DMatrix<f64> {
        DMatrix::from_fn(self.columns.len(), 3, |c, k| {
            positions[3 * self.columns[c] as usize + k] as f64
        })
    }
}

/// Relax the region above `params.bound` of the regressed mesh `out` in place.
///
/// Differential coordinates come from the template, so the solution keeps the
/// template's local shape. Column vertices below the ear height or in front
/// (`z > 0`) are anchored to their regressed positions.
pub fn relax_part(
    out: &mut [f32],
    template: &[f32],
    rings: &VertexRings,
    params: &RelaxParams,
) -> Result<RelaxStats> {
    if out.len() != template.len() {
        return Err(InversionError::Laplace(format!(
            "mesh has {} values, template has {}",
            out.len(),
            template.len()
        )));
    }
    let ear_y = out.get(3 * params.ear_vertex + 1).copied().ok_or_else(|| {
        InversionError::Laplace(format!(
            "ear vertex {} outside the mesh",
            params.ear_vertex
        ))
    })?;

    let Some(lap) = CotangentLaplacian::build(template, rings, params.bound, params.row_sum_limit)?
    else {
        debug!(bound = params.bound, "No vertices above bound, skipping relaxation");
        return Ok(RelaxStats::skipped());
    };

    let delta = &lap.weights * lap.gather(template);

    let current = lap.gather(out);
    let anchors: Vec<usize> = (0..lap.columns.len())
        .filter(|&c| current[(c, 1)] < ear_y as f64 || current[(c, 2)] > 0.0)
        .collect();

    let lt = lap.weights.transpose();
    let mut system = &lt * &lap.weights;
    let mut rhs = &lt * &delta;
    for &c in &anchors {
        system[(c, c)] += 1.0;
        for k in 0..3 {
            rhs[(c, k)] += current[(c, k)];
        }
    }

    let (solution, method) = match system.clone().cholesky() {
        Some(chol) => (chol.solve(&rhs), SolveMethod::Cholesky),
        None => {
            debug!("Normal equations not positive definite, falling back to LU");
            let x = system
                .lu()
                .solve(&rhs)
                .ok_or_else(|| InversionError::Laplace("singular normal equations".into()))?;
            (x, SolveMethod::Lu)
        }
    };

    if solution.iter().any(|v| !v.is_finite()) {
        return Err(InversionError::Laplace("non-finite solution".into()));
    }

    for (c, &v) in lap.columns.iter().enumerate() {
        let base = 3 * v as usize;
        for k in 0..3 {
            out[base + k] = solution[(c, k)] as f32;
        }
    }

    let stats = RelaxStats {
        rows: lap.rows.len(),
        columns: lap.columns.len(),
        anchors: anchors.len(),
        method,
    };
    info!(
        rows = stats.rows,
        columns = stats.columns,
        anchors = stats.anchors,
        method = ?stats.method,
        "Laplacian relaxation complete"
    );
    Ok(stats)
}
