//! Procedural stand-in for a trained body model.
//!
//! The body is a closed capsule of exactly the sizes the trained models use
//! (10,777 / 21,550 on the fine mesh, 1,002 / 2,000 on the coarse one), with
//! a shape basis whose columns act on the regions a real basis would: height
//! stretches, weight inflates, the circumferences bulge their bands. It lets
//! the demo mode, the benchmarks and the tests run without model files.

use std::collections::HashMap;
use std::f32::consts::PI;

use super::codec::Matrix;
use super::{
    BodyParts, StatisticalModelBundle, VertexRings, N_BONES, N_FACES, N_FACES_INV, N_JOINTS,
    N_MU, N_VERTS, N_VERTS_INV,
};
use crate::error::{InversionError, Result};
use crate::geometry;
use crate::types::Gender;

/// Segments around every ring.
pub const SEGMENTS: usize = 25;
/// Rings of the fine mesh: `2 + 431 * 25 = 10777` vertices.
pub const FINE_RINGS: usize = 431;
/// Rings of the coarse mesh: `2 + 40 * 25 = 1002` vertices.
pub const COARSE_RINGS: usize = 40;

const BASE_RADIUS: f32 = 0.08;

/// Ring parameter (fraction of the height) of each measured limb band.
const CALF_T: f32 = 0.20;
const THIGH_T: f32 = 0.35;
const UPPER_ARM_T: f32 = 0.75;

const CHEST_T: f32 = 0.72;
const WAIST_T: f32 = 0.60;
const HIP_T: f32 = 0.50;
const CROTCH_T: f32 = 0.45;

/// Parameter standard deviations: height, weight, chest, waist, hip, inseam, fitness.
const SIGMA: [f32; N_MU] = [7.0, 10.0, 8.0, 9.0, 7.0, 4.0, 0.2];

const RANGES: [[f32; 2]; N_MU] = [
    [120.0, 220.0],
    [30.0, 200.0],
    [60.0, 150.0],
    [50.0, 150.0],
    [60.0, 160.0],
    [50.0, 110.0],
    [0.0, 1.0],
];

/// Closed capsule mesh along +y.
///
/// Vertex 0 is the bottom pole, ring `r` segment `s` is `1 + r * SEGMENTS + s`
/// and the last vertex is the top pole. Triangles wind counter-clockwise seen
/// from outside.
#[derive(Debug, Clone)]
pub struct Capsule {
    pub positions: Vec<f32>,
    pub indices: Vec<u32>,
    pub rings: usize,
    pub height: f32,
}

impl Capsule {
    pub fn new(rings: usize, height: f32) -> Self {
        let s = SEGMENTS;
        let vertex_count = 2 + rings * s;
        let mut positions = Vec::with_capacity(3 * vertex_count);

        positions.extend_from_slice(&[0.0, 0.0, 0.0]);
        for r in 0..rings {
            let t = (r + 1) as f32 / (rings + 1) as f32;
            let rho = BASE_RADIUS * (PI * t).sin().powf(0.25);
            for seg in 0..s {
                let phi = 2.0 * PI * seg as f32 / s as f32;
                positions.extend_from_slice(&[rho * phi.cos(), height * t, rho * phi.sin()]);
            }
        }
        positions.extend_from_slice(&[0.0, height, 0.0]);

        let at = |r: usize, seg: usize| (1 + r * s + seg % s) as u32;
        let bottom = 0u32;
        let top = (vertex_count - 1) as u32;

        let mut indices = Vec::with_capacity(6 * rings * s);
        for seg in 0..s {
            indices.extend_from_slice(&[bottom, at(0, seg), at(0, seg + 1)]);
        }
        for r in 0..rings.saturating_sub(1) {
            for seg in 0..s {
                let a = at(r, seg);
                let b = at(r, seg + 1);
                let c = at(r + 1, seg + 1);
                let d = at(r + 1, seg);
                indices.extend_from_slice(&[a, d, b, b, d, c]);
            }
        }
        for seg in 0..s {
            indices.extend_from_slice(&[top, at(rings - 1, seg + 1), at(rings - 1, seg)]);
        }

        Self {
            positions,
            indices,
            rings,
            height,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Vertex ids of the three rings centered on height fraction `t`.
    pub fn band(&self, t: f32) -> Vec<u32> {
        let center = ((t * (self.rings + 1) as f32).round() as usize)
            .saturating_sub(1)
            .clamp(1, self.rings - 2);
        (center - 1..=center + 1)
            .flat_map(|r| (0..SEGMENTS).map(move |seg| (1 + r * SEGMENTS + seg) as u32))
            .collect()
    }
}

/// Builder for a synthetic per-gender model bundle.
#[derive(Debug, Clone)]
pub struct SyntheticBody {
    gender: Gender,
    height: f32,
    mu: [f32; N_MU],
}

impl SyntheticBody {
    pub fn new(gender: Gender) -> Self {
        match gender {
            Gender::Male => Self {
                gender,
                height: 1.60,
                mu: [175.0, 78.0, 100.0, 88.0, 100.0, 80.0, 0.5],
            },
            Gender::Female => Self {
                gender,
                height: 1.52,
                mu: [162.0, 65.0, 92.0, 78.0, 100.0, 75.0, 0.5],
            },
        }
    }

    /// Template height in meters.
    pub fn with_height(mut self, height: f32) -> Self {
        self.height = height;
        self
    }

    pub fn with_mean(mut self, mu: [f32; N_MU]) -> Self {
        self.mu = mu;
        self
    }

    pub fn bundle(&self) -> Result<StatisticalModelBundle> {
        let fine = Capsule::new(FINE_RINGS, self.height);
        let coarse = Capsule::new(COARSE_RINGS, self.height);
        debug_assert_eq!(fine.vertex_count(), N_VERTS_INV);
        debug_assert_eq!(coarse.vertex_count(), N_VERTS);
        debug_assert_eq!(fine.indices.len(), 3 * N_FACES_INV);
        debug_assert_eq!(coarse.indices.len(), 3 * N_FACES);

        let rings = geometry::vertex_rings(&fine.indices, fine.vertex_count())?;
        if rings.iter().any(|r| r.len() < 4) {
            return Err(InversionError::ModelLoad(
                "synthetic mesh has an open fan".into(),
            ));
        }

        let mut ranges = Matrix::zeros(N_MU, 2);
        for (p, [lo, hi]) in RANGES.iter().enumerate() {
            ranges.set(p, 0, *lo);
            ranges.set(p, 1, *hi);
        }

        Ok(StatisticalModelBundle {
            gender: self.gender,
            mu: self.mu.to_vec(),
            ranges,
            cov: covariance(),
            sv: self.shape_basis(&coarse),
            sv_inv: self.shape_basis(&fine),
            joints: self.joints(),
            bone_weights: bone_weights(&coarse),
            bone_weights_inv: bone_weights(&fine),
            rings: VertexRings::from_rings(&rings),
            parts: BodyParts {
                calf: fine.band(CALF_T),
                thigh: fine.band(THIGH_T),
                upper_arm: fine.band(UPPER_ARM_T),
            },
            avg_verts: coarse.positions,
            verts_inv: fine.positions,
            faces: coarse.indices,
            faces_inv: fine.indices,
        })
    }

    /// Encoded blobs under their bare names, as `ModelStore::load` takes them.
    pub fn blobs(&self) -> Result<HashMap<String, Vec<u8>>> {
        Ok(self.bundle()?.to_blobs())
    }

    /// One column per parameter, per unit of that parameter (cm, kg, score).
    fn shape_basis(&self, mesh: &Capsule) -> Matrix {
        let n = mesh.vertex_count();
        let mut sv = Matrix::zeros(3 * n, N_MU);
        let h = mesh.height;
        let cm = 0.01;

        for v in 0..n {
            let x = mesh.positions[3 * v];
            let y = mesh.positions[3 * v + 1];
            let z = mesh.positions[3 * v + 2];
            let t = y / h;
            let rho = (x * x + z * z).sqrt();
            let (ux, uz) = if rho > 0.0 { (x / rho, z / rho) } else { (0.0, 0.0) };
            let (rx, ry, rz) = (3 * v, 3 * v + 1, 3 * v + 2);

            // Height: uniform stretch along the axis.
            sv.set(ry, 0, y / self.mu[0]);

            // Weight: uniform inflation.
            sv.set(rx, 1, 0.004 * x);
            sv.set(rz, 1, 0.004 * z);

            // Circumferences: one centimeter of girth per unit in its band.
            for (col, center) in [(2, CHEST_T), (3, WAIST_T), (4, HIP_T)] {
                let dr = cm / (2.0 * PI) * band(t, center, 0.06);
                sv.set(rx, col, dr * ux);
                sv.set(rz, col, dr * uz);
            }

            // Inseam: stretch the legs, lift everything above them.
            let lift = if t < CROTCH_T { t / CROTCH_T } else { 1.0 };
            sv.set(ry, 5, cm * lift);

            // Fitness: slight slimming.
            sv.set(rx, 6, -0.002 * x);
            sv.set(rz, 6, -0.002 * z);
        }
        sv
    }

    fn joints(&self) -> Matrix {
        let mut skv = Matrix::zeros(N_JOINTS, 3);
        for j in 0..N_JOINTS {
            skv.set(j, 1, self.height * (j as f32 + 0.5) / N_JOINTS as f32);
        }
        skv
    }
}

fn band(t: f32, center: f32, width: f32) -> f32 {
    let d = (t - center) / width;
    (-d * d).exp()
}

fn covariance() -> Matrix {
    let mut cov = Matrix::zeros(N_MU, N_MU);
    for i in 0..N_MU {
        for j in 0..N_MU {
            let corr = if i == j { 1.0 } else { 0.4 };
            cov.set(i, j, corr * SIGMA[i] * SIGMA[j]);
        }
    }
    cov
}

/// Rigid skinning: every vertex follows the bone of its height band.
fn bone_weights(mesh: &Capsule) -> Matrix {
    let n = mesh.vertex_count();
    let mut w = Matrix::zeros(n, N_BONES);
    for v in 0..n {
        let t = mesh.positions[3 * v + 1] / mesh.height;
        let bone = ((t * N_BONES as f32) as usize).min(N_BONES - 1);
        w.set(v, bone, 1.0);
    }
    w
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EAR_VERTEX, N_VERTS_3, N_VERTS_INV_3};

    #[test]
    fn capsule_sizes_match_model_constants() {
        let fine = Capsule::new(FINE_RINGS, 1.6);
        assert_eq!(fine.vertex_count(), N_VERTS_INV);
        assert_eq!(fine.indices.len() / 3, N_FACES_INV);
        assert!(EAR_VERTEX < N_VERTS_INV);

        let coarse = Capsule::new(COARSE_RINGS, 1.6);
        assert_eq!(coarse.vertex_count(), N_VERTS);
        assert_eq!(coarse.indices.len() / 3, N_FACES);
    }

    #[test]
    fn capsule_is_closed_and_outward() {
        let mesh = Capsule::new(10, 1.0);
        let rings = geometry::vertex_rings(&mesh.indices, mesh.vertex_count()).unwrap();
        for ring in &rings {
            assert_eq!(ring.first(), ring.last());
        }

        let normals = geometry::create_normals(&mesh.positions, &mesh.indices).unwrap();
        let p = geometry::vertices(&mesh.positions).unwrap();
        let n = geometry::vertices(&normals).unwrap();
        let center = glam::Vec3::new(0.0, 0.5, 0.0);
        for (p, n) in p.iter().zip(n) {
            assert!((*p - center).dot(*n) > 0.0);
        }
    }

    #[test]
    fn bundle_has_model_shapes() {
        let b = SyntheticBody::new(Gender::Male).bundle().unwrap();
        assert_eq!(b.verts_inv.len(), N_VERTS_INV_3);
        assert_eq!(b.avg_verts.len(), N_VERTS_3);
        assert_eq!(b.sv_inv.shape(), (N_VERTS_INV_3, N_MU));
        assert_eq!(b.bone_weights_inv.shape(), (N_VERTS_INV, N_BONES));
        assert_eq!(b.rings.len(), N_VERTS_INV);
        assert_eq!(b.parts.thigh.len(), 3 * SEGMENTS);
        for row in 0..N_VERTS_INV {
            let sum: f32 = b.bone_weights_inv.row(row).iter().sum();
            assert!((sum - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn builder_overrides_height_and_mean() {
        let mu = [190.0, 90.0, 105.0, 92.0, 104.0, 88.0, 0.6];
        let tall = SyntheticBody::new(Gender::Male)
            .with_height(1.9)
            .with_mean(mu)
            .bundle()
            .unwrap();
        let base = SyntheticBody::new(Gender::Male).bundle().unwrap();

        assert_eq!(tall.mu, mu.to_vec());
        let top = |v: &[f32]| v.chunks_exact(3).map(|p| p[1]).fold(f32::MIN, f32::max);
        assert!(top(&tall.verts_inv) > top(&base.verts_inv));
        assert!(top(&tall.avg_verts) > top(&base.avg_verts));
        assert_eq!(tall.faces_inv, base.faces_inv);
    }

    #[test]
    fn covariance_is_symmetric_positive() {
        let cov = covariance();
        for i in 0..N_MU {
            assert!(cov.get(i, i) > 0.0);
            for j in 0..N_MU {
                assert_eq!(cov.get(i, j), cov.get(j, i));
            }
        }
        let m = nalgebra::DMatrix::from_fn(N_MU, N_MU, |i, j| cov.get(i, j) as f64);
        assert!(m.cholesky().is_some());
    }

    #[test]
    fn bands_sit_at_their_heights() {
        let mesh = Capsule::new(FINE_RINGS, 1.6);
        let thigh = mesh.band(THIGH_T);
        for &v in &thigh {
            let t = mesh.positions[3 * v as usize + 1] / 1.6;
            assert!((t - THIGH_T).abs() < 0.01);
        }
    }
}
