pub mod conditioning;
pub mod skinning;

use std::sync::Arc;

use glam::Vec3;
use tracing::{debug, info};

use crate::error::{InversionError, Result};
use crate::geometry;
use crate::model::codec::Matrix;
use crate::model::{StatisticalModelBundle, N_MU};
use crate::types::{AnthropometricParameters, Gender};

/// Status reported by the raw regression entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegressionStatus {
    Passed,
    Failed,
}

impl RegressionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegressionStatus::Passed => "Passed",
            RegressionStatus::Failed => "11",
        }
    }
}

impl<T> From<&Result<T>> for RegressionStatus {
    fn from(r: &Result<T>) -> Self {
        if r.is_ok() {
            RegressionStatus::Passed
        } else {
            RegressionStatus::Failed
        }
    }
}

impl std::fmt::Display for RegressionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mesh resolution a regression runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// 1,002-vertex mesh.
    Coarse,
    /// 10,777-vertex mesh.
    Fine,
}

/// Output of a regression: flat xyz vertices plus the completed parameters.
#[derive(Debug, Clone)]
pub struct RegressedMesh {
    pub vertices: Vec<f32>,
    pub parameters: [f32; N_MU],
}

impl RegressedMesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }
}

/// Linear shape regression over one gender's statistical model.
#[derive(Debug, Clone)]
pub struct PredMesh {
    bundle: Arc<StatisticalModelBundle>,
}

impl PredMesh {
    pub fn new(bundle: Arc<StatisticalModelBundle>) -> Self {
        Self { bundle }
    }

    pub fn gender(&self) -> Gender {
        self.bundle.gender
    }

    pub fn bundle(&self) -> &StatisticalModelBundle {
        &self.bundle
    }

    /// Fill the unknown measurements from the prior.
    pub fn predict_parameters(&self, params: &AnthropometricParameters) -> Result<[f32; N_MU]> {
        let b = &self.bundle;
        conditioning::condition(&b.mu, &b.cov, &b.ranges, params)
    }

    /// Regress the 10,777-vertex mesh.
    ///
    /// `pose` holds right arm, left arm, right leg and left leg angles and
    /// `feet` the right and left foot angles, all in radians.
    pub fn run_inv(
        &self,
        params: &AnthropometricParameters,
        pose: &[f32],
        feet: &[f32],
    ) -> Result<RegressedMesh> {
        self.regress(Resolution::Fine, params, pose, feet)
    }

    /// Regress the 1,002-vertex mesh.
    pub fn run(
        &self,
        params: &AnthropometricParameters,
        pose: &[f32],
        feet: &[f32],
    ) -> Result<RegressedMesh> {
        self.regress(Resolution::Coarse, params, pose, feet)
    }

    pub fn regress(
        &self,
        resolution: Resolution,
        params: &AnthropometricParameters,
        pose: &[f32],
        feet: &[f32],
    ) -> Result<RegressedMesh> {
        let pose: [f32; 4] = pose.try_into().map_err(|_| {
            InversionError::Regression(format!("expected 4 pose angles, got {}", pose.len()))
        })?;
        let feet: [f32; 2] = feet.try_into().map_err(|_| {
            InversionError::Regression(format!("expected 2 foot angles, got {}", feet.len()))
        })?;

        let b = &self.bundle;
        let (template, basis, weights) = match resolution {
            Resolution::Fine => (&b.verts_inv, &b.sv_inv, &b.bone_weights_inv),
            Resolution::Coarse => (&b.avg_verts, &b.sv, &b.bone_weights),
        };

        let parameters = self.predict_parameters(params)?;
        let coeffs: [f32; N_MU] = std::array::from_fn(|p| parameters[p] - b.mu[p]);
        debug!(gender = %b.gender, ?resolution, ?coeffs, "Shape coefficients");

        let mut vertices = if skinning::needs_pose(&pose, &feet) {
            let posed = skinning::deform(
                geometry::vertices(template)?,
                &b.joints,
                weights,
                &pose,
                &feet,
            );
            bytemuck::cast_slice::<Vec3, f32>(&posed).to_vec()
        } else {
            template.clone()
        };

        add_basis(&mut vertices, basis, &coeffs)?;

        if vertices.len() != template.len() {
            return Err(InversionError::Regression(format!(
                "regressed buffer has {} values, expected {}",
                vertices.len(),
                template.len()
            )));
        }
        if vertices.iter().any(|v| !v.is_finite()) {
            return Err(InversionError::Regression("non-finite vertex".into()));
        }

        info!(
            gender = %b.gender,
            vertices = vertices.len() / 3,
            "Regression complete"
        );
        Ok(RegressedMesh {
            vertices,
            parameters,
        })
    }
}

/// `vertices += basis * coeffs`, one basis row per coordinate.
fn add_basis(vertices: &mut [f32], basis: &Matrix, coeffs: &[f32; N_MU]) -> Result<()> {
    if basis.rows != vertices.len() || basis.cols != N_MU {
        return Err(InversionError::Regression(format!(
            "shape basis is {}x{}, expected {}x{N_MU}",
            basis.rows,
            basis.cols,
            vertices.len()
        )));
    }
    for (r, v) in vertices.iter_mut().enumerate() {
        *v += basis
            .row(r)
            .iter()
            .zip(coeffs)
            .map(|(s, c)| s * c)
            .sum::<f32>();
    }
    Ok(())
}
