pub mod arc_length;
pub mod average;
pub mod laplacian;
pub mod obj;
pub mod ransac;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::InversionConfig;
use crate::error::{ArcLengthError, InversionError, Result};
use crate::model::{ModelStore, N_MU, N_VERTS_INV_3};
use crate::regression::PredMesh;
use crate::types::{AnthropometricParameters, BodyMesh, Gender};

pub use average::{average, vector_mean, AverageReport, MeasurementSeries};
pub use laplacian::{relax_part, RelaxParams, RelaxStats};
pub use obj::OBJ_FAILURE_CODE;
pub use ransac::{RansacInputs, RansacSampler, RansacSamples};

/// Relaxed fine mesh with the measurements that produced it.
#[derive(Debug, Clone)]
pub struct InvertedBody {
    pub mesh: BodyMesh,
    pub parameters: [f32; N_MU],
}

/// Measurements to a relaxed fine body mesh.
///
/// Holds a shared model store, so clones are cheap and one engine can serve
/// many threads.
#[derive(Debug, Clone)]
pub struct Inversion {
    store: Arc<ModelStore>,
    config: InversionConfig,
}

impl Inversion {
    pub fn new(store: Arc<ModelStore>, config: InversionConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<ModelStore> {
        &self.store
    }

    pub fn config(&self) -> &InversionConfig {
        &self.config
    }

    /// Regress the fine mesh in the rest pose and relax its head region.
    ///
    /// On failure, [`InversionError::error_string`] gives the caller-facing
    /// message: empty for a regression failure, `"Failed in Laplace: ..."`
    /// for a relaxation failure.
    pub fn invert(&self, gender: Gender, params: &AnthropometricParameters) -> Result<Vec<f32>> {
        Ok(self.invert_body(gender, params)?.mesh.positions)
    }

    /// [`invert`](Self::invert) plus the fine-mesh faces.
    pub fn invert_mesh(&self, gender: Gender, params: &AnthropometricParameters) -> Result<BodyMesh> {
        Ok(self.invert_body(gender, params)?.mesh)
    }

    /// Full inversion result: the relaxed fine mesh and the completed
    /// measurements it was regressed from.
    pub fn invert_body(
        &self,
        gender: Gender,
        params: &AnthropometricParameters,
    ) -> Result<InvertedBody> {
        let bundle = self.store.bundle(gender)?;
        info!(%gender, known = params.known_count(), "Inverting measurements");

        let regressed = PredMesh::new(Arc::clone(&bundle)).run_inv(params, &[0.0; 4], &[0.0; 2])?;
        debug!(parameters = ?regressed.parameters, "Completed parameters");

        let mut vertices = regressed.vertices;
        relax_part(
            &mut vertices,
            &bundle.verts_inv,
            &bundle.rings,
            &self.config.laplacian.params(gender),
        )?;

        if vertices.len() != N_VERTS_INV_3 {
            return Err(InversionError::Laplace(format!(
                "relaxed buffer has {} values",
                vertices.len()
            )));
        }
        Ok(InvertedBody {
            mesh: BodyMesh::new(vertices, bundle.faces_inv.clone()),
            parameters: regressed.parameters,
        })
    }

    /// Invert and render as OBJ lines ending in `delimiter`.
    ///
    /// Callers on the wire report every failure as [`OBJ_FAILURE_CODE`];
    /// see [`obj_wire`].
    pub fn invert_obj(
        &self,
        gender: Gender,
        params: &AnthropometricParameters,
        delimiter: &str,
    ) -> Result<Vec<String>> {
        self.invert_mesh(gender, params)?.to_obj_lines(delimiter, false)
    }

    /// Calf, thigh and upper-arm circumferences of a fine mesh.
    pub fn arc_length(
        &self,
        gender: Gender,
        vertices: &[f32],
        theta_ra: f32,
        theta_rl: f32,
    ) -> std::result::Result<[f32; 3], ArcLengthError> {
        let bundle = self
            .store
            .bundle(gender)
            .map_err(|e| ArcLengthError::Numeric(e.to_string()))?;
        arc_length::arc_length(vertices, &bundle.parts, theta_ra, theta_rl)
    }
}

/// Build a store from injected blobs and invert to OBJ lines.
///
/// Both maps use bare blob names and must include the shared body-part blobs.
pub fn invert_obj_from_models<B: AsRef<[u8]>>(
    gender: Gender,
    params: &AnthropometricParameters,
    male_blobs: &HashMap<String, B>,
    female_blobs: &HashMap<String, B>,
    config: InversionConfig,
    delimiter: &str,
) -> Result<Vec<String>> {
    let store = ModelStore::from_blobs(male_blobs, female_blobs)?;
    Inversion::new(Arc::new(store), config).invert_obj(gender, params, delimiter)
}

/// Split an OBJ result into the lines and the error code reported with them.
pub fn obj_wire(result: Result<Vec<String>>) -> (Vec<String>, &'static str) {
    match result {
        Ok(lines) => (lines, ""),
        Err(e) => {
            warn!(%e, "OBJ inversion failed");
            (Vec::new(), OBJ_FAILURE_CODE)
        }
    }
}
