use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::error::{InversionError, Result};
use crate::model::codec::Matrix;
use crate::model::N_MU;
use crate::types::AnthropometricParameters;

/// Complete a partially known parameter vector from the Gaussian prior.
///
/// When every slot is known and positive the values pass through untouched,
/// even outside `ranges`. Otherwise each known value inside its range is an
/// observation, and the rest are replaced by the conditional mean
/// `mu + cov[:, o] * cov[o, o]^-1 * (x_o - mu_o)`. Known values outside their
/// range are discarded.
pub fn condition(
    mu: &[f32],
    cov: &Matrix,
    ranges: &Matrix,
    params: &AnthropometricParameters,
) -> Result<[f32; N_MU]> {
    let values = params.as_array();

    if values.iter().all(|v| matches!(v, Some(x) if *x > 0.0)) {
        return Ok(values.map(|v| v.unwrap_or_default()));
    }

    let observed: Vec<(usize, f32)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| {
            let x = (*v)?;
            (x >= ranges.get(i, 0) && x <= ranges.get(i, 1)).then_some((i, x))
        })
        .collect();

    let mut out = [0.0f32; N_MU];
    out.copy_from_slice(&mu[..N_MU]);
    if observed.is_empty() {
        debug!("No usable measurements, returning prior mean");
        return Ok(out);
    }

    let n = observed.len();
    let sigma_oo = DMatrix::from_fn(n, n, |a, b| cov.get(observed[a].0, observed[b].0) as f64);
    let offsets = DVector::from_fn(n, |a, _| (observed[a].1 - mu[observed[a].0]) as f64);

    let weights = match sigma_oo.clone().cholesky() {
        Some(chol) => chol.solve(&offsets),
        None => sigma_oo.lu().solve(&offsets).ok_or_else(|| {
            InversionError::Regression("singular conditioning covariance".into())
        })?,
    };

    for (p, slot) in out.iter_mut().enumerate() {
        let shift: f64 = observed
            .iter()
            .zip(weights.iter())
            .map(|(&(o, _), w)| cov.get(p, o) as f64 * w)
            .sum();
        *slot += shift as f32;
    }
    for &(o, x) in &observed {
        out[o] = x;
    }

    if out.iter().any(|v| !v.is_finite()) {
        return Err(InversionError::Regression(
            "non-finite conditioned parameters".into(),
        ));
    }
    debug!(observed = n, ?out, "Conditioned parameters");
    Ok(out)
}
