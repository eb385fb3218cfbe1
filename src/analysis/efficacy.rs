//! Offline aggregate statistics over trained parameters
//!
//! Post-synaptic aggregates answer "what plasticity does a unit *receive*",
//! as opposed to the per-presynaptic-unit parameters the cell trains. They
//! are computed on host-side matrices exported from a trained cell and are
//! not part of the recurrence.

use crate::error::{CbrnnError, CbrnnResult};
use ndarray::{Array1, Array2};

/// Denominator magnitudes below this are treated as zero.
const NORMALIZATION_EPS: f32 = 1e-8;

/// Aggregates a per-presynaptic-unit quantity onto each postsynaptic unit,
/// weighted by incoming synaptic magnitude:
///
/// `out[post] = Σ_pre |W[pre, post]| · q[pre] / Σ_pre |W[pre, post]|`
///
/// The weight is laid out `[pre, post]` like everywhere else in the crate.
/// A unit whose incoming-magnitude sum is below the epsilon has no defined
/// aggregate and reports `NaN` instead of raising a division error.
pub fn postsynaptic_efficacy(
    weight: &Array2<f32>,
    per_unit: &Array1<f32>,
) -> CbrnnResult<Array1<f32>> {
    let (pre, post) = weight.dim();
    if per_unit.len() != pre {
        return Err(CbrnnError::ShapeMismatch(format!(
            "weight has {} presynaptic rows but the per-unit quantity has {} entries",
            pre,
            per_unit.len()
        )));
    }

    let mut out = Array1::zeros(post);
    for j in 0..post {
        let mut numerator = 0.0f32;
        let mut denominator = 0.0f32;
        for i in 0..pre {
            let magnitude = weight[[i, j]].abs();
            numerator += magnitude * per_unit[i];
            denominator += magnitude;
        }
        out[j] = if denominator < NORMALIZATION_EPS {
            f32::NAN
        } else {
            numerator / denominator
        };
    }
    Ok(out)
}
