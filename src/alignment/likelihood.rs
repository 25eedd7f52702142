//! Pairwise Gaussian log-likelihood matrix fed to the search.
//!
//! `L[i][j]` is the log-density of flow output frame `j` under the diagonal
//! Gaussian predicted for source unit `i`, summed over channels.

use crate::error::AlignmentError;
use crate::types::LikelihoodMatrix;

pub(crate) const HALF_LN_2PI: f64 = 0.918_938_533_204_672_8;

/// Builds the `(Tx, Ty)` likelihood from channel-major parameters.
///
/// `means` and `log_scales` are `(C, Tx)`, `frames` is `(C, Ty)`.
pub fn gaussian_log_likelihood(
    means: &[Vec<f32>],
    log_scales: &[Vec<f32>],
    frames: &[Vec<f32>],
) -> Result<LikelihoodMatrix, AlignmentError> {
    let channels = means.len();
    if log_scales.len() != channels || frames.len() != channels {
        return Err(AlignmentError::shape_mismatch(
            "gaussian likelihood channels",
            channels,
            format!("{} log-scales, {} frame channels", log_scales.len(), frames.len()),
        ));
    }
    if channels == 0 {
        return Err(AlignmentError::invalid_input(
            "gaussian likelihood needs at least one channel",
        ));
    }
    let x_len = means[0].len();
    let y_len = frames[0].len();
    for c in 0..channels {
        if means[c].len() != x_len || log_scales[c].len() != x_len {
            return Err(AlignmentError::shape_mismatch(
                "gaussian likelihood source length",
                x_len,
                format!("{}/{} in channel {c}", means[c].len(), log_scales[c].len()),
            ));
        }
        if frames[c].len() != y_len {
            return Err(AlignmentError::shape_mismatch(
                "gaussian likelihood frame length",
                y_len,
                format!("{} in channel {c}", frames[c].len()),
            ));
        }
    }

    let mut data = Vec::with_capacity(x_len * y_len);
    let mut inv_var = vec![0.0f64; channels];
    for i in 0..x_len {
        let mut constant = 0.0f64;
        for c in 0..channels {
            let log_scale = f64::from(log_scales[c][i]);
            inv_var[c] = (-2.0 * log_scale).exp();
            constant += -HALF_LN_2PI - log_scale;
        }
        for j in 0..y_len {
            let mut quad = 0.0f64;
            for c in 0..channels {
                let diff = f64::from(frames[c][j]) - f64::from(means[c][i]);
                quad += diff * diff * inv_var[c];
            }
            data.push((constant - 0.5 * quad) as f32);
        }
    }

    LikelihoodMatrix::new(x_len, y_len, data)
}
