use crate::error::AlignmentError;
use crate::types::AlignmentPath;

/// Projects channel-major per-unit parameters `(C, Tx)` onto frames `(C, Ty)`
/// through `path`, i.e. `params @ path`.
///
/// Used to expand prior means and log-scales to frame granularity.
pub fn project(
    path: &AlignmentPath,
    params: &[Vec<f32>],
) -> Result<Vec<Vec<f32>>, AlignmentError> {
    let rows = path.rows();
    let cols = path.cols();
    if let Some((c, channel)) = params.iter().enumerate().find(|(_, ch)| ch.len() != rows) {
        return Err(AlignmentError::shape_mismatch(
            "projected parameters",
            format!("{rows} source units"),
            format!("{} in channel {c}", channel.len()),
        ));
    }

    let mut out = vec![vec![0.0f32; cols]; params.len()];
    for i in 0..rows {
        for j in 0..cols {
            let weight = path.get(i, j);
            if weight == 0.0 {
                continue;
            }
            for (dst, src) in out.iter_mut().zip(params) {
                dst[j] += src[i] * weight;
            }
        }
    }
    Ok(out)
}
