//! candle entry points for callers that keep their model state in tensors.
//!
//! Layouts follow the model code: parameters are channel-major `[B, C, T]`,
//! likelihoods and paths are `[B, Tx, Ty]`. Search runs on the host; results are
//! moved back to the input's device and dtype.

use candle_core::{DType, Device, Tensor};

use crate::alignment::expansion::expand_batch;
use crate::alignment::likelihood::HALF_LN_2PI;
use crate::alignment::mask::extents_from_lengths;
use crate::alignment::search::{search_batch, BatchSchedule};
use crate::error::AlignmentError;
use crate::types::{DurationVector, LikelihoodBatch};

fn candle_err(context: &'static str) -> impl Fn(candle_core::Error) -> AlignmentError {
    move |e| AlignmentError::runtime(context, e)
}

/// Batched search result; failed elements keep an all-zero path.
#[derive(Debug)]
pub struct TensorAlignment {
    /// `[B, Tx, Ty]` binary path.
    pub path: Tensor,
    /// `[B, Tx]` frames per source unit.
    pub durations: Tensor,
    pub failures: Vec<(usize, AlignmentError)>,
}

/// `[B, Tx, Ty]` Gaussian log-likelihood of `frames` under the per-unit priors.
///
/// Expanded into four terms so the quadratic part becomes two batched matmuls:
/// `Σ(-½ln2π - logs) + (-½z²)ᵀ·s + (m·s)ᵀ·z + Σ(-½m²·s)` with `s = e^{-2·logs}`.
pub fn log_likelihood(
    means: &Tensor,
    log_scales: &Tensor,
    frames: &Tensor,
) -> Result<Tensor, AlignmentError> {
    let (b, c, tx) = means.dims3().map_err(candle_err("means dims3"))?;
    let logs_dims = log_scales.dims3().map_err(candle_err("log-scales dims3"))?;
    if logs_dims != (b, c, tx) {
        return Err(AlignmentError::shape_mismatch(
            "prior log-scales",
            format!("({b}, {c}, {tx})"),
            format!("{logs_dims:?}"),
        ));
    }
    let (fb, fc, _) = frames.dims3().map_err(candle_err("frames dims3"))?;
    if (fb, fc) != (b, c) {
        return Err(AlignmentError::shape_mismatch(
            "flow frames",
            format!("({b}, {c}, _)"),
            format!("({fb}, {fc}, _)"),
        ));
    }

    let err = candle_err("gaussian log-likelihood");
    let frames = frames.contiguous().map_err(&err)?;
    let inv_var = log_scales.affine(-2.0, 0.0).and_then(|t| t.exp()).map_err(&err)?;
    let constant = log_scales
        .affine(-1.0, -HALF_LN_2PI)
        .and_then(|t| t.sum_keepdim(1))
        .and_then(|t| t.transpose(1, 2))
        .map_err(&err)?;
    let quad_frames = frames
        .sqr()
        .and_then(|t| t.affine(-0.5, 0.0))
        .and_then(|t| t.contiguous())
        .map_err(&err)?;
    let quad = inv_var
        .transpose(1, 2)
        .and_then(|t| t.contiguous())
        .and_then(|t| t.matmul(&quad_frames))
        .map_err(&err)?;
    let cross = means
        .mul(&inv_var)
        .and_then(|t| t.transpose(1, 2))
        .and_then(|t| t.contiguous())
        .and_then(|t| t.matmul(&frames))
        .map_err(&err)?;
    let mean_sq = means
        .sqr()
        .and_then(|t| t.mul(&inv_var))
        .and_then(|t| t.affine(-0.5, 0.0))
        .and_then(|t| t.sum_keepdim(1))
        .and_then(|t| t.transpose(1, 2))
        .map_err(&err)?;

    quad.add(&cross)
        .and_then(|t| t.broadcast_add(&constant))
        .and_then(|t| t.broadcast_add(&mean_sq))
        .map_err(err)
}

/// `[B, max_len]` mask with ones inside each length, in `dtype`.
pub fn sequence_mask(
    lengths: &[usize],
    max_len: Option<usize>,
    dtype: DType,
    device: &Device,
) -> Result<Tensor, AlignmentError> {
    let masks = crate::alignment::mask::sequence_masks(lengths, max_len);
    let width = masks.first().map_or(0, Vec::len);
    let data = masks
        .into_iter()
        .flatten()
        .map(|valid| if valid { 1.0f32 } else { 0.0 })
        .collect::<Vec<_>>();
    Tensor::from_vec(data, (lengths.len(), width), device)
        .and_then(|t| t.to_dtype(dtype))
        .map_err(candle_err("sequence mask"))
}

/// Searches a `[B, Tx, Ty]` likelihood tensor with per-element lengths.
pub fn maximum_path(
    likelihood: &Tensor,
    x_lengths: &[usize],
    y_lengths: &[usize],
    schedule: BatchSchedule,
) -> Result<TensorAlignment, AlignmentError> {
    let (b, tx, ty) = likelihood.dims3().map_err(candle_err("likelihood dims3"))?;
    let data = likelihood
        .to_dtype(DType::F32)
        .and_then(|t| t.flatten_all())
        .and_then(|t| t.to_vec1::<f32>())
        .map_err(candle_err("likelihood to host"))?;
    let batch = LikelihoodBatch::new(b, tx, ty, data)?;
    let extents = extents_from_lengths(x_lengths, y_lengths)?;
    let alignment = search_batch(&batch, &extents, schedule)?;

    let mut path_data = vec![0.0f32; b * tx * ty];
    let mut failures = Vec::new();
    for (element, result) in alignment.into_results().into_iter().enumerate() {
        match result {
            Ok(path) => path_data[element * tx * ty..(element + 1) * tx * ty]
                .copy_from_slice(path.as_slice()),
            Err(err) => failures.push((element, err)),
        }
    }
    if !failures.is_empty() {
        tracing::warn!(
            failed = failures.len(),
            batch_size = b,
            "maximum path: failed elements left as zero paths"
        );
    }

    let path = Tensor::from_vec(path_data, (b, tx, ty), likelihood.device())
        .and_then(|t| t.to_dtype(likelihood.dtype()))
        .map_err(candle_err("path tensor"))?;
    let durations = path.sum(2).map_err(candle_err("path durations"))?;
    Ok(TensorAlignment {
        path,
        durations,
        failures,
    })
}

/// `[B, rows, cols]` closed-form paths for known durations; `cols` defaults to
/// the longest total duration.
pub fn generate_path(
    durations: &[DurationVector],
    rows: usize,
    cols: Option<usize>,
    device: &Device,
) -> Result<Tensor, AlignmentError> {
    let paths = expand_batch(durations, rows, cols)?;
    let cols = paths.first().map_or(cols.unwrap_or(0), |p| p.cols());
    let data = paths
        .iter()
        .flat_map(|p| p.as_slice().iter().copied())
        .collect::<Vec<_>>();
    Tensor::from_vec(data, (durations.len(), rows, cols), device)
        .map_err(candle_err("generate path"))
}

/// `[B, C, Tx] @ [B, Tx, Ty] -> [B, C, Ty]`: per-unit parameters onto frames.
pub fn expand_parameters(params: &Tensor, path: &Tensor) -> Result<Tensor, AlignmentError> {
    let path = path
        .to_dtype(params.dtype())
        .and_then(|t| t.contiguous())
        .map_err(candle_err("expand parameters"))?;
    params
        .contiguous()
        .and_then(|t| t.matmul(&path))
        .map_err(candle_err("expand parameters"))
}
