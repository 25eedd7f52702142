use crate::error::AlignmentError;
use crate::types::{ValidExtent, ValidityMask};

/// `[true; length]` followed by `false` up to `max_len`.
pub fn sequence_mask(length: usize, max_len: usize) -> Vec<bool> {
    (0..max_len).map(|t| t < length).collect()
}

/// Per-element sequence masks padded to the longest length (or `max_len`).
pub fn sequence_masks(lengths: &[usize], max_len: Option<usize>) -> Vec<Vec<bool>> {
    let max_len = max_len.unwrap_or_else(|| lengths.iter().copied().max().unwrap_or(0));
    lengths
        .iter()
        .map(|&length| sequence_mask(length, max_len))
        .collect()
}

/// Pairs source and target lengths into per-element extents.
pub fn extents_from_lengths(
    x_lengths: &[usize],
    y_lengths: &[usize],
) -> Result<Vec<ValidExtent>, AlignmentError> {
    if x_lengths.len() != y_lengths.len() {
        return Err(AlignmentError::shape_mismatch(
            "length vectors",
            format!("{} target lengths", x_lengths.len()),
            y_lengths.len(),
        ));
    }
    Ok(x_lengths
        .iter()
        .zip(y_lengths)
        .map(|(&x_len, &y_len)| ValidExtent::new(x_len, y_len))
        .collect())
}

/// Outer-product path masks `x_mask ⊗ y_mask` for every batch element.
pub fn path_masks(
    x_lengths: &[usize],
    y_lengths: &[usize],
    rows: usize,
    cols: usize,
) -> Result<Vec<ValidityMask>, AlignmentError> {
    extents_from_lengths(x_lengths, y_lengths)?
        .into_iter()
        .map(|extent| ValidityMask::from_lengths(rows, cols, extent.x_len, extent.y_len))
        .collect()
}
