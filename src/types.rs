use crate::error::AlignmentError;

/// Number of valid (unpadded) source units and target frames of one batch element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidExtent {
    pub x_len: usize,
    pub y_len: usize,
}

impl ValidExtent {
    pub fn new(x_len: usize, y_len: usize) -> Self {
        Self { x_len, y_len }
    }

    pub fn cells(&self) -> usize {
        self.x_len * self.y_len
    }

    pub(crate) fn check_within(&self, rows: usize, cols: usize) -> Result<(), AlignmentError> {
        if self.x_len > rows || self.y_len > cols {
            return Err(AlignmentError::shape_mismatch(
                "valid extent",
                format!("at most ({rows}, {cols})"),
                format!("({}, {})", self.x_len, self.y_len),
            ));
        }
        Ok(())
    }
}

/// Pairwise log-likelihoods of one batch element, row-major `(Tx, Ty)`.
///
/// Row `i` is a source unit, column `j` a target frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LikelihoodMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl LikelihoodMatrix {
    pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self, AlignmentError> {
        if data.len() != rows * cols {
            return Err(AlignmentError::shape_mismatch(
                "likelihood matrix",
                format!("{} values for ({rows}, {cols})", rows * cols),
                data.len(),
            ));
        }
        Ok(Self { rows, cols, data })
    }

    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self, AlignmentError> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n_cols {
                return Err(AlignmentError::shape_mismatch(
                    "likelihood matrix row",
                    n_cols,
                    format!("{} in row {i}", row.len()),
                ));
            }
            data.extend(row);
        }
        Ok(Self {
            rows: n_rows,
            cols: n_cols,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.data[i * self.cols + j]
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Extent covering the whole matrix, i.e. no padding.
    pub fn full_extent(&self) -> ValidExtent {
        ValidExtent::new(self.rows, self.cols)
    }
}

/// Boolean `(Tx, Ty)` grid marking cells inside the unpadded lengths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidityMask {
    rows: usize,
    cols: usize,
    data: Vec<bool>,
}

impl ValidityMask {
    pub fn new(rows: usize, cols: usize, data: Vec<bool>) -> Result<Self, AlignmentError> {
        if data.len() != rows * cols {
            return Err(AlignmentError::shape_mismatch(
                "validity mask",
                format!("{} cells for ({rows}, {cols})", rows * cols),
                data.len(),
            ));
        }
        Ok(Self { rows, cols, data })
    }

    /// Outer product of two sequence masks: cell `(i, j)` is valid when both
    /// unit `i` and frame `j` are valid.
    pub fn from_sequence_masks(x_mask: &[bool], y_mask: &[bool]) -> Self {
        let data = x_mask
            .iter()
            .flat_map(|&x| y_mask.iter().map(move |&y| x && y))
            .collect();
        Self {
            rows: x_mask.len(),
            cols: y_mask.len(),
            data,
        }
    }

    pub fn from_lengths(
        rows: usize,
        cols: usize,
        x_len: usize,
        y_len: usize,
    ) -> Result<Self, AlignmentError> {
        ValidExtent::new(x_len, y_len).check_within(rows, cols)?;
        let x_mask = crate::alignment::mask::sequence_mask(x_len, rows);
        let y_mask = crate::alignment::mask::sequence_mask(y_len, cols);
        Ok(Self::from_sequence_masks(&x_mask, &y_mask))
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_valid(&self, i: usize, j: usize) -> bool {
        self.data[i * self.cols + j]
    }

    /// Counts valid rows and columns.
    ///
    /// The valid cells must form the top-left `(x_len, y_len)` rectangle; any
    /// other pattern cannot come from two length vectors and is rejected.
    pub fn extent(&self) -> Result<ValidExtent, AlignmentError> {
        let x_len = (0..self.rows)
            .filter(|&i| (0..self.cols).any(|j| self.is_valid(i, j)))
            .count();
        let y_len = (0..self.cols)
            .filter(|&j| (0..self.rows).any(|i| self.is_valid(i, j)))
            .count();
        for i in 0..self.rows {
            for j in 0..self.cols {
                let expected = i < x_len && j < y_len;
                if self.is_valid(i, j) != expected {
                    return Err(AlignmentError::invalid_input(format!(
                        "validity mask is not a prefix rectangle: cell ({i}, {j}) is {}",
                        if expected { "masked" } else { "valid" }
                    )));
                }
            }
        }
        Ok(ValidExtent::new(x_len, y_len))
    }
}

/// Binary `(Tx, Ty)` alignment, stored as `f32` so it can act directly as a
/// projection operator on per-unit parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentPath {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl AlignmentPath {
    pub(crate) fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    #[inline]
    pub(crate) fn mark(&mut self, i: usize, j: usize) {
        self.data[i * self.cols + j] = 1.0;
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.data[i * self.cols + j]
    }

    pub fn is_marked(&self, i: usize, j: usize) -> bool {
        self.get(i, j) != 0.0
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Source unit assigned to each frame, `None` for frames with no marked cell.
    pub fn assignments(&self) -> Vec<Option<usize>> {
        (0..self.cols)
            .map(|j| (0..self.rows).find(|&i| self.is_marked(i, j)))
            .collect()
    }

    /// Column sums: frames assigned to each source unit.
    pub fn durations(&self) -> DurationVector {
        let frames = (0..self.rows)
            .map(|i| (0..self.cols).filter(|&j| self.is_marked(i, j)).count())
            .collect();
        DurationVector::new(frames)
    }

    /// Checks the monotonic alignment invariants against `extent`.
    pub fn validate(&self, extent: ValidExtent) -> Result<(), AlignmentError> {
        extent.check_within(self.rows, self.cols)?;
        let mut prev: Option<usize> = None;
        for j in 0..self.cols {
            let marked: Vec<usize> = (0..self.rows).filter(|&i| self.is_marked(i, j)).collect();
            if let Some(&i) = marked.iter().find(|&&i| i >= extent.x_len || j >= extent.y_len) {
                return Err(AlignmentError::invalid_input(format!(
                    "path marks padding cell ({i}, {j})"
                )));
            }
            if j >= extent.y_len {
                continue;
            }
            let i = match marked.as_slice() {
                [i] => *i,
                _ => {
                    return Err(AlignmentError::invalid_input(format!(
                        "frame {j} assigned to {} source units",
                        marked.len()
                    )))
                }
            };
            if self.get(i, j) != 1.0 {
                return Err(AlignmentError::invalid_input(format!(
                    "path cell ({i}, {j}) holds non-binary value {}",
                    self.get(i, j)
                )));
            }
            let expected_step = match prev {
                None => i == 0,
                Some(p) => i == p || i == p + 1,
            };
            if !expected_step {
                return Err(AlignmentError::invalid_input(format!(
                    "non-monotonic step to unit {i} at frame {j} (previous {prev:?})"
                )));
            }
            prev = Some(i);
        }
        if extent.y_len > 0 && prev != Some(extent.x_len.saturating_sub(1)) {
            return Err(AlignmentError::invalid_input(format!(
                "path ends at unit {prev:?}, expected {}",
                extent.x_len.saturating_sub(1)
            )));
        }
        Ok(())
    }
}

/// Frames assigned to each source unit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DurationVector {
    frames: Vec<usize>,
}

impl DurationVector {
    pub fn new(frames: Vec<usize>) -> Self {
        Self { frames }
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Total frames, saturating at `usize::MAX`.
    pub fn total(&self) -> usize {
        self.frames
            .iter()
            .fold(0usize, |acc, &d| acc.saturating_add(d))
    }

    /// Total frames, or `None` when the sum does not fit in `usize`.
    pub fn checked_total(&self) -> Option<usize> {
        self.frames
            .iter()
            .try_fold(0usize, |acc, &d| acc.checked_add(d))
    }

    /// Exclusive end offset of each unit's frame block, saturating like [`Self::total`].
    pub fn cumulative(&self) -> Vec<usize> {
        self.frames
            .iter()
            .scan(0usize, |acc, &d| {
                *acc = acc.saturating_add(d);
                Some(*acc)
            })
            .collect()
    }

    pub fn into_inner(self) -> Vec<usize> {
        self.frames
    }
}

impl From<Vec<usize>> for DurationVector {
    fn from(frames: Vec<usize>) -> Self {
        Self::new(frames)
    }
}

/// Padded batch of likelihood matrices, row-major `(B, Tx, Ty)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LikelihoodBatch {
    batch: usize,
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl LikelihoodBatch {
    pub fn new(
        batch: usize,
        rows: usize,
        cols: usize,
        data: Vec<f32>,
    ) -> Result<Self, AlignmentError> {
        if data.len() != batch * rows * cols {
            return Err(AlignmentError::shape_mismatch(
                "likelihood batch",
                format!("{} values for ({batch}, {rows}, {cols})", batch * rows * cols),
                data.len(),
            ));
        }
        Ok(Self {
            batch,
            rows,
            cols,
            data,
        })
    }

    /// Packs equally shaped matrices into one batch.
    pub fn from_matrices(matrices: &[LikelihoodMatrix]) -> Result<Self, AlignmentError> {
        let (rows, cols) = matrices.first().map_or((0, 0), |m| (m.rows, m.cols));
        let mut data = Vec::with_capacity(matrices.len() * rows * cols);
        for (b, m) in matrices.iter().enumerate() {
            if (m.rows, m.cols) != (rows, cols) {
                return Err(AlignmentError::shape_mismatch(
                    "likelihood batch element",
                    format!("({rows}, {cols})"),
                    format!("({}, {}) at index {b}", m.rows, m.cols),
                ));
            }
            data.extend_from_slice(&m.data);
        }
        Self::new(matrices.len(), rows, cols, data)
    }

    pub fn batch_size(&self) -> usize {
        self.batch
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn element(&self, b: usize) -> &[f32] {
        let stride = self.rows * self.cols;
        &self.data[b * stride..(b + 1) * stride]
    }
}

/// Per-element outcome of a batched search; failures stay local to their element.
#[derive(Debug)]
pub struct BatchAlignment {
    items: Vec<Result<AlignmentPath, AlignmentError>>,
}

impl BatchAlignment {
    pub(crate) fn new(items: Vec<Result<AlignmentPath, AlignmentError>>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, b: usize) -> Option<&Result<AlignmentPath, AlignmentError>> {
        self.items.get(b)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Result<AlignmentPath, AlignmentError>> {
        self.items.iter()
    }

    pub fn failures(&self) -> impl Iterator<Item = (usize, &AlignmentError)> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(b, item)| item.as_ref().err().map(|e| (b, e)))
    }

    /// Durations of every successful element, `None` where the search failed.
    pub fn durations(&self) -> Vec<Option<DurationVector>> {
        self.items
            .iter()
            .map(|item| item.as_ref().ok().map(AlignmentPath::durations))
            .collect()
    }

    pub fn into_results(self) -> Vec<Result<AlignmentPath, AlignmentError>> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn likelihood_from_rows_rejects_ragged_input() {
        let err = LikelihoodMatrix::from_rows(vec![vec![0.0, 1.0], vec![0.0]]).unwrap_err();
        assert!(matches!(err, AlignmentError::ShapeMismatch { .. }));
    }

    #[test]
    fn mask_from_lengths_is_outer_product() {
        let mask = ValidityMask::from_lengths(3, 4, 2, 3).unwrap();
        assert!(mask.is_valid(1, 2));
        assert!(!mask.is_valid(2, 0));
        assert!(!mask.is_valid(0, 3));
        assert_eq!(mask.extent().unwrap(), ValidExtent::new(2, 3));
    }

    #[test]
    fn mask_extent_rejects_holes() {
        let mask = ValidityMask::new(2, 2, vec![true, false, true, true]).unwrap();
        assert!(matches!(
            mask.extent(),
            Err(AlignmentError::InvalidInput { .. })
        ));
    }

    #[test]
    fn duration_cumulative_offsets() {
        let durations = DurationVector::new(vec![2, 1, 3]);
        assert_eq!(durations.cumulative(), vec![2, 3, 6]);
        assert_eq!(durations.total(), 6);
        assert_eq!(durations.checked_total(), Some(6));
    }

    #[test]
    fn duration_total_saturates_instead_of_overflowing() {
        let durations = DurationVector::new(vec![usize::MAX, 2]);
        assert_eq!(durations.total(), usize::MAX);
        assert_eq!(durations.checked_total(), None);
        assert_eq!(durations.cumulative(), vec![usize::MAX, usize::MAX]);
    }

    #[test]
    fn validate_flags_skipped_unit() {
        let mut path = AlignmentPath::zeros(3, 3);
        path.mark(0, 0);
        path.mark(2, 1);
        path.mark(2, 2);
        assert!(path.validate(ValidExtent::new(3, 3)).is_err());
    }

    #[test]
    fn batch_from_matrices_requires_equal_shapes() {
        let a = LikelihoodMatrix::new(1, 2, vec![0.0, 0.0]).unwrap();
        let b = LikelihoodMatrix::new(2, 1, vec![0.0, 0.0]).unwrap();
        assert!(LikelihoodBatch::from_matrices(&[a, b]).is_err());
    }
}
