//! Ragged batches: variable-length rows without padding.
//!
//! A [`RaggedTensor`] stores every row of the batch concatenated along the
//! leading axis of `values`, with `row_splits` marking the boundaries:
//! row `g` is `values[row_splits[g]..row_splits[g + 1]]`.

use super::index::{exclusive_cumsum, ragged_layout};
use crate::primitives::{index_tensor, index_values};
use crate::{GraphCoreError, Result};
use candle_core::Tensor;
use tracing::debug;

/// Ragged batch of `B` variable-length rows.
#[derive(Debug, Clone)]
pub struct RaggedTensor {
    values: Tensor,
    row_splits: Vec<usize>,
}

impl RaggedTensor {
    /// Create from flat values and row boundaries.
    ///
    /// `row_splits` must start at 0, be non-decreasing and end at
    /// `values.dim(0)`.
    pub fn new(values: Tensor, row_splits: Vec<usize>) -> Result<Self> {
        if values.rank() == 0 {
            return Err(GraphCoreError::ShapeMismatch(
                "ragged values must have a leading row axis".into(),
            ));
        }
        let total = values.dim(0)?;
        if row_splits.first() != Some(&0) {
            return Err(GraphCoreError::ShapeMismatch(format!(
                "row_splits must start at 0, got {:?}",
                row_splits.first()
            )));
        }
        if row_splits.windows(2).any(|w| w[1] < w[0]) {
            return Err(GraphCoreError::ShapeMismatch(
                "row_splits must be non-decreasing".into(),
            ));
        }
        if row_splits.last() != Some(&total) {
            return Err(GraphCoreError::ShapeMismatch(format!(
                "row_splits must end at {} (values rows), got {:?}",
                total,
                row_splits.last()
            )));
        }
        Ok(Self { values, row_splits })
    }

    /// Create from flat values and per-row lengths.
    pub fn from_row_lengths(values: Tensor, lengths: &[usize]) -> Result<Self> {
        let mut splits = exclusive_cumsum(lengths);
        splits.push(lengths.iter().sum());
        Self::new(values, splits)
    }

    /// Concatenate individual rows `(n_i, ...)`.
    pub fn from_rows(rows: &[Tensor]) -> Result<Self> {
        if rows.is_empty() {
            return Err(GraphCoreError::ShapeMismatch(
                "from_rows needs at least one row to fix the feature shape".into(),
            ));
        }
        let lengths = rows
            .iter()
            .map(|r| r.dim(0).map_err(GraphCoreError::from))
            .collect::<Result<Vec<_>>>()?;
        let values = Tensor::cat(rows, 0)
            .map_err(|e| GraphCoreError::Tensor(format!("ragged concat failed: {}", e)))?;
        Self::from_row_lengths(values, &lengths)
    }

    /// Flat values `(Σ n_i, ...)`
    pub fn values(&self) -> &Tensor {
        &self.values
    }

    /// Row boundaries, length `B + 1`
    pub fn row_splits(&self) -> &[usize] {
        &self.row_splits
    }

    /// Number of rows `B`
    pub fn nrows(&self) -> usize {
        self.row_splits.len() - 1
    }

    /// Length of every row
    pub fn row_lengths(&self) -> Vec<usize> {
        self.row_splits.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Longest row, 0 for an empty batch
    pub fn max_row_length(&self) -> usize {
        self.row_lengths().into_iter().max().unwrap_or(0)
    }

    /// Row `i` as a `(n_i, ...)` tensor
    pub fn row(&self, i: usize) -> Result<Tensor> {
        if i >= self.nrows() {
            return Err(GraphCoreError::ShapeMismatch(format!(
                "row {} out of range for {} rows",
                i,
                self.nrows()
            )));
        }
        let start = self.row_splits[i];
        self.values
            .narrow(0, start, self.row_splits[i + 1] - start)
            .map_err(|e| GraphCoreError::Tensor(format!("ragged row failed: {}", e)))
    }

    /// Zero-pad to `(B, max_len, ...)`.
    ///
    /// Returns the padded tensor and the `(B,)` U32 row lengths.
    pub fn to_padded(&self, max_len: usize) -> Result<(Tensor, Tensor)> {
        let lengths = self.row_lengths();
        if let Some(longest) = lengths.iter().copied().max().filter(|&l| l > max_len) {
            return Err(GraphCoreError::ShapeMismatch(format!(
                "ragged row of length {} does not fit padded size {}",
                longest, max_len
            )));
        }
        let layout = ragged_layout(&self.row_splits);
        let padded = scatter_rows(
            &self.values,
            &layout.batch_id,
            &layout.local_id,
            self.nrows(),
            max_len,
        )?;
        let counts = index_tensor(&lengths, lengths.len(), self.values.device())?;
        Ok((padded, counts))
    }
}

/// Scatter rows to `[batch_id[i], local_id[i]]` of a zero `(B, max_len, ...)` tensor.
///
/// Target positions must be unique and in range.
pub(crate) fn scatter_rows(
    values: &Tensor,
    batch_id: &[usize],
    local_id: &[usize],
    batch_size: usize,
    max_len: usize,
) -> Result<Tensor> {
    let rows = values.dim(0)?;
    if batch_id.len() != rows || local_id.len() != rows {
        return Err(GraphCoreError::ShapeMismatch(format!(
            "{} rows but {} batch ids and {} local ids",
            rows,
            batch_id.len(),
            local_id.len()
        )));
    }

    let mut written = vec![false; batch_size * max_len];
    let mut positions = Vec::with_capacity(rows);
    for (i, (&b, &l)) in batch_id.iter().zip(local_id).enumerate() {
        if b >= batch_size || l >= max_len {
            return Err(GraphCoreError::ShapeMismatch(format!(
                "row {} targets ({}, {}) outside ({}, {})",
                i, b, l, batch_size, max_len
            )));
        }
        let pos = b * max_len + l;
        if written[pos] {
            return Err(GraphCoreError::ShapeMismatch(format!(
                "row {} targets ({}, {}) which is already written",
                i, b, l
            )));
        }
        written[pos] = true;
        positions.push(pos);
    }

    let mut flat_dims = values.dims().to_vec();
    flat_dims[0] = batch_size * max_len;
    let mut out_dims = vec![batch_size, max_len];
    out_dims.extend_from_slice(&values.dims()[1..]);

    let zeros = Tensor::zeros(flat_dims, values.dtype(), values.device())
        .map_err(|e| GraphCoreError::Tensor(format!("scatter zeros failed: {}", e)))?;
    let flat = if positions.is_empty() {
        zeros
    } else {
        let index = index_tensor(&positions, positions.len(), values.device())?;
        let source = values
            .contiguous()
            .map_err(|e| GraphCoreError::Tensor(format!("scatter contiguous failed: {}", e)))?;
        zeros
            .index_add(&index, &source, 0)
            .map_err(|e| GraphCoreError::Tensor(format!("scatter index_add failed: {}", e)))?
    };
    flat.reshape(out_dims)
        .map_err(|e| GraphCoreError::Tensor(format!("scatter reshape failed: {}", e)))
}

// =============================================================================
// Ragged casting
// =============================================================================

/// Cast a ragged attribute batch: `(flat_attr, batch_id, local_id)`.
///
/// The values are already flat, so only the index arrays are built.
pub fn cast_ragged_attributes(attr: &RaggedTensor) -> Result<(Tensor, Tensor, Tensor)> {
    let layout = ragged_layout(attr.row_splits());
    let device = attr.values().device();
    debug!(graphs = attr.nrows(), rows = layout.len(), "cast_ragged_attributes");
    Ok((
        attr.values().clone(),
        layout.batch_id_tensor(device)?,
        layout.local_id_tensor(device)?,
    ))
}

/// Globalise ragged `(E_total, 2)` local edge pairs.
///
/// Returns `(sources, targets)` with each pair shifted by its graph's node
/// offset, after checking it lies inside that graph.
pub(crate) fn globalise_ragged_edges(
    edge_index: &RaggedTensor,
    node_counts: &[usize],
) -> Result<(Vec<usize>, Vec<usize>)> {
    let dims = edge_index.values().dims();
    if dims.len() != 2 || dims[1] != 2 {
        return Err(GraphCoreError::ShapeMismatch(format!(
            "ragged edge_index values must be (E, 2), got {:?}",
            dims
        )));
    }
    let pairs = index_values(edge_index.values())?;
    let offsets = exclusive_cumsum(node_counts);

    let total = edge_index.row_splits().last().copied().unwrap_or(0);
    let mut sources = Vec::with_capacity(total);
    let mut targets = Vec::with_capacity(total);
    for (g, w) in edge_index.row_splits().windows(2).enumerate() {
        for e in w[0]..w[1] {
            let src = local_node(pairs[2 * e], g, node_counts[g])?;
            let tgt = local_node(pairs[2 * e + 1], g, node_counts[g])?;
            sources.push(offsets[g] + src);
            targets.push(offsets[g] + tgt);
        }
    }
    Ok((sources, targets))
}

/// Validate a local node index against its graph's node count.
pub(crate) fn local_node(index: i64, graph: usize, count: usize) -> Result<usize> {
    usize::try_from(index)
        .ok()
        .filter(|&i| i < count)
        .ok_or(GraphCoreError::IndexOutOfGraph {
            graph,
            index,
            count,
        })
}
