//! Host-side index bookkeeping shared by the casters.
//!
//! Counts, offsets and gather positions are small per-batch vectors, so they
//! are computed on the host and only the final index arrays become tensors.

use crate::primitives::index_tensor;
use crate::{GraphCoreError, Result};
use candle_core::{Device, Tensor};

/// Exclusive prefix sum: `offsets[0] = 0`, `offsets[g] = offsets[g-1] + counts[g-1]`.
pub fn exclusive_cumsum(counts: &[usize]) -> Vec<usize> {
    let mut total = 0;
    counts
        .iter()
        .map(|&c| {
            let offset = total;
            total += c;
            offset
        })
        .collect()
}

/// Where every flat row comes from and which graph it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SegmentLayout {
    /// Rows of the `(B * max_len, ...)` view that survive the cast, in output order
    pub gather: Vec<usize>,
    /// Graph of each output row
    pub batch_id: Vec<usize>,
    /// Position of each output row within its graph
    pub local_id: Vec<usize>,
    /// Rows per graph, as stored in the disjoint graph
    pub counts: Vec<usize>,
}

impl SegmentLayout {
    /// Compacting layout: the first `counts[g]` slots of every block, padding dropped.
    pub fn compact(counts: &[usize], max_len: usize, name: &str) -> Result<Self> {
        check_counts(counts, max_len, name)?;
        let total: usize = counts.iter().sum();
        let mut layout = Self {
            gather: Vec::with_capacity(total),
            batch_id: Vec::with_capacity(total),
            local_id: Vec::with_capacity(total),
            counts: counts.to_vec(),
        };
        for (g, &count) in counts.iter().enumerate() {
            for i in 0..count {
                layout.gather.push(g * max_len + i);
                layout.batch_id.push(g);
                layout.local_id.push(i);
            }
        }
        Ok(layout)
    }

    /// Stride-preserving layout: a dump row at position 0, then every slot of
    /// every block. Live slots belong to graph `g + 1`; padding and the dump
    /// row belong to graph 0 with local id 0.
    ///
    /// `gather` indexes the `(1 + B * max_len, ...)` view with the dump row
    /// prepended, so it is the identity here.
    pub fn padded_disjoint(counts: &[usize], max_len: usize, name: &str) -> Result<Self> {
        check_counts(counts, max_len, name)?;
        let slots = 1 + counts.len() * max_len;
        let live: usize = counts.iter().sum();

        let mut layout = Self {
            gather: (0..slots).collect(),
            batch_id: Vec::with_capacity(slots),
            local_id: Vec::with_capacity(slots),
            counts: Vec::with_capacity(counts.len() + 1),
        };
        layout.batch_id.push(0);
        layout.local_id.push(0);
        for (g, &count) in counts.iter().enumerate() {
            for i in 0..max_len {
                if i < count {
                    layout.batch_id.push(g + 1);
                    layout.local_id.push(i);
                } else {
                    layout.batch_id.push(0);
                    layout.local_id.push(0);
                }
            }
        }
        layout.counts.push(slots - live);
        layout.counts.extend_from_slice(counts);
        Ok(layout)
    }

    /// Number of output rows
    pub fn len(&self) -> usize {
        self.batch_id.len()
    }

    pub fn batch_id_tensor(&self, device: &Device) -> Result<Tensor> {
        index_tensor(&self.batch_id, self.batch_id.len(), device)
    }

    pub fn local_id_tensor(&self, device: &Device) -> Result<Tensor> {
        index_tensor(&self.local_id, self.local_id.len(), device)
    }

    pub fn counts_tensor(&self, device: &Device) -> Result<Tensor> {
        index_tensor(&self.counts, self.counts.len(), device)
    }
}

/// Layout of a ragged batch described by its row splits.
pub(crate) fn ragged_layout(row_splits: &[usize]) -> SegmentLayout {
    let counts: Vec<usize> = row_splits.windows(2).map(|w| w[1] - w[0]).collect();
    let total = row_splits.last().copied().unwrap_or(0);
    let mut layout = SegmentLayout {
        gather: (0..total).collect(),
        batch_id: Vec::with_capacity(total),
        local_id: Vec::with_capacity(total),
        counts,
    };
    for (g, &count) in layout.counts.iter().enumerate() {
        layout.batch_id.extend(std::iter::repeat(g).take(count));
        layout.local_id.extend(0..count);
    }
    layout
}

fn check_counts(counts: &[usize], max_len: usize, name: &str) -> Result<()> {
    if let Some((g, &c)) = counts.iter().enumerate().find(|&(_, &c)| c > max_len) {
        return Err(GraphCoreError::ShapeMismatch(format!(
            "{}[{}] = {} exceeds padded size {}",
            name, g, c, max_len
        )));
    }
    Ok(())
}

/// Gather the rows named by `positions` from the leading axis of `flat`.
///
/// An empty selection yields a `(0, ...)` tensor of the same dtype.
pub(crate) fn gather_rows(flat: &Tensor, positions: &[usize]) -> Result<Tensor> {
    if positions.is_empty() {
        let mut dims = flat.dims().to_vec();
        dims[0] = 0;
        return Tensor::zeros(dims, flat.dtype(), flat.device())
            .map_err(|e| GraphCoreError::Tensor(format!("gather_rows empty failed: {}", e)));
    }
    let index = index_tensor(positions, positions.len(), flat.device())?;
    flat.index_select(&index, 0)
        .map_err(|e| GraphCoreError::Tensor(format!("gather_rows index_select failed: {}", e)))
}

/// Merge the two leading axes: `(B, M, ...)` → `(B * M, ...)`.
pub(crate) fn merge_batch_axis(t: &Tensor, name: &str) -> Result<Tensor> {
    if t.rank() < 2 {
        return Err(GraphCoreError::ShapeMismatch(format!(
            "{} must be at least (B, N, ...), got {:?}",
            name,
            t.dims()
        )));
    }
    t.flatten(0, 1)
        .map_err(|e| GraphCoreError::Tensor(format!("{} flatten failed: {}", name, e)))
}

/// Check a count vector has one entry per graph.
pub(crate) fn check_batch_len(counts: &[usize], batch_size: usize, name: &str) -> Result<()> {
    if counts.len() != batch_size {
        return Err(GraphCoreError::ShapeMismatch(format!(
            "{} has {} entries but batch size is {}",
            name,
            counts.len(),
            batch_size
        )));
    }
    Ok(())
}
