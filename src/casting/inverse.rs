//! Disjoint → batched casting.
//!
//! Scatters flat per-node or per-edge rows back into a zero-filled
//! `(B, max_per_graph, ...)` tensor, or regroups them as a [`RaggedTensor`].
//! The inverse of the compaction in [`super::cast_indices`] on every valid
//! position; padding positions come back as zero.

use super::batched::DisjointGraph;
use super::index::gather_rows;
use super::ragged::{scatter_rows, RaggedTensor};
use crate::primitives::index_values;
use crate::{GraphCoreError, Result};
use candle_core::Tensor;
use tracing::debug;

/// Scatter each row `i` of `flat` to `[batch_id[i], local_id[i], ...]`.
///
/// # Arguments
/// - `flat`: Flat rows `(R, ...)`
/// - `batch_id`: Graph of every row `(R,)`
/// - `local_id`: Position of every row within its graph `(R,)`
/// - `batch_size`: Output batch size `B`
/// - `max_per_graph`: Output padded size
///
/// # Returns
/// `(B, max_per_graph, ...)`, zero wherever no row lands.
///
/// # Errors
/// [`GraphCoreError::ShapeMismatch`] if an id is negative, out of range, or two
/// rows target the same position.
pub fn cast_to_batched(
    flat: &Tensor,
    batch_id: &Tensor,
    local_id: &Tensor,
    batch_size: usize,
    max_per_graph: usize,
) -> Result<Tensor> {
    if flat.rank() == 0 {
        return Err(GraphCoreError::ShapeMismatch(
            "cast_to_batched values must have a leading row axis".into(),
        ));
    }
    let batch = non_negative(batch_id, "batch_id")?;
    let local = non_negative(local_id, "local_id")?;
    debug!(rows = batch.len(), batch_size, max_per_graph, "cast_to_batched");
    scatter_rows(flat, &batch, &local, batch_size, max_per_graph)
}

fn non_negative(t: &Tensor, name: &str) -> Result<Vec<usize>> {
    index_values(t)?
        .into_iter()
        .map(|v| {
            usize::try_from(v).map_err(|_| {
                GraphCoreError::ShapeMismatch(format!("{} contains negative id {}", name, v))
            })
        })
        .collect()
}

/// Which half of the disjoint graph a tensor of rows belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    Node,
    Edge,
}

/// Host view of the live rows of one element kind.
struct LiveRows {
    positions: Vec<usize>,
    batch_id: Vec<usize>,
    local_id: Vec<usize>,
    counts: Vec<usize>,
}

impl DisjointGraph {
    /// Scatter per-node rows back to `(B, max_per_graph, ...)`.
    ///
    /// In padded-disjoint form the dump graph's rows are dropped.
    pub fn nodes_to_batched(&self, values: &Tensor, max_per_graph: usize) -> Result<Tensor> {
        self.to_batched(values, Element::Node, max_per_graph)
    }

    /// Scatter per-edge rows back to `(B, max_per_graph, ...)`.
    pub fn edges_to_batched(&self, values: &Tensor, max_per_graph: usize) -> Result<Tensor> {
        self.to_batched(values, Element::Edge, max_per_graph)
    }

    /// Regroup per-node rows as one ragged row per graph.
    pub fn nodes_to_ragged(&self, values: &Tensor) -> Result<RaggedTensor> {
        self.to_ragged(values, Element::Node)
    }

    /// Regroup per-edge rows as one ragged row per graph.
    pub fn edges_to_ragged(&self, values: &Tensor) -> Result<RaggedTensor> {
        self.to_ragged(values, Element::Edge)
    }

    fn to_batched(&self, values: &Tensor, element: Element, max_per_graph: usize) -> Result<Tensor> {
        let live = self.live_rows(values, element)?;
        let rows = gather_rows(values, &live.positions)?;
        scatter_rows(
            &rows,
            &live.batch_id,
            &live.local_id,
            live.counts.len(),
            max_per_graph,
        )
    }

    fn to_ragged(&self, values: &Tensor, element: Element) -> Result<RaggedTensor> {
        let live = self.live_rows(values, element)?;
        // Rows come out of the casters grouped by graph.
        if live.batch_id.windows(2).any(|w| w[1] < w[0]) {
            return Err(GraphCoreError::ShapeMismatch(
                "disjoint rows are not ordered by graph".into(),
            ));
        }
        let rows = gather_rows(values, &live.positions)?;
        RaggedTensor::from_row_lengths(rows, &live.counts)
    }

    /// Positions, graph ids and local ids of rows belonging to real graphs,
    /// with graph ids shifted past the dump graph in padded-disjoint form.
    fn live_rows(&self, values: &Tensor, element: Element) -> Result<LiveRows> {
        let (batch_id, local_id, counts, expected) = match element {
            Element::Node => (
                self.batch_id_node_vec()?,
                self.node_id_vec()?,
                self.count_nodes_vec()?,
                self.num_nodes()?,
            ),
            Element::Edge => (
                self.batch_id_edge_vec()?,
                self.edge_id_vec()?,
                self.count_edges_vec()?,
                self.num_edges()?,
            ),
        };
        if values.rank() == 0 || values.dim(0)? != expected {
            return Err(GraphCoreError::ShapeMismatch(format!(
                "{:?} values have shape {:?} but the graph has {} rows",
                element,
                values.dims(),
                expected
            )));
        }

        if !self.padded_disjoint {
            return Ok(LiveRows {
                positions: (0..expected).collect(),
                batch_id,
                local_id,
                counts,
            });
        }

        let mut live = LiveRows {
            positions: Vec::with_capacity(expected),
            batch_id: Vec::with_capacity(expected),
            local_id: Vec::with_capacity(expected),
            counts: counts.into_iter().skip(1).collect(),
        };
        for (pos, (&b, &l)) in batch_id.iter().zip(&local_id).enumerate() {
            if b == 0 {
                continue;
            }
            live.positions.push(pos);
            live.batch_id.push(b - 1);
            live.local_id.push(l);
        }
        Ok(live)
    }
}
