//! Batched → disjoint casting.
//!
//! ```text
//! padded (B, N_max, F) + node_count ─┐
//!                                     ├─► DisjointGraph { node_attr (Σn, F), edge_index (2, Σe), ... }
//! padded (B, E_max, 2) + edge_count ─┘
//! ```
//!
//! Node `i` of graph `g` becomes global node `offset(g) + i`, where
//! `offset` is the exclusive prefix sum of `node_count`. Edge pairs are
//! `(source, target)`; row 0 of `edge_index` holds sources, row 1 targets.
//!
//! ## Padded-disjoint layout
//!
//! With [`CastDisjointConfig::padded_disjoint`] the padding is kept so every
//! graph occupies a fixed stride:
//!
//! ```text
//! position   0      1 .. N_max      N_max+1 .. 2·N_max    ...
//! graph      dump   graph 0 slots   graph 1 slots
//! batch id   0      1 (live) / 0    2 (live) / 0
//! ```
//!
//! Padding rows belong to the dump graph 0 and padding edges are rewired to
//! the dump node `(0, 0)`, so they never reach a real node. Read-out and the
//! inverse casters drop graph 0.

use super::index::{
    check_batch_len, exclusive_cumsum, gather_rows, merge_batch_axis, ragged_layout,
    SegmentLayout,
};
use super::ragged::{globalise_ragged_edges, local_node, RaggedTensor};
use super::template::CastDisjointConfig;
use crate::primitives::{count_values, index_tensor, index_values};
use crate::{GraphCoreError, Result};
use candle_core::{Device, Tensor};
use tracing::debug;

// =============================================================================
// DisjointGraph
// =============================================================================

/// A batch of graphs as one disjoint-union graph.
///
/// All index tensors are `U32`. In padded-disjoint form every per-graph
/// vector (`count_nodes`, `count_edges`) has a leading entry for the dump
/// graph.
#[derive(Debug, Clone)]
pub struct DisjointGraph {
    /// Node rows of every graph, concatenated `(N_total, ...)`
    pub node_attr: Tensor,
    /// Global `(source, target)` rows `(2, E_total)`
    pub edge_index: Tensor,
    /// Graph of every node `(N_total,)`
    pub batch_id_node: Tensor,
    /// Graph of every edge `(E_total,)`
    pub batch_id_edge: Tensor,
    /// Position of every node within its graph `(N_total,)`
    pub node_id: Tensor,
    /// Position of every edge within its graph `(E_total,)`
    pub edge_id: Tensor,
    /// Nodes per graph
    pub count_nodes: Tensor,
    /// Edges per graph
    pub count_edges: Tensor,
    /// Whether graph 0 is the dump graph of the padded-disjoint layout
    pub padded_disjoint: bool,
}

impl DisjointGraph {
    /// Number of real graphs `B` (the dump graph is not counted)
    pub fn batch_size(&self) -> Result<usize> {
        Ok(self.num_graph_segments()? - usize::from(self.padded_disjoint))
    }

    /// Number of graph ids in use, including the dump graph
    pub fn num_graph_segments(&self) -> Result<usize> {
        Ok(self.count_nodes.dim(0)?)
    }

    /// Total node rows
    pub fn num_nodes(&self) -> Result<usize> {
        Ok(self.node_attr.dim(0)?)
    }

    /// Total edge columns
    pub fn num_edges(&self) -> Result<usize> {
        Ok(self.edge_index.dim(1)?)
    }

    pub fn device(&self) -> &Device {
        self.node_attr.device()
    }

    pub fn batch_id_node_vec(&self) -> Result<Vec<usize>> {
        host_indices(&self.batch_id_node)
    }

    pub fn batch_id_edge_vec(&self) -> Result<Vec<usize>> {
        host_indices(&self.batch_id_edge)
    }

    pub fn node_id_vec(&self) -> Result<Vec<usize>> {
        host_indices(&self.node_id)
    }

    pub fn edge_id_vec(&self) -> Result<Vec<usize>> {
        host_indices(&self.edge_id)
    }

    pub fn count_nodes_vec(&self) -> Result<Vec<usize>> {
        host_indices(&self.count_nodes)
    }

    pub fn count_edges_vec(&self) -> Result<Vec<usize>> {
        host_indices(&self.count_edges)
    }

    /// Edge list as host `[source, target]` pairs
    pub fn edge_pairs(&self) -> Result<Vec<[usize; 2]>> {
        let flat = host_indices(&self.edge_index)?;
        let e = flat.len() / 2;
        Ok((0..e).map(|j| [flat[j], flat[e + j]]).collect())
    }

    /// Node offsets per graph segment (exclusive prefix sum of `count_nodes`)
    pub fn node_offsets(&self) -> Result<Vec<usize>> {
        Ok(exclusive_cumsum(&self.count_nodes_vec()?))
    }
}

fn host_indices(t: &Tensor) -> Result<Vec<usize>> {
    Ok(index_values(t)?.into_iter().map(|v| v as usize).collect())
}

/// Assemble the graph from host layouts and global edge columns.
fn assemble(
    node_attr: Tensor,
    nodes: &SegmentLayout,
    edges: &SegmentLayout,
    sources: &[usize],
    targets: &[usize],
    padded_disjoint: bool,
) -> Result<DisjointGraph> {
    let device = node_attr.device().clone();
    let mut columns = Vec::with_capacity(sources.len() * 2);
    columns.extend_from_slice(sources);
    columns.extend_from_slice(targets);

    let graph = DisjointGraph {
        edge_index: index_tensor(&columns, (2, sources.len()), &device)?,
        batch_id_node: nodes.batch_id_tensor(&device)?,
        batch_id_edge: edges.batch_id_tensor(&device)?,
        node_id: nodes.local_id_tensor(&device)?,
        edge_id: edges.local_id_tensor(&device)?,
        count_nodes: nodes.counts_tensor(&device)?,
        count_edges: edges.counts_tensor(&device)?,
        node_attr,
        padded_disjoint,
    };
    debug!(
        nodes = nodes.len(),
        edges = sources.len(),
        graphs = nodes.counts.len(),
        padded_disjoint,
        "cast to disjoint graph"
    );
    Ok(graph)
}

// =============================================================================
// Padded inputs
// =============================================================================

/// Dimensions of a padded `(B, M, ...)` tensor
fn padded_dims(t: &Tensor, name: &str) -> Result<(usize, usize)> {
    match t.dims() {
        [b, m, ..] => Ok((*b, *m)),
        dims => Err(GraphCoreError::ShapeMismatch(format!(
            "{} must be (B, N, ...), got {:?}",
            name, dims
        ))),
    }
}

/// Validated host view of padded `(B, E_max, 2)` local edge pairs.
struct PaddedEdges {
    pairs: Vec<i64>,
    node_counts: Vec<usize>,
    edge_counts: Vec<usize>,
    e_max: usize,
}

impl PaddedEdges {
    fn new(
        node_attr: &Tensor,
        edge_index: &Tensor,
        node_count: &Tensor,
        edge_count: &Tensor,
    ) -> Result<(Self, usize, usize)> {
        let (batch, n_max) = padded_dims(node_attr, "node_attr")?;
        let (edge_batch, e_max) = match edge_index.dims() {
            [b, e, 2] => (*b, *e),
            dims => {
                return Err(GraphCoreError::ShapeMismatch(format!(
                    "edge_index must be (B, E_max, 2), got {:?}",
                    dims
                )))
            }
        };
        if edge_batch != batch {
            return Err(GraphCoreError::ShapeMismatch(format!(
                "edge_index batch {} differs from node_attr batch {}",
                edge_batch, batch
            )));
        }
        let node_counts = count_values(node_count, "node_count")?;
        let edge_counts = count_values(edge_count, "edge_count")?;
        check_batch_len(&node_counts, batch, "node_count")?;
        check_batch_len(&edge_counts, batch, "edge_count")?;

        Ok((
            Self {
                pairs: index_values(edge_index)?,
                node_counts,
                edge_counts,
                e_max,
            },
            batch,
            n_max,
        ))
    }

    /// Local pair of edge slot `j` in graph `g`, validated against the graph
    fn local_pair(&self, g: usize, j: usize) -> Result<(usize, usize)> {
        let base = 2 * (g * self.e_max + j);
        let count = self.node_counts[g];
        Ok((
            local_node(self.pairs[base], g, count)?,
            local_node(self.pairs[base + 1], g, count)?,
        ))
    }
}

/// Cast padded node and edge tensors to a disjoint graph.
///
/// # Arguments
/// - `node_attr`: Padded nodes `(B, N_max, ...)`
/// - `edge_index`: Padded local `(source, target)` pairs `(B, E_max, 2)`
/// - `node_count`: Valid nodes per graph `(B,)`
/// - `edge_count`: Valid edges per graph `(B,)`
///
/// # Errors
/// - [`GraphCoreError::ShapeMismatch`] on inconsistent batch sizes or counts above the padded size
/// - [`GraphCoreError::IndexOutOfGraph`] if a valid edge references a node outside its graph
pub fn cast_indices(
    node_attr: &Tensor,
    edge_index: &Tensor,
    node_count: &Tensor,
    edge_count: &Tensor,
) -> Result<DisjointGraph> {
    let (edges, _, n_max) = PaddedEdges::new(node_attr, edge_index, node_count, edge_count)?;
    let nodes = SegmentLayout::compact(&edges.node_counts, n_max, "node_count")?;
    let edge_layout = SegmentLayout::compact(&edges.edge_counts, edges.e_max, "edge_count")?;
    let offsets = exclusive_cumsum(&edges.node_counts);

    let mut sources = Vec::with_capacity(edge_layout.len());
    let mut targets = Vec::with_capacity(edge_layout.len());
    for (&g, &j) in edge_layout.batch_id.iter().zip(&edge_layout.local_id) {
        let (src, tgt) = edges.local_pair(g, j)?;
        sources.push(offsets[g] + src);
        targets.push(offsets[g] + tgt);
    }

    let flat = gather_rows(&merge_batch_axis(node_attr, "node_attr")?, &nodes.gather)?;
    assemble(flat, &nodes, &edge_layout, &sources, &targets, false)
}

/// Cast padded tensors to the stride-preserving padded-disjoint layout.
///
/// See the module docs for the layout. Live edges are validated exactly as
/// in [`cast_indices`]; padding edges are not inspected.
pub fn cast_indices_padded_disjoint(
    node_attr: &Tensor,
    edge_index: &Tensor,
    node_count: &Tensor,
    edge_count: &Tensor,
) -> Result<DisjointGraph> {
    let (edges, _, n_max) = PaddedEdges::new(node_attr, edge_index, node_count, edge_count)?;
    let nodes = SegmentLayout::padded_disjoint(&edges.node_counts, n_max, "node_count")?;
    let edge_layout =
        SegmentLayout::padded_disjoint(&edges.edge_counts, edges.e_max, "edge_count")?;

    let mut sources = Vec::with_capacity(edge_layout.len());
    let mut targets = Vec::with_capacity(edge_layout.len());
    for (pos, (&b, &j)) in edge_layout
        .batch_id
        .iter()
        .zip(&edge_layout.local_id)
        .enumerate()
    {
        if b == 0 {
            // dump edge or padding: self-loop on the dump node
            sources.push(0);
            targets.push(0);
            continue;
        }
        let g = b - 1;
        debug_assert_eq!(pos, 1 + g * edges.e_max + j);
        let (src, tgt) = edges.local_pair(g, j)?;
        let offset = 1 + g * n_max;
        sources.push(offset + src);
        targets.push(offset + tgt);
    }

    let flat = with_dump_row(&merge_batch_axis(node_attr, "node_attr")?)?;
    assemble(flat, &nodes, &edge_layout, &sources, &targets, true)
}

/// Cast one padded attribute tensor: `(flat_attr, batch_id, local_id)`.
///
/// Compaction matches the node branch of [`cast_indices`] for the same counts.
pub fn cast_attributes(attr: &Tensor, count: &Tensor) -> Result<(Tensor, Tensor, Tensor)> {
    let (batch, max_len) = padded_dims(attr, "attr")?;
    let counts = count_values(count, "count")?;
    check_batch_len(&counts, batch, "count")?;
    let layout = SegmentLayout::compact(&counts, max_len, "count")?;

    let flat = gather_rows(&merge_batch_axis(attr, "attr")?, &layout.gather)?;
    debug!(rows = layout.len(), graphs = batch, "cast_attributes");
    Ok((
        flat,
        layout.batch_id_tensor(attr.device())?,
        layout.local_id_tensor(attr.device())?,
    ))
}

/// Padded-disjoint variant of [`cast_attributes`]: `(1 + B * max_len, ...)`
/// rows with a leading dump row, matching the node branch of
/// [`cast_indices_padded_disjoint`].
pub fn cast_attributes_padded_disjoint(
    attr: &Tensor,
    count: &Tensor,
) -> Result<(Tensor, Tensor, Tensor)> {
    let (batch, max_len) = padded_dims(attr, "attr")?;
    let counts = count_values(count, "count")?;
    check_batch_len(&counts, batch, "count")?;
    let layout = SegmentLayout::padded_disjoint(&counts, max_len, "count")?;

    let flat = with_dump_row(&merge_batch_axis(attr, "attr")?)?;
    Ok((
        flat,
        layout.batch_id_tensor(attr.device())?,
        layout.local_id_tensor(attr.device())?,
    ))
}

/// Prepend one zero row.
fn with_dump_row(flat: &Tensor) -> Result<Tensor> {
    let mut dims = flat.dims().to_vec();
    dims[0] = 1;
    Tensor::zeros(dims, flat.dtype(), flat.device())
        .and_then(|dump| Tensor::cat(&[&dump, flat], 0))
        .map_err(|e| GraphCoreError::Tensor(format!("dump row failed: {}", e)))
}

// =============================================================================
// Ragged inputs
// =============================================================================

/// Cast a ragged batch to a disjoint graph.
///
/// # Arguments
/// - `nodes`: Ragged nodes, one row per graph
/// - `edge_index`: Ragged local `(source, target)` pairs, values `(E_total, 2)`
pub fn cast_ragged_indices(nodes: &RaggedTensor, edge_index: &RaggedTensor) -> Result<DisjointGraph> {
    if nodes.nrows() != edge_index.nrows() {
        return Err(GraphCoreError::ShapeMismatch(format!(
            "ragged edge_index has {} graphs but nodes have {}",
            edge_index.nrows(),
            nodes.nrows()
        )));
    }
    let node_layout = ragged_layout(nodes.row_splits());
    let edge_layout = ragged_layout(edge_index.row_splits());
    let (sources, targets) = globalise_ragged_edges(edge_index, &node_layout.counts)?;
    assemble(
        nodes.values().clone(),
        &node_layout,
        &edge_layout,
        &sources,
        &targets,
        false,
    )
}

// =============================================================================
// BatchedCaster
// =============================================================================

/// Stateless caster selecting the compacting or padded-disjoint path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchedCaster {
    pub config: CastDisjointConfig,
}

impl BatchedCaster {
    pub fn new(config: CastDisjointConfig) -> Self {
        Self { config }
    }

    /// Cast padded node/edge tensors, see [`cast_indices`]
    pub fn cast_padded(
        &self,
        node_attr: &Tensor,
        edge_index: &Tensor,
        node_count: &Tensor,
        edge_count: &Tensor,
    ) -> Result<DisjointGraph> {
        if self.config.padded_disjoint {
            cast_indices_padded_disjoint(node_attr, edge_index, node_count, edge_count)
        } else {
            cast_indices(node_attr, edge_index, node_count, edge_count)
        }
    }

    /// Cast a ragged batch, see [`cast_ragged_indices`].
    ///
    /// With `padded_disjoint` the batch is padded to its longest rows first.
    pub fn cast_ragged(&self, nodes: &RaggedTensor, edge_index: &RaggedTensor) -> Result<DisjointGraph> {
        if !self.config.padded_disjoint {
            return cast_ragged_indices(nodes, edge_index);
        }
        let (node_attr, node_count) = nodes.to_padded(nodes.max_row_length())?;
        let (edges, edge_count) = edge_index.to_padded(edge_index.max_row_length())?;
        cast_indices_padded_disjoint(&node_attr, &edges, &node_count, &edge_count)
    }

    /// Cast a padded per-graph attribute tensor with the same layout as the nodes
    pub fn cast_attributes(&self, attr: &Tensor, count: &Tensor) -> Result<(Tensor, Tensor, Tensor)> {
        if self.config.padded_disjoint {
            cast_attributes_padded_disjoint(attr, count)
        } else {
            cast_attributes(attr, count)
        }
    }

    /// Cast a ragged per-graph attribute tensor with the same layout as the nodes
    pub fn cast_ragged_attributes(&self, attr: &RaggedTensor) -> Result<(Tensor, Tensor, Tensor)> {
        if !self.config.padded_disjoint {
            return super::ragged::cast_ragged_attributes(attr);
        }
        let (padded, count) = attr.to_padded(attr.max_row_length())?;
        cast_attributes_padded_disjoint(&padded, &count)
    }
}
