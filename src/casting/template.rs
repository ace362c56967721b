//! Model-builder boundary.
//!
//! A model declares how its batches arrive ([`InputTensorType`]), how the
//! casters should lay them out ([`CastDisjointConfig`]) and what its output
//! looks like ([`OutputEmbedding`], [`OutputTensorType`]). [`cast_input`] and
//! [`cast_output`] are the two calls a model makes around its message
//! passing layers.

use super::batched::{BatchedCaster, DisjointGraph};
use super::ragged::RaggedTensor;
use crate::{GraphCoreError, Result};
use candle_core::Tensor;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Configuration
// =============================================================================

/// Form of the incoming batch tensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputTensorType {
    #[default]
    Padded,
    Ragged,
}

/// Form of the tensors handed back to the training driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputTensorType {
    #[default]
    Padded,
    Ragged,
}

/// What one output row describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputEmbedding {
    /// One row per graph
    #[default]
    Graph,
    /// One row per node
    Node,
    /// One row per edge
    Edge,
}

impl fmt::Display for InputTensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Padded => write!(f, "padded"),
            Self::Ragged => write!(f, "ragged"),
        }
    }
}

impl fmt::Display for OutputTensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Padded => write!(f, "padded"),
            Self::Ragged => write!(f, "ragged"),
        }
    }
}

/// Per-model options for the batched → disjoint cast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CastDisjointConfig {
    /// Keep padding in a fixed-stride layout with a dump graph at id 0
    pub padded_disjoint: bool,
}

// =============================================================================
// Batches
// =============================================================================

/// Zero-padded batch with explicit counts
#[derive(Debug, Clone)]
pub struct PaddedGraphBatch {
    /// `(B, N_max, F)`
    pub nodes: Tensor,
    /// Optional edge attributes `(B, E_max, F_e)`
    pub edges: Option<Tensor>,
    /// Local `(source, target)` pairs `(B, E_max, 2)`
    pub edge_indices: Tensor,
    /// `(B,)`
    pub node_count: Tensor,
    /// `(B,)`
    pub edge_count: Tensor,
}

/// Ragged batch, counts implied by the row splits
#[derive(Debug, Clone)]
pub struct RaggedGraphBatch {
    pub nodes: RaggedTensor,
    pub edges: Option<RaggedTensor>,
    /// Local `(source, target)` pairs, values `(E_total, 2)`
    pub edge_indices: RaggedTensor,
}

/// A batch in either input form
#[derive(Debug, Clone)]
pub enum GraphBatch {
    Padded(PaddedGraphBatch),
    Ragged(RaggedGraphBatch),
}

impl GraphBatch {
    /// Form of this batch
    pub fn tensor_type(&self) -> InputTensorType {
        match self {
            Self::Padded(_) => InputTensorType::Padded,
            Self::Ragged(_) => InputTensorType::Ragged,
        }
    }
}

/// Output of [`cast_input`]
#[derive(Debug, Clone)]
pub struct DisjointInputs {
    pub graph: DisjointGraph,
    /// Edge attributes in the same layout as `graph.edge_index`
    pub edge_attr: Option<Tensor>,
}

/// Output of [`cast_output`]
#[derive(Debug, Clone)]
pub enum CastOutput {
    Dense(Tensor),
    Ragged(RaggedTensor),
}

impl CastOutput {
    /// Dense tensor, if this is dense output
    pub fn as_dense(&self) -> Option<&Tensor> {
        match self {
            Self::Dense(t) => Some(t),
            Self::Ragged(_) => None,
        }
    }

    /// Ragged tensor, if this is ragged output
    pub fn as_ragged(&self) -> Option<&RaggedTensor> {
        match self {
            Self::Dense(_) => None,
            Self::Ragged(r) => Some(r),
        }
    }
}

// =============================================================================
// Casting at the model boundary
// =============================================================================

/// Cast a model's input batch to disjoint form.
///
/// # Errors
/// - [`GraphCoreError::Config`] if the batch form differs from `input_tensor_type`
/// - [`GraphCoreError::ShapeMismatch`] if edge attributes do not line up with the edge index
/// - Any error of the underlying casters
pub fn cast_input(
    batch: &GraphBatch,
    input_tensor_type: InputTensorType,
    config: CastDisjointConfig,
) -> Result<DisjointInputs> {
    if batch.tensor_type() != input_tensor_type {
        return Err(GraphCoreError::Config(format!(
            "model expects {} input but received a {} batch",
            input_tensor_type,
            batch.tensor_type()
        )));
    }

    let caster = BatchedCaster::new(config);
    let (graph, edge_attr) = match batch {
        GraphBatch::Padded(b) => {
            let graph =
                caster.cast_padded(&b.nodes, &b.edge_indices, &b.node_count, &b.edge_count)?;
            let edge_attr = b
                .edges
                .as_ref()
                .map(|e| caster.cast_attributes(e, &b.edge_count).map(|(flat, _, _)| flat))
                .transpose()?;
            (graph, edge_attr)
        }
        GraphBatch::Ragged(b) => {
            if let Some(e) = &b.edges {
                if e.row_splits() != b.edge_indices.row_splits() {
                    return Err(GraphCoreError::ShapeMismatch(format!(
                        "edge attribute row splits {:?} differ from edge index row splits {:?}",
                        e.row_splits(),
                        b.edge_indices.row_splits()
                    )));
                }
            }
            let graph = caster.cast_ragged(&b.nodes, &b.edge_indices)?;
            let edge_attr = b
                .edges
                .as_ref()
                .map(|e| caster.cast_ragged_attributes(e).map(|(flat, _, _)| flat))
                .transpose()?;
            (graph, edge_attr)
        }
    };

    if let Some(attr) = &edge_attr {
        let edges = graph.num_edges()?;
        if attr.dim(0)? != edges {
            return Err(GraphCoreError::ShapeMismatch(format!(
                "edge attributes cast to {} rows but the edge index has {} edges",
                attr.dim(0)?,
                edges
            )));
        }
    }
    Ok(DisjointInputs { graph, edge_attr })
}

/// Cast model output back to batched form.
///
/// Graph-level output is already batched and passes through unchanged after
/// checking it has one row per graph. Node and edge output is scattered with
/// the graph's index arrays; `max_per_graph` defaults to the largest count.
pub fn cast_output(
    values: &Tensor,
    graph: &DisjointGraph,
    output_embedding: OutputEmbedding,
    output_tensor_type: OutputTensorType,
    max_per_graph: Option<usize>,
) -> Result<CastOutput> {
    match output_embedding {
        OutputEmbedding::Graph => {
            let batch = graph.batch_size()?;
            if values.rank() == 0 || values.dim(0)? != batch {
                return Err(GraphCoreError::ShapeMismatch(format!(
                    "graph output has shape {:?} but the batch has {} graphs",
                    values.dims(),
                    batch
                )));
            }
            Ok(CastOutput::Dense(values.clone()))
        }
        OutputEmbedding::Node => match output_tensor_type {
            OutputTensorType::Padded => {
                let max = resolve_max(max_per_graph, graph.count_nodes_vec()?, graph)?;
                Ok(CastOutput::Dense(graph.nodes_to_batched(values, max)?))
            }
            OutputTensorType::Ragged => Ok(CastOutput::Ragged(graph.nodes_to_ragged(values)?)),
        },
        OutputEmbedding::Edge => match output_tensor_type {
            OutputTensorType::Padded => {
                let max = resolve_max(max_per_graph, graph.count_edges_vec()?, graph)?;
                Ok(CastOutput::Dense(graph.edges_to_batched(values, max)?))
            }
            OutputTensorType::Ragged => Ok(CastOutput::Ragged(graph.edges_to_ragged(values)?)),
        },
    }
}

/// Explicit size, or the largest count of a real graph
fn resolve_max(max_per_graph: Option<usize>, counts: Vec<usize>, graph: &DisjointGraph) -> Result<usize> {
    if let Some(max) = max_per_graph {
        return Ok(max);
    }
    let skip = usize::from(graph.padded_disjoint);
    Ok(counts.into_iter().skip(skip).max().unwrap_or(0))
}
