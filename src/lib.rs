//! # disjoint-gnn
//!
//! Batched-to-disjoint graph casting and segment aggregation for graph neural
//! networks, built on candle tensors.
//!
//! ## Overview
//!
//! Graph models train on batches of variable-sized graphs. Those batches arrive
//! either zero-padded to a common size (with explicit per-graph counts) or as
//! ragged sequences. Message passing, however, wants one flat "disjoint union"
//! graph: every node and edge of the batch concatenated, with globally unique
//! node ids and a batch assignment per element.
//!
//! Core capabilities:
//!
//! - **Casting**: padded / ragged batches → [`casting::DisjointGraph`] and back
//! - **Aggregate**: segment-wise sum / mean / max / min scatter reductions
//! - **Pooling**: per-graph readout over the disjoint representation
//! - **Adjacency**: dataset-side adjacency scaling and edge-list utilities
//! - **Training glue**: history, label scaling and hyperparameter records
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use disjoint_gnn::prelude::*;
//!
//! let device = best_device();
//! // (B=2, N_max=2, F=2) nodes, (B=2, E_max=4, 2) local edge pairs
//! let graph = cast_indices(&nodes, &edge_index, &node_count, &edge_count)?;
//!
//! // One message per edge, summed into its target node
//! let messages = graph.node_attr.index_select(&graph.edge_index.get(0)?, 0)?;
//! let updated = AggregateLocalEdges::new(ReductionMethod::Sum)
//!     .forward(&graph.node_attr, &messages, &graph.edge_index)?;
//!
//! // Back to (B, N_max, F) for the loss
//! let batched = graph.nodes_to_batched(&updated, 2)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `metal`: Apple Metal GPU acceleration
//! - `cuda`: NVIDIA CUDA GPU acceleration

pub mod casting;
pub mod primitives;
pub mod training;

// Re-export candle types for convenience
pub use candle_core::{DType, Device, Tensor};

/// Error types for graph casting and aggregation
#[derive(Debug, thiserror::Error)]
pub enum GraphCoreError {
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Edge index {index} out of graph {graph} with {count} nodes")]
    IndexOutOfGraph { graph: usize, index: i64, count: usize },

    #[error("Segment index {index} at position {position} out of range for {num_segments} segments")]
    SegmentIndexOutOfRange {
        position: usize,
        index: i64,
        num_segments: usize,
    },

    #[error("Unsupported reduction method: {0}")]
    UnsupportedReductionMethod(String),

    #[error("Tensor operation failed: {0}")]
    Tensor(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),
}

/// Result type alias for casting and aggregation operations
pub type Result<T> = std::result::Result<T, GraphCoreError>;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{DType, Device, Tensor};
    pub use crate::{GraphCoreError, Result};

    // Device selection
    pub use crate::primitives::{
        best_device, cpu_device, cuda_available, gpu_available, gpu_disabled, metal_available,
    };

    // Segment reductions and readout
    pub use crate::primitives::{
        aggregate, Aggregate, AggregateLocalEdges, AggregateWeightedLocalEdges, PoolingEdges,
        PoolingNodes, ReductionMethod,
    };

    // Casting
    pub use crate::casting::{
        cast_attributes, cast_indices, cast_input, cast_output, cast_ragged_attributes,
        cast_ragged_indices, cast_to_batched, BatchedCaster, CastDisjointConfig, CastOutput,
        DisjointGraph, DisjointInputs, GraphBatch, InputTensorType, OutputEmbedding,
        OutputTensorType, PaddedGraphBatch, RaggedGraphBatch, RaggedTensor,
    };

    // Training glue
    pub use crate::training::{HyperParameter, StandardLabelScaler, TrainingHistory};
}
