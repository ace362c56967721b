//! Graph Tensor Primitives
//!
//! Device selection, segment reductions, per-graph pooling and adjacency
//! utilities for tensors in disjoint layout.
//!
//! ## Contents
//!
//! - [`best_device`], [`index_values`], [`index_tensor`]: Device selection and host/tensor index conversion
//! - [`aggregate()`], [`ReductionMethod`]: Segment-scatter reductions (sum, mean, max, min)
//! - [`PoolingNodes`], [`PoolingEdges`]: Per-graph readout over a [`crate::casting::DisjointGraph`]
//! - [`adjacency`]: Adjacency scaling and edge-list preprocessing

pub mod adjacency;
mod aggregate;
mod pooling;
mod tensor_ops;

// Re-export all primitives at module level
pub use aggregate::*;
pub use pooling::*;
pub use tensor_ops::*;
