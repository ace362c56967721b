//! Batched ↔ Disjoint Casting
//!
//! Converts batches of variable-sized graphs between their batched forms
//! (zero-padded with counts, or ragged) and the flat disjoint-union form
//! message passing runs on.
//!
//! ## Submodules
//!
//! - [`batched`]: [`DisjointGraph`] and the forward casters
//! - [`ragged`]: [`RaggedTensor`] and the ragged attribute cast
//! - [`inverse`]: Disjoint → batched scatter
//! - [`template`]: Model-boundary configuration, [`cast_input`] and [`cast_output`]
//!
//! ## Invariants
//!
//! - Node `i` of graph `g` has global index `offset(g) + i`
//! - Every edge connects two nodes of its own graph
//! - `batch_id_*`, `*_id` and `count_*` always agree
//! - Index tensors produced here are `U32`

pub mod batched;
mod index;
pub mod inverse;
pub mod ragged;
pub mod template;

pub use batched::{
    cast_attributes, cast_attributes_padded_disjoint, cast_indices, cast_indices_padded_disjoint,
    cast_ragged_indices, BatchedCaster, DisjointGraph,
};
pub use index::exclusive_cumsum;
pub use inverse::cast_to_batched;
pub use ragged::{cast_ragged_attributes, RaggedTensor};
pub use template::{
    cast_input, cast_output, CastDisjointConfig, CastOutput, DisjointInputs, GraphBatch,
    InputTensorType, OutputEmbedding, OutputTensorType, PaddedGraphBatch, RaggedGraphBatch,
};
