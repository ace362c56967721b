//! Adjacency preprocessing
//!
//! Dataset-side utilities run once per graph before batching: scaling a
//! dense adjacency matrix, turning it into an edge list with weights, and
//! tidying edge lists (self-loops, ordering).
//!
//! | Function | Result |
//! |---|---|
//! | [`row_normalize`] | `D⁻¹ A` |
//! | [`precompute_adjacency_scaled`] | `D_r^-½ (A + I) D_c^-½` |
//! | [`make_adjacency_undirected_logical_or`] | `max(A, Aᵀ)` |
//! | [`convert_scaled_adjacency_to_list`] | `(edge_index (E, 2), weights (E,))` |
//! | [`add_self_loops_to_edge_indices`] | edge list with `[i, i]` for every node |
//! | [`sort_edge_indices`] | edge list ordered by `(source, target)` |
//!
//! Edge lists are host `[source, target]` pairs; edge values travel as a
//! tensor with one leading row per edge.

use super::tensor_ops::index_tensor;
use crate::{GraphCoreError, Result};
use candle_core::{DType, Tensor};
use std::collections::BTreeMap;

// =============================================================================
// Dense adjacency scaling
// =============================================================================

fn square_dim(adj: &Tensor) -> Result<usize> {
    match adj.dims() {
        [n, m] if n == m => Ok(*n),
        dims => Err(GraphCoreError::ShapeMismatch(format!(
            "adjacency must be square (N, N), got {:?}",
            dims
        ))),
    }
}

/// Row-stochastic adjacency `D⁻¹ A`, rows of isolated nodes stay 0.
pub fn row_normalize(adj: &Tensor) -> Result<Tensor> {
    square_dim(adj)?;
    let inv_degree = adj
        .sum_keepdim(1)
        .map_err(|e| GraphCoreError::Tensor(format!("row_normalize degree failed: {}", e)))
        .and_then(|d| inverse_degree(&d, false))?;
    adj.broadcast_mul(&inv_degree)
        .map_err(|e| GraphCoreError::Tensor(format!("row_normalize scale failed: {}", e)))
}

/// `d⁻¹` (or `d^-½` with `sqrt`), mapping zero or negative degrees to 0
/// instead of inf.
fn inverse_degree(d: &Tensor, sqrt: bool) -> Result<Tensor> {
    let positive = d
        .gt(0.0)
        .map_err(|e| GraphCoreError::Tensor(format!("degree mask failed: {}", e)))?;
    // Clamp first so masked-out entries stay finite
    let clamped = d
        .maximum(1e-30)
        .map_err(|e| GraphCoreError::Tensor(format!("degree clamp failed: {}", e)))?;
    let inv = if sqrt { clamped.sqrt() } else { Ok(clamped) }
        .and_then(|t| t.recip())
        .map_err(|e| GraphCoreError::Tensor(format!("degree inverse failed: {}", e)))?;
    let zeros = inv
        .zeros_like()
        .map_err(|e| GraphCoreError::Tensor(format!("degree zeros failed: {}", e)))?;
    positive
        .where_cond(&inv, &zeros)
        .map_err(|e| GraphCoreError::Tensor(format!("degree select failed: {}", e)))
}

/// Scaled adjacency `D_r^-½ (A + I) D_c^-½`.
///
/// Row degrees scale rows and column degrees scale columns, so directed
/// graphs are handled. Rows or columns with zero degree scale to 0.
pub fn precompute_adjacency_scaled(adj: &Tensor, add_identity: bool) -> Result<Tensor> {
    let n = square_dim(adj)?;
    let adj = if add_identity {
        let eye = Tensor::eye(n, adj.dtype(), adj.device())
            .map_err(|e| GraphCoreError::Tensor(format!("eye failed: {}", e)))?;
        (adj + &eye).map_err(|e| GraphCoreError::Tensor(format!("add identity failed: {}", e)))?
    } else {
        adj.clone()
    };

    let d_row = adj
        .sum_keepdim(1)
        .map_err(|e| GraphCoreError::Tensor(format!("row degree failed: {}", e)))
        .and_then(|d| inverse_degree(&d, true))?;
    let d_col = adj
        .sum_keepdim(0)
        .map_err(|e| GraphCoreError::Tensor(format!("column degree failed: {}", e)))
        .and_then(|d| inverse_degree(&d, true))?;

    adj.broadcast_mul(&d_row)
        .and_then(|t| t.broadcast_mul(&d_col))
        .map_err(|e| GraphCoreError::Tensor(format!("adjacency scaling failed: {}", e)))
}

/// Symmetrise by elementwise maximum: an edge exists if it exists in either
/// direction, keeping the larger weight.
pub fn make_adjacency_undirected_logical_or(adj: &Tensor) -> Result<Tensor> {
    square_dim(adj)?;
    let transposed = adj
        .t()
        .map_err(|e| GraphCoreError::Tensor(format!("transpose failed: {}", e)))?;
    adj.maximum(&transposed)
        .map_err(|e| GraphCoreError::Tensor(format!("undirected max failed: {}", e)))
}

/// Edge list of the strictly positive entries, in row-major order.
///
/// # Returns
/// - `edge_index`: `(E, 2)` U32 `[row, col]` pairs
/// - `weights`: `(E,)` matching entries, same dtype as `adj`
pub fn convert_scaled_adjacency_to_list(adj: &Tensor) -> Result<(Tensor, Tensor)> {
    square_dim(adj)?;
    let rows = adj
        .to_dtype(DType::F64)
        .and_then(|t| t.to_vec2::<f64>())
        .map_err(|e| GraphCoreError::Tensor(format!("adjacency readback failed: {}", e)))?;

    let mut pairs = Vec::new();
    let mut weights = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        for (j, &w) in row.iter().enumerate() {
            if w > 0.0 {
                pairs.extend_from_slice(&[i, j]);
                weights.push(w);
            }
        }
    }

    let e = weights.len();
    let edge_index = index_tensor(&pairs, (e, 2), adj.device())?;
    let weights = Tensor::from_vec(weights, e, adj.device())
        .and_then(|t| t.to_dtype(adj.dtype()))
        .map_err(|e| GraphCoreError::Tensor(format!("edge weights failed: {}", e)))?;
    Ok((edge_index, weights))
}

// =============================================================================
// Edge lists
// =============================================================================

fn check_values(edges: &[[usize; 2]], values: Option<&Tensor>) -> Result<()> {
    if let Some(v) = values {
        if v.rank() == 0 || v.dim(0)? != edges.len() {
            return Err(GraphCoreError::ShapeMismatch(format!(
                "edge values have shape {:?} for {} edges",
                v.dims(),
                edges.len()
            )));
        }
    }
    Ok(())
}

/// Reorder value rows to follow `order`.
fn permute_values(values: Option<&Tensor>, order: &[usize]) -> Result<Option<Tensor>> {
    values
        .map(|v| {
            if order.is_empty() {
                let mut dims = v.dims().to_vec();
                dims[0] = 0;
                return Tensor::zeros(dims, v.dtype(), v.device())
                    .map_err(|e| GraphCoreError::Tensor(format!("empty values failed: {}", e)));
            }
            let index = index_tensor(order, order.len(), v.device())?;
            v.index_select(&index, 0)
                .map_err(|e| GraphCoreError::Tensor(format!("permute values failed: {}", e)))
        })
        .transpose()
}

/// Positions of `edges` in stable `(source, target)` order
fn sorted_order(edges: &[[usize; 2]]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..edges.len()).collect();
    order.sort_by_key(|&i| edges[i]);
    order
}

/// Sort an edge list by `(source, target)`, carrying value rows along.
///
/// The sort is stable: equal pairs keep their relative order.
pub fn sort_edge_indices(
    edges: &[[usize; 2]],
    values: Option<&Tensor>,
) -> Result<(Vec<[usize; 2]>, Option<Tensor>)> {
    check_values(edges, values)?;
    let order = sorted_order(edges);
    let sorted = order.iter().map(|&i| edges[i]).collect();
    Ok((sorted, permute_values(values, &order)?))
}

/// Add `[i, i]` for every node `0..=max index`, filling new value rows with 1.
///
/// With `remove_duplicates` only the first occurrence of each pair survives
/// (so an existing self-loop keeps its value) and pairs come out in
/// `(source, target)` order. With `sort` the result is ordered by
/// `(source, target)` as in [`sort_edge_indices`].
pub fn add_self_loops_to_edge_indices(
    edges: &[[usize; 2]],
    values: Option<&Tensor>,
    remove_duplicates: bool,
    sort: bool,
) -> Result<(Vec<[usize; 2]>, Option<Tensor>)> {
    check_values(edges, values)?;
    let num_nodes = edges
        .iter()
        .flat_map(|p| p.iter().copied())
        .max()
        .map_or(0, |m| m + 1);

    let mut combined: Vec<[usize; 2]> = edges.to_vec();
    combined.extend((0..num_nodes).map(|i| [i, i]));

    let values = values
        .map(|v| {
            let mut dims = v.dims().to_vec();
            dims[0] = num_nodes;
            Tensor::ones(dims, v.dtype(), v.device())
                .and_then(|ones| Tensor::cat(&[v, &ones], 0))
                .map_err(|e| GraphCoreError::Tensor(format!("self-loop values failed: {}", e)))
        })
        .transpose()?;

    let mut order: Vec<usize> = if remove_duplicates {
        let mut first: BTreeMap<[usize; 2], usize> = BTreeMap::new();
        for (i, pair) in combined.iter().enumerate() {
            first.entry(*pair).or_insert(i);
        }
        first.into_values().collect()
    } else {
        (0..combined.len()).collect()
    };
    if sort {
        order.sort_by_key(|&i| combined[i]);
    }

    let result = order.iter().map(|&i| combined[i]).collect();
    Ok((result, permute_values(values.as_ref(), &order)?))
}
