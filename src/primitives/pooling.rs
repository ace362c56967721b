//! Graph Readout
//!
//! Reduce every node (or edge) row of a [`DisjointGraph`] into one row per
//! graph, using the batch assignment as the segment index:
//!
//! ```text
//! out[g] = REDUCE({ h[i] : batch_id[i] == g })
//! ```
//!
//! In padded-disjoint form the dump graph (id 0) is dropped, so the output
//! always has `B` rows.

use super::aggregate::{aggregate, ReductionMethod};
use crate::casting::DisjointGraph;
use crate::{GraphCoreError, Result};
use candle_core::Tensor;
use serde::{Deserialize, Serialize};

/// Reduce per-row values into per-graph rows and drop the dump graph.
fn pool(
    values: &Tensor,
    batch_id: &Tensor,
    graph: &DisjointGraph,
    method: ReductionMethod,
) -> Result<Tensor> {
    let segments = graph.num_graph_segments()?;
    let pooled = aggregate(values, batch_id, segments, method)?;
    if !graph.padded_disjoint {
        return Ok(pooled);
    }
    pooled
        .narrow(0, 1, segments - 1)
        .map_err(|e| GraphCoreError::Tensor(format!("pool drop dump graph failed: {}", e)))
}

/// Per-graph readout of node rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolingNodes {
    #[serde(rename = "pooling_method")]
    pub method: ReductionMethod,
}

impl PoolingNodes {
    pub fn new(method: ReductionMethod) -> Self {
        Self { method }
    }

    /// Pool `nodes` `(N_total, ...)` into `(B, ...)`
    pub fn forward(&self, nodes: &Tensor, graph: &DisjointGraph) -> Result<Tensor> {
        pool(nodes, &graph.batch_id_node, graph, self.method)
    }
}

/// Per-graph readout of edge rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolingEdges {
    #[serde(rename = "pooling_method")]
    pub method: ReductionMethod,
}

impl PoolingEdges {
    pub fn new(method: ReductionMethod) -> Self {
        Self { method }
    }

    /// Pool `edges` `(E_total, ...)` into `(B, ...)`
    pub fn forward(&self, edges: &Tensor, graph: &DisjointGraph) -> Result<Tensor> {
        pool(edges, &graph.batch_id_edge, graph, self.method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::casting::{cast_indices, cast_indices_padded_disjoint};
    use candle_core::Device;

    fn device() -> Device {
        Device::Cpu
    }

    fn inputs() -> (Tensor, Tensor, Tensor, Tensor) {
        let nodes = Tensor::from_vec(
            vec![1.0f32, 9.0, 2.0, 4.0, 6.0, 8.0],
            (2, 3, 1),
            &device(),
        )
        .unwrap();
        let edges = Tensor::zeros((2, 1, 2), candle_core::DType::U32, &device()).unwrap();
        let node_count = Tensor::from_vec(vec![2u32, 3], 2, &device()).unwrap();
        let edge_count = Tensor::from_vec(vec![1u32, 0], 2, &device()).unwrap();
        (nodes, edges, node_count, edge_count)
    }

    #[test]
    fn test_pooling_nodes() {
        let (nodes, edges, nc, ec) = inputs();
        let graph = cast_indices(&nodes, &edges, &nc, &ec).unwrap();

        let sum = PoolingNodes::new(ReductionMethod::Sum)
            .forward(&graph.node_attr, &graph)
            .unwrap();
        // graph 0 keeps [1, 9]; graph 1 keeps [4, 6, 8]
        assert_eq!(sum.to_vec2::<f32>().unwrap(), vec![vec![10.0], vec![18.0]]);

        let mean = PoolingNodes::new(ReductionMethod::Mean)
            .forward(&graph.node_attr, &graph)
            .unwrap();
        assert_eq!(mean.to_vec2::<f32>().unwrap(), vec![vec![5.0], vec![6.0]]);
    }

    #[test]
    fn test_pooling_drops_dump_graph() {
        let (nodes, edges, nc, ec) = inputs();
        let graph = cast_indices_padded_disjoint(&nodes, &edges, &nc, &ec).unwrap();

        // padding row 2.0 must not leak into graph 0
        let max = PoolingNodes::new(ReductionMethod::Max)
            .forward(&graph.node_attr, &graph)
            .unwrap();
        assert_eq!(max.to_vec2::<f32>().unwrap(), vec![vec![9.0], vec![8.0]]);
    }

    #[test]
    fn test_pooling_edges() {
        let (nodes, edges, nc, ec) = inputs();
        let graph = cast_indices(&nodes, &edges, &nc, &ec).unwrap();
        let edge_values = Tensor::from_vec(vec![3.0f32], (1, 1), &device()).unwrap();
        let pooled = PoolingEdges::new(ReductionMethod::Sum)
            .forward(&edge_values, &graph)
            .unwrap();
        // graph 1 has no edges
        assert_eq!(pooled.to_vec2::<f32>().unwrap(), vec![vec![3.0], vec![0.0]]);
    }
}
