//! Ragged batch with weighted aggregation and label scaling
//!
//! Demonstrates: adjacency preprocessing → ragged cast → weighted aggregate
//! → readout → scaled loss → training history
//!
//! Run with:
//! ```bash
//! RUST_LOG=info cargo run --example ragged_readout
//! ```

use disjoint_gnn::primitives::adjacency::{
    convert_scaled_adjacency_to_list, make_adjacency_undirected_logical_or,
    precompute_adjacency_scaled,
};
use disjoint_gnn::prelude::*;
use disjoint_gnn::training::EpochRecord;

/// Edge list and GCN weights for one graph given as a dense adjacency
fn graph_edges(adj: Vec<f32>, n: usize, device: &Device) -> Result<(Tensor, Tensor)> {
    let adj = Tensor::from_vec(adj, (n, n), device)?;
    let adj = make_adjacency_undirected_logical_or(&adj)?;
    let scaled = precompute_adjacency_scaled(&adj, true)?;
    convert_scaled_adjacency_to_list(&scaled)
}

fn main() -> Result<()> {
    env_logger::init();

    let device = cpu_device();

    // 1. Two graphs of different size: a path 0-1-2 and a single edge 0-1
    let (edges_a, weights_a) = graph_edges(
        vec![0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
        3,
        &device,
    )?;
    let (edges_b, weights_b) = graph_edges(vec![0.0, 1.0, 0.0, 0.0], 2, &device)?;

    let nodes = RaggedTensor::from_rows(&[
        Tensor::from_vec(vec![1.0f32, 2.0, 3.0], (3, 1), &device)?,
        Tensor::from_vec(vec![10.0f32, 20.0], (2, 1), &device)?,
    ])?;
    let edge_indices = RaggedTensor::from_rows(&[edges_a, edges_b])?;
    let weights = Tensor::cat(&[&weights_a, &weights_b], 0)?;

    // 2. Cast the ragged batch
    let graph = cast_input(
        &GraphBatch::Ragged(RaggedGraphBatch {
            nodes,
            edges: None,
            edge_indices,
        }),
        InputTensorType::Ragged,
        CastDisjointConfig::default(),
    )?
    .graph;
    println!(
        "{} nodes, {} edges (self-loops included)",
        graph.num_nodes()?,
        graph.num_edges()?
    );

    // 3. GCN-style propagation: scaled neighbour sum
    let sources = graph.edge_index.get(0)?;
    let messages = graph.node_attr.index_select(&sources, 0)?;
    let propagated = AggregateWeightedLocalEdges::new(ReductionMethod::Sum, false).forward(
        &graph.node_attr,
        &messages,
        &graph.edge_index,
        &weights,
    )?;
    let prediction = PoolingNodes::new(ReductionMethod::Mean).forward(&propagated, &graph)?;
    println!("prediction: {:?}", prediction.to_vec2::<f32>()?);

    // 4. Compare against scaled labels and keep a history
    let labels = Tensor::from_vec(vec![2.5f32, 14.0], (2, 1), &device)?;
    let mut scaler = StandardLabelScaler::new();
    let scaled_labels = scaler.fit_transform(&labels)?;
    let scaled_prediction = scaler.transform(&prediction)?;

    let loss = (scaled_prediction - &scaled_labels)?
        .sqr()?
        .mean_all()?
        .to_scalar::<f32>()?;

    let mut history = TrainingHistory::new("GCN");
    history.record(EpochRecord::new(0, loss as f64).with_metric("mse_scaled", loss as f64));
    println!("{}", history.to_json()?);

    Ok(())
}
