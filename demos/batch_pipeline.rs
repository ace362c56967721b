//! Padded batch through one message-passing step
//!
//! Demonstrates: cast → gather messages → aggregate → readout → cast back
//!
//! Run with:
//! ```bash
//! RUST_LOG=debug cargo run --example batch_pipeline
//! ```

use disjoint_gnn::prelude::*;

fn main() -> Result<()> {
    env_logger::init();

    let device = best_device();

    // 1. A padded batch of two graphs (N_max = 3, E_max = 4)
    //
    //   graph 0: triangle 0 → 1 → 2 → 0
    //   graph 1: 0 ↔ 1, third slot is padding
    let nodes = Tensor::from_vec(
        vec![
            1.0f32, 0.0, 0.0, 1.0, 1.0, 1.0, //
            2.0, 2.0, 3.0, 3.0, 0.0, 0.0,
        ],
        (2, 3, 2),
        &device,
    )?;
    let edge_indices = Tensor::from_vec(
        vec![
            0u32, 1, 1, 2, 2, 0, 0, 0, //
            0, 1, 1, 0, 0, 0, 0, 0,
        ],
        (2, 4, 2),
        &device,
    )?;
    let batch = GraphBatch::Padded(PaddedGraphBatch {
        nodes,
        edges: None,
        edge_indices,
        node_count: Tensor::from_vec(vec![3u32, 2], 2, &device)?,
        edge_count: Tensor::from_vec(vec![3u32, 2], 2, &device)?,
    });

    for padded_disjoint in [false, true] {
        let config = CastDisjointConfig { padded_disjoint };

        // 2. Cast to one disjoint graph
        let graph = cast_input(&batch, InputTensorType::Padded, config)?.graph;
        println!(
            "\n--- padded_disjoint = {} ---\n{} nodes, {} edges, {} graphs",
            padded_disjoint,
            graph.num_nodes()?,
            graph.num_edges()?,
            graph.batch_size()?
        );
        println!("batch_id_node: {:?}", graph.batch_id_node_vec()?);
        println!("edge pairs:    {:?}", graph.edge_pairs()?);

        // 3. Each edge carries its source node's features to its target
        let sources = graph.edge_index.get(0)?;
        let messages = graph.node_attr.index_select(&sources, 0)?;
        let updated = AggregateLocalEdges::new(ReductionMethod::Mean).forward(
            &graph.node_attr,
            &messages,
            &graph.edge_index,
        )?;

        // 4. Graph-level readout
        let readout = PoolingNodes::new(ReductionMethod::Sum).forward(&updated, &graph)?;
        println!("readout: {:?}", readout.to_vec2::<f32>()?);

        // 5. Node-level output back to (B, N_max, F)
        let per_node = cast_output(
            &updated,
            &graph,
            OutputEmbedding::Node,
            OutputTensorType::Padded,
            Some(3),
        )?;
        if let Some(dense) = per_node.as_dense() {
            println!("per-node output: {:?}", dense.to_vec3::<f32>()?);
        }
    }

    Ok(())
}
