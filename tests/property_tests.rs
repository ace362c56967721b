//! Property-based tests for disjoint casting and segment aggregation.
//!
//! These tests verify invariants that should hold for any batch:
//! - Round trip: batched → disjoint → batched restores valid positions
//! - No edge ever crosses a graph boundary
//! - Aggregation does not depend on row order

use disjoint_gnn::casting::{cast_attributes_padded_disjoint, cast_indices_padded_disjoint};
use disjoint_gnn::prelude::*;
use proptest::prelude::*;

/// One graph: node count and local edge pairs
type Graph = (usize, Vec<(usize, usize)>);

fn arb_graph() -> impl Strategy<Value = Graph> {
    (0usize..5, prop::collection::vec((0usize..16, 0usize..16), 0..6)).prop_map(|(n, raw)| {
        let edges = if n == 0 {
            Vec::new()
        } else {
            raw.into_iter().map(|(a, b)| (a % n, b % n)).collect()
        };
        (n, edges)
    })
}

fn arb_batch() -> impl Strategy<Value = Vec<Graph>> {
    prop::collection::vec(arb_graph(), 1..5)
}

/// Padded tensors for a batch. Valid node `i` of graph `g` carries
/// `[g * 100 + i + 1, -(g * 100 + i + 1)]`; padding is filled with 999.
struct Padded {
    nodes: Tensor,
    edges: Tensor,
    node_count: Tensor,
    edge_count: Tensor,
    n_max: usize,
}

fn padded(batch: &[Graph]) -> Padded {
    let device = Device::Cpu;
    let b = batch.len();
    let n_max = batch.iter().map(|(n, _)| *n).max().unwrap_or(0).max(1);
    let e_max = batch.iter().map(|(_, e)| e.len()).max().unwrap_or(0).max(1);

    let mut nodes = vec![999.0f32; b * n_max * 2];
    let mut edges = vec![0u32; b * e_max * 2];
    for (g, (n, pairs)) in batch.iter().enumerate() {
        for i in 0..*n {
            let v = (g * 100 + i + 1) as f32;
            nodes[(g * n_max + i) * 2] = v;
            nodes[(g * n_max + i) * 2 + 1] = -v;
        }
        for (j, (s, t)) in pairs.iter().enumerate() {
            edges[(g * e_max + j) * 2] = *s as u32;
            edges[(g * e_max + j) * 2 + 1] = *t as u32;
        }
    }
    let node_count: Vec<u32> = batch.iter().map(|(n, _)| *n as u32).collect();
    let edge_count: Vec<u32> = batch.iter().map(|(_, e)| e.len() as u32).collect();

    Padded {
        nodes: Tensor::from_vec(nodes, (b, n_max, 2), &device).unwrap(),
        edges: Tensor::from_vec(edges, (b, e_max, 2), &device).unwrap(),
        node_count: Tensor::from_vec(node_count, b, &device).unwrap(),
        edge_count: Tensor::from_vec(edge_count, b, &device).unwrap(),
        n_max,
    }
}

mod casting_props {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn round_trip_restores_valid_positions(batch in arb_batch()) {
            let p = padded(&batch);
            let (flat, batch_id, local_id) = cast_attributes(&p.nodes, &p.node_count).unwrap();
            let back = cast_to_batched(&flat, &batch_id, &local_id, batch.len(), p.n_max).unwrap();

            let original = p.nodes.to_vec3::<f32>().unwrap();
            let restored = back.to_vec3::<f32>().unwrap();
            for (g, (n, _)) in batch.iter().enumerate() {
                for i in 0..p.n_max {
                    if i < *n {
                        prop_assert_eq!(&restored[g][i], &original[g][i]);
                    } else {
                        prop_assert_eq!(&restored[g][i], &vec![0.0f32, 0.0]);
                    }
                }
            }
        }

        #[test]
        fn padded_disjoint_round_trip_restores_valid_positions(batch in arb_batch()) {
            let p = padded(&batch);
            let (flat, batch_id, local_id) =
                cast_attributes_padded_disjoint(&p.nodes, &p.node_count).unwrap();
            let graph = cast_indices_padded_disjoint(
                &p.nodes, &p.edges, &p.node_count, &p.edge_count,
            ).unwrap();

            // attribute cast lines up with the node branch
            prop_assert_eq!(
                batch_id.to_vec1::<u32>().unwrap(),
                graph.batch_id_node.to_vec1::<u32>().unwrap()
            );
            prop_assert_eq!(
                local_id.to_vec1::<u32>().unwrap(),
                graph.node_id.to_vec1::<u32>().unwrap()
            );

            let back = graph.nodes_to_batched(&flat, p.n_max).unwrap();
            let original = p.nodes.to_vec3::<f32>().unwrap();
            let restored = back.to_vec3::<f32>().unwrap();
            for (g, (n, _)) in batch.iter().enumerate() {
                for i in 0..p.n_max {
                    if i < *n {
                        prop_assert_eq!(&restored[g][i], &original[g][i]);
                    } else {
                        prop_assert_eq!(&restored[g][i], &vec![0.0f32, 0.0]);
                    }
                }
            }
        }

        #[test]
        fn no_cross_graph_edges(batch in arb_batch()) {
            let p = padded(&batch);
            let graph = cast_indices(&p.nodes, &p.edges, &p.node_count, &p.edge_count).unwrap();

            let batch_node = graph.batch_id_node_vec().unwrap();
            let batch_edge = graph.batch_id_edge_vec().unwrap();
            for (j, [s, t]) in graph.edge_pairs().unwrap().into_iter().enumerate() {
                prop_assert_eq!(batch_node[s], batch_edge[j]);
                prop_assert_eq!(batch_node[t], batch_edge[j]);
            }
            let total_edges: usize = batch.iter().map(|(_, e)| e.len()).sum();
            prop_assert_eq!(graph.num_edges().unwrap(), total_edges);
        }

        #[test]
        fn padding_never_reaches_disjoint_nodes(batch in arb_batch()) {
            let p = padded(&batch);
            let graph = cast_indices(&p.nodes, &p.edges, &p.node_count, &p.edge_count).unwrap();
            let values: Vec<f32> = graph.node_attr.flatten_all().unwrap().to_vec1().unwrap();
            prop_assert!(values.iter().all(|v| *v != 999.0));
        }

        #[test]
        fn padded_disjoint_routes_padding_to_dump(batch in arb_batch()) {
            let p = padded(&batch);
            let graph = cast_indices_padded_disjoint(
                &p.nodes, &p.edges, &p.node_count, &p.edge_count,
            ).unwrap();

            let batch_node = graph.batch_id_node_vec().unwrap();
            let batch_edge = graph.batch_id_edge_vec().unwrap();
            for (j, [s, t]) in graph.edge_pairs().unwrap().into_iter().enumerate() {
                prop_assert_eq!(batch_node[s], batch_edge[j]);
                prop_assert_eq!(batch_node[t], batch_edge[j]);
                if batch_edge[j] == 0 {
                    prop_assert_eq!((s, t), (0, 0));
                }
            }
            let counts = graph.count_nodes_vec().unwrap();
            prop_assert_eq!(counts.iter().sum::<usize>(), graph.num_nodes().unwrap());

            // read-out never sees the 999 padding
            let pooled = PoolingNodes::new(ReductionMethod::Max)
                .forward(&graph.node_attr, &graph)
                .unwrap();
            prop_assert_eq!(pooled.dims(), &[batch.len(), 2]);
            let values: Vec<f32> = pooled.flatten_all().unwrap().to_vec1().unwrap();
            prop_assert!(values.iter().all(|v| *v != 999.0));
        }

        #[test]
        fn pooled_sum_matches_per_graph_sum(batch in arb_batch()) {
            let p = padded(&batch);
            let graph = cast_indices(&p.nodes, &p.edges, &p.node_count, &p.edge_count).unwrap();
            let pooled = PoolingNodes::new(ReductionMethod::Sum)
                .forward(&graph.node_attr, &graph)
                .unwrap()
                .to_vec2::<f32>()
                .unwrap();
            for (g, (n, _)) in batch.iter().enumerate() {
                let expected: f32 = (0..*n).map(|i| (g * 100 + i + 1) as f32).sum();
                prop_assert_eq!(pooled[g][0], expected);
            }
        }
    }
}

mod aggregate_props {
    use super::*;

    /// Integer-valued rows (exact in f32) with a permutation of them
    fn arb_rows() -> impl Strategy<Value = (usize, Vec<(i32, usize)>, Vec<usize>)> {
        (1usize..6)
            .prop_flat_map(|segments| {
                (
                    Just(segments),
                    prop::collection::vec((-100i32..100, 0..segments), 0..24),
                )
            })
            .prop_flat_map(|(segments, rows)| {
                let order: Vec<usize> = (0..rows.len()).collect();
                (Just(segments), Just(rows), Just(order).prop_shuffle())
            })
    }

    fn tensors(rows: &[(i32, usize)]) -> (Tensor, Tensor) {
        let values: Vec<f32> = rows.iter().map(|(v, _)| *v as f32).collect();
        let index: Vec<u32> = rows.iter().map(|(_, s)| *s as u32).collect();
        (
            Tensor::from_vec(values, (rows.len(), 1), &Device::Cpu).unwrap(),
            Tensor::from_vec(index, rows.len(), &Device::Cpu).unwrap(),
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn aggregation_is_order_invariant((segments, rows, order) in arb_rows()) {
            let permuted: Vec<(i32, usize)> = order.iter().map(|&i| rows[i]).collect();
            let (values, index) = tensors(&rows);
            let (p_values, p_index) = tensors(&permuted);

            for &method in ReductionMethod::all() {
                let a = aggregate(&values, &index, segments, method).unwrap().to_vec2::<f32>().unwrap();
                let b = aggregate(&p_values, &p_index, segments, method).unwrap().to_vec2::<f32>().unwrap();
                for (x, y) in a.iter().flatten().zip(b.iter().flatten()) {
                    prop_assert!((x - y).abs() < 1e-4, "{} differs: {} vs {}", method, x, y);
                }
            }
        }

        #[test]
        fn aggregate_matches_reference((segments, rows, _order) in arb_rows()) {
            let (values, index) = tensors(&rows);
            let sum = aggregate(&values, &index, segments, ReductionMethod::Sum).unwrap().to_vec2::<f32>().unwrap();
            let max = aggregate(&values, &index, segments, ReductionMethod::Max).unwrap().to_vec2::<f32>().unwrap();

            for k in 0..segments {
                let members: Vec<f32> = rows.iter().filter(|(_, s)| *s == k).map(|(v, _)| *v as f32).collect();
                prop_assert_eq!(sum[k][0], members.iter().sum::<f32>());
                let expected_max = members.iter().copied().reduce(f32::max).unwrap_or(0.0);
                prop_assert_eq!(max[k][0], expected_max);
            }
        }
    }
}
