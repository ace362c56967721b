//! Segment Aggregation
//!
//! The message-passing primitive: reduce a flat sequence of rows into
//! `num_segments` output rows, grouped by a destination index per row.
//!
//! ```text
//! out[k] = REDUCE({ values[i] : index[i] == k })
//! ```
//!
//! | Method | Empty segment | Kernel |
//! |---|---|---|
//! | [`ReductionMethod::Sum`] | 0 | zero-initialised `index_add` |
//! | [`ReductionMethod::Mean`] | 0 | sum / max(count, 1) |
//! | [`ReductionMethod::Max`] | 0 | one gather + `maximum` per degree round |
//! | [`ReductionMethod::Min`] | 0 | one gather + `minimum` per degree round |
//!
//! The reduction runs over the leading axis only, so `values` may have any
//! feature rank. Results are invariant to the order of `(values, index)` pairs
//! up to floating point summation order.

use crate::primitives::tensor_ops::{index_tensor, index_values, row_broadcast_shape};
use crate::{GraphCoreError, Result};
use candle_core::{DType, Tensor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

// =============================================================================
// Reduction methods
// =============================================================================

/// Reduction applied per segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReductionMethod {
    /// Sum of contributing rows
    #[default]
    Sum,
    /// Mean of contributing rows
    Mean,
    /// Elementwise maximum of contributing rows
    Max,
    /// Elementwise minimum of contributing rows
    Min,
}

/// Every accepted method name, resolved in one place.
///
/// The `scatter_*` and `segment_*` spellings are the names model
/// hyperparameter files use for the same reductions.
pub const REDUCTION_NAMES: &[(&str, ReductionMethod)] = &[
    ("sum", ReductionMethod::Sum),
    ("scatter_sum", ReductionMethod::Sum),
    ("segment_sum", ReductionMethod::Sum),
    ("mean", ReductionMethod::Mean),
    ("scatter_mean", ReductionMethod::Mean),
    ("segment_mean", ReductionMethod::Mean),
    ("max", ReductionMethod::Max),
    ("scatter_max", ReductionMethod::Max),
    ("segment_max", ReductionMethod::Max),
    ("min", ReductionMethod::Min),
    ("scatter_min", ReductionMethod::Min),
    ("segment_min", ReductionMethod::Min),
];

/// Reduction kernel: `(values, segment per row, num_segments) -> reduced`
pub type SegmentReducer = fn(&Tensor, &[usize], usize) -> Result<Tensor>;

impl ReductionMethod {
    /// Canonical name of the method
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Max => "max",
            Self::Min => "min",
        }
    }

    /// Kernel implementing this reduction
    pub fn reducer(&self) -> SegmentReducer {
        match self {
            Self::Sum => segment_sum,
            Self::Mean => segment_mean,
            Self::Max => segment_max,
            Self::Min => segment_min,
        }
    }

    /// Get all methods
    pub fn all() -> &'static [ReductionMethod] {
        &[Self::Sum, Self::Mean, Self::Max, Self::Min]
    }
}

impl FromStr for ReductionMethod {
    type Err = GraphCoreError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase();
        REDUCTION_NAMES
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, method)| *method)
            .ok_or_else(|| GraphCoreError::UnsupportedReductionMethod(s.to_string()))
    }
}

impl TryFrom<String> for ReductionMethod {
    type Error = GraphCoreError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ReductionMethod> for String {
    fn from(method: ReductionMethod) -> Self {
        method.name().to_string()
    }
}

impl fmt::Display for ReductionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// aggregate
// =============================================================================

/// Reduce `values` into `num_segments` rows grouped by `index`.
///
/// # Arguments
/// - `values`: Rows to reduce `[E, ...]`
/// - `index`: Destination segment per row `[E]`, integer dtype
/// - `num_segments`: Number of output rows
/// - `method`: Reduction to apply
///
/// # Returns
/// Reduced rows `[num_segments, ...]`. Segments nobody writes to are 0.
///
/// # Errors
/// - [`GraphCoreError::ShapeMismatch`] if `index` is not a vector of length `E`
/// - [`GraphCoreError::SegmentIndexOutOfRange`] if any index is outside `[0, num_segments)`
pub fn aggregate(
    values: &Tensor,
    index: &Tensor,
    num_segments: usize,
    method: ReductionMethod,
) -> Result<Tensor> {
    let segments = segment_ids(values, index, num_segments)?;
    debug!(
        method = method.name(),
        rows = segments.len(),
        num_segments,
        "aggregate"
    );
    method.reducer()(values, &segments, num_segments)
}

/// Validate `index` against `values` and read it back as segment ids.
fn segment_ids(values: &Tensor, index: &Tensor, num_segments: usize) -> Result<Vec<usize>> {
    if values.rank() == 0 {
        return Err(GraphCoreError::ShapeMismatch(
            "aggregate values must have a leading row axis, got a scalar".into(),
        ));
    }
    if index.rank() != 1 {
        return Err(GraphCoreError::ShapeMismatch(format!(
            "aggregate index must be a vector, got shape {:?}",
            index.dims()
        )));
    }
    let rows = values.dim(0)?;
    if index.dim(0)? != rows {
        return Err(GraphCoreError::ShapeMismatch(format!(
            "aggregate index has {} entries but values have {} rows",
            index.dim(0)?,
            rows
        )));
    }

    index_values(index)?
        .into_iter()
        .enumerate()
        .map(|(position, idx)| {
            usize::try_from(idx)
                .ok()
                .filter(|&k| k < num_segments)
                .ok_or(GraphCoreError::SegmentIndexOutOfRange {
                    position,
                    index: idx,
                    num_segments,
                })
        })
        .collect()
}

/// Output shape `[num_segments, ...feature dims]`
fn segment_shape(values: &Tensor, num_segments: usize) -> Vec<usize> {
    let mut dims = values.dims().to_vec();
    dims[0] = num_segments;
    dims
}

/// Number of rows per segment
fn segment_counts(segments: &[usize], num_segments: usize) -> Vec<usize> {
    let mut counts = vec![0usize; num_segments];
    for &s in segments {
        counts[s] += 1;
    }
    counts
}

fn segment_sum(values: &Tensor, segments: &[usize], num_segments: usize) -> Result<Tensor> {
    let zeros = Tensor::zeros(
        segment_shape(values, num_segments),
        values.dtype(),
        values.device(),
    )
    .map_err(|e| GraphCoreError::Tensor(format!("segment_sum zeros failed: {}", e)))?;
    if segments.is_empty() {
        return Ok(zeros);
    }

    let ids = index_tensor(segments, segments.len(), values.device())?;
    let source = values
        .contiguous()
        .map_err(|e| GraphCoreError::Tensor(format!("segment_sum contiguous failed: {}", e)))?;
    zeros
        .index_add(&ids, &source, 0)
        .map_err(|e| GraphCoreError::Tensor(format!("segment_sum index_add failed: {}", e)))
}

fn segment_mean(values: &Tensor, segments: &[usize], num_segments: usize) -> Result<Tensor> {
    let sum = segment_sum(values, segments, num_segments)?;

    // Empty segments divide by 1, leaving their zero sum in place.
    let counts: Vec<f32> = segment_counts(segments, num_segments)
        .into_iter()
        .map(|c| c.max(1) as f32)
        .collect();
    let counts = Tensor::from_vec(
        counts,
        row_broadcast_shape(num_segments, values.rank()),
        values.device(),
    )
    .and_then(|t| t.to_dtype(values.dtype()))
    .map_err(|e| GraphCoreError::Tensor(format!("segment_mean counts failed: {}", e)))?;

    sum.broadcast_div(&counts)
        .map_err(|e| GraphCoreError::Tensor(format!("segment_mean div failed: {}", e)))
}

fn segment_max(values: &Tensor, segments: &[usize], num_segments: usize) -> Result<Tensor> {
    segment_extreme(values, segments, num_segments, true)
}

fn segment_min(values: &Tensor, segments: &[usize], num_segments: usize) -> Result<Tensor> {
    segment_extreme(values, segments, num_segments, false)
}

/// Max/min in rounds over segment degree.
///
/// Round `k` gathers the `k`-th member of every segment (the last member once
/// a segment is exhausted) and folds it in with `maximum`/`minimum`, so the
/// number of tensor ops grows with the largest segment, not the segment count.
fn segment_extreme(
    values: &Tensor,
    segments: &[usize],
    num_segments: usize,
    take_max: bool,
) -> Result<Tensor> {
    if segments.is_empty() || num_segments == 0 {
        return Tensor::zeros(
            segment_shape(values, num_segments),
            values.dtype(),
            values.device(),
        )
        .map_err(|e| GraphCoreError::Tensor(format!("segment_extreme zeros failed: {}", e)));
    }

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); num_segments];
    for (row, &s) in segments.iter().enumerate() {
        members[s].push(row);
    }
    let degree = members.iter().map(Vec::len).max().unwrap_or(0);

    // Empty segments read row 0 and are zeroed afterwards.
    let pick = |k: usize| -> Vec<usize> {
        members
            .iter()
            .map(|m| m.get(k).or(m.last()).copied().unwrap_or(0))
            .collect()
    };
    let gather = |k: usize| -> Result<Tensor> {
        let index = index_tensor(&pick(k), num_segments, values.device())?;
        values
            .index_select(&index, 0)
            .map_err(|e| GraphCoreError::Tensor(format!("segment_extreme gather failed: {}", e)))
    };

    let mut out = gather(0)?;
    for k in 1..degree {
        let next = gather(k)?;
        out = if take_max { out.maximum(&next) } else { out.minimum(&next) }
            .map_err(|e| GraphCoreError::Tensor(format!("segment_extreme reduce failed: {}", e)))?;
    }

    if members.iter().all(|m| !m.is_empty()) {
        return Ok(out);
    }
    let occupied: Vec<u8> = members.iter().map(|m| u8::from(!m.is_empty())).collect();
    let mask = Tensor::from_vec(
        occupied,
        row_broadcast_shape(num_segments, values.rank()),
        values.device(),
    )
    .and_then(|m| m.broadcast_as(out.dims()))
    .map_err(|e| GraphCoreError::Tensor(format!("segment_extreme mask failed: {}", e)))?;
    let zeros = out
        .zeros_like()
        .map_err(|e| GraphCoreError::Tensor(format!("segment_extreme zeros failed: {}", e)))?;
    mask.where_cond(&out, &zeros)
        .map_err(|e| GraphCoreError::Tensor(format!("segment_extreme select failed: {}", e)))
}

// =============================================================================
// Layers
// =============================================================================

/// Aggregate rows by an explicit index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Aggregate {
    /// Reduction to apply
    #[serde(rename = "pooling_method")]
    pub method: ReductionMethod,
}

impl Aggregate {
    /// Create a new aggregate layer
    pub fn new(method: ReductionMethod) -> Self {
        Self { method }
    }

    /// Create from a method name such as `"scatter_sum"`
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(Self::new(name.parse()?))
    }

    /// Forward pass, see [`aggregate`]
    pub fn forward(&self, values: &Tensor, index: &Tensor, num_segments: usize) -> Result<Tensor> {
        aggregate(values, index, num_segments, self.method)
    }
}

/// Select row `pooling_index` of a `[2, E]` disjoint edge index.
fn edge_index_row(edge_index: &Tensor, pooling_index: usize) -> Result<Tensor> {
    if pooling_index > 1 {
        return Err(GraphCoreError::Config(format!(
            "pooling_index must be 0 (source) or 1 (target), got {}",
            pooling_index
        )));
    }
    let (rows, _) = edge_index.dims2().map_err(|_| {
        GraphCoreError::ShapeMismatch(format!(
            "edge_index must be [2, E], got {:?}",
            edge_index.dims()
        ))
    })?;
    if rows != 2 {
        return Err(GraphCoreError::ShapeMismatch(format!(
            "edge_index must be [2, E], got {:?}",
            edge_index.dims()
        )));
    }
    edge_index
        .get(pooling_index)
        .map_err(|e| GraphCoreError::Tensor(format!("edge_index row failed: {}", e)))
}

/// Aggregate edge rows onto the nodes named by one row of the edge index.
///
/// ```text
/// out[v] = REDUCE({ edges[e] : edge_index[pooling_index][e] == v })
/// ```
///
/// `pooling_index = 1` (the default) pools onto edge targets, `0` onto sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateLocalEdges {
    /// Reduction to apply
    #[serde(rename = "pooling_method")]
    pub method: ReductionMethod,
    /// Row of the edge index used as destination
    pub pooling_index: usize,
}

impl Default for AggregateLocalEdges {
    fn default() -> Self {
        Self {
            method: ReductionMethod::Sum,
            pooling_index: 1,
        }
    }
}

impl AggregateLocalEdges {
    /// Create a layer pooling onto edge targets
    pub fn new(method: ReductionMethod) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    /// Builder: set the pooling row (0 = source, 1 = target)
    pub fn with_pooling_index(mut self, pooling_index: usize) -> Self {
        self.pooling_index = pooling_index;
        self
    }

    /// Forward pass.
    ///
    /// # Arguments
    /// - `nodes`: Disjoint node tensor `[N, ...]`, only its row count is used
    /// - `edges`: Edge rows `[E, ...]`
    /// - `edge_index`: Disjoint edge index `[2, E]`
    ///
    /// # Returns
    /// Per-node reduction `[N, ...]`
    pub fn forward(&self, nodes: &Tensor, edges: &Tensor, edge_index: &Tensor) -> Result<Tensor> {
        let index = edge_index_row(edge_index, self.pooling_index)?;
        let num_nodes = nodes.dim(0)?;
        aggregate(edges, &index, num_nodes, self.method)
    }
}

/// Weighted variant of [`AggregateLocalEdges`].
///
/// ```text
/// out[v]  = REDUCE({ w[e] * edges[e] : dst(e) == v })
/// norm[v] = Σ { w[e] : dst(e) == v }
/// out[v]  = out[v] / norm[v]          (normalize_by_weights and norm[v] != 0)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateWeightedLocalEdges {
    /// Reduction to apply
    #[serde(rename = "pooling_method")]
    pub method: ReductionMethod,
    /// Row of the edge index used as destination
    pub pooling_index: usize,
    /// Divide by the per-node sum of weights
    pub normalize_by_weights: bool,
}

impl Default for AggregateWeightedLocalEdges {
    fn default() -> Self {
        Self {
            method: ReductionMethod::Sum,
            pooling_index: 1,
            normalize_by_weights: false,
        }
    }
}

impl AggregateWeightedLocalEdges {
    /// Create a weighted layer pooling onto edge targets
    pub fn new(method: ReductionMethod, normalize_by_weights: bool) -> Self {
        Self {
            method,
            normalize_by_weights,
            ..Default::default()
        }
    }

    /// Builder: set the pooling row (0 = source, 1 = target)
    pub fn with_pooling_index(mut self, pooling_index: usize) -> Self {
        self.pooling_index = pooling_index;
        self
    }

    /// Forward pass.
    ///
    /// # Arguments
    /// - `nodes`: Disjoint node tensor `[N, ...]`, only its row count is used
    /// - `edges`: Edge rows `[E, ...]`
    /// - `edge_index`: Disjoint edge index `[2, E]`
    /// - `weights`: Per-edge scalar weight `[E]` or `[E, 1]`
    pub fn forward(
        &self,
        nodes: &Tensor,
        edges: &Tensor,
        edge_index: &Tensor,
        weights: &Tensor,
    ) -> Result<Tensor> {
        let index = edge_index_row(edge_index, self.pooling_index)?;
        let num_nodes = nodes.dim(0)?;
        let num_edges = edges.dim(0)?;

        let weights = edge_weights(weights, num_edges)?
            .to_dtype(edges.dtype())
            .map_err(|e| GraphCoreError::Tensor(format!("weights dtype failed: {}", e)))?;
        let weighted = weights
            .reshape(row_broadcast_shape(num_edges, edges.rank()))
            .and_then(|w| edges.broadcast_mul(&w))
            .map_err(|e| GraphCoreError::Tensor(format!("weighted edges failed: {}", e)))?;

        let out = aggregate(&weighted, &index, num_nodes, self.method)?;
        if !self.normalize_by_weights {
            return Ok(out);
        }

        let norm = aggregate(&weights, &index, num_nodes, ReductionMethod::Sum)?
            .to_dtype(DType::F64)
            .and_then(|t| t.to_vec1::<f64>())
            .map_err(|e| GraphCoreError::Tensor(format!("weight norm failed: {}", e)))?;

        // Zero-weight segments keep their unnormalised value.
        let targets = segment_ids(&weights, &index, num_nodes)?;
        let incoming = segment_counts(&targets, num_nodes);
        let cancelled = norm
            .iter()
            .zip(&incoming)
            .filter(|&(&s, &c)| s == 0.0 && c > 0)
            .count();
        if cancelled > 0 {
            warn!(
                cancelled,
                "weights sum to zero on nodes with incoming edges, skipping normalization there"
            );
        }

        let divisor: Vec<f64> = norm
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect();
        let divisor = Tensor::from_vec(
            divisor,
            row_broadcast_shape(num_nodes, out.rank()),
            out.device(),
        )
        .and_then(|t| t.to_dtype(out.dtype()))
        .map_err(|e| GraphCoreError::Tensor(format!("weight divisor failed: {}", e)))?;

        out.broadcast_div(&divisor)
            .map_err(|e| GraphCoreError::Tensor(format!("weight normalize failed: {}", e)))
    }
}

/// Accept `[E]` or `[E, 1]` weights and return `[E]`.
fn edge_weights(weights: &Tensor, num_edges: usize) -> Result<Tensor> {
    match weights.dims() {
        [e] if *e == num_edges => Ok(weights.clone()),
        [e, 1] if *e == num_edges => weights
            .reshape(num_edges)
            .map_err(|e| GraphCoreError::Tensor(format!("weights reshape failed: {}", e))),
        dims => Err(GraphCoreError::ShapeMismatch(format!(
            "edge weights must be [{}] or [{}, 1], got {:?}",
            num_edges, num_edges, dims
        ))),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn device() -> Device {
        Device::Cpu
    }

    fn rows(data: &[f32], shape: (usize, usize)) -> Tensor {
        Tensor::from_vec(data.to_vec(), shape, &device()).unwrap()
    }

    fn index(data: &[u32]) -> Tensor {
        Tensor::from_vec(data.to_vec(), data.len(), &device()).unwrap()
    }

    #[test]
    fn test_sum_basic() {
        let values = rows(&[1.0, 2.0, 3.0], (3, 1));
        let out = aggregate(&values, &index(&[0, 0, 1]), 2, ReductionMethod::Sum).unwrap();
        assert_eq!(out.to_vec2::<f32>().unwrap(), vec![vec![3.0], vec![3.0]]);
    }

    #[test]
    fn test_empty_input_gives_zeros() {
        let values = Tensor::zeros((0, 3), DType::F32, &device()).unwrap();
        let idx = Tensor::zeros(0, DType::U32, &device()).unwrap();
        for &method in ReductionMethod::all() {
            let out = aggregate(&values, &idx, 4, method).unwrap();
            assert_eq!(out.dims(), &[4, 3]);
            let vals: Vec<f32> = out.flatten_all().unwrap().to_vec1().unwrap();
            assert!(vals.iter().all(|v| *v == 0.0), "{} not zero", method);
        }
    }

    #[test]
    fn test_mean_empty_segment_is_zero_not_nan() {
        let values = rows(&[2.0, 4.0, 9.0], (3, 1));
        let out = aggregate(&values, &index(&[0, 0, 2]), 3, ReductionMethod::Mean).unwrap();
        assert_eq!(out.to_vec2::<f32>().unwrap(), vec![vec![3.0], vec![0.0], vec![9.0]]);
    }

    #[test]
    fn test_extremes_with_uneven_degrees() {
        // segment 0: 3 rows, segment 1: empty, segment 2: 1 row, segment 3: 2 rows
        let values = rows(&[4.0, -2.0, 7.0, 1.0, -3.0, -8.0, 5.0, 0.0], (4, 2));
        let idx = index(&[0, 3, 0, 3]);
        let values = Tensor::cat(&[&values, &rows(&[-1.0, 9.0, 2.0, 2.0], (2, 2))], 0).unwrap();
        let idx = Tensor::cat(&[&idx, &index(&[2, 0])], 0).unwrap();

        let max = aggregate(&values, &idx, 4, ReductionMethod::Max).unwrap();
        assert_eq!(
            max.to_vec2::<f32>().unwrap(),
            vec![vec![4.0, 2.0], vec![0.0, 0.0], vec![-1.0, 9.0], vec![7.0, 1.0]]
        );
        let min = aggregate(&values, &idx, 4, ReductionMethod::Min).unwrap();
        assert_eq!(
            min.to_vec2::<f32>().unwrap(),
            vec![vec![-3.0, -8.0], vec![0.0, 0.0], vec![-1.0, 9.0], vec![5.0, 0.0]]
        );
    }

    #[test]
    fn test_extremes_many_segments() {
        let n = 5000;
        let data: Vec<f32> = (0..2 * n).map(|i| i as f32).collect();
        let values = Tensor::from_vec(data, (2 * n, 1), &device()).unwrap();
        let seg: Vec<u32> = (0..2 * n as u32).map(|i| i / 2).collect();
        let idx = Tensor::from_vec(seg, 2 * n, &device()).unwrap();

        let max: Vec<f32> = aggregate(&values, &idx, n + 1, ReductionMethod::Max)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap();
        assert_eq!(max.len(), n + 1);
        assert_eq!(max[0], 1.0);
        assert_eq!(max[n - 1], (2 * n - 1) as f32);
        assert_eq!(max[n], 0.0);
    }

    #[test]
    fn test_max_and_min() {
        let values = rows(&[1.0, -5.0, 3.0, 2.0, -1.0, 7.0], (3, 2));
        let idx = index(&[1, 1, 1]);

        let max = aggregate(&values, &idx, 2, ReductionMethod::Max).unwrap();
        assert_eq!(max.to_vec2::<f32>().unwrap(), vec![vec![0.0, 0.0], vec![3.0, 7.0]]);

        let min = aggregate(&values, &idx, 2, ReductionMethod::Min).unwrap();
        assert_eq!(min.to_vec2::<f32>().unwrap(), vec![vec![0.0, 0.0], vec![-1.0, -5.0]]);
    }

    #[test]
    fn test_higher_rank_features() {
        // 3 rows of [2, 2] features
        let values = Tensor::arange(0f32, 12.0, &device())
            .unwrap()
            .reshape((3, 2, 2))
            .unwrap();
        let out = aggregate(&values, &index(&[1, 0, 1]), 2, ReductionMethod::Sum).unwrap();
        assert_eq!(out.dims(), &[2, 2, 2]);
        let got = out.to_vec3::<f32>().unwrap();
        assert_eq!(got[0], vec![vec![4.0, 5.0], vec![6.0, 7.0]]);
        assert_eq!(got[1], vec![vec![8.0, 10.0], vec![12.0, 14.0]]);

        let mean = aggregate(&values, &index(&[1, 0, 1]), 2, ReductionMethod::Mean).unwrap();
        assert_eq!(mean.to_vec3::<f32>().unwrap()[1], vec![vec![4.0, 5.0], vec![6.0, 7.0]]);
    }

    #[test]
    fn test_vector_values() {
        let values = Tensor::from_vec(vec![1.0f32, 2.0, 3.0], 3, &device()).unwrap();
        let out = aggregate(&values, &index(&[2, 2, 0]), 3, ReductionMethod::Max).unwrap();
        assert_eq!(out.to_vec1::<f32>().unwrap(), vec![3.0, 0.0, 2.0]);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let values = rows(&[1.0], (1, 1));
        let err = aggregate(&values, &index(&[5]), 2, ReductionMethod::Sum).unwrap_err();
        assert!(matches!(
            err,
            GraphCoreError::SegmentIndexOutOfRange {
                position: 0,
                index: 5,
                num_segments: 2
            }
        ));

        let negative = Tensor::from_vec(vec![-1i64], 1, &device()).unwrap();
        assert!(matches!(
            aggregate(&values, &negative, 2, ReductionMethod::Mean),
            Err(GraphCoreError::SegmentIndexOutOfRange { index: -1, .. })
        ));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let values = rows(&[1.0, 2.0], (2, 1));
        assert!(matches!(
            aggregate(&values, &index(&[0]), 2, ReductionMethod::Sum),
            Err(GraphCoreError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_method_names() {
        assert_eq!("sum".parse::<ReductionMethod>().unwrap(), ReductionMethod::Sum);
        assert_eq!("scatter_mean".parse::<ReductionMethod>().unwrap(), ReductionMethod::Mean);
        assert_eq!("Segment_Max".parse::<ReductionMethod>().unwrap(), ReductionMethod::Max);
        assert!(matches!(
            "median".parse::<ReductionMethod>(),
            Err(GraphCoreError::UnsupportedReductionMethod(_))
        ));
        assert!(Aggregate::from_name("lstm").is_err());
    }

    #[test]
    fn test_method_serde() {
        let json = serde_json::to_string(&ReductionMethod::Max).unwrap();
        assert_eq!(json, "\"max\"");
        let parsed: ReductionMethod = serde_json::from_str("\"scatter_min\"").unwrap();
        assert_eq!(parsed, ReductionMethod::Min);
        assert!(serde_json::from_str::<ReductionMethod>("\"attention\"").is_err());

        let layer: AggregateLocalEdges =
            serde_json::from_str(r#"{"pooling_method": "scatter_mean"}"#).unwrap();
        assert_eq!(layer.method, ReductionMethod::Mean);
        assert_eq!(layer.pooling_index, 1);
    }

    #[test]
    fn test_local_edges_pooling_index() {
        let nodes = Tensor::zeros((3, 1), DType::F32, &device()).unwrap();
        let edges = rows(&[1.0, 10.0], (2, 1));
        // edges 0->1 and 0->2
        let edge_index = Tensor::from_vec(vec![0u32, 0, 1, 2], (2, 2), &device()).unwrap();

        let to_target = AggregateLocalEdges::new(ReductionMethod::Sum)
            .forward(&nodes, &edges, &edge_index)
            .unwrap();
        assert_eq!(
            to_target.to_vec2::<f32>().unwrap(),
            vec![vec![0.0], vec![1.0], vec![10.0]]
        );

        let to_source = AggregateLocalEdges::new(ReductionMethod::Sum)
            .with_pooling_index(0)
            .forward(&nodes, &edges, &edge_index)
            .unwrap();
        assert_eq!(
            to_source.to_vec2::<f32>().unwrap(),
            vec![vec![11.0], vec![0.0], vec![0.0]]
        );

        let bad = AggregateLocalEdges::new(ReductionMethod::Sum).with_pooling_index(2);
        assert!(matches!(
            bad.forward(&nodes, &edges, &edge_index),
            Err(GraphCoreError::Config(_))
        ));
    }

    #[test]
    fn test_weighted_normalized() {
        let nodes = Tensor::zeros((3, 1), DType::F32, &device()).unwrap();
        let edges = rows(&[2.0, 4.0, 5.0], (3, 1));
        // 0->1, 2->1, 0->2
        let edge_index = Tensor::from_vec(vec![0u32, 2, 0, 1, 1, 2], (2, 3), &device()).unwrap();
        let weights = Tensor::from_vec(vec![1.0f32, 3.0, 0.0], (3, 1), &device()).unwrap();

        let plain = AggregateWeightedLocalEdges::new(ReductionMethod::Sum, false)
            .forward(&nodes, &edges, &edge_index, &weights)
            .unwrap();
        assert_eq!(
            plain.to_vec2::<f32>().unwrap(),
            vec![vec![0.0], vec![14.0], vec![0.0]]
        );

        let normed = AggregateWeightedLocalEdges::new(ReductionMethod::Sum, true)
            .forward(&nodes, &edges, &edge_index, &weights)
            .unwrap();
        let vals = normed.to_vec2::<f32>().unwrap();
        assert!((vals[1][0] - 3.5).abs() < 1e-6);
        // Node 2 only receives a zero-weight edge: left unnormalised, no NaN
        assert_eq!(vals[2][0], 0.0);
        assert_eq!(vals[0][0], 0.0);
    }

    #[test]
    fn test_weighted_shape_check() {
        let nodes = Tensor::zeros((2, 1), DType::F32, &device()).unwrap();
        let edges = rows(&[1.0, 1.0], (2, 1));
        let edge_index = Tensor::from_vec(vec![0u32, 1, 1, 0], (2, 2), &device()).unwrap();
        let weights = Tensor::ones((2, 2), DType::F32, &device()).unwrap();
        assert!(matches!(
            AggregateWeightedLocalEdges::default().forward(&nodes, &edges, &edge_index, &weights),
            Err(GraphCoreError::ShapeMismatch(_))
        ));
    }
}
