//! Core Tensor Operations
//!
//! Device selection and the conversions between host-side index vectors and
//! candle index tensors used by the casting and aggregation layers.
//!
//! ## Device selection
//!
//! Force CPU mode with:
//! ```bash
//! export DISJOINT_GNN_NO_GPU=1
//! ```
//!
//! ## Index tensors
//!
//! Index tensors produced by this crate are always `DType::U32`. Index tensors
//! accepted as input may be `U8`, `U32` or `I64`, and are read back to the host
//! as `i64` so that negative values can be reported instead of wrapped.

use crate::{GraphCoreError, Result};
use candle_core::{DType, Device, Shape, Tensor};
use tracing::info;

// ============================================================================
// Environment-controlled Device Selection
// ============================================================================

/// Check if GPU is disabled via environment variable.
///
/// Set `DISJOINT_GNN_NO_GPU=1` to force CPU-only mode.
pub fn gpu_disabled() -> bool {
    std::env::var("DISJOINT_GNN_NO_GPU")
        .map(|v| !v.is_empty() && v != "0" && v.to_lowercase() != "false")
        .unwrap_or(false)
}

/// Get the best available device for tensor operations
///
/// Priority:
/// 1. Check `DISJOINT_GNN_NO_GPU` env var (forces CPU if set)
/// 2. Metal (Apple Silicon)
/// 3. CUDA (NVIDIA GPUs)
/// 4. CPU (fallback)
pub fn best_device() -> Device {
    if gpu_disabled() {
        info!("Using CPU device (DISJOINT_GNN_NO_GPU set)");
        return Device::Cpu;
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            info!("Using Metal device");
            return device;
        }
    }

    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            info!("Using CUDA device");
            return device;
        }
    }

    info!("Using CPU device");
    Device::Cpu
}

/// Force CPU device, ignoring GPU availability.
pub fn cpu_device() -> Device {
    Device::Cpu
}

// ============================================================================
// Device Availability Checks
// ============================================================================

/// Check if Metal is available (respects DISJOINT_GNN_NO_GPU)
#[cfg(feature = "metal")]
pub fn metal_available() -> bool {
    !gpu_disabled() && Device::new_metal(0).is_ok()
}

/// Check if Metal is available (always false when `metal` feature is not enabled)
#[cfg(not(feature = "metal"))]
pub fn metal_available() -> bool {
    false
}

/// Check if CUDA is available (respects DISJOINT_GNN_NO_GPU)
#[cfg(feature = "cuda")]
pub fn cuda_available() -> bool {
    !gpu_disabled() && Device::new_cuda(0).is_ok()
}

/// Check if CUDA is available (always false when `cuda` feature is not enabled)
#[cfg(not(feature = "cuda"))]
pub fn cuda_available() -> bool {
    false
}

/// Check if any GPU is available and enabled
pub fn gpu_available() -> bool {
    !gpu_disabled() && (metal_available() || cuda_available())
}

// ============================================================================
// Index conversion
// ============================================================================

/// Read an integer tensor of any rank back to the host as a flat `Vec<i64>`.
///
/// Floating point tensors are rejected with [`GraphCoreError::ShapeMismatch`]:
/// an index array with a float dtype is always a wiring mistake upstream.
pub fn index_values(t: &Tensor) -> Result<Vec<i64>> {
    let flat = t
        .flatten_all()
        .map_err(|e| GraphCoreError::Tensor(format!("index flatten failed: {}", e)))?;
    let values = match flat.dtype() {
        DType::I64 => flat.to_vec1::<i64>()?,
        DType::U32 => flat.to_vec1::<u32>()?.into_iter().map(i64::from).collect(),
        DType::U8 => flat.to_vec1::<u8>()?.into_iter().map(i64::from).collect(),
        other => {
            return Err(GraphCoreError::ShapeMismatch(format!(
                "index tensor must have an integer dtype, got {:?}",
                other
            )))
        }
    };
    Ok(values)
}

/// Read a 1D count vector (e.g. `node_count`) as `usize`, rejecting negatives.
pub fn count_values(t: &Tensor, name: &str) -> Result<Vec<usize>> {
    if t.rank() != 1 {
        return Err(GraphCoreError::ShapeMismatch(format!(
            "{} must be a vector, got shape {:?}",
            name,
            t.dims()
        )));
    }
    index_values(t)?
        .into_iter()
        .map(|c| {
            usize::try_from(c).map_err(|_| {
                GraphCoreError::ShapeMismatch(format!("{} contains negative count {}", name, c))
            })
        })
        .collect()
}

/// Build a `U32` index tensor from host indices.
pub fn index_tensor<S: Into<Shape>>(values: &[usize], shape: S, device: &Device) -> Result<Tensor> {
    let data = values
        .iter()
        .map(|&v| {
            u32::try_from(v)
                .map_err(|_| GraphCoreError::Tensor(format!("index {} exceeds u32 range", v)))
        })
        .collect::<Result<Vec<u32>>>()?;
    Tensor::from_vec(data, shape, device)
        .map_err(|e| GraphCoreError::Tensor(format!("index tensor failed: {}", e)))
}

/// Shape `(n, 1, 1, ...)` that broadcasts a per-row scalar over a tensor of `rank`.
pub(crate) fn row_broadcast_shape(n: usize, rank: usize) -> Vec<usize> {
    let mut shape = vec![1; rank.max(1)];
    shape[0] = n;
    shape
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_device() {
        let device = best_device();
        assert!(matches!(
            device,
            Device::Cpu | Device::Metal(_) | Device::Cuda(_)
        ));
    }

    #[test]
    fn test_cpu_device() {
        assert!(matches!(cpu_device(), Device::Cpu));
    }

    #[test]
    fn test_gpu_flags_do_not_panic() {
        let _disabled = gpu_disabled();
        let _available = gpu_available();
    }

    #[test]
    fn test_index_values_dtypes() {
        let device = Device::Cpu;
        let a = Tensor::from_vec(vec![0i64, -1, 7], 3, &device).unwrap();
        assert_eq!(index_values(&a).unwrap(), vec![0, -1, 7]);

        let b = Tensor::from_vec(vec![3u32, 4, 5, 6], (2, 2), &device).unwrap();
        assert_eq!(index_values(&b).unwrap(), vec![3, 4, 5, 6]);

        let c = Tensor::from_vec(vec![1.0f32, 2.0], 2, &device).unwrap();
        assert!(matches!(
            index_values(&c),
            Err(GraphCoreError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_count_values_rejects_negative() {
        let device = Device::Cpu;
        let counts = Tensor::from_vec(vec![2i64, -1], 2, &device).unwrap();
        assert!(count_values(&counts, "node_count").is_err());

        let counts = Tensor::from_vec(vec![2i64, 0, 1], 3, &device).unwrap();
        assert_eq!(count_values(&counts, "node_count").unwrap(), vec![2, 0, 1]);
    }

    #[test]
    fn test_index_tensor_roundtrip() {
        let device = Device::Cpu;
        let t = index_tensor(&[0, 4, 2], 3, &device).unwrap();
        assert_eq!(t.dtype(), DType::U32);
        assert_eq!(t.to_vec1::<u32>().unwrap(), vec![0, 4, 2]);
    }

    #[test]
    fn test_row_broadcast_shape() {
        assert_eq!(row_broadcast_shape(5, 1), vec![5]);
        assert_eq!(row_broadcast_shape(5, 3), vec![5, 1, 1]);
    }
}
