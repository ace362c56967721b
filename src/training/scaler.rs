//! Label standardisation.
//!
//! `y' = (y - mean) / std` per target column, fitted on the training split
//! and inverted on model output before metrics are reported in data units.

use crate::{GraphCoreError, Result};
use candle_core::{DType, Tensor};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Per-column standard scaler for `(N, T)` (or `(N,)`) label tensors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardLabelScaler {
    mean: Option<Vec<f64>>,
    scale: Option<Vec<f64>>,
}

impl StandardLabelScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        self.mean.is_some() && self.scale.is_some()
    }

    /// Fitted column means
    pub fn mean(&self) -> Option<&[f64]> {
        self.mean.as_deref()
    }

    /// Fitted column standard deviations (zero columns reported as 1)
    pub fn scale(&self) -> Option<&[f64]> {
        self.scale.as_deref()
    }

    /// Fit mean and population standard deviation over the leading axis.
    pub fn fit(&mut self, labels: &Tensor) -> Result<()> {
        check_labels(labels)?;
        if labels.dim(0)? == 0 {
            return Err(GraphCoreError::ShapeMismatch(
                "cannot fit a scaler on zero labels".into(),
            ));
        }
        let labels = labels
            .to_dtype(DType::F64)
            .map_err(|e| GraphCoreError::Tensor(format!("scaler dtype failed: {}", e)))?;

        let mean = labels
            .mean_keepdim(0)
            .map_err(|e| GraphCoreError::Tensor(format!("scaler mean failed: {}", e)))?;
        let std = labels
            .broadcast_sub(&mean)
            .and_then(|d| d.sqr())
            .and_then(|d| d.mean(0))
            .and_then(|v| v.sqrt())
            .map_err(|e| GraphCoreError::Tensor(format!("scaler std failed: {}", e)))?;

        let mean = mean
            .flatten_all()
            .and_then(|m| m.to_vec1::<f64>())
            .map_err(|e| GraphCoreError::Tensor(format!("scaler mean readback failed: {}", e)))?;
        let scale = std
            .flatten_all()
            .and_then(|s| s.to_vec1::<f64>())
            .map_err(|e| GraphCoreError::Tensor(format!("scaler std readback failed: {}", e)))?
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect();

        debug!(targets = mean.len(), "fitted label scaler");
        self.mean = Some(mean);
        self.scale = Some(scale);
        Ok(())
    }

    /// Fit, then transform the same labels
    pub fn fit_transform(&mut self, labels: &Tensor) -> Result<Tensor> {
        self.fit(labels)?;
        self.transform(labels)
    }

    /// `(y - mean) / std`
    pub fn transform(&self, labels: &Tensor) -> Result<Tensor> {
        let (mean, scale) = self.columns(labels)?;
        labels
            .broadcast_sub(&mean)
            .and_then(|t| t.broadcast_div(&scale))
            .map_err(|e| GraphCoreError::Tensor(format!("scaler transform failed: {}", e)))
    }

    /// `y' * std + mean`
    pub fn inverse_transform(&self, scaled: &Tensor) -> Result<Tensor> {
        let (mean, scale) = self.columns(scaled)?;
        scaled
            .broadcast_mul(&scale)
            .and_then(|t| t.broadcast_add(&mean))
            .map_err(|e| GraphCoreError::Tensor(format!("scaler inverse failed: {}", e)))
    }

    /// Fitted statistics as tensors matching `labels` in dtype and device
    fn columns(&self, labels: &Tensor) -> Result<(Tensor, Tensor)> {
        let (Some(mean), Some(scale)) = (&self.mean, &self.scale) else {
            return Err(GraphCoreError::Config("label scaler is not fitted".into()));
        };
        check_labels(labels)?;
        let targets = if labels.rank() == 2 { labels.dim(1)? } else { 1 };
        if targets != mean.len() {
            return Err(GraphCoreError::ShapeMismatch(format!(
                "scaler fitted on {} targets, got {}",
                mean.len(),
                targets
            )));
        }
        let as_tensor = |v: &[f64]| {
            Tensor::from_vec(v.to_vec(), v.len(), labels.device())
                .and_then(|t| t.to_dtype(labels.dtype()))
                .map_err(|e| GraphCoreError::Tensor(format!("scaler columns failed: {}", e)))
        };
        Ok((as_tensor(mean)?, as_tensor(scale)?))
    }

    /// Write the fitted state as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| GraphCoreError::Serialization(format!("scaler to json failed: {}", e)))?;
        std::fs::write(path.as_ref(), json)?;
        info!(path = %path.as_ref().display(), "saved label scaler");
        Ok(())
    }

    /// Read a scaler written by [`StandardLabelScaler::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| GraphCoreError::Serialization(format!("scaler from json failed: {}", e)))
    }
}

fn check_labels(labels: &Tensor) -> Result<()> {
    if labels.rank() == 0 || labels.rank() > 2 {
        return Err(GraphCoreError::ShapeMismatch(format!(
            "labels must be (N,) or (N, T), got {:?}",
            labels.dims()
        )));
    }
    Ok(())
}
