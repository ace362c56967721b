//! Hyperparameter records.
//!
//! ```json
//! {
//!   "model": {
//!     "name": "GCN",
//!     "input_tensor_type": "padded",
//!     "output_tensor_type": "padded",
//!     "output_embedding": "graph",
//!     "cast_disjoint_kwargs": { "padded_disjoint": false },
//!     "pooling_method": "scatter_sum"
//!   },
//!   "training": { "epochs": 800, "batch_size": 32, "execute_folds": [0] },
//!   "data": { "data_unit": "eV" }
//! }
//! ```

use crate::casting::{CastDisjointConfig, InputTensorType, OutputEmbedding, OutputTensorType};
use crate::primitives::ReductionMethod;
use crate::{GraphCoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// How a model is wired to the casting layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSection {
    pub name: String,

    #[serde(default)]
    pub input_tensor_type: InputTensorType,

    #[serde(default)]
    pub output_tensor_type: OutputTensorType,

    #[serde(default)]
    pub output_embedding: OutputEmbedding,

    #[serde(default)]
    pub cast_disjoint_kwargs: CastDisjointConfig,

    /// Reduction used by the model's aggregation and readout layers
    #[serde(default)]
    pub pooling_method: ReductionMethod,
}

/// Training loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSection {
    pub epochs: usize,

    pub batch_size: usize,

    /// Cross-validation folds to run; all folds when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute_folds: Option<Vec<usize>>,
}

/// Dataset metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSection {
    /// Unit of the labels, for reporting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_unit: Option<String>,
}

/// Complete hyperparameter set for one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperParameter {
    pub model: ModelSection,
    pub training: TrainingSection,
    #[serde(default)]
    pub data: DataSection,
}

impl HyperParameter {
    /// Parse and verify
    pub fn from_json_str(json: &str) -> Result<Self> {
        let hyper: Self = serde_json::from_str(json)
            .map_err(|e| GraphCoreError::Serialization(format!("hyperparameter parse failed: {}", e)))?;
        hyper.verify()?;
        Ok(hyper)
    }

    /// Read, parse and verify a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let hyper = Self::from_json_str(&std::fs::read_to_string(path)?)?;
        info!(model = %hyper.model.name, path = %path.display(), "loaded hyperparameters");
        Ok(hyper)
    }

    /// Serialise to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| GraphCoreError::Serialization(format!("hyperparameter to json failed: {}", e)))
    }

    /// Write as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        info!(path = %path.as_ref().display(), "saved hyperparameters");
        Ok(())
    }

    /// Check the settings are usable together.
    pub fn verify(&self) -> Result<()> {
        if self.model.name.trim().is_empty() {
            return Err(GraphCoreError::Config("model name is empty".into()));
        }
        if self.training.epochs == 0 {
            return Err(GraphCoreError::Config("training.epochs must be > 0".into()));
        }
        if self.training.batch_size == 0 {
            return Err(GraphCoreError::Config("training.batch_size must be > 0".into()));
        }
        Ok(())
    }

    /// Model name
    pub fn model_name(&self) -> &str {
        &self.model.name
    }

    /// Whether cross-validation fold `fold` should be run
    pub fn should_execute_fold(&self, fold: usize) -> bool {
        self.training
            .execute_folds
            .as_ref()
            .map_or(true, |folds| folds.contains(&fold))
    }
}
