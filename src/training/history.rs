//! Per-epoch training history.

use crate::{GraphCoreError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Losses and metrics recorded after one epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    /// Epoch number
    pub epoch: usize,

    /// Training loss
    pub loss: f64,

    /// Validation loss (if a validation split was evaluated)
    pub val_loss: Option<f64>,

    /// Additional named metrics, e.g. `"mae"`
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,

    /// When the record was taken
    pub recorded_at: DateTime<Utc>,
}

impl EpochRecord {
    /// Create a record stamped with the current time
    pub fn new(epoch: usize, loss: f64) -> Self {
        Self {
            epoch,
            loss,
            val_loss: None,
            metrics: BTreeMap::new(),
            recorded_at: Utc::now(),
        }
    }

    /// Builder: set validation loss
    pub fn with_val_loss(mut self, val_loss: f64) -> Self {
        self.val_loss = Some(val_loss);
        self
    }

    /// Builder: add a named metric
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    /// Loss used for model selection: validation loss when present
    pub fn monitored_loss(&self) -> f64 {
        self.val_loss.unwrap_or(self.loss)
    }
}

/// Training history tracker
///
/// Tracks the best monitored loss and how many epochs have passed without
/// improving on it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// Name of the model being trained
    pub model_name: String,

    records: Vec<EpochRecord>,

    #[serde(skip)]
    best_index: Option<usize>,

    #[serde(skip)]
    epochs_since_improvement: usize,
}

impl TrainingHistory {
    /// Create an empty history
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Default::default()
        }
    }

    /// Record an epoch
    pub fn record(&mut self, record: EpochRecord) {
        let loss = record.monitored_loss();
        self.records.push(record);

        let improved = match self.best_index {
            None => true,
            Some(i) => loss < self.records[i].monitored_loss(),
        };
        if improved {
            self.best_index = Some(self.records.len() - 1);
            self.epochs_since_improvement = 0;
        } else {
            self.epochs_since_improvement += 1;
        }
    }

    /// All records in order
    pub fn records(&self) -> &[EpochRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record with the lowest monitored loss (first one on ties)
    pub fn best_epoch(&self) -> Option<&EpochRecord> {
        self.best_index.map(|i| &self.records[i])
    }

    /// Get average training loss over the last N epochs
    pub fn average_loss(&self, n: usize) -> Option<f64> {
        if self.records.is_empty() || n == 0 {
            return None;
        }

        let start = self.records.len().saturating_sub(n);
        let slice = &self.records[start..];
        Some(slice.iter().map(|r| r.loss).sum::<f64>() / slice.len() as f64)
    }

    /// Check if training has converged (no improvement for N epochs)
    pub fn has_converged(&self, patience: usize) -> bool {
        self.best_index.is_some() && self.epochs_since_improvement >= patience
    }

    /// Serialise to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| GraphCoreError::Serialization(format!("history to json failed: {}", e)))
    }

    /// Parse from JSON, rebuilding the improvement tracking
    pub fn from_json(json: &str) -> Result<Self> {
        let stored: Self = serde_json::from_str(json)
            .map_err(|e| GraphCoreError::Serialization(format!("history from json failed: {}", e)))?;
        let mut history = Self::new(stored.model_name);
        for record in stored.records {
            history.record(record);
        }
        Ok(history)
    }

    /// Write the history as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)?;
        info!(
            model = %self.model_name,
            epochs = self.records.len(),
            path = %path.display(),
            "saved training history"
        );
        Ok(())
    }

    /// Read a history written by [`TrainingHistory::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}
