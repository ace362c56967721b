//! Training Glue
//!
//! The bookkeeping a training driver keeps around the casting layer:
//!
//! - **History**: Per-epoch losses, best epoch and convergence monitoring
//! - **Scaling**: Label standardisation fitted on the training split
//! - **Hyperparameters**: Typed, verified JSON configuration for a run
//!
//! Gradients and optimizers belong to the tensor framework, not to this crate.
//!
//! ## Example
//!
//! ```ignore
//! use disjoint_gnn::training::*;
//!
//! let hyper = HyperParameter::from_file("hyper/gcn.json")?;
//! let mut scaler = StandardLabelScaler::new();
//! let y_train = scaler.fit_transform(&labels)?;
//!
//! let mut history = TrainingHistory::new(hyper.model_name());
//! for epoch in 0..hyper.training.epochs {
//!     let loss = run_epoch(&y_train)?;
//!     history.record(EpochRecord::new(epoch, loss));
//!     if history.has_converged(20) {
//!         break;
//!     }
//! }
//! history.save("history.json")?;
//! ```

mod history;
mod hyper;
mod scaler;

pub use history::{EpochRecord, TrainingHistory};
pub use hyper::{DataSection, HyperParameter, ModelSection, TrainingSection};
pub use scaler::StandardLabelScaler;
