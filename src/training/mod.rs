//! Training module
//!
//! This module provides:
//! - The supervised training loop (Adam, cross-entropy, per-class split)
//! - Per-epoch metrics history saved next to the model

pub mod history;
pub mod trainer;

pub use crate::model::config::TrainingConfig;
pub use history::{EpochMetrics, TrainingHistory};
pub use trainer::{run_training, TrainingOutcome};
