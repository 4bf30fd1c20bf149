//! Model module for the bean-plant part classifier
//!
//! This module provides:
//! - The CNN architecture and its burn `Config`
//! - Training hyperparameters
//! - Model record and metadata persistence

pub mod cnn;
pub mod config;
pub mod storage;

pub use cnn::{BeanPartsClassifier, BeanPartsClassifierConfig};
pub use config::TrainingConfig;
pub use storage::{load_model, model_file_stem, save_model, ModelMetadata};
