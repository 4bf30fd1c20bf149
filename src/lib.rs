//! # Bean Doctor
//!
//! Classifies photographs of bean plants into their visible part (leaf,
//! stem and plant, pod, or unneeded background) with a small CNN built on
//! the Burn framework.
//!
//! ## Modules
//!
//! - `dataset`: Image tree discovery, preprocessing and the train/validation split
//! - `model`: CNN architecture, training hyperparameters and persistence
//! - `training`: Supervised training loop and per-epoch history
//! - `inference`: Loading a trained model and classifying single images
//! - `utils`: Errors, logging, metrics and console helpers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bean_doctor::backend::{default_device, DefaultBackend, TrainingBackend};
//! use bean_doctor::inference::Predictor;
//! use bean_doctor::model::{BeanPartsClassifierConfig, TrainingConfig};
//! use bean_doctor::training::run_training;
//!
//! let config = TrainingConfig::new(BeanPartsClassifierConfig::new(4));
//! let outcome = run_training::<TrainingBackend>("data/partes del frijol".as_ref(), ".".as_ref(), &config)?;
//!
//! let predictor = Predictor::<DefaultBackend>::load(
//!     &outcome.model_path,
//!     bean_doctor::dataset::default_class_names(),
//!     256,
//!     &default_device(),
//! )?;
//! println!("{}", predictor.predict_file("leaf.jpg".as_ref())?.report());
//! ```

pub mod backend;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use dataset::split::{DatasetSplits, SplitConfig};
pub use dataset::{BeanPartsBatch, BeanPartsBatcher, BeanPartsDataset, BeanPartsItem, ImageFolder};
pub use inference::{PredictionResult, Predictor};
pub use model::{BeanPartsClassifier, BeanPartsClassifierConfig, ModelMetadata, TrainingConfig};
pub use training::{run_training, TrainingHistory, TrainingOutcome};
pub use utils::error::{BeanDoctorError, Result};

/// Default input image size (square)
pub const IMAGE_SIZE: usize = 256;

/// Default number of training epochs
pub const DEFAULT_EPOCHS: usize = 20;

/// Default batch size
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Default Adam learning rate
pub const DEFAULT_LEARNING_RATE: f64 = 1e-3;

/// Default fraction of each class held out for validation
pub const VALIDATION_SPLIT: f64 = 0.2;

/// Prefix of saved model files; the epoch count is appended
pub const MODEL_FILE_PREFIX: &str = "modelo_final_partes_planta_v";

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
