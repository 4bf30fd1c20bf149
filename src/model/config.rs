//! Training Configuration
//!
//! Hyperparameters for a training run. Serializable with burn's `Config`
//! so a run can be saved next to its model and replayed.

use burn::config::Config;

use super::cnn::BeanPartsClassifierConfig;
use crate::dataset::SplitConfig;
use crate::utils::error::{self, BeanDoctorError};

/// Hyperparameters of a training run
#[derive(Config, Debug)]
pub struct TrainingConfig {
    /// Model architecture
    pub model: BeanPartsClassifierConfig,

    /// Number of passes over the training subset
    #[config(default = 20)]
    pub epochs: usize,

    #[config(default = 32)]
    pub batch_size: usize,

    /// Adam learning rate
    #[config(default = 1e-3)]
    pub learning_rate: f64,

    /// Adam epsilon
    #[config(default = 1e-7)]
    pub epsilon: f32,

    /// Fraction of each class held out for validation
    #[config(default = 0.2)]
    pub validation_fraction: f64,

    /// Seed for the split and epoch shuffling; random when `None`
    pub seed: Option<u64>,

    /// Decode every image once before the first epoch
    #[config(default = false)]
    pub cache_images: bool,
}

impl TrainingConfig {
    pub fn split_config(&self) -> error::Result<SplitConfig> {
        SplitConfig::new(self.validation_fraction, self.seed)
    }

    pub fn validate(&self) -> error::Result<()> {
        self.model.validate()?;

        if self.epochs == 0 {
            return Err(BeanDoctorError::Config("epochs must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(BeanDoctorError::Config(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0) {
            return Err(BeanDoctorError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }

        self.split_config().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrainingConfig::new(BeanPartsClassifierConfig::new(4));

        assert_eq!(config.epochs, 20);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.model.image_size, 256);
        assert!((config.learning_rate - 1e-3).abs() < 1e-12);
        assert!((config.validation_fraction - 0.2).abs() < 1e-12);
        assert!(config.seed.is_none());
        assert!(!config.cache_images);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let model = || BeanPartsClassifierConfig::new(4);

        assert!(TrainingConfig::new(model()).with_epochs(0).validate().is_err());
        assert!(TrainingConfig::new(model()).with_batch_size(0).validate().is_err());
        assert!(TrainingConfig::new(model()).with_learning_rate(0.0).validate().is_err());
        assert!(TrainingConfig::new(model())
            .with_validation_fraction(1.5)
            .validate()
            .is_err());
        assert!(TrainingConfig::new(model().with_image_size(8)).validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("training.json");

        let config = TrainingConfig::new(BeanPartsClassifierConfig::new(3).with_image_size(64))
            .with_epochs(5)
            .with_seed(Some(11));
        config.save(&path).unwrap();

        let loaded = TrainingConfig::load(&path).unwrap();
        assert_eq!(loaded.epochs, 5);
        assert_eq!(loaded.seed, Some(11));
        assert_eq!(loaded.model.num_classes, 3);
        assert_eq!(loaded.model.image_size, 64);
    }
}
