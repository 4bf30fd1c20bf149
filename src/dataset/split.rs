//! Training / validation split
//!
//! Each class is split on its own so both subsets keep the class balance
//! of the directory tree:
//! 1. shuffle the class's samples with a seeded `ChaCha8Rng`
//! 2. the first `floor(n * validation_fraction)` samples become validation
//! 3. the rest become training
//!
//! Without an explicit seed a fresh one is drawn, so repeated runs pick
//! different validation images. The seed actually used is kept in
//! [`DatasetSplits::seed`].

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::loader::{ImageFolder, ImageSample};
use crate::utils::error::{BeanDoctorError, Result};

/// Configuration for dataset splitting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of each class held out for validation
    pub validation_fraction: f64,
    /// Seed for the per-class shuffle; `None` draws a random one
    pub seed: Option<u64>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            validation_fraction: 0.2,
            seed: None,
        }
    }
}

impl SplitConfig {
    pub fn new(validation_fraction: f64, seed: Option<u64>) -> Result<Self> {
        let config = Self {
            validation_fraction,
            seed,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.validation_fraction > 0.0 && self.validation_fraction < 1.0) {
            return Err(BeanDoctorError::Config(format!(
                "validation fraction must be in (0, 1), got {}",
                self.validation_fraction
            )));
        }
        Ok(())
    }

    /// Number of validation samples for a class of `n` images
    pub fn validation_count(&self, n: usize) -> usize {
        (n as f64 * self.validation_fraction).floor() as usize
    }

    /// Whether a class of `n` images puts at least one image on each side
    pub fn splits_class(&self, n: usize) -> bool {
        let v = self.validation_count(n);
        v >= 1 && v < n
    }

    /// Smallest class size that leaves at least one image on each side
    ///
    /// Starts from `ceil(1 / fraction)` and corrects for rounding in a few
    /// steps. Returns `usize::MAX` when no representable size works.
    pub fn min_class_size(&self) -> usize {
        // `as` saturates, so a tiny fraction lands on usize::MAX
        let mut n = ((1.0 / self.validation_fraction).ceil() as usize).max(1);

        while n > 1 && self.splits_class(n - 1) {
            n -= 1;
        }

        (0..4)
            .map(|step| n.saturating_add(step))
            .find(|&candidate| self.splits_class(candidate))
            .unwrap_or(usize::MAX)
    }
}

/// Disjoint training and validation subsets of an image tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSplits {
    pub train: Vec<ImageSample>,
    pub validation: Vec<ImageSample>,
    pub class_names: Vec<String>,
    /// Seed that produced this split
    pub seed: u64,
}

impl DatasetSplits {
    /// Split an image tree class by class
    pub fn from_folder(folder: &ImageFolder, config: &SplitConfig) -> Result<Self> {
        config.validate()?;

        let seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let mut train = Vec::new();
        let mut validation = Vec::new();

        for (label, class_name) in folder.class_names.iter().enumerate() {
            let mut class_samples: Vec<ImageSample> =
                folder.samples_of_class(label).into_iter().cloned().collect();

            let n = class_samples.len();
            let n_val = config.validation_count(n);

            if !config.splits_class(n) {
                return Err(BeanDoctorError::Dataset(format!(
                    "Class '{}' has {} image(s); at least {} are needed for a {:.0}% validation split",
                    class_name,
                    n,
                    config.min_class_size(),
                    config.validation_fraction * 100.0
                )));
            }

            class_samples.shuffle(&mut rng);
            let class_train = class_samples.split_off(n_val);

            debug!(
                "Class '{}': {} training / {} validation",
                class_name,
                class_train.len(),
                class_samples.len()
            );

            validation.extend(class_samples);
            train.extend(class_train);
        }

        info!(
            "Split {} images into {} training / {} validation (seed {})",
            folder.len(),
            train.len(),
            validation.len(),
            seed
        );

        Ok(Self {
            train,
            validation,
            class_names: folder.class_names.clone(),
            seed,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn total(&self) -> usize {
        self.train.len() + self.validation.len()
    }
}

impl std::fmt::Display for DatasetSplits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let total = self.total().max(1) as f64;
        writeln!(f, "Dataset Split (seed {}):", self.seed)?;
        writeln!(
            f,
            "  Training:   {:6} ({:.1}%)",
            self.train.len(),
            100.0 * self.train.len() as f64 / total
        )?;
        writeln!(
            f,
            "  Validation: {:6} ({:.1}%)",
            self.validation.len(),
            100.0 * self.validation.len() as f64 / total
        )?;
        Ok(())
    }
}
