//! Dataset module for bean-plant part images
//!
//! This module provides functionality for:
//! - Discovering a class-per-subdirectory image tree on disk
//! - Decoding, resizing and scaling images into network input
//! - Splitting each class into training and validation subsets
//! - Burn `Dataset` / `Batcher` integration for the training loop
//!
//! ## Directory layout
//!
//! ```text
//! partes del frijol/
//! ├── fondo no necesario/
//! ├── hoja/
//! ├── tallo y planta/
//! └── vaina/
//! ```
//!
//! Class indices follow the sorted order of the subdirectory names.

pub mod burn_dataset;
pub mod loader;
pub mod preprocess;
pub mod split;

use std::path::Path;

pub use burn_dataset::{BeanPartsBatch, BeanPartsBatcher, BeanPartsDataset, BeanPartsItem};
pub use loader::{DatasetStats, ImageFolder, ImageSample};
pub use preprocess::{load_image_tensor, preprocess_image};
pub use split::{DatasetSplits, SplitConfig};

/// Class names in the order the directory tree produces them.
///
/// This list is maintained by hand for the predictor; it must match the
/// sorted subdirectory names the model was trained on.
pub const DEFAULT_CLASS_NAMES: [&str; 4] = ["fondo no necesario", "hoja", "tallo y planta", "vaina"];

/// File extensions (lowercase) accepted as images
pub const IMAGE_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "bmp", "ppm", "tif", "tiff", "webp"];

/// Check whether a path has one of the accepted image extensions
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Default class names as owned strings
pub fn default_class_names() -> Vec<String> {
    DEFAULT_CLASS_NAMES.iter().map(|s| s.to_string()).collect()
}
