//! Image Folder Loader
//!
//! Discovers a labeled image tree on disk: every immediate subdirectory of
//! the root is a class, every image file below it (recursively) is a sample.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::is_image_file;
use crate::utils::error::{BeanDoctorError, Result};

/// A single image sample with its label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSample {
    /// Path to the image file
    pub path: PathBuf,
    /// Class label index (position in the sorted class list)
    pub label: usize,
}

/// A class-per-subdirectory image tree
#[derive(Debug, Clone)]
pub struct ImageFolder {
    /// Root directory of the tree
    pub root_dir: PathBuf,
    /// Class names, sorted; index = label
    pub class_names: Vec<String>,
    /// All samples, grouped by class and sorted by path within a class
    pub samples: Vec<ImageSample>,
}

impl ImageFolder {
    /// Scan a directory tree
    ///
    /// Fails if the root does not exist, has no class subdirectories or
    /// contains no images at all.
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        info!("Loading image tree from: {:?}", root_dir);

        if !root_dir.is_dir() {
            return Err(BeanDoctorError::PathNotFound(root_dir));
        }

        let mut class_names: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&root_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                class_names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        class_names.sort();

        if class_names.is_empty() {
            return Err(BeanDoctorError::Dataset(format!(
                "No class subdirectories found in {:?}",
                root_dir
            )));
        }

        info!("Found {} classes: {:?}", class_names.len(), class_names);

        let mut samples = Vec::new();
        for (label, class_name) in class_names.iter().enumerate() {
            let class_dir = root_dir.join(class_name);
            let before = samples.len();

            for entry in WalkDir::new(&class_dir)
                .min_depth(1)
                .follow_links(false)
                .sort_by_file_name()
            {
                let entry = entry.map_err(|e| {
                    BeanDoctorError::Dataset(format!("Failed to walk {:?}: {}", class_dir, e))
                })?;

                if entry.file_type().is_file() && is_image_file(entry.path()) {
                    samples.push(ImageSample {
                        path: entry.path().to_path_buf(),
                        label,
                    });
                }
            }

            let count = samples.len() - before;
            if count == 0 {
                warn!("Class '{}' contains no images", class_name);
            }
            debug!("Class '{}' (label {}): {} images", class_name, label, count);
        }

        if samples.is_empty() {
            return Err(BeanDoctorError::Dataset(format!(
                "No images found under {:?}",
                root_dir
            )));
        }

        info!("Found {} images", samples.len());

        Ok(Self {
            root_dir,
            class_names,
            samples,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Samples belonging to one class, in discovery order
    pub fn samples_of_class(&self, label: usize) -> Vec<&ImageSample> {
        self.samples.iter().filter(|s| s.label == label).collect()
    }

    /// Per-class sample counts
    pub fn stats(&self) -> DatasetStats {
        let mut class_counts = vec![0usize; self.num_classes()];
        for sample in &self.samples {
            class_counts[sample.label] += 1;
        }

        DatasetStats {
            total_samples: self.samples.len(),
            num_classes: self.num_classes(),
            class_counts,
            class_names: self.class_names.clone(),
        }
    }
}

/// Statistics about an image tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_samples: usize,
    pub num_classes: usize,
    pub class_counts: Vec<usize>,
    pub class_names: Vec<String>,
}

impl DatasetStats {
    /// Render the class distribution, one line per class
    pub fn display(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("  Total samples: {}\n", self.total_samples));
        output.push_str(&format!("  Number of classes: {}\n\n", self.num_classes));

        for (idx, (name, count)) in self.class_names.iter().zip(&self.class_counts).enumerate() {
            let share = if self.total_samples > 0 {
                *count as f64 / self.total_samples as f64
            } else {
                0.0
            };
            output.push_str(&format!(
                "  {:2}. {:24} {:6}  {}\n",
                idx,
                name,
                count,
                crate::utils::format_progress_bar(share, 30)
            ));
        }

        output
    }
}
