//! Model persistence
//!
//! A trained model is stored as a burn record (`<stem>.mpk`) with a JSON
//! sidecar (`<stem>.json`) describing how it was trained.

use std::path::{Path, PathBuf};

use burn::{
    module::Module,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
    tensor::backend::Backend,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::cnn::{BeanPartsClassifier, BeanPartsClassifierRecord};
use crate::utils::error::{BeanDoctorError, Result};
use crate::MODEL_FILE_PREFIX;

/// Extension the record file ends up with
pub const MODEL_EXTENSION: &str = "mpk";

type ModelRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// File stem of a model trained for `epochs` epochs
pub fn model_file_stem(epochs: usize) -> String {
    format!("{}{}", MODEL_FILE_PREFIX, epochs)
}

/// Full record path inside `output_dir`
pub fn model_path(output_dir: &Path, epochs: usize) -> PathBuf {
    output_dir
        .join(model_file_stem(epochs))
        .with_extension(MODEL_EXTENSION)
}

/// Record file for a user-given model path
///
/// A path without the `mpk` extension gets it appended, so `model.v2`
/// names `model.v2.mpk` rather than `model.mpk`.
pub fn record_path(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == MODEL_EXTENSION) {
        return path.to_path_buf();
    }
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(MODEL_EXTENSION);
    PathBuf::from(name)
}

/// Sidecar metadata path for a record path
pub fn metadata_path(model_path: &Path) -> PathBuf {
    model_path.with_extension("json")
}

/// Training history path for a record path
pub fn history_path(model_path: &Path) -> PathBuf {
    let stem = model_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    model_path.with_file_name(format!("{}_history.json", stem))
}

/// Write a model record to [`record_path`]`(path)` and return that path
pub fn save_model<B: Backend>(model: &BeanPartsClassifier<B>, path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let saved = record_path(path);
    let recorder = ModelRecorder::new();
    model
        .clone()
        .save_file(saved.clone(), &recorder)
        .map_err(|e| BeanDoctorError::Model(format!("Failed to save model: {:?}", e)))?;

    info!("Model saved to {:?}", saved);
    Ok(saved)
}

/// Load a model record into an initialized model
///
/// The record's dense layers must have the same shapes as `model`'s,
/// i.e. the same class count and input image size.
pub fn load_model<B: Backend>(
    model: BeanPartsClassifier<B>,
    path: &Path,
    device: &B::Device,
) -> Result<BeanPartsClassifier<B>> {
    let record_path = record_path(path);
    if !record_path.is_file() {
        return Err(BeanDoctorError::Model(if record_path == path {
            format!("Model file not found: {:?}", path)
        } else {
            format!("Model file not found: {:?} (looked for {:?})", path, record_path)
        }));
    }

    debug!("Loading model record from {:?}", record_path);

    let record: BeanPartsClassifierRecord<B> = ModelRecorder::new()
        .load(record_path.clone(), device)
        .map_err(|e| {
            BeanDoctorError::Model(format!("Failed to load model {:?}: {:?}", record_path, e))
        })?;

    let record_classes = record.fc2.weight.val().dims()[1];
    if record_classes != model.num_classes() {
        return Err(BeanDoctorError::Model(format!(
            "Model predicts {} classes, expected {}",
            record_classes,
            model.num_classes()
        )));
    }

    let record_features = record.fc1.weight.val().dims()[0];
    if record_features != model.flatten_size() {
        return Err(BeanDoctorError::Model(format!(
            "Model has {} dense inputs, expected {}; was it trained at another image size?",
            record_features,
            model.flatten_size()
        )));
    }

    Ok(model.load_record(record))
}

/// Description of a trained model, saved next to its record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Class names in label order (sorted directory names)
    pub class_names: Vec<String>,

    /// Input image size the model was trained on
    pub image_size: usize,

    pub epochs: usize,

    /// Seed of the train/validation split
    pub split_seed: u64,

    /// Training accuracy of the last epoch, in [0, 1]
    pub train_accuracy: f64,

    /// Validation accuracy of the last epoch, in [0, 1]
    pub val_accuracy: f64,

    /// Training timestamp (RFC 3339)
    pub trained_at: String,

    pub backend: String,
}

impl ModelMetadata {
    pub fn new(
        class_names: Vec<String>,
        image_size: usize,
        epochs: usize,
        split_seed: u64,
        train_accuracy: f64,
        val_accuracy: f64,
    ) -> Self {
        Self {
            class_names,
            image_size,
            epochs,
            split_seed,
            train_accuracy,
            val_accuracy,
            trained_at: chrono::Local::now().to_rfc3339(),
            backend: crate::backend::backend_name().to_string(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!("Model metadata saved to {:?}", path);
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(BeanDoctorError::PathNotFound(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BeanPartsClassifierConfig;
    use burn::tensor::Tensor;
    use burn_ndarray::NdArray;
    use tempfile::TempDir;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_paths() {
        let dir = Path::new("out");
        let path = model_path(dir, 20);

        assert_eq!(path, PathBuf::from("out/modelo_final_partes_planta_v20.mpk"));
        assert_eq!(
            metadata_path(&path),
            PathBuf::from("out/modelo_final_partes_planta_v20.json")
        );
        assert_eq!(
            history_path(&path),
            PathBuf::from("out/modelo_final_partes_planta_v20_history.json")
        );
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let device = Default::default();
        let config = BeanPartsClassifierConfig::new(3).with_image_size(24);

        let model = config.init::<TestBackend>(&device);
        let saved = save_model(&model, &tmp.path().join("model")).unwrap();
        assert!(saved.ends_with("model.mpk"));
        assert!(saved.is_file());

        let loaded = load_model(config.init::<TestBackend>(&device), &saved, &device).unwrap();

        let input = Tensor::<TestBackend, 4>::ones([1, 3, 24, 24], &device);
        let a: Vec<f32> = model.forward(input.clone()).into_data().to_vec().unwrap();
        let b: Vec<f32> = loaded.forward(input).into_data().to_vec().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_load_missing_file() {
        let device = Default::default();
        let model = BeanPartsClassifierConfig::new(2)
            .with_image_size(24)
            .init::<TestBackend>(&device);

        let err = load_model(model, Path::new("/no/such/model.mpk"), &device).unwrap_err();
        assert!(matches!(err, BeanDoctorError::Model(_)));
    }

    #[test]
    fn test_record_path_keeps_dotted_names() {
        assert_eq!(record_path(Path::new("runs/model")), PathBuf::from("runs/model.mpk"));
        assert_eq!(record_path(Path::new("runs/model.mpk")), PathBuf::from("runs/model.mpk"));
        assert_eq!(record_path(Path::new("runs/model.v2")), PathBuf::from("runs/model.v2.mpk"));
    }

    #[test]
    fn test_dotted_name_does_not_load_sibling() {
        let tmp = TempDir::new().unwrap();
        let device = Default::default();
        let config = BeanPartsClassifierConfig::new(2).with_image_size(24);

        save_model(&config.init::<TestBackend>(&device), &tmp.path().join("model")).unwrap();
        let err = load_model(config.init::<TestBackend>(&device), &tmp.path().join("model.v2"), &device)
            .unwrap_err();
        assert!(err.to_string().contains("model.v2"));

        let saved = save_model(&config.init::<TestBackend>(&device), &tmp.path().join("model.v2")).unwrap();
        assert!(saved.ends_with("model.v2.mpk"));
        assert!(load_model(config.init::<TestBackend>(&device), &tmp.path().join("model.v2"), &device).is_ok());
    }

    #[test]
    fn test_load_rejects_other_shapes() {
        let tmp = TempDir::new().unwrap();
        let device = Default::default();
        let config = BeanPartsClassifierConfig::new(3).with_image_size(24);
        let saved = save_model(&config.init::<TestBackend>(&device), &tmp.path().join("model")).unwrap();

        let fewer_classes = BeanPartsClassifierConfig::new(2).with_image_size(24);
        let err = load_model(fewer_classes.init::<TestBackend>(&device), &saved, &device).unwrap_err();
        assert!(err.to_string().contains("3 classes"));

        let larger_images = BeanPartsClassifierConfig::new(3).with_image_size(32);
        assert!(load_model(larger_images.init::<TestBackend>(&device), &saved, &device).is_err());
    }

    #[test]
    fn test_metadata_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("meta.json");

        let meta = ModelMetadata::new(
            vec!["hoja".to_string(), "vaina".to_string()],
            256,
            20,
            42,
            0.9,
            0.85,
        );
        meta.save(&path).unwrap();

        assert_eq!(ModelMetadata::load(&path).unwrap(), meta);
        assert!(ModelMetadata::load(&tmp.path().join("missing.json")).is_err());
    }
}
