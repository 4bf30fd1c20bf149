//! Inference Predictor Module
//!
//! Loads a trained model and classifies single images, preprocessed exactly
//! as during training.

use std::path::{Path, PathBuf};

use burn::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dataset::load_image_tensor;
use crate::model::storage::{load_model, metadata_path, record_path, ModelMetadata};
use crate::model::{BeanPartsClassifier, BeanPartsClassifierConfig};
use crate::utils::error::{BeanDoctorError, Result};

/// Result of a single prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Path to the input image (if applicable)
    pub image_path: Option<PathBuf>,

    /// Probability of each class, in class-list order
    pub probabilities: Vec<f32>,

    /// Display name of each class
    pub class_names: Vec<String>,

    /// Predicted class index
    pub predicted_class: usize,

    /// Predicted class name
    pub class_name: String,

    /// Probability of the predicted class
    pub confidence: f32,
}

impl PredictionResult {
    /// Build a result from a probability vector
    ///
    /// `class_names` must have one entry per probability. Ties resolve to
    /// the lowest index.
    pub fn new(probabilities: Vec<f32>, class_names: Vec<String>, image_path: Option<PathBuf>) -> Self {
        let (predicted_class, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, p)| if p > best.1 { (i, p) } else { best });

        let class_name = class_names
            .get(predicted_class)
            .cloned()
            .unwrap_or_else(|| format!("class {}", predicted_class));

        Self {
            image_path,
            probabilities,
            class_names,
            predicted_class,
            class_name,
            confidence: confidence.max(0.0),
        }
    }

    /// Render the per-class distribution and the top prediction
    pub fn report(&self) -> String {
        let mut output = String::from("Prediction results:\n");

        for (name, prob) in self.class_names.iter().zip(&self.probabilities) {
            output.push_str(&format!("  {}: {:.2}%\n", name, prob * 100.0));
        }

        output.push('\n');
        output.push_str(&format!("Predicted class: {}\n", self.class_name));
        output.push_str(&format!("Confidence: {:.2}%\n", self.confidence * 100.0));

        output
    }
}

/// A loaded model plus the labels it is displayed with
pub struct Predictor<B: Backend> {
    model: BeanPartsClassifier<B>,
    class_names: Vec<String>,
    image_size: usize,
    device: B::Device,
}

impl<B: Backend> Predictor<B> {
    /// Load a trained model
    ///
    /// Fails when the record is missing, when its output width differs from
    /// the number of class names, or when it was trained at another image
    /// size. A sidecar naming the classes in another order is only reported.
    pub fn load(
        model_path: &Path,
        class_names: Vec<String>,
        image_size: usize,
        device: &B::Device,
    ) -> Result<Self> {
        let config = BeanPartsClassifierConfig::new(class_names.len()).with_image_size(image_size);
        config.validate()?;

        info!("Loading model from {:?}", model_path);
        let model = load_model(config.init::<B>(device), model_path, device)?;
        debug!("Model loaded with {} classes", model.num_classes());

        check_metadata(model_path, &class_names);

        Ok(Self {
            model,
            class_names,
            image_size,
            device: device.clone(),
        })
    }

    /// Class probabilities for one preprocessed image
    pub fn predict_tensor(&self, image: Vec<f32>) -> Result<Vec<f32>> {
        let expected = 3 * self.image_size * self.image_size;
        if image.len() != expected {
            return Err(BeanDoctorError::InvalidInput(format!(
                "expected {} input values, got {}",
                expected,
                image.len()
            )));
        }

        let input = Tensor::<B, 4>::from_data(
            TensorData::new(image, [1, 3, self.image_size, self.image_size]),
            &self.device,
        );

        self.model
            .forward_softmax(input)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| BeanDoctorError::Inference(format!("{:?}", e)))
    }

    /// Classify an image file
    pub fn predict_file(&self, path: &Path) -> Result<PredictionResult> {
        let image = load_image_tensor(path, self.image_size)?;
        let probabilities = self.predict_tensor(image)?;
        debug!("Probabilities for {:?}: {:?}", path, probabilities);

        Ok(PredictionResult::new(
            probabilities,
            self.class_names.clone(),
            Some(path.to_path_buf()),
        ))
    }
}

/// Warn when the training metadata lists the classes differently
fn check_metadata(model_path: &Path, class_names: &[String]) {
    let path = metadata_path(&record_path(model_path));
    match ModelMetadata::load(&path) {
        Ok(metadata) if metadata.class_names != class_names => warn!(
            "Class names {:?} differ from the training order {:?}; labels may be misattributed",
            class_names, metadata.class_names
        ),
        Ok(_) => {}
        Err(e) => debug!("No usable metadata at {:?}: {}", path, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::save_model;
    use burn_ndarray::NdArray;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    type TestBackend = NdArray<f32>;

    const SIZE: usize = 24;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    /// Save a freshly initialized model and a test image
    fn fixture(num_classes: usize) -> (TempDir, PathBuf, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let device = Default::default();
        let model = BeanPartsClassifierConfig::new(num_classes)
            .with_image_size(SIZE)
            .init::<TestBackend>(&device);
        let model_path = save_model(&model, &tmp.path().join("model")).unwrap();

        let image_path = tmp.path().join("leaf.png");
        RgbImage::from_fn(50, 40, |x, y| Rgb([(x * 5) as u8, (y * 6) as u8, 90]))
            .save(&image_path)
            .unwrap();

        (tmp, model_path, image_path)
    }

    #[test]
    fn test_probabilities_sum_to_one_and_deterministic() {
        let (_tmp, model_path, image_path) = fixture(4);
        let device = Default::default();
        let predictor =
            Predictor::<TestBackend>::load(&model_path, names(&["a", "b", "c", "d"]), SIZE, &device).unwrap();

        let first = predictor.predict_file(&image_path).unwrap();
        let second = predictor.predict_file(&image_path).unwrap();

        let sum: f32 = first.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
        assert_eq!(first.probabilities, second.probabilities);
        assert_eq!(first.probabilities[first.predicted_class], first.confidence);
    }

    #[test]
    fn test_swapped_labels_keep_probabilities() {
        let (_tmp, model_path, image_path) = fixture(2);
        let device = Default::default();

        let a = Predictor::<TestBackend>::load(&model_path, names(&["hoja", "vaina"]), SIZE, &device)
            .unwrap()
            .predict_file(&image_path)
            .unwrap();
        let b = Predictor::<TestBackend>::load(&model_path, names(&["vaina", "hoja"]), SIZE, &device)
            .unwrap()
            .predict_file(&image_path)
            .unwrap();

        assert_eq!(a.probabilities, b.probabilities);
        assert_eq!(a.predicted_class, b.predicted_class);
        assert_ne!(a.class_name, b.class_name);
    }

    #[test]
    fn test_class_count_mismatch() {
        let (_tmp, model_path, _) = fixture(3);
        let device = Default::default();

        let result = Predictor::<TestBackend>::load(&model_path, names(&["a", "b"]), SIZE, &device);
        assert!(matches!(result, Err(BeanDoctorError::Model(_))));
    }

    #[test]
    fn test_image_size_mismatch() {
        let (_tmp, model_path, _) = fixture(2);
        let device = Default::default();

        let result = Predictor::<TestBackend>::load(&model_path, names(&["a", "b"]), 32, &device);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_model_and_image() {
        let (_tmp, model_path, _) = fixture(2);
        let device = Default::default();

        let missing = Predictor::<TestBackend>::load(Path::new("/no/model.mpk"), names(&["a", "b"]), SIZE, &device);
        assert!(missing.is_err());

        let predictor = Predictor::<TestBackend>::load(&model_path, names(&["a", "b"]), SIZE, &device).unwrap();
        assert!(predictor.predict_file(Path::new("/no/image.jpg")).is_err());
    }

    #[test]
    fn test_report_format() {
        let result = PredictionResult::new(
            vec![0.1, 0.7, 0.15, 0.05],
            names(&["fondo no necesario", "hoja", "tallo y planta", "vaina"]),
            None,
        );

        let expected = "Prediction results:\n  fondo no necesario: 10.00%\n  hoja: 70.00%\n  tallo y planta: 15.00%\n  vaina: 5.00%\n\nPredicted class: hoja\nConfidence: 70.00%\n";
        assert_eq!(result.report(), expected);
    }
}
