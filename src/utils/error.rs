//! Error type shared by the dataset, model, training and inference modules

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BeanDoctorError {
    /// An image could not be read or decoded
    #[error("Failed to load image at '{0}': {1}")]
    ImageLoad(PathBuf, String),

    /// Class discovery or the train/validation split failed
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// A model record could not be saved, loaded or matched to the config
    #[error("Model error: {0}")]
    Model(String),

    #[error("Inference error: {0}")]
    Inference(String),

    /// Rejected hyperparameter or architecture setting
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata or history JSON could not be written or parsed
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

impl From<serde_json::Error> for BeanDoctorError {
    fn from(err: serde_json::Error) -> Self {
        BeanDoctorError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BeanDoctorError>;

/// Turn a missing value into an `InvalidInput` error
pub trait OptionExt<T> {
    fn or_invalid<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_invalid<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.ok_or_else(|| BeanDoctorError::InvalidInput(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_load_error() {
        let path = PathBuf::from("/data/hoja/leaf.jpg");
        let err = BeanDoctorError::ImageLoad(path, "unsupported format".to_string());
        let msg = err.to_string();
        assert!(msg.contains("leaf.jpg"));
        assert!(msg.contains("unsupported format"));
    }

    #[test]
    fn test_json_error_conversion() {
        let parsed: std::result::Result<Vec<String>, _> = serde_json::from_str("{not json");
        let err: BeanDoctorError = parsed.unwrap_err().into();
        assert!(matches!(err, BeanDoctorError::Serialization(_)));
    }

    #[test]
    fn test_or_invalid() {
        let missing: Option<&str> = None;
        let err = missing.or_invalid(|| "no class names given".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: no class names given");
        assert_eq!(Some(3).or_invalid(String::new).unwrap(), 3);
    }
}
