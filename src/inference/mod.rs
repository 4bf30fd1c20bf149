//! Inference module for single-image prediction
//!
//! This module provides:
//! - Model loading with label-list validation
//! - Single image prediction and the console report

pub mod predictor;

pub use predictor::{PredictionResult, Predictor};

use crate::utils::error::{OptionExt, Result};

/// Parse a comma-separated class list such as `hoja,vaina`
///
/// Surrounding whitespace is trimmed; empty entries are rejected.
pub fn parse_class_list(list: &str) -> Result<Vec<String>> {
    list.split(',')
        .map(|name| {
            let name = name.trim();
            (!name.is_empty())
                .then(|| name.to_string())
                .or_invalid(|| format!("empty class name in {:?}", list))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_class_list() {
        assert_eq!(
            parse_class_list("fondo no necesario, hoja,tallo y planta ,vaina").unwrap(),
            vec!["fondo no necesario", "hoja", "tallo y planta", "vaina"]
        );
        assert!(parse_class_list("hoja,,vaina").is_err());
        assert!(parse_class_list("").is_err());
    }
}
