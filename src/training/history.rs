//! Per-epoch training history

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::error::Result;

/// Metrics of one epoch; accuracies are in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 1-based epoch number
    pub epoch: usize,
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochMetrics>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, metrics: EpochMetrics) {
        self.epochs.push(metrics);
    }

    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    /// Epoch with the highest validation accuracy (earliest on ties)
    pub fn best_epoch(&self) -> Option<&EpochMetrics> {
        self.epochs.iter().fold(None, |best: Option<&EpochMetrics>, m| match best {
            Some(b) if b.val_accuracy >= m.val_accuracy => Some(b),
            _ => Some(m),
        })
    }

    pub fn total_duration_secs(&self) -> f64 {
        self.epochs.iter().map(|m| m.duration_secs).sum()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(epoch: usize, val_accuracy: f64) -> EpochMetrics {
        EpochMetrics {
            epoch,
            train_loss: 1.0 / epoch as f64,
            train_accuracy: 0.5,
            val_loss: 0.8,
            val_accuracy,
            duration_secs: 2.0,
        }
    }

    #[test]
    fn test_best_epoch() {
        let mut history = TrainingHistory::new();
        assert!(history.best_epoch().is_none());

        history.push(metrics(1, 0.4));
        history.push(metrics(2, 0.7));
        history.push(metrics(3, 0.7));
        history.push(metrics(4, 0.6));

        assert_eq!(history.best_epoch().unwrap().epoch, 2);
        assert_eq!(history.last().unwrap().epoch, 4);
        assert!((history.total_duration_secs() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_save_and_load() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("history.json");

        let mut history = TrainingHistory::new();
        history.push(metrics(1, 0.5));
        history.save(&path).unwrap();

        let loaded: TrainingHistory =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.epochs, history.epochs);
    }
}
