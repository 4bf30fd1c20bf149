//! Metrics Module
//!
//! Running loss/accuracy accumulators used by the training loop and a
//! confusion matrix for the final validation report.

use serde::{Deserialize, Serialize};

/// Running average for tracking the loss over an epoch
#[derive(Debug, Clone, Default)]
pub struct RunningAverage {
    sum: f64,
    count: usize,
}

impl RunningAverage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value weighted by the number of samples it covers
    pub fn add_weighted(&mut self, value: f64, weight: usize) {
        self.sum += value * weight as f64;
        self.count += weight;
    }

    pub fn average(&self) -> f64 {
        if self.count > 0 {
            self.sum / self.count as f64
        } else {
            0.0
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// Accuracy tracker for training and validation passes
#[derive(Debug, Clone, Default)]
pub struct AccuracyTracker {
    correct: usize,
    total: usize,
}

impl AccuracyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the result of a batch: number of correct predictions out of `total`
    pub fn add_counts(&mut self, correct: usize, total: usize) {
        self.correct += correct;
        self.total += total;
    }

    /// Accuracy in the range [0, 1]
    pub fn accuracy(&self) -> f64 {
        if self.total > 0 {
            self.correct as f64 / self.total as f64
        } else {
            0.0
        }
    }

    pub fn count(&self) -> usize {
        self.total
    }
}

/// Confusion Matrix for multi-class classification
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Number of classes
    pub num_classes: usize,

    /// Row-major counts (row = actual, column = predicted)
    pub matrix: Vec<usize>,
}

impl ConfusionMatrix {
    /// Create a new empty confusion matrix
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            matrix: vec![0; num_classes * num_classes],
        }
    }

    /// Build a matrix from parallel prediction / ground-truth slices
    pub fn from_predictions(predictions: &[usize], ground_truth: &[usize], num_classes: usize) -> Self {
        let mut cm = Self::new(num_classes);
        for (&pred, &actual) in predictions.iter().zip(ground_truth.iter()) {
            cm.add(actual, pred);
        }
        cm
    }

    /// Record a single prediction; out-of-range indices are ignored
    pub fn add(&mut self, actual: usize, predicted: usize) {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted] += 1;
        }
    }

    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted]
        } else {
            0
        }
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().sum()
    }

    /// Diagonal sum
    pub fn correct(&self) -> usize {
        (0..self.num_classes).map(|i| self.get(i, i)).sum()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total > 0 {
            self.correct() as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Recall of each class (correct / actual count), 0 for absent classes
    pub fn per_class_recall(&self) -> Vec<f64> {
        (0..self.num_classes)
            .map(|row| {
                let support: usize = (0..self.num_classes).map(|col| self.get(row, col)).sum();
                if support > 0 {
                    self.get(row, row) as f64 / support as f64
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Render the matrix with (truncated) class names as row/column labels
    pub fn display(&self, class_names: &[String]) -> String {
        let short = |idx: usize, width: usize| -> String {
            class_names
                .get(idx)
                .map(|n| n.chars().take(width).collect())
                .unwrap_or_else(|| idx.to_string())
        };

        let mut output = String::new();
        output.push_str("Confusion Matrix (rows=actual, cols=predicted):\n\n");

        output.push_str(&format!("{:>16} ", ""));
        for col in 0..self.num_classes {
            output.push_str(&format!("{:>8}", short(col, 7)));
        }
        output.push('\n');

        let recall = self.per_class_recall();
        for row in 0..self.num_classes {
            output.push_str(&format!("{:>16} ", short(row, 16)));
            for col in 0..self.num_classes {
                let count = self.get(row, col);
                if row == col {
                    output.push_str(&format!("[{:>6}]", count));
                } else {
                    output.push_str(&format!(" {:>6} ", count));
                }
            }
            output.push_str(&format!("  recall {:>6.2}%\n", recall[row] * 100.0));
        }

        output.push_str(&format!("\nAccuracy: {:.2}%\n", self.accuracy() * 100.0));
        output
    }
}
