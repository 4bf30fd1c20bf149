//! Utilities module for logging, metrics, and helper functions
//!
//! This module provides:
//! - Structured logging with tracing
//! - Loss/accuracy accumulators and a confusion matrix
//! - Error handling types
//! - Console formatting helpers

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{BeanDoctorError, OptionExt, Result};
pub use logging::{init_logging, LogConfig};
pub use metrics::{AccuracyTracker, ConfusionMatrix, RunningAverage};

/// Format a duration in a human-readable way
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{:.1}s", seconds)
    } else if seconds < 3600.0 {
        let minutes = (seconds / 60.0).floor();
        let secs = seconds % 60.0;
        format!("{}m {:.0}s", minutes as u32, secs)
    } else {
        let hours = (seconds / 3600.0).floor();
        let minutes = ((seconds % 3600.0) / 60.0).floor();
        format!("{}h {}m", hours as u32, minutes as u32)
    }
}

/// Format a fraction (0.0 - 1.0) as a bar followed by its percentage
pub fn format_progress_bar(progress: f64, width: usize) -> String {
    let progress = progress.clamp(0.0, 1.0);
    let filled = (progress * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);

    format!(
        "[{}{}] {:.1}%",
        "█".repeat(filled),
        "░".repeat(empty),
        progress * 100.0
    )
}
