//! Logging Module
//!
//! Structured logging via the `tracing` crate, plus a small helper that logs
//! per-epoch training progress.

use std::time::Instant;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: LogLevel,
    /// Whether to include target (module path)
    pub include_target: bool,
    /// Whether to include thread IDs
    pub include_thread_ids: bool,
    /// Whether to use ANSI colors
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            include_target: false,
            include_thread_ids: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    /// Verbose logging for debugging
    pub fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            include_target: true,
            include_thread_ids: true,
            ansi_colors: true,
        }
    }

    /// Errors and warnings only
    pub fn quiet() -> Self {
        Self {
            level: LogLevel::Warn,
            include_target: false,
            include_thread_ids: false,
            ansi_colors: true,
        }
    }
}

/// Log level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Convert to tracing Level
    pub fn to_tracing_level(&self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Initialize the global tracing subscriber
///
/// Fails if a global subscriber was already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.level.to_tracing_level())
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .with_thread_ids(config.include_thread_ids)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Training progress logger
pub struct TrainingLogger {
    epoch: usize,
    total_epochs: usize,
    epoch_start: Instant,
    training_start: Instant,
}

impl TrainingLogger {
    /// Create a new training logger
    pub fn new(total_epochs: usize) -> Self {
        Self {
            epoch: 0,
            total_epochs,
            epoch_start: Instant::now(),
            training_start: Instant::now(),
        }
    }

    /// Log start of an epoch (zero-based index)
    pub fn start_epoch(&mut self, epoch: usize) {
        self.epoch = epoch;
        self.epoch_start = Instant::now();

        tracing::debug!("Epoch {}/{} started", epoch + 1, self.total_epochs);
    }

    /// Log end of an epoch and return its wall-clock duration in seconds
    pub fn end_epoch(&self, train_loss: f64, train_accuracy: f64, val_accuracy: f64) -> f64 {
        let epoch_secs = self.epoch_start.elapsed().as_secs_f64();
        let total_secs = self.training_start.elapsed().as_secs_f64();

        let epochs_remaining = self.total_epochs.saturating_sub(self.epoch + 1);
        let avg_epoch_secs = total_secs / (self.epoch + 1) as f64;
        let eta_secs = epochs_remaining as f64 * avg_epoch_secs;

        tracing::info!(
            "Epoch {}/{} completed in {:.1}s | Loss: {:.4} | Acc: {:.2}% | Val Acc: {:.2}% | ETA: {:.0}s",
            self.epoch + 1,
            self.total_epochs,
            epoch_secs,
            train_loss,
            train_accuracy * 100.0,
            val_accuracy * 100.0,
            eta_secs
        );

        epoch_secs
    }

    /// Log training completion
    pub fn log_complete(&self, best_accuracy: f64) {
        tracing::info!(
            "Training complete! {} epochs in {:.1}s | Best val accuracy: {:.2}%",
            self.total_epochs,
            self.training_start.elapsed().as_secs_f64(),
            best_accuracy * 100.0
        );
    }
}
