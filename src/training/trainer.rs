//! Supervised training loop
//!
//! A plain custom loop over Burn's optimizer API: shuffle, batch, step,
//! then evaluate on the validation subset with the non-autodiff backend.

use std::path::{Path, PathBuf};

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use super::history::{EpochMetrics, TrainingHistory};
use crate::dataset::{BeanPartsBatch, BeanPartsBatcher, BeanPartsDataset, DatasetSplits, ImageFolder};
use crate::model::storage::{history_path, metadata_path, model_path, save_model, ModelMetadata};
use crate::model::{BeanPartsClassifier, TrainingConfig};
use crate::utils::error::Result;
use crate::utils::logging::TrainingLogger;
use crate::utils::{format_duration, AccuracyTracker, ConfusionMatrix, RunningAverage};

/// Files and results of a finished training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model_path: PathBuf,
    pub metadata_path: PathBuf,
    pub history_path: PathBuf,
    pub history: TrainingHistory,
    /// Class names in label order
    pub class_names: Vec<String>,
    /// Seed of the train/validation split
    pub split_seed: u64,
    /// Validation confusion matrix of the final model
    pub confusion: ConfusionMatrix,
}

/// Loss, accuracy and predictions over a dataset
struct Evaluation {
    loss: f64,
    accuracy: f64,
    predictions: Vec<usize>,
    targets: Vec<usize>,
}

/// Train a classifier on the image tree at `data_dir`
///
/// The number of classes is taken from the directory tree and overrides
/// `config.model.num_classes`. The model, its metadata and the history are
/// written to `output_dir`.
pub fn run_training<B>(data_dir: &Path, output_dir: &Path, config: &TrainingConfig) -> Result<TrainingOutcome>
where
    B: AutodiffBackend,
{
    println!("{}", "Initializing Training...".green().bold());

    let device = B::Device::default();
    info!("Training on {} ({:?})", crate::backend::backend_name(), device);

    // Dataset
    println!("{}", "Loading Dataset...".cyan());
    let folder = ImageFolder::new(data_dir)?;
    println!("{}", folder.stats().display());

    let mut config = config.clone();
    config.model.num_classes = folder.num_classes();
    config.validate()?;

    let splits = DatasetSplits::from_folder(&folder, &config.split_config()?)?;
    println!("{}", splits);

    let image_size = config.model.image_size;
    let (train_dataset, val_dataset) = if config.cache_images {
        println!("{}", "Pre-loading Training Data...".cyan().bold());
        let train = BeanPartsDataset::new_cached(splits.train.clone(), image_size)?;
        println!("{}", "Pre-loading Validation Data...".cyan().bold());
        let val = BeanPartsDataset::new_cached(splits.validation.clone(), image_size)?;
        (train, val)
    } else {
        (
            BeanPartsDataset::new(splits.train.clone(), image_size),
            BeanPartsDataset::new(splits.validation.clone(), image_size),
        )
    };

    let batcher = BeanPartsBatcher::new(image_size);

    // Model and optimizer
    let mut model: BeanPartsClassifier<B> = config.model.init(&device);
    let mut optimizer = AdamConfig::new().with_epsilon(config.epsilon).init();
    let loss_fn = CrossEntropyLossConfig::new().init(&device);

    println!();
    println!("{}", "Training Configuration:".cyan().bold());
    println!("  Classes:            {}", splits.num_classes());
    println!("  Training samples:   {}", train_dataset.len());
    println!("  Validation samples: {}", val_dataset.len());
    println!("  Image size:         {}x{}", image_size, image_size);
    println!("  Epochs:             {}", config.epochs);
    println!("  Batch size:         {}", config.batch_size);
    println!("  Learning rate:      {}", config.learning_rate);
    println!("  Split seed:         {}", splits.seed);
    println!();

    println!("{}", "Starting Training...".green().bold());
    println!();

    let mut history = TrainingHistory::new();
    let mut logger = TrainingLogger::new(config.epochs);
    let mut epoch_rng = ChaCha8Rng::seed_from_u64(splits.seed.wrapping_add(1));
    let mut last_eval = None;

    let num_batches = train_dataset.len().div_ceil(config.batch_size);

    for epoch in 0..config.epochs {
        logger.start_epoch(epoch);
        println!("{}", format!("Epoch {}/{}", epoch + 1, config.epochs).yellow().bold());

        let mut indices: Vec<usize> = (0..train_dataset.len()).collect();
        indices.shuffle(&mut epoch_rng);

        let pb = epoch_progress_bar(num_batches);
        let mut train_loss = RunningAverage::new();
        let mut train_acc = AccuracyTracker::new();

        for chunk in indices.chunks(config.batch_size) {
            let items = train_dataset.get_many(chunk)?;
            let batch: BeanPartsBatch<B> = batcher.batch(items, &device);
            let batch_len = batch.targets.dims()[0];

            let output = model.forward(batch.images);
            let loss = loss_fn.forward(output.clone(), batch.targets.clone());

            let loss_value: f64 = loss.clone().into_scalar().elem();
            train_loss.add_weighted(loss_value, batch_len);
            train_acc.add_counts(count_correct(output, batch.targets), batch_len);

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(config.learning_rate, model, grads);

            pb.set_message(format!("loss {:.4}", train_loss.average()));
            pb.inc(1);
        }
        pb.finish_and_clear();

        let eval = evaluate(&model.valid(), &val_dataset, &batcher, config.batch_size)?;
        let duration_secs = logger.end_epoch(train_loss.average(), train_acc.accuracy(), eval.accuracy);

        let metrics = EpochMetrics {
            epoch: epoch + 1,
            train_loss: train_loss.average(),
            train_accuracy: train_acc.accuracy(),
            val_loss: eval.loss,
            val_accuracy: eval.accuracy,
            duration_secs,
        };

        let is_best = history
            .best_epoch()
            .map_or(true, |best| metrics.val_accuracy > best.val_accuracy);

        println!(
            "  {} Loss: {:.4} | Acc: {:.2}% | Val Loss: {:.4} | Val Acc: {:.2}% {}",
            "→".cyan(),
            metrics.train_loss,
            metrics.train_accuracy * 100.0,
            metrics.val_loss,
            metrics.val_accuracy * 100.0,
            if is_best { "(best)".green().to_string() } else { String::new() }
        );

        history.push(metrics);
        last_eval = Some(eval);
    }

    let best_accuracy = history.best_epoch().map_or(0.0, |m| m.val_accuracy);
    logger.log_complete(best_accuracy);

    let confusion = match &last_eval {
        Some(eval) => ConfusionMatrix::from_predictions(&eval.predictions, &eval.targets, splits.num_classes()),
        None => ConfusionMatrix::new(splits.num_classes()),
    };
    println!();
    println!("{}", confusion.display(&splits.class_names));

    // Persist
    println!("{}", "Saving Model...".cyan());
    std::fs::create_dir_all(output_dir)?;

    let saved_path = save_model(&model, &model_path(output_dir, config.epochs))?;

    let last = history.last();
    let metadata = ModelMetadata::new(
        splits.class_names.clone(),
        image_size,
        config.epochs,
        splits.seed,
        last.map_or(0.0, |m| m.train_accuracy),
        last.map_or(0.0, |m| m.val_accuracy),
    );
    let meta_path = metadata_path(&saved_path);
    metadata.save(&meta_path)?;

    let hist_path = history_path(&saved_path);
    history.save(&hist_path)?;
    debug!("History saved to {:?}", hist_path);

    println!("  Model saved as: {}", saved_path.display());
    println!();
    println!("{}", "Training Complete!".green().bold());
    println!("  Best validation accuracy: {:.2}%", best_accuracy * 100.0);
    println!("  Training time: {}", format_duration(history.total_duration_secs()));

    Ok(TrainingOutcome {
        model_path: saved_path,
        metadata_path: meta_path,
        history_path: hist_path,
        history,
        class_names: splits.class_names.clone(),
        split_seed: splits.seed,
        confusion,
    })
}

fn epoch_progress_bar(num_batches: usize) -> ProgressBar {
    let pb = ProgressBar::new(num_batches as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Number of rows whose arg-max matches the target
fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let predictions = logits.argmax(1).flatten::<1>(0, 1);
    let correct: i64 = predictions.equal(targets).int().sum().into_scalar().elem();
    correct as usize
}

/// Evaluate a (non-autodiff) model on a dataset
fn evaluate<B: Backend>(
    model: &BeanPartsClassifier<B>,
    dataset: &BeanPartsDataset,
    batcher: &BeanPartsBatcher,
    batch_size: usize,
) -> Result<Evaluation> {
    let device = B::Device::default();
    let loss_fn = CrossEntropyLossConfig::new().init(&device);

    let mut loss = RunningAverage::new();
    let mut predictions = Vec::with_capacity(dataset.len());
    let mut targets = Vec::with_capacity(dataset.len());

    let indices: Vec<usize> = (0..dataset.len()).collect();
    for chunk in indices.chunks(batch_size) {
        let items = dataset.get_many(chunk)?;
        let batch: BeanPartsBatch<B> = batcher.batch(items, &device);
        let batch_len = batch.targets.dims()[0];

        let output = model.forward(batch.images);
        let batch_loss: f64 = loss_fn
            .forward(output.clone(), batch.targets.clone())
            .into_scalar()
            .elem();
        loss.add_weighted(batch_loss, batch_len);

        let predicted = output.argmax(1).flatten::<1>(0, 1).into_data();
        predictions.extend(predicted.iter::<i64>().map(|p| p as usize));
        targets.extend(batch.targets.into_data().iter::<i64>().map(|t| t as usize));
    }

    let correct = predictions.iter().zip(&targets).filter(|(p, t)| p == t).count();
    let accuracy = if targets.is_empty() {
        0.0
    } else {
        correct as f64 / targets.len() as f64
    };

    Ok(Evaluation {
        loss: loss.average(),
        accuracy,
        predictions,
        targets,
    })
}
