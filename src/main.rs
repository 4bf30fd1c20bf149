//! Bean Doctor CLI
//!
//! Trains the bean-plant part classifier on a directory tree of labeled
//! images and classifies single images with a trained model.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use bean_doctor::backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
use bean_doctor::dataset::{default_class_names, DatasetSplits, ImageFolder, SplitConfig};
use bean_doctor::inference::{parse_class_list, Predictor};
use bean_doctor::model::{model_file_stem, BeanPartsClassifierConfig, TrainingConfig};
use bean_doctor::training::run_training;
use bean_doctor::utils::logging::{init_logging, LogConfig};
use bean_doctor::{
    DEFAULT_BATCH_SIZE, DEFAULT_EPOCHS, DEFAULT_LEARNING_RATE, IMAGE_SIZE, VALIDATION_SPLIT, VERSION,
};

const DEFAULT_DATA_DIR: &str = "data/partes del frijol";

/// Bean-plant part classification
///
/// Trains a small CNN on photographs sorted into one directory per class
/// and predicts the class of new images.
#[derive(Parser, Debug)]
#[command(name = "bean_doctor")]
#[command(version)]
#[command(about = "Bean-plant part classification with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false", global = true)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, default_value = "false", global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train a model on a labeled image tree
    Train {
        /// Root directory with one subdirectory per class
        #[arg(short, long, default_value = DEFAULT_DATA_DIR)]
        data_dir: PathBuf,

        /// Number of training epochs
        #[arg(short, long, default_value_t = DEFAULT_EPOCHS)]
        epochs: usize,

        /// Input image size (square)
        #[arg(long, default_value_t = IMAGE_SIZE)]
        image_size: usize,

        /// Batch size for training
        #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Adam learning rate
        #[arg(short, long, default_value_t = DEFAULT_LEARNING_RATE)]
        learning_rate: f64,

        /// Fraction of each class held out for validation
        #[arg(long, default_value_t = VALIDATION_SPLIT)]
        validation_split: f64,

        /// Seed for the split and shuffling (random when omitted)
        #[arg(long)]
        seed: Option<u64>,

        /// Directory the model files are written to
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Decode all images into memory before training
        #[arg(long, default_value = "false")]
        cache: bool,
    },

    /// Classify a single image
    Predict {
        /// Image to classify
        #[arg(short, long)]
        image: PathBuf,

        /// Trained model file
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Comma-separated class names, in training (sorted directory) order
        #[arg(short, long)]
        classes: Option<String>,

        /// Input image size the model was trained with
        #[arg(long, default_value_t = IMAGE_SIZE)]
        image_size: usize,
    },

    /// Show dataset statistics and the split preview
    Stats {
        /// Root directory with one subdirectory per class
        #[arg(short, long, default_value = DEFAULT_DATA_DIR)]
        data_dir: PathBuf,

        /// Fraction of each class held out for validation
        #[arg(long, default_value_t = VALIDATION_SPLIT)]
        validation_split: f64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else if cli.quiet {
        LogConfig::quiet()
    } else {
        LogConfig::default()
    };

    let _ = init_logging(&log_config);

    match cli.command {
        Commands::Train {
            data_dir,
            epochs,
            image_size,
            batch_size,
            learning_rate,
            validation_split,
            seed,
            output_dir,
            cache,
        } => {
            print_banner();

            // The class count is replaced by the number of class directories found
            let model = BeanPartsClassifierConfig::new(default_class_names().len()).with_image_size(image_size);
            let config = TrainingConfig::new(model)
                .with_epochs(epochs)
                .with_batch_size(batch_size)
                .with_learning_rate(learning_rate)
                .with_validation_fraction(validation_split)
                .with_seed(seed)
                .with_cache_images(cache);

            cmd_train(&data_dir, &output_dir, &config)?;
        }

        Commands::Predict {
            image,
            model,
            classes,
            image_size,
        } => {
            let model = model.unwrap_or_else(|| PathBuf::from(format!("{}.mpk", model_file_stem(DEFAULT_EPOCHS))));
            let class_names = match classes {
                Some(list) => parse_class_list(&list)?,
                None => default_class_names(),
            };

            cmd_predict(&image, &model, class_names, image_size)?;
        }

        Commands::Stats {
            data_dir,
            validation_split,
        } => {
            print_banner();
            cmd_stats(&data_dir, validation_split)?;
        }
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        format!(
            r#"
 ╔══════════════════════════════════════════════════════╗
 ║   Bean Doctor v{:<38}║
 ║   Bean-plant part classification with Burn + Rust    ║
 ╚══════════════════════════════════════════════════════╝
  "#,
            VERSION
        )
        .green()
    );
}

fn cmd_train(data_dir: &Path, output_dir: &Path, config: &TrainingConfig) -> Result<()> {
    info!("Training on {:?} with backend {}", data_dir, backend_name());

    let outcome = run_training::<TrainingBackend>(data_dir, output_dir, config)
        .with_context(|| format!("Training on {:?} failed", data_dir))?;

    println!();
    println!("{}", "Class order used for training:".cyan().bold());
    for (idx, name) in outcome.class_names.iter().enumerate() {
        println!("  {}. {}", idx, name);
    }
    println!();
    println!("{}", "Next steps:".cyan().bold());
    println!(
        "  • Predict: bean_doctor predict --model {:?} --classes {:?} --image <image> --image-size {}",
        outcome.model_path,
        outcome.class_names.join(","),
        config.model.image_size
    );

    Ok(())
}

fn cmd_predict(image: &Path, model: &Path, class_names: Vec<String>, image_size: usize) -> Result<()> {
    info!("Running inference");
    info!("  Image: {:?}", image);
    info!("  Model: {:?}", model);
    info!("  Backend: {}", backend_name());

    let device = default_device();
    let predictor = Predictor::<DefaultBackend>::load(model, class_names, image_size, &device)
        .with_context(|| format!("Could not load model {:?}", model))?;

    let result = predictor
        .predict_file(image)
        .with_context(|| format!("Could not classify {:?}", image))?;

    print!("{}", result.report());

    Ok(())
}

fn cmd_stats(data_dir: &Path, validation_split: f64) -> Result<()> {
    info!("Computing dataset statistics for: {:?}", data_dir);

    let folder = ImageFolder::new(data_dir).with_context(|| format!("Could not read {:?}", data_dir))?;

    println!("{}", "Dataset Statistics:".cyan().bold());
    println!("{}", folder.stats().display());

    let split_config = SplitConfig::new(validation_split, Some(0))?;
    println!(
        "{}",
        format!(
            "Split preview ({:.0}% validation per class, at least {} images per class):",
            validation_split * 100.0,
            split_config.min_class_size()
        )
        .yellow()
        .bold()
    );

    match DatasetSplits::from_folder(&folder, &split_config) {
        Ok(splits) => {
            println!("  Training:   {}", splits.train.len());
            println!("  Validation: {}", splits.validation.len());
        }
        Err(e) => println!("  {} {}", "Cannot split:".red(), e),
    }

    Ok(())
}
