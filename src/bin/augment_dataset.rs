use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use yolo_prep::config::AugmentConfig;
use yolo_prep::dataset::augment_pipeline::DatasetAugmenter;
use yolo_prep::dataset::data_augmenters::image_augmentations::AugmentationPipeline;
use yolo_prep::dataset::storage::FsStorage;

/// Splits a YOLO dataset into train/val/test and writes augmented copies of every pair
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// YAML or JSON config file. Flags below override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    image_root: Option<PathBuf>,

    #[arg(long)]
    annotation_root: Option<PathBuf>,

    #[arg(short, long)]
    output_root: Option<PathBuf>,

    /// Train, val and test ratios
    #[arg(long, num_args = 3, value_names = ["TRAIN", "VAL", "TEST"])]
    ratios: Option<Vec<f64>>,

    /// Augmented variants per image
    #[arg(short = 'n', long)]
    augment_count: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Prefix output names with the image's sub directories
    #[arg(long)]
    qualify_names: bool,

    /// Class names, in class id order
    #[arg(long, value_delimiter = ',')]
    class_names: Option<Vec<String>>,

    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Result<AugmentConfig> {
        let mut config = match &self.config {
            Some(path) => AugmentConfig::from_file(path)
                .with_context(|| format!("Loading config {}", path.display()))?,
            None => AugmentConfig::default(),
        };
        if let Some(image_root) = self.image_root {
            config.image_root = image_root;
        }
        if let Some(annotation_root) = self.annotation_root {
            config.annotation_root = annotation_root;
        }
        if let Some(output_root) = self.output_root {
            config.output_root = output_root;
        }
        if let Some(ratios) = self.ratios {
            config.split_ratios.train = ratios[0];
            config.split_ratios.val = ratios[1];
            config.split_ratios.test = ratios[2];
        }
        if let Some(augment_count) = self.augment_count {
            config.augment_count = augment_count;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.qualify_names {
            config.qualify_names = true;
        }
        if let Some(class_names) = self.class_names {
            config.class_names = class_names;
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = cli.into_config()?;

    let augmenter = AugmentationPipeline::new(config.transforms.clone())
        .context("Invalid transform configuration")?;
    info!("Transforms: {}", augmenter.describe());
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let storage = FsStorage;
    let report = DatasetAugmenter::new(&config, &storage, augmenter)
        .run(&mut rng)
        .context("Dataset augmentation failed")?;

    for split in &report.splits {
        info!(
            "{}: {} of {} pairs processed, {} augmented, {} discarded, {} failed, {} skipped",
            split.split,
            split.processed,
            split.pairs_assigned,
            split.augmented_written,
            split.augmentations_discarded,
            split.failed_augmentations.len(),
            split.skipped.len()
        );
    }
    if !report.unmatched_images.is_empty() {
        info!("{} images had no annotation", report.unmatched_images.len());
    }
    Ok(())
}
