use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use yolo_prep::dataset::data_loaders::yolo_dataset_loader::{discover_pairs, load_pair};
use yolo_prep::dataset::storage::FsStorage;
use yolo_prep::helpers::img_drawing::draw_bbs;

/// Draws the label boxes of a split onto its images, for eyeballing the augmentations
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Split directory holding `images/` and `labels/`, e.g. data/augmented/train
    split_dir: PathBuf,

    /// Where to write the overlays. Defaults to `<split_dir>/overlays`
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();
    let output = cli
        .output
        .unwrap_or_else(|| cli.split_dir.join("overlays"));
    std::fs::create_dir_all(&output)
        .with_context(|| format!("Creating {}", output.display()))?;

    let storage = FsStorage;
    let discovery = discover_pairs(
        &storage,
        &cli.split_dir.join("images"),
        &cli.split_dir.join("labels"),
    )
    .context("Listing split images")?;

    let mut written = 0;
    for pair in &discovery.pairs {
        let sample = match load_pair(&storage, pair) {
            Ok(sample) => sample,
            Err(reason) => {
                warn!("{}", reason);
                continue;
            }
        };
        let file_name = match pair.image_path.file_name() {
            Some(name) => name,
            None => continue,
        };
        let out_path = output.join(file_name);
        let drawn = draw_bbs(&sample.image, &sample.bboxes).to_rgb8();
        drawn
            .save(&out_path)
            .with_context(|| format!("Saving overlay {}", out_path.display()))?;
        written += 1;
    }
    info!("Wrote {} overlays to {}", written, output.display());
    Ok(())
}
