//! Splits a dataset into train/val/test and writes, per split, every source pair plus its
//! augmented variants.
//!
//! Failures of a single pair or a single augmentation attempt are logged, recorded in the
//! [`RunReport`] and never stop the run. Only a missing input (no pairs at all) or a broken
//! output directory abort it.
use crate::config::AugmentConfig;
use crate::dataset::common_structs::{ImageAnnotationPair, NormalizedBbox};
use crate::dataset::data_augmenters::image_augmentations::SampleAugmenter;
use crate::dataset::data_loaders::yolo_dataset_loader::{
    discover_pairs, LoadedSample, YoloDataLoader,
};
use crate::dataset::data_transformers::dataset_yaml::{build_descriptor, write_dataset_yaml};
use crate::dataset::iterator_adapters::splitting::{shuffle_and_split, Split};
use crate::dataset::label_files::{serialize_label_file, LABEL_EXTENSION};
use crate::dataset::storage::DatasetStorage;
use crate::dataset::DataLoader;
use crate::error::{AugmentError, DatasetError, SkipReason};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

pub const REPORT_FILE_NAME: &str = "augment_report.json";
const JPEG_QUALITY: u8 = 95;

/// What happened to one augmentation attempt
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    Written,
    /// The transform left no box inside the image
    Discarded,
    Failed(String),
}

/// What came out of one fully processed pair
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairStats {
    pub augmented_written: usize,
    pub augmentations_discarded: usize,
    pub failed_augmentations: Vec<FailedAugmentation>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    Processed(PairStats),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedPair {
    pub image: PathBuf,
    #[serde(flatten)]
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedAugmentation {
    pub image: PathBuf,
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitReport {
    pub split: Split,
    pub pairs_assigned: usize,
    pub processed: usize,
    pub augmented_written: usize,
    pub augmentations_discarded: usize,
    pub failed_augmentations: Vec<FailedAugmentation>,
    pub skipped: Vec<SkippedPair>,
}

impl SplitReport {
    fn new(split: Split, pairs_assigned: usize) -> Self {
        SplitReport {
            split,
            pairs_assigned,
            processed: 0,
            augmented_written: 0,
            augmentations_discarded: 0,
            failed_augmentations: vec![],
            skipped: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub output_root: PathBuf,
    pub pairs_found: usize,
    pub unmatched_images: Vec<PathBuf>,
    pub splits: Vec<SplitReport>,
    pub classes_seen: BTreeSet<u32>,
}

impl RunReport {
    pub fn split(&self, split: Split) -> Option<&SplitReport> {
        self.splits.iter().find(|r| r.split == split)
    }

    pub fn total_processed(&self) -> usize {
        self.splits.iter().map(|r| r.processed).sum()
    }
}

/// Output directories of one split
#[derive(Debug, Clone)]
pub struct SplitDirs {
    pub images: PathBuf,
    pub labels: PathBuf,
}

impl SplitDirs {
    pub fn new(output_root: &Path, split: Split) -> Self {
        let root = output_root.join(split.dir_name());
        SplitDirs {
            images: root.join("images"),
            labels: root.join("labels"),
        }
    }
}

/// Base name and extension used for the outputs of an image.
/// `qualify` folds the sub directories into the name so that equally named frames of
/// different videos stay apart.
pub fn output_stem(relative_path: &Path, qualify: bool) -> (String, String) {
    let ext = relative_path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = if qualify {
        relative_path
            .with_extension("")
            .iter()
            .map(|c| c.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("_")
    } else {
        relative_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    (stem, ext)
}

/// Encodes in the format implied by the extension
pub fn encode_image(img: &DynamicImage, ext: &str) -> Result<Vec<u8>, AugmentError> {
    let format = ImageFormat::from_extension(ext)
        .ok_or_else(|| AugmentError::UnsupportedFormat(ext.to_string()))?;
    let mut bytes = vec![];
    if format == ImageFormat::Jpeg {
        let encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
        img.write_with_encoder(encoder)?;
    } else {
        img.write_to(&mut Cursor::new(&mut bytes), format)?;
    }
    Ok(bytes)
}

/// Writes the image, then its label. The label is only written if the image made it.
fn write_image_and_label<S: DatasetStorage + ?Sized>(
    storage: &S,
    image_path: &Path,
    image_bytes: &[u8],
    label_path: &Path,
    bboxes: &[NormalizedBbox],
) -> Result<(), SkipReason> {
    storage
        .write(image_path, image_bytes)
        .map_err(|e| SkipReason::WriteFailed {
            path: image_path.to_path_buf(),
            message: e.to_string(),
        })?;
    storage
        .write(label_path, serialize_label_file(bboxes).as_bytes())
        .map_err(|e| SkipReason::WriteFailed {
            path: label_path.to_path_buf(),
            message: e.to_string(),
        })
}

pub struct DatasetAugmenter<'a, S: DatasetStorage + ?Sized, A: SampleAugmenter> {
    config: &'a AugmentConfig,
    storage: &'a S,
    augmenter: A,
}

impl<'a, S: DatasetStorage + ?Sized, A: SampleAugmenter> DatasetAugmenter<'a, S, A> {
    pub fn new(config: &'a AugmentConfig, storage: &'a S, augmenter: A) -> Self {
        DatasetAugmenter {
            config,
            storage,
            augmenter,
        }
    }

    /// Discovers, shuffles, splits and augments the whole dataset.
    /// `rng` drives both the shuffle and the transforms.
    pub fn run<R: Rng>(&self, rng: &mut R) -> Result<RunReport, DatasetError> {
        let cfg = self.config;
        cfg.validate()?;
        let discovery = discover_pairs(self.storage, &cfg.image_root, &cfg.annotation_root)?;
        if discovery.pairs.is_empty() {
            error!("No image-annotation pairs found!");
            return Err(DatasetError::NoInput {
                image_root: cfg.image_root.clone(),
            });
        }
        let pairs_found = discovery.pairs.len();
        let splits = shuffle_and_split(discovery.pairs, &cfg.split_ratios, rng);

        let mut report = RunReport {
            output_root: cfg.output_root.clone(),
            pairs_found,
            unmatched_images: discovery.unmatched,
            splits: vec![],
            classes_seen: BTreeSet::new(),
        };
        for (split, pairs) in splits.into_iter_splits() {
            let split_report = self.process_split(split, pairs, &mut report.classes_seen, rng)?;
            report.splits.push(split_report);
        }

        if cfg.write_dataset_yaml {
            let descriptor =
                build_descriptor(&cfg.output_root, &cfg.class_names, &report.classes_seen);
            write_dataset_yaml(self.storage, &cfg.output_root, &descriptor)?;
        }
        if cfg.write_report {
            self.write_report(&report)?;
        }
        info!("Augmented dataset saved to: {}", cfg.output_root.display());
        Ok(report)
    }

    fn write_report(&self, report: &RunReport) -> Result<(), DatasetError> {
        let path = self.config.output_root.join(REPORT_FILE_NAME);
        let json = serde_json::to_vec_pretty(report)
            .map_err(|e| DatasetError::Serialization(e.to_string()))?;
        self.storage
            .write(&path, &json)
            .map_err(|source| DatasetError::Io { path, source })
    }

    /// Copies and augments every pair of one split
    pub fn process_split<R: Rng>(
        &self,
        split: Split,
        pairs: Vec<ImageAnnotationPair>,
        classes_seen: &mut BTreeSet<u32>,
        rng: &mut R,
    ) -> Result<SplitReport, DatasetError> {
        info!("Processing {} files for {} split...", pairs.len(), split);
        let dirs = SplitDirs::new(&self.config.output_root, split);
        for dir in [&dirs.images, &dirs.labels].iter() {
            self.storage
                .create_dir_all(dir)
                .map_err(|source| DatasetError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        let mut report = SplitReport::new(split, pairs.len());
        let mut loader = YoloDataLoader::new(self.storage, pairs);
        while let Some((pair, loaded)) = loader.next() {
            let outcome = match loaded {
                Ok(sample) => {
                    classes_seen.extend(sample.bboxes.iter().map(|bb| bb.class_id));
                    self.process_pair(&pair, &sample, &dirs, rng)
                }
                Err(reason) => PairOutcome::Skipped(reason),
            };
            match outcome {
                PairOutcome::Processed(stats) => {
                    report.processed += 1;
                    report.augmented_written += stats.augmented_written;
                    report.augmentations_discarded += stats.augmentations_discarded;
                    report.failed_augmentations.extend(stats.failed_augmentations);
                    let every = self.config.progress_every;
                    if every > 0 && report.processed % every == 0 {
                        info!(
                            "Processed {}/{} files for {}",
                            report.processed,
                            loader.max_elem_index(),
                            split
                        );
                    }
                }
                PairOutcome::Skipped(reason) => {
                    warn!("{}", reason);
                    report.skipped.push(SkippedPair {
                        image: pair.relative_path.clone(),
                        reason,
                    });
                }
            }
        }
        info!(
            "Completed {}: {} files processed ({} augmented written, {} skipped)",
            split,
            report.processed,
            report.augmented_written,
            report.skipped.len()
        );
        Ok(report)
    }

    /// Writes the untouched copy of a pair, then `augment_count` variants
    pub fn process_pair<R: Rng>(
        &self,
        pair: &ImageAnnotationPair,
        sample: &LoadedSample,
        dirs: &SplitDirs,
        rng: &mut R,
    ) -> PairOutcome {
        let (stem, ext) = output_stem(&pair.relative_path, self.config.qualify_names);
        let image_path = dirs.images.join(format!("{}.{}", stem, ext));
        let label_path = dirs.labels.join(format!("{}.{}", stem, LABEL_EXTENSION));
        if let Err(reason) = write_image_and_label(
            self.storage,
            &image_path,
            &sample.image_bytes,
            &label_path,
            &sample.bboxes,
        ) {
            return PairOutcome::Skipped(reason);
        }

        let mut stats = PairStats::default();
        for index in 0..self.config.augment_count {
            match self.augment_once(sample, &stem, &ext, index, dirs, rng) {
                SampleOutcome::Written => stats.augmented_written += 1,
                SampleOutcome::Discarded => {
                    debug!(
                        "Augmentation {} of {} left no boxes, discarded",
                        index,
                        pair.image_path.display()
                    );
                    stats.augmentations_discarded += 1;
                }
                SampleOutcome::Failed(message) => {
                    warn!(
                        "Augmentation error for {} (aug {}): {}",
                        pair.image_path.display(),
                        index,
                        message
                    );
                    stats.failed_augmentations.push(FailedAugmentation {
                        image: pair.relative_path.clone(),
                        index,
                        message,
                    });
                }
            }
        }
        PairOutcome::Processed(stats)
    }

    fn augment_once<R: Rng>(
        &self,
        sample: &LoadedSample,
        stem: &str,
        ext: &str,
        index: usize,
        dirs: &SplitDirs,
        rng: &mut R,
    ) -> SampleOutcome {
        let augmented = match self.augmenter.augment(&sample.image, &sample.bboxes, rng) {
            Ok(augmented) => augmented,
            Err(e) => return SampleOutcome::Failed(e.to_string()),
        };
        if augmented.bboxes.is_empty() {
            return SampleOutcome::Discarded;
        }
        let bytes = match encode_image(&augmented.image, ext) {
            Ok(bytes) => bytes,
            Err(e) => return SampleOutcome::Failed(e.to_string()),
        };
        let aug_stem = format!("{}_aug_{}", stem, index);
        let image_path = dirs.images.join(format!("{}.{}", aug_stem, ext));
        let label_path = dirs.labels.join(format!("{}.{}", aug_stem, LABEL_EXTENSION));
        match write_image_and_label(
            self.storage,
            &image_path,
            &bytes,
            &label_path,
            &augmented.bboxes,
        ) {
            Ok(()) => SampleOutcome::Written,
            Err(reason) => SampleOutcome::Failed(reason.to_string()),
        }
    }
}
