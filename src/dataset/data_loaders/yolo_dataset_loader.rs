use crate::dataset::common_structs::{ImageAnnotationPair, NormalizedBbox};
use crate::dataset::label_files::{parse_label_file, LABEL_EXTENSION};
use crate::dataset::storage::DatasetStorage;
use crate::dataset::DataLoader;
use crate::error::{DatasetError, SkipReason};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Result of walking the image root
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub pairs: Vec<ImageAnnotationPair>,
    /// Images (relative to the image root) without a label file
    pub unmatched: Vec<PathBuf>,
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Where the label file of an image lives: same relative path under the annotation root,
/// extension replaced
pub fn annotation_path_for(annotation_root: &Path, relative_image_path: &Path) -> PathBuf {
    annotation_root
        .join(relative_image_path)
        .with_extension(LABEL_EXTENSION)
}

/// Walks `image_root` recursively and pairs every image with its label file.
/// Images without a label file are reported and left out. A missing annotation root just
/// means nothing matches; an unreadable image root is an error.
pub fn discover_pairs<S: DatasetStorage + ?Sized>(
    storage: &S,
    image_root: &Path,
    annotation_root: &Path,
) -> Result<Discovery, DatasetError> {
    let files = storage
        .list_files(image_root)
        .map_err(|source| DatasetError::UnreadableRoot {
            path: image_root.to_path_buf(),
            source,
        })?;
    let mut discovery = Discovery::default();
    for image_path in files.into_iter().filter(|p| is_image_file(p)) {
        let relative_path = match image_path.strip_prefix(image_root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => continue,
        };
        let annotation_path = annotation_path_for(annotation_root, &relative_path);
        if storage.is_file(&annotation_path) {
            discovery.pairs.push(ImageAnnotationPair {
                image_path,
                annotation_path,
                relative_path,
            });
        } else {
            warn!("Annotation not found for {}", relative_path.display());
            discovery.unmatched.push(relative_path);
        }
    }
    info!("Found {} image-annotation pairs", discovery.pairs.len());
    Ok(discovery)
}

/// A pair that was read, decoded and parsed successfully
#[derive(Debug, Clone)]
pub struct LoadedSample {
    /// Raw bytes of the image file, used for the lossless copy
    pub image_bytes: Vec<u8>,
    pub image: DynamicImage,
    pub bboxes: Vec<NormalizedBbox>,
}

/// Reads, decodes and parses one pair
pub fn load_pair<S: DatasetStorage + ?Sized>(
    storage: &S,
    pair: &ImageAnnotationPair,
) -> Result<LoadedSample, SkipReason> {
    let image_bytes = storage
        .read(&pair.image_path)
        .map_err(|e| SkipReason::ReadFailed {
            path: pair.image_path.clone(),
            message: e.to_string(),
        })?;
    let image = image::load_from_memory(&image_bytes).map_err(|e| SkipReason::DecodeFailed {
        path: pair.image_path.clone(),
        message: e.to_string(),
    })?;
    let label_bytes = storage
        .read(&pair.annotation_path)
        .map_err(|e| SkipReason::ReadFailed {
            path: pair.annotation_path.clone(),
            message: e.to_string(),
        })?;
    let bboxes = parse_label_file(&String::from_utf8_lossy(&label_bytes));
    if bboxes.is_empty() {
        return Err(SkipReason::EmptyAnnotation {
            path: pair.annotation_path.clone(),
        });
    }
    Ok(LoadedSample {
        image_bytes,
        image,
        bboxes,
    })
}

/// Yolo style dataset loader: goes over the pairs of one split, loading each in turn.
/// Pairs that can't be loaded come out with the reason instead of the sample.
pub struct YoloDataLoader<'a, S: DatasetStorage + ?Sized> {
    storage: &'a S,
    pairs: std::vec::IntoIter<ImageAnnotationPair>,
    max_elem_index: usize,
    next_element_index: usize,
}

impl<'a, S: DatasetStorage + ?Sized> YoloDataLoader<'a, S> {
    pub fn new(storage: &'a S, pairs: Vec<ImageAnnotationPair>) -> YoloDataLoader<'a, S> {
        YoloDataLoader {
            storage,
            max_elem_index: pairs.len(),
            pairs: pairs.into_iter(),
            next_element_index: 0,
        }
    }
}

impl<'a, S: DatasetStorage + ?Sized> Iterator for YoloDataLoader<'a, S> {
    type Item = (ImageAnnotationPair, Result<LoadedSample, SkipReason>);

    fn next(&mut self) -> Option<Self::Item> {
        let pair = self.pairs.next()?;
        self.next_element_index += 1;
        let loaded = load_pair(self.storage, &pair);
        Some((pair, loaded))
    }
}

impl<'a, S: DatasetStorage + ?Sized> DataLoader for YoloDataLoader<'a, S> {
    fn next_element_index(&self) -> usize {
        self.next_element_index
    }

    fn max_elem_index(&self) -> usize {
        self.max_elem_index
    }
}
