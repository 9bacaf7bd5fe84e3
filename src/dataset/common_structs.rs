use serde::{Deserialize, Serialize};
use std::path::PathBuf;
/// Frequently used structs in the provided data loaders/augmenters

/// A Bounding Box in the normalized YOLO convention: center and size as fractions of the
/// image width/height, all in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBbox {
    pub class_id: u32,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedBbox {
    pub fn new(class_id: u32, x_center: f64, y_center: f64, width: f64, height: f64) -> Self {
        NormalizedBbox {
            class_id,
            x_center,
            y_center,
            width,
            height,
        }
    }

    /// True if all four coordinates lie in [0, 1]
    pub fn is_normalized(&self) -> bool {
        [self.x_center, self.y_center, self.width, self.height]
            .iter()
            .all(|v| v.is_finite() && (0.0..=1.0).contains(v))
    }
}

/// An image file and the label file describing it. Both exist on disk when discovered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageAnnotationPair {
    pub image_path: PathBuf,
    pub annotation_path: PathBuf,
    /// Image path relative to the image root, extension included
    pub relative_path: PathBuf,
}
