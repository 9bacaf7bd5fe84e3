use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a whole run
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("no image-annotation pairs found under {image_root}")]
    NoInput { image_root: PathBuf },

    #[error("cannot read directory {path}: {source}")]
    UnreadableRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("split ratio `{name}` must be a finite value in [0, 1], got {value}")]
    InvalidRatio { name: &'static str, value: f64 },

    #[error("probability `{name}` must be in [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f64 },

    #[error("`{name}` must be a finite non-negative value, got {value}")]
    InvalidLimit { name: &'static str, value: f64 },

    #[error("blur kernel bounds must be odd, >= 3 and ordered, got ({min}, {max})")]
    InvalidBlurKernel { min: u32, max: u32 },

    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// A single augmentation attempt failed. Only that attempt is lost.
#[derive(Error, Debug)]
pub enum AugmentError {
    #[error("image has degenerate dimensions {width}x{height}")]
    DegenerateImage { width: u32, height: u32 },

    #[error("unsupported output image format for extension `{0}`")]
    UnsupportedFormat(String),

    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
}

/// Why a pair produced no output at all
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("can't read {path}: {message}")]
    ReadFailed { path: PathBuf, message: String },

    #[error("can't decode {path}: {message}")]
    DecodeFailed { path: PathBuf, message: String },

    #[error("no valid bboxes found in {path}")]
    EmptyAnnotation { path: PathBuf },

    #[error("can't write {path}: {message}")]
    WriteFailed { path: PathBuf, message: String },
}
