use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything needed to split and augment one dataset.
/// Missing keys in a config file fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    pub image_root: PathBuf,
    pub annotation_root: PathBuf,
    pub output_root: PathBuf,
    pub split_ratios: SplitRatios,
    /// Augmented variants generated per source image
    pub augment_count: usize,
    /// Seed for shuffling and transform sampling. Random if None.
    pub seed: Option<u64>,
    /// Log progress every this many processed pairs
    pub progress_every: usize,
    /// Name outputs after the full relative path of the image instead of its file name
    pub qualify_names: bool,
    pub class_names: Vec<String>,
    pub write_dataset_yaml: bool,
    pub write_report: bool,
    pub transforms: TransformConfig,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        AugmentConfig {
            image_root: PathBuf::from("data/frames"),
            annotation_root: PathBuf::from("data/annotations"),
            output_root: PathBuf::from("data/augmented"),
            split_ratios: SplitRatios::default(),
            augment_count: 3,
            seed: None,
            progress_every: 10,
            qualify_names: false,
            class_names: vec![],
            write_dataset_yaml: true,
            write_report: true,
            transforms: TransformConfig::default(),
        }
    }
}

/// Fractions of the shuffled pairs going to each split.
/// They are not required to sum to 1; whatever is left after val goes to test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitRatios {
    pub train: f64,
    pub val: f64,
    pub test: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        SplitRatios {
            train: 0.7,
            val: 0.15,
            test: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub rotation: RotationConfig,
    pub brightness_contrast: BrightnessContrastConfig,
    pub blur: BlurConfig,
    pub horizontal_flip: FlipConfig,
    pub scale: ScaleConfig,
}

impl Default for TransformConfig {
    fn default() -> Self {
        TransformConfig {
            rotation: RotationConfig::default(),
            brightness_contrast: BrightnessContrastConfig::default(),
            blur: BlurConfig::default(),
            horizontal_flip: FlipConfig::default(),
            scale: ScaleConfig::default(),
        }
    }
}

impl TransformConfig {
    /// All transforms switched off
    pub fn disabled() -> Self {
        let mut cfg = TransformConfig::default();
        cfg.rotation.p = 0.;
        cfg.brightness_contrast.p = 0.;
        cfg.blur.p = 0.;
        cfg.horizontal_flip.p = 0.;
        cfg.scale.p = 0.;
        cfg
    }
}

/// Rotation by an angle drawn from [-limit_degrees, limit_degrees]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    pub limit_degrees: f64,
    pub p: f64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        RotationConfig {
            limit_degrees: 30.,
            p: 0.5,
        }
    }
}

/// Brightness shift in [-brightness_limit, brightness_limit] (fraction of full range) and
/// contrast factor in [1 - contrast_limit, 1 + contrast_limit]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrightnessContrastConfig {
    pub brightness_limit: f64,
    pub contrast_limit: f64,
    pub p: f64,
}

impl Default for BrightnessContrastConfig {
    fn default() -> Self {
        BrightnessContrastConfig {
            brightness_limit: 0.2,
            contrast_limit: 0.2,
            p: 0.3,
        }
    }
}

/// Gaussian blur with an odd kernel size in [min_kernel, max_kernel]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurConfig {
    pub min_kernel: u32,
    pub max_kernel: u32,
    pub p: f64,
}

impl Default for BlurConfig {
    fn default() -> Self {
        BlurConfig {
            min_kernel: 3,
            max_kernel: 7,
            p: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlipConfig {
    pub p: f64,
}

impl Default for FlipConfig {
    fn default() -> Self {
        FlipConfig { p: 0.5 }
    }
}

/// Resize by a factor in [1 - limit, 1 + limit]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    pub limit: f64,
    pub p: f64,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        ScaleConfig { limit: 0.1, p: 0.3 }
    }
}

impl AugmentConfig {
    /// Reads a YAML (or JSON) config file
    pub fn from_file<T: AsRef<Path>>(path: T) -> Result<AugmentConfig, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ratios = [
            ("split_ratios.train", self.split_ratios.train),
            ("split_ratios.val", self.split_ratios.val),
            ("split_ratios.test", self.split_ratios.test),
        ];
        for &(name, value) in ratios.iter() {
            if !value.is_finite() || value < 0. || value > 1. {
                return Err(ConfigError::InvalidRatio { name, value });
            }
        }
        self.transforms.validate()
    }
}

impl TransformConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let probabilities = [
            ("rotation.p", self.rotation.p),
            ("brightness_contrast.p", self.brightness_contrast.p),
            ("blur.p", self.blur.p),
            ("horizontal_flip.p", self.horizontal_flip.p),
            ("scale.p", self.scale.p),
        ];
        for &(name, value) in probabilities.iter() {
            if !value.is_finite() || value < 0. || value > 1. {
                return Err(ConfigError::InvalidProbability { name, value });
            }
        }
        let limits = [
            ("rotation.limit_degrees", self.rotation.limit_degrees),
            (
                "brightness_contrast.brightness_limit",
                self.brightness_contrast.brightness_limit,
            ),
            (
                "brightness_contrast.contrast_limit",
                self.brightness_contrast.contrast_limit,
            ),
        ];
        for &(name, value) in limits.iter() {
            if !value.is_finite() || value < 0. {
                return Err(ConfigError::InvalidLimit { name, value });
            }
        }
        // a scale factor of 0 or below has no meaning
        if !self.scale.limit.is_finite() || self.scale.limit < 0. || self.scale.limit >= 1. {
            return Err(ConfigError::InvalidLimit {
                name: "scale.limit",
                value: self.scale.limit,
            });
        }
        let (min, max) = (self.blur.min_kernel, self.blur.max_kernel);
        if min < 3 || min % 2 == 0 || max % 2 == 0 || min > max {
            return Err(ConfigError::InvalidBlurKernel { min, max });
        }
        Ok(())
    }
}
