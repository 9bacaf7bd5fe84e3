use crate::config::TransformConfig;
use crate::dataset::bbox_conversion::{clip_bb, flip_bb_horizontally, project_bb};
use crate::dataset::common_structs::NormalizedBbox;
use crate::error::{AugmentError, ConfigError};
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{warp, Interpolation, Projection};
use rand::{Rng, RngCore};

/// An augmented image with the boxes that survived the transform
#[derive(Debug, Clone)]
pub struct AugmentedSample {
    pub image: DynamicImage,
    pub bboxes: Vec<NormalizedBbox>,
}

/// Produces one randomized variant of an image and its boxes. Boxes must follow the pixels.
pub trait SampleAugmenter {
    fn augment(
        &self,
        img: &DynamicImage,
        bboxes: &[NormalizedBbox],
        rng: &mut dyn RngCore,
    ) -> Result<AugmentedSample, AugmentError>;
}

/// Rotation, brightness/contrast, blur, horizontal flip and scale, in that order,
/// each applied on its own coin flip
#[derive(Debug, Clone)]
pub struct AugmentationPipeline {
    config: TransformConfig,
}

impl AugmentationPipeline {
    /// Fails on probabilities outside [0, 1] or invalid limits
    pub fn new(config: TransformConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(AugmentationPipeline { config })
    }

    pub fn describe(&self) -> String {
        let c = &self.config;
        format!(
            "rotate(±{:.0}°, p={:.2}) brightness_contrast(±{:.2}/±{:.2}, p={:.2}) blur(k={}..{}, p={:.2}) hflip(p={:.2}) scale(±{:.2}, p={:.2})",
            c.rotation.limit_degrees,
            c.rotation.p,
            c.brightness_contrast.brightness_limit,
            c.brightness_contrast.contrast_limit,
            c.brightness_contrast.p,
            c.blur.min_kernel,
            c.blur.max_kernel,
            c.blur.p,
            c.horizontal_flip.p,
            c.scale.limit,
            c.scale.p
        )
    }
}

impl SampleAugmenter for AugmentationPipeline {
    fn augment(
        &self,
        img: &DynamicImage,
        bboxes: &[NormalizedBbox],
        rng: &mut dyn RngCore,
    ) -> Result<AugmentedSample, AugmentError> {
        let c = &self.config;
        let mut rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Err(AugmentError::DegenerateImage { width, height });
        }
        let mut bbs: Vec<NormalizedBbox> = bboxes.iter().filter_map(clip_bb).collect();

        if rng.gen_bool(c.rotation.p) {
            let limit = c.rotation.limit_degrees;
            let degrees = rng.gen_range(-limit..=limit);
            let (rotated, rotated_bbs) = rotate_sample(&rgb, &bbs, degrees);
            rgb = rotated;
            bbs = rotated_bbs;
        }
        if rng.gen_bool(c.brightness_contrast.p) {
            let b_limit = c.brightness_contrast.brightness_limit;
            let c_limit = c.brightness_contrast.contrast_limit;
            let brightness = rng.gen_range(-b_limit..=b_limit);
            let contrast = 1. + rng.gen_range(-c_limit..=c_limit);
            adjust_brightness_contrast(&mut rgb, brightness, contrast);
        }
        if rng.gen_bool(c.blur.p) {
            let kernel = random_kernel_size(rng, c.blur.min_kernel, c.blur.max_kernel);
            rgb = gaussian_blur(&rgb, kernel);
        }
        if rng.gen_bool(c.horizontal_flip.p) {
            image::imageops::flip_horizontal_in_place(&mut rgb);
            bbs = flip_bb_horizontally(&bbs);
        }
        if rng.gen_bool(c.scale.p) {
            let factor = 1. + rng.gen_range(-c.scale.limit..=c.scale.limit);
            rgb = scale_image(&rgb, factor)?;
        }

        Ok(AugmentedSample {
            image: DynamicImage::ImageRgb8(rgb),
            bboxes: bbs,
        })
    }
}

/// Rotates the image about its center by `degrees` (positive is clockwise on screen), keeping
/// the canvas size. Uncovered pixels are deliberately filled with black rather than with a
/// reflected border. Boxes go through the same projection; the ones ending fully outside the
/// image are dropped.
pub fn rotate_sample(
    img: &RgbImage,
    bbs: &[NormalizedBbox],
    degrees: f64,
) -> (RgbImage, Vec<NormalizedBbox>) {
    let (width, height) = img.dimensions();
    let (cx, cy) = (width as f32 / 2., height as f32 / 2.);
    let projection = Projection::translate(cx, cy)
        * Projection::rotate(degrees.to_radians() as f32)
        * Projection::translate(-cx, -cy);
    let rotated = warp(img, &projection, Interpolation::Bilinear, Rgb([0, 0, 0]));
    let rotated_bbs = bbs
        .iter()
        .filter_map(|bb| project_bb(bb, &projection, width, height))
        .collect();
    (rotated, rotated_bbs)
}

/// `out = in * contrast + brightness * 255`, clamped to the u8 range
pub fn adjust_brightness_contrast(img: &mut RgbImage, brightness: f64, contrast: f64) {
    let shift = brightness * 255.;
    for pixel in img.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            let v = *channel as f64 * contrast + shift;
            *channel = v.round().max(0.).min(255.) as u8;
        }
    }
}

/// Sigma for a given kernel size, same relation OpenCV uses when only the size is given
pub fn kernel_sigma(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.) * 0.5 - 1.) + 0.8
}

/// An odd kernel size in [min, max]
pub fn random_kernel_size<R: Rng + ?Sized>(rng: &mut R, min: u32, max: u32) -> u32 {
    let choices = (max - min) / 2 + 1;
    min + 2 * rng.gen_range(0..choices)
}

pub fn gaussian_blur(img: &RgbImage, kernel_size: u32) -> RgbImage {
    gaussian_blur_f32(img, kernel_sigma(kernel_size))
}

/// Resizes the whole image. Normalized boxes don't change with scale.
pub fn scale_image(img: &RgbImage, factor: f64) -> Result<RgbImage, AugmentError> {
    let (width, height) = img.dimensions();
    let new_width = (width as f64 * factor).round() as u32;
    let new_height = (height as f64 * factor).round() as u32;
    if new_width == 0 || new_height == 0 {
        return Err(AugmentError::DegenerateImage {
            width: new_width,
            height: new_height,
        });
    }
    Ok(image::imageops::resize(
        img,
        new_width,
        new_height,
        FilterType::Triangle,
    ))
}
