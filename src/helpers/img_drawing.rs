use crate::dataset::bbox_conversion::bb_to_corners;
use crate::dataset::common_structs::NormalizedBbox;
use image::{DynamicImage, GenericImageView, Rgba};
use imageproc::drawing::{draw_hollow_rect_mut, Blend};
use imageproc::rect::Rect;

const PALETTE: [[u8; 3]; 6] = [
    [255, 0, 0],
    [0, 255, 0],
    [0, 0, 255],
    [255, 255, 0],
    [255, 0, 255],
    [0, 255, 255],
];

/// Color used for a class, cycling over a small palette
pub fn class_color(class_id: u32) -> [u8; 4] {
    let [r, g, b] = PALETTE[class_id as usize % PALETTE.len()];
    [r, g, b, 200]
}

/// Pixel rectangle covered by a normalized box. None if it covers less than a pixel.
pub fn bb_pixel_rect(bb: &NormalizedBbox, img_width: u32, img_height: u32) -> Option<Rect> {
    let c = bb_to_corners(bb);
    let left = (c.x_min * img_width as f64).round() as i32;
    let top = (c.y_min * img_height as f64).round() as i32;
    let right = (c.x_max * img_width as f64).round() as i32;
    let bottom = (c.y_max * img_height as f64).round() as i32;
    if right <= left || bottom <= top {
        return None;
    }
    Some(Rect::at(left, top).of_size((right - left) as u32, (bottom - top) as u32))
}

pub fn draw_bb_to_img(img: &mut DynamicImage, bb: &NormalizedBbox) {
    draw_bb_to_img_with_color(img, bb, class_color(bb.class_id));
}

pub fn draw_bb_to_img_with_color(img: &mut DynamicImage, bb: &NormalizedBbox, rgba_color: [u8; 4]) {
    let (width, height) = img.dimensions();
    let rect = match bb_pixel_rect(bb, width, height) {
        Some(rect) => rect,
        None => return,
    };
    let mut img_blend = Blend(img.to_rgba8());
    draw_hollow_rect_mut(&mut img_blend, rect, Rgba(rgba_color));
    *img = DynamicImage::ImageRgba8(img_blend.0);
}

/// Copy of the image with all boxes drawn on it
pub fn draw_bbs(img: &DynamicImage, bbs: &[NormalizedBbox]) -> DynamicImage {
    let mut out = img.clone();
    for bb in bbs {
        draw_bb_to_img(&mut out, bb);
    }
    out
}
