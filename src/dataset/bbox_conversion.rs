use crate::dataset::common_structs::NormalizedBbox;
use imageproc::geometric_transformations::Projection;

/// Boxes narrower or shorter than this after clipping are considered gone.
/// Anything smaller would serialize as a zero-sized box with 6 decimals.
pub const MIN_NORMALIZED_SIZE: f64 = 1e-6;

/// Normalized corner coordinates of a box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corners {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

pub fn bb_to_corners(bb: &NormalizedBbox) -> Corners {
    let half_w = bb.width / 2.;
    let half_h = bb.height / 2.;
    Corners {
        x_min: bb.x_center - half_w,
        y_min: bb.y_center - half_h,
        x_max: bb.x_center + half_w,
        y_max: bb.y_center + half_h,
    }
}

pub fn corners_to_bb(class_id: u32, corners: &Corners) -> NormalizedBbox {
    NormalizedBbox {
        class_id,
        x_center: (corners.x_min + corners.x_max) / 2.,
        y_center: (corners.y_min + corners.y_max) / 2.,
        width: corners.x_max - corners.x_min,
        height: corners.y_max - corners.y_min,
    }
}

/// Clips the box to the image area. None if nothing of it is left inside the image.
/// Boxes already inside the image come back untouched.
pub fn clip_bb(bb: &NormalizedBbox) -> Option<NormalizedBbox> {
    let corners = bb_to_corners(bb);
    let inside = [corners.x_min, corners.y_min, corners.x_max, corners.y_max]
        .iter()
        .all(|v| (0.0..=1.0).contains(v));
    if inside && bb.width >= MIN_NORMALIZED_SIZE && bb.height >= MIN_NORMALIZED_SIZE {
        return Some(*bb);
    }
    let clipped = Corners {
        x_min: corners.x_min.max(0.).min(1.),
        y_min: corners.y_min.max(0.).min(1.),
        x_max: corners.x_max.max(0.).min(1.),
        y_max: corners.y_max.max(0.).min(1.),
    };
    if clipped.x_max - clipped.x_min < MIN_NORMALIZED_SIZE
        || clipped.y_max - clipped.y_min < MIN_NORMALIZED_SIZE
    {
        return None;
    }
    Some(corners_to_bb(bb.class_id, &clipped))
}

/// Mirrors the boxes in respect to the mid vertical line
pub fn flip_bb_horizontally(bbs: &[NormalizedBbox]) -> Vec<NormalizedBbox> {
    bbs.iter()
        .map(|bb| NormalizedBbox {
            x_center: 1. - bb.x_center,
            ..*bb
        })
        .collect()
}

/// Maps a box through the same projection used to warp an image of `img_width` x `img_height`
/// pixels. The result is the axis aligned envelope of the four projected corners, clipped to the
/// image. None if the box ends up fully outside the image.
pub fn project_bb(
    bb: &NormalizedBbox,
    projection: &Projection,
    img_width: u32,
    img_height: u32,
) -> Option<NormalizedBbox> {
    let (w, h) = (img_width as f64, img_height as f64);
    let c = bb_to_corners(bb);
    let pixel_corners = [
        (c.x_min * w, c.y_min * h),
        (c.x_max * w, c.y_min * h),
        (c.x_max * w, c.y_max * h),
        (c.x_min * w, c.y_max * h),
    ];
    let mut envelope = Corners {
        x_min: f64::INFINITY,
        y_min: f64::INFINITY,
        x_max: f64::NEG_INFINITY,
        y_max: f64::NEG_INFINITY,
    };
    for (x, y) in pixel_corners.iter() {
        let (px, py) = *projection * (*x as f32, *y as f32);
        let (nx, ny) = (px as f64 / w, py as f64 / h);
        envelope.x_min = envelope.x_min.min(nx);
        envelope.y_min = envelope.y_min.min(ny);
        envelope.x_max = envelope.x_max.max(nx);
        envelope.y_max = envelope.y_max.max(ny);
    }
    if !(envelope.x_min.is_finite()
        && envelope.y_min.is_finite()
        && envelope.x_max.is_finite()
        && envelope.y_max.is_finite())
    {
        return None;
    }
    clip_bb(&corners_to_bb(bb.class_id, &envelope))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn corners_round_trip() {
        let bb = NormalizedBbox::new(2, 0.4, 0.3, 0.2, 0.1);
        let back = corners_to_bb(2, &bb_to_corners(&bb));
        assert!(close(back.x_center, 0.4));
        assert!(close(back.y_center, 0.3));
        assert!(close(back.width, 0.2));
        assert!(close(back.height, 0.1));
    }

    #[test]
    fn clip_keeps_inner_part() {
        // spans x in [-0.1, 0.3]
        let bb = NormalizedBbox::new(0, 0.1, 0.5, 0.4, 0.2);
        let clipped = clip_bb(&bb).unwrap();
        assert!(close(clipped.x_center, 0.15));
        assert!(close(clipped.width, 0.3));
        assert!(close(clipped.height, 0.2));
    }

    #[test]
    fn clip_drops_outside_box() {
        let bb = NormalizedBbox::new(0, 1.3, 0.5, 0.2, 0.2);
        assert!(clip_bb(&bb).is_none());
    }

    #[test]
    fn horizontal_flip_mirrors_center() {
        let bbs = vec![NormalizedBbox::new(1, 0.2, 0.6, 0.1, 0.3)];
        let flipped = flip_bb_horizontally(&bbs);
        assert!(close(flipped[0].x_center, 0.8));
        assert!(close(flipped[0].y_center, 0.6));
        assert_eq!(flipped[0].class_id, 1);
        // flipping twice is a no-op
        let back = flip_bb_horizontally(&flipped);
        assert!(close(back[0].x_center, 0.2));
    }

    #[test]
    fn identity_projection_keeps_box() {
        let bb = NormalizedBbox::new(0, 0.5, 0.5, 0.2, 0.4);
        let projected = project_bb(&bb, &Projection::scale(1., 1.), 200, 100).unwrap();
        assert!(close(projected.x_center, 0.5));
        assert!(close(projected.width, 0.2));
        assert!(close(projected.height, 0.4));
    }

    #[test]
    fn translation_out_of_frame_drops_box() {
        let bb = NormalizedBbox::new(0, 0.5, 0.5, 0.2, 0.2);
        let projection = Projection::translate(500., 0.);
        assert!(project_bb(&bb, &projection, 200, 100).is_none());
    }
}
