//! Reading and writing of YOLO style label files: one box per line,
//! `<class_id> <x_center> <y_center> <width> <height>`, coordinates normalized to [0, 1].
use crate::dataset::common_structs::NormalizedBbox;
use itertools::Itertools;

pub const LABEL_EXTENSION: &str = "txt";
const FIELDS_PER_LINE: usize = 5;

/// Parses a single label line. None for anything malformed.
pub fn parse_label_line(line: &str) -> Option<NormalizedBbox> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != FIELDS_PER_LINE {
        return None;
    }
    let mut values = [0f64; FIELDS_PER_LINE];
    for (value, field) in values.iter_mut().zip(fields.iter()) {
        *value = field.parse::<f64>().ok()?;
    }
    let class_id = values[0];
    if !class_id.is_finite() || class_id < 0. || class_id.fract() != 0. || class_id > u32::MAX as f64
    {
        return None;
    }
    let bb = NormalizedBbox::new(class_id as u32, values[1], values[2], values[3], values[4]);
    if !bb.is_normalized() {
        return None;
    }
    Some(bb)
}

/// Parses a whole label file, silently skipping malformed lines
pub fn parse_label_file(contents: &str) -> Vec<NormalizedBbox> {
    contents.lines().filter_map(parse_label_line).collect()
}

pub fn format_label_line(bb: &NormalizedBbox) -> String {
    format!(
        "{} {:.6} {:.6} {:.6} {:.6}",
        bb.class_id, bb.x_center, bb.y_center, bb.width, bb.height
    )
}

/// One line per box, every line newline terminated
pub fn serialize_label_file(bbs: &[NormalizedBbox]) -> String {
    if bbs.is_empty() {
        return String::new();
    }
    let mut out = bbs.iter().map(format_label_line).join("\n");
    out.push('\n');
    out
}
