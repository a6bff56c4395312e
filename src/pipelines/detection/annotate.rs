// SPDX-License-Identifier: GPL-3.0-only

//! Box outlines on color images

use super::DetectionBox;
use crate::backends::camera::types::ColorImage;
use image::Rgb;

/// Draw a hollow rectangle, clipped to the image
///
/// The outline grows inwards from the box edges by `thickness` pixels.
pub fn draw_box(img: &mut ColorImage, b: &DetectionBox, color: [u8; 3], thickness: u32) {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || thickness == 0 {
        return;
    }
    let max_x = w as i64 - 1;
    let max_y = h as i64 - 1;
    let (x1, x2) = (b.x1.min(b.x2) as i64, b.x1.max(b.x2) as i64);
    let (y1, y2) = (b.y1.min(b.y2) as i64, b.y1.max(b.y2) as i64);
    if x2 < 0 || y2 < 0 || x1 > max_x || y1 > max_y {
        return;
    }
    let t = thickness as i64;

    let mut fill = |xa: i64, ya: i64, xb: i64, yb: i64| {
        for y in ya.max(0)..=yb.min(max_y) {
            for x in xa.max(0)..=xb.min(max_x) {
                img.put_pixel(x as u32, y as u32, Rgb(color));
            }
        }
    };

    // top, bottom, left, right
    fill(x1, y1, x2, (y1 + t - 1).min(y2));
    fill(x1, (y2 - t + 1).max(y1), x2, y2);
    fill(x1, y1, (x1 + t - 1).min(x2), y2);
    fill((x2 - t + 1).max(x1), y1, x2, y2);
}

/// Copy of `img` with every box outlined
pub fn annotate(img: &ColorImage, boxes: &[DetectionBox], color: [u8; 3], thickness: u32) -> ColorImage {
    let mut out = img.clone();
    for b in boxes {
        draw_box(&mut out, b, color, thickness);
    }
    out
}
