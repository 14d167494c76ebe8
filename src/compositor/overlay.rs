//! Debug overlays drawn on top of the composited output

use image::RgbaImage;

use crate::detection::Detection;
use crate::effects::{blend_over, Region};

const MIDLINE_COLOR: [u8; 3] = [255, 255, 255];
const MIDLINE_ALPHA: f32 = 0.6;
const MIDLINE_WIDTH: u32 = 2;

/// Box colour for detections without an active effect
pub const BOX_COLOR: [u8; 3] = [0, 255, 140];
/// Box colour for detections with an active effect
pub const ACTIVE_BOX_COLOR: [u8; 3] = [255, 80, 200];
const BOX_THICKNESS: u32 = 2;

fn fill(image: &mut RgbaImage, region: Region, color: [u8; 3], alpha: f32) {
    let (w, h) = image.dimensions();
    let Some(region) = region.clip(w, h) else { return };
    let (x0, y0) = (region.x as u32, region.y as u32);
    for y in y0..y0 + region.height {
        for x in x0..x0 + region.width {
            blend_over(image.get_pixel_mut(x, y), color, alpha);
        }
    }
}

/// Vertical line separating the hemifields
pub fn draw_midline(image: &mut RgbaImage) {
    let (w, h) = image.dimensions();
    if w < MIDLINE_WIDTH {
        return;
    }
    let x = (w / 2).saturating_sub(MIDLINE_WIDTH / 2);
    fill(image, Region::new(x as i32, 0, MIDLINE_WIDTH, h), MIDLINE_COLOR, MIDLINE_ALPHA);
}

/// Outline of a rectangle, drawn inside its bounds
pub fn draw_box(image: &mut RgbaImage, region: Region, color: [u8; 3]) {
    if region.is_empty() {
        return;
    }
    let t = BOX_THICKNESS.min(region.width).min(region.height);
    let (x, y) = (region.x, region.y);
    let right = x + region.width as i32 - t as i32;
    let bottom = y + region.height as i32 - t as i32;

    fill(image, Region::new(x, y, region.width, t), color, 1.0);
    fill(image, Region::new(x, bottom, region.width, t), color, 1.0);
    fill(image, Region::new(x, y, t, region.height), color, 1.0);
    fill(image, Region::new(right, y, t, region.height), color, 1.0);
}

/// Outline every detection; `active` says whether it currently has an effect
pub fn draw_detections<F>(image: &mut RgbaImage, detections: &[Detection], active: F)
where
    F: Fn(&Detection) -> bool,
{
    for detection in detections {
        let color = if active(detection) { ACTIVE_BOX_COLOR } else { BOX_COLOR };
        draw_box(image, detection.bbox.to_region(), color);
    }
}
