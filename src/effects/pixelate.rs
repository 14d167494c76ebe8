//! Pixelate effect
//!
//! Nearest-neighbour minify of the source region followed by a
//! nearest-neighbour magnify back to the original size. Blockiness grows
//! with intensity until the 2x2 floor.

use image::imageops;
use image::RgbaImage;
use rand::RngCore;

use super::{clamp_intensity, clip_pair, EffectKind, Region, RegionEffect};

/// Smallest downsample dimension
pub const MIN_CELLS: u32 = 2;

/// Downsample size for a `width x height` region
pub fn pixelate_size(width: u32, height: u32, intensity: f32) -> (u32, u32) {
    let scale = (1.0 - clamp_intensity(intensity) * 0.9).clamp(0.08, 1.0);
    let tw = ((width as f32 * scale).floor() as u32).max(MIN_CELLS);
    let th = ((height as f32 * scale).floor() as u32).max(MIN_CELLS);
    (tw, th)
}

/// Pixelate a whole image, returning a raster of the same size
pub fn pixelate_image(image: &RgbaImage, intensity: f32) -> RgbaImage {
    let (w, h) = image.dimensions();
    let (tw, th) = pixelate_size(w, h, intensity);
    if (tw, th) == (w, h) {
        return image.clone();
    }
    let small = resample_nearest(image, tw, th);
    resample_nearest(&small, w, h)
}

/// Non-interpolating resample to `width x height`
fn resample_nearest(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let (sw, sh) = image.dimensions();
    RgbaImage::from_fn(width, height, |x, y| {
        let src_x = (x as u64 * sw as u64 / width as u64) as u32;
        let src_y = (y as u64 * sh as u64 / height as u64) as u32;
        *image.get_pixel(src_x.min(sw - 1), src_y.min(sh - 1))
    })
}

pub struct Pixelate;

impl RegionEffect for Pixelate {
    fn kind(&self) -> EffectKind {
        EffectKind::Pixelate
    }

    fn apply(
        &self,
        target: &mut RgbaImage,
        source: &RgbaImage,
        region: Region,
        intensity: f32,
        _rng: &mut dyn RngCore,
    ) {
        let Some(region) = clip_pair(target, source, region) else { return };
        let (x0, y0) = (region.x as u32, region.y as u32);

        let crop = imageops::crop_imm(source, x0, y0, region.width, region.height).to_image();
        let blocks = pixelate_image(&crop, intensity);
        imageops::replace(target, &blocks, x0 as i64, y0 as i64);
    }
}
