//! Blur effect
//!
//! Gaussian blur clipped to the region. The radius never drops below
//! [`MIN_BLUR_RADIUS`], so blur is not an identity at intensity 0.

use image::imageops;
use image::RgbaImage;
use rand::RngCore;

use super::{clamp_intensity, clip_pair, EffectKind, Region, RegionEffect};

/// Radius at intensity 0
pub const MIN_BLUR_RADIUS: f32 = 2.0;

/// Additional radius at intensity 1
pub const BLUR_RADIUS_RANGE: f32 = 14.0;

/// Blur radius in pixels for an intensity
pub fn blur_radius(intensity: f32) -> f32 {
    MIN_BLUR_RADIUS + clamp_intensity(intensity) * BLUR_RADIUS_RANGE
}

pub struct Blur;

impl RegionEffect for Blur {
    fn kind(&self) -> EffectKind {
        EffectKind::Blur
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
        let radius = blur_radius(intensity);

        // Sample a margin around the clip so edges blur against their real
        // neighbours instead of the crop border.
        let margin = (radius * 2.0).ceil() as i32;
        let (sw, sh) = source.dimensions();
        let Some(padded) = Region::new(
            region.x - margin,
            region.y - margin,
            region.width + 2 * margin as u32,
            region.height + 2 * margin as u32,
        )
        .clip(sw, sh) else {
            return;
        };

        let crop = imageops::crop_imm(
            source,
            padded.x as u32,
            padded.y as u32,
            padded.width,
            padded.height,
        )
        .to_image();
        let blurred = imageops::blur(&crop, radius);

        let off_x = (region.x - padded.x) as u32;
        let off_y = (region.y - padded.y) as u32;
        for y in 0..region.height {
            for x in 0..region.width {
                let pixel = *blurred.get_pixel(off_x + x, off_y + y);
                target.put_pixel(region.x as u32 + x, region.y as u32 + y, pixel);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn checkerboard(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        })
    }

    #[test]
    fn test_blur_radius_floor() {
        assert_eq!(blur_radius(0.0), MIN_BLUR_RADIUS);
        assert_eq!(blur_radius(-1.0), 2.0);
        assert_eq!(blur_radius(1.0), 16.0);
        assert_eq!(blur_radius(0.5), 9.0);
    }

    #[test]
    fn test_blur_zero_intensity_still_blurs() {
        let source = checkerboard(32, 32);
        let mut target = source.clone();
        let mut rng = StdRng::seed_from_u64(0);
        Blur.apply(&mut target, &source, Region::new(8, 8, 16, 16), 0.0, &mut rng);

        let center = target.get_pixel(16, 16);
        assert!(center[0] > 64 && center[0] < 192, "expected a grey mix, got {:?}", center);
        assert_eq!(target.get_pixel(2, 2), source.get_pixel(2, 2));
    }

    #[test]
    fn test_blur_flat_region_stays_flat() {
        let source = RgbaImage::from_pixel(24, 24, Rgba([120, 60, 30, 255]));
        let mut target = source.clone();
        let mut rng = StdRng::seed_from_u64(0);
        Blur.apply(&mut target, &source, Region::new(0, 0, 12, 24), 1.0, &mut rng);

        for (_, _, p) in target.enumerate_pixels() {
            assert!((p[0] as i32 - 120).abs() <= 1);
            assert!((p[1] as i32 - 60).abs() <= 1);
            assert!((p[2] as i32 - 30).abs() <= 1);
        }
    }
}
