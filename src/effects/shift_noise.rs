//! Shift+Noise effect
//!
//! Re-draws the source region displaced by a small random translation and
//! sprinkles dark single-pixel speckles over it.

use image::RgbaImage;
use rand::{Rng, RngCore};

use super::{blend_over, clamp_intensity, clip_pair, EffectKind, Region, RegionEffect};

/// Number of speckles per application
pub const SPECKLE_COUNT: u32 = 50;

/// Maximum translation `(dx, dy)` in pixels for an intensity
pub fn max_shift(intensity: f32) -> (i32, i32) {
    let i = clamp_intensity(intensity);
    (
        (2.0 + 10.0 * i).round() as i32,
        (1.0 + 6.0 * i).round() as i32,
    )
}

/// Opacity of each speckle
pub fn speckle_opacity(intensity: f32) -> f32 {
    0.12 + 0.20 * clamp_intensity(intensity)
}

pub struct ShiftNoise;

impl RegionEffect for ShiftNoise {
    fn kind(&self) -> EffectKind {
        EffectKind::ShiftNoise
    }

    fn apply(
        &self,
        target: &mut RgbaImage,
        source: &RgbaImage,
        region: Region,
        intensity: f32,
        rng: &mut dyn RngCore,
    ) {
        let Some(region) = clip_pair(target, source, region) else { return };

        let (max_dx, max_dy) = max_shift(intensity);
        let dx = rng.random_range(-max_dx..=max_dx);
        let dy = rng.random_range(-max_dy..=max_dy);

        // Destination pixel p takes source pixel p - (dx, dy) when that
        // lies inside the region; the uncovered strip keeps its pixels.
        let x0 = region.x;
        let y0 = region.y;
        for y in 0..region.height as i32 {
            let sy = y - dy;
            if sy < 0 || sy >= region.height as i32 {
                continue;
            }
            for x in 0..region.width as i32 {
                let sx = x - dx;
                if sx < 0 || sx >= region.width as i32 {
                    continue;
                }
                let pixel = *source.get_pixel((x0 + sx) as u32, (y0 + sy) as u32);
                target.put_pixel((x0 + x) as u32, (y0 + y) as u32, pixel);
            }
        }

        let opacity = speckle_opacity(intensity);
        for _ in 0..SPECKLE_COUNT {
            let px = x0 as u32 + rng.random_range(0..region.width);
            let py = y0 as u32 + rng.random_range(0..region.height);
            blend_over(target.get_pixel_mut(px, py), [0, 0, 0], opacity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_shift_bounds() {
        assert_eq!(max_shift(0.0), (2, 1));
        assert_eq!(max_shift(1.0), (12, 7));
        assert!((speckle_opacity(0.0) - 0.12).abs() < 1e-6);
        assert!((speckle_opacity(1.0) - 0.32).abs() < 1e-6);
    }

    #[test]
    fn test_shift_zero_intensity_is_near_identity() {
        // A single bright column: after the shift it may move by at most
        // two pixels horizontally.
        let source = RgbaImage::from_fn(40, 20, |x, _| {
            if x == 20 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([100, 100, 100, 255])
            }
        });
        for seed in 0..16 {
            let mut target = source.clone();
            let mut rng = StdRng::seed_from_u64(seed);
            ShiftNoise.apply(&mut target, &source, Region::new(0, 0, 40, 20), 0.0, &mut rng);

            let bright: Vec<u32> = (0..40)
                .filter(|&x| target.get_pixel(x, 10)[0] > 200)
                .collect();
            assert!(
                bright.iter().all(|&x| (18..=22).contains(&x)),
                "column moved too far: {:?}",
                bright
            );

            let darkened = target.pixels().filter(|p| p[0] < 100).count();
            assert!(darkened <= SPECKLE_COUNT as usize);
            assert!(target.pixels().all(|p| p[0] >= 45));
        }
    }

    #[test]
    fn test_shift_adds_speckles() {
        let source = RgbaImage::from_pixel(30, 30, Rgba([200, 200, 200, 255]));
        let mut target = source.clone();
        let mut rng = StdRng::seed_from_u64(2);
        ShiftNoise.apply(&mut target, &source, Region::new(0, 0, 30, 30), 1.0, &mut rng);
        assert!(target.pixels().any(|p| p[0] < 200));
        assert!(target.pixels().all(|p| p[3] == 255));
    }
}
