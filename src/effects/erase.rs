//! Erase effect
//!
//! Punches randomly placed, randomly sized holes into the destination alpha
//! (destination-out). Colour channels are never touched. The speckle pattern
//! comes from the caller's RNG, so consecutive calls differ.

use image::RgbaImage;
use rand::{Rng, RngCore};

use super::{clamp_intensity, EffectKind, Region, RegionEffect};

/// Hole count at intensity 0
pub const BASE_HOLES: u32 = 20;

/// Additional holes at intensity 1
pub const EXTRA_HOLES: f32 = 80.0;

/// Hole size range as a fraction of the region size
pub const HOLE_FRACTION: (f32, f32) = (0.03, 0.18);

/// Number of holes punched at an intensity
pub fn hole_count(intensity: f32) -> u32 {
    BASE_HOLES + (clamp_intensity(intensity) * EXTRA_HOLES).floor() as u32
}

/// Alpha removed by each hole
pub fn erase_strength(intensity: f32) -> f32 {
    0.35 + clamp_intensity(intensity) * 0.65
}

pub struct Erase;

impl RegionEffect for Erase {
    fn kind(&self) -> EffectKind {
        EffectKind::Erase
    }

    fn apply(
        &self,
        target: &mut RgbaImage,
        _source: &RgbaImage,
        region: Region,
        intensity: f32,
        rng: &mut dyn RngCore,
    ) {
        let (w, h) = target.dimensions();
        let Some(region) = region.clip(w, h) else { return };

        let keep = 1.0 - erase_strength(intensity);
        let count = hole_count(intensity);
        let (min_frac, max_frac) = HOLE_FRACTION;

        for _ in 0..count {
            let hole_w = (region.width as f32 * rng.random_range(min_frac..max_frac))
                .round()
                .max(1.0) as u32;
            let hole_h = (region.height as f32 * rng.random_range(min_frac..max_frac))
                .round()
                .max(1.0) as u32;
            let hx = region.x + rng.random_range(0..region.width) as i32;
            let hy = region.y + rng.random_range(0..region.height) as i32;

            let Some(hole) = Region::new(hx, hy, hole_w, hole_h).intersect(&region) else {
                continue;
            };
            let (x0, y0) = (hole.x as u32, hole.y as u32);
            for y in y0..y0 + hole.height {
                for x in x0..x0 + hole.width {
                    let pixel = target.get_pixel_mut(x, y);
                    pixel[3] = (pixel[3] as f32 * keep).round() as u8;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::test_util::gradient;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_hole_count_and_strength() {
        assert_eq!(hole_count(0.0), 20);
        assert_eq!(hole_count(1.0), 100);
        assert_eq!(hole_count(0.5), 60);
        assert!((erase_strength(0.0) - 0.35).abs() < 1e-6);
        assert!((erase_strength(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_erase_zero_intensity_only_touches_alpha() {
        let source = gradient(50, 40);
        let mut target = source.clone();
        let mut rng = StdRng::seed_from_u64(11);
        Erase.apply(&mut target, &source, Region::new(0, 0, 50, 40), 0.0, &mut rng);

        let mut erased = 0;
        for (x, y, p) in target.enumerate_pixels() {
            let orig = source.get_pixel(x, y);
            assert_eq!(&p.0[..3], &orig.0[..3]);
            if p[3] < orig[3] {
                erased += 1;
            }
        }
        assert!(erased > 0);
    }

    #[test]
    fn test_erase_full_intensity_clears_alpha() {
        let source = gradient(50, 40);
        let mut target = source.clone();
        let mut rng = StdRng::seed_from_u64(5);
        Erase.apply(&mut target, &source, Region::new(0, 0, 50, 40), 1.0, &mut rng);
        assert!(target.pixels().any(|p| p[3] == 0));
    }

    #[test]
    fn test_erase_pattern_differs_per_call() {
        let source = gradient(60, 60);
        let region = Region::new(0, 0, 60, 60);
        let mut rng = StdRng::seed_from_u64(99);

        let mut first = source.clone();
        Erase.apply(&mut first, &source, region, 0.5, &mut rng);
        let mut second = source.clone();
        Erase.apply(&mut second, &source, region, 0.5, &mut rng);
        assert_ne!(first, second);
    }

    #[test]
    fn test_erase_same_seed_same_pattern() {
        let source = gradient(60, 60);
        let region = Region::new(0, 0, 60, 60);

        let mut a = source.clone();
        Erase.apply(&mut a, &source, region, 0.5, &mut StdRng::seed_from_u64(4));
        let mut b = source.clone();
        Erase.apply(&mut b, &source, region, 0.5, &mut StdRng::seed_from_u64(4));
        assert_eq!(a, b);
    }
}
