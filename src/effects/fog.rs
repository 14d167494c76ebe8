//! Fog effect
//!
//! Flat translucent wash over the region. Repeated application keeps
//! darkening toward the fog colour, which is what lets fog layer on top of
//! other effects.

use image::RgbaImage;
use rand::RngCore;

use super::{blend_over, clamp_intensity, EffectKind, Region, RegionEffect};

/// Fog colour (#9aa3c7)
pub const FOG_COLOR: [u8; 3] = [0x9a, 0xa3, 0xc7];

/// Opacity at full intensity
pub const FOG_OPACITY: f32 = 0.7;

pub struct Fog;

impl Fog {
    /// Opacity used for a given intensity
    pub fn opacity(intensity: f32) -> f32 {
        clamp_intensity(intensity) * FOG_OPACITY
    }
}

impl RegionEffect for Fog {
    fn kind(&self) -> EffectKind {
        EffectKind::Fog
    }

    fn apply(
        &self,
        target: &mut RgbaImage,
        _source: &RgbaImage,
        region: Region,
        intensity: f32,
        _rng: &mut dyn RngCore,
    ) {
        let alpha = Self::opacity(intensity);
        if alpha <= 0.0 {
            return;
        }
        let (w, h) = target.dimensions();
        let Some(region) = region.clip(w, h) else { return };

        let (x0, y0) = (region.x as u32, region.y as u32);
        for y in y0..y0 + region.height {
            for x in x0..x0 + region.width {
                blend_over(target.get_pixel_mut(x, y), FOG_COLOR, alpha);
            }
        }
    }
}
