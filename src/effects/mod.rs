//! Raster effect library
//!
//! Region transforms used for both object neglect and hemifield neglect.
//! Every effect writes only inside its (clipped) target rectangle, clamps
//! its intensity to `[0, 1]` and treats zero-area rectangles as a no-op.

pub mod blur;
pub mod erase;
pub mod fog;
pub mod pixelate;
pub mod shift_noise;

use image::{Rgba, RgbaImage};
use rand::RngCore;

pub use blur::{blur_radius, Blur};
pub use erase::Erase;
pub use fog::Fog;
pub use pixelate::{pixelate_size, Pixelate};
pub use shift_noise::ShiftNoise;

/// Axis-aligned rectangle in raster pixel space
///
/// The origin may be negative and the extent may run past the raster;
/// effects call [`Region::clip`] before touching pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Region covering a whole raster
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Intersect with a `width x height` raster
    ///
    /// Returns `None` when nothing of the region is left.
    pub fn clip(&self, width: u32, height: u32) -> Option<Region> {
        let x0 = (self.x as i64).max(0);
        let y0 = (self.y as i64).max(0);
        let x1 = self.right().min(width as i64);
        let y1 = self.bottom().min(height as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Region::new(
            x0 as i32,
            y0 as i32,
            (x1 - x0) as u32,
            (y1 - y0) as u32,
        ))
    }

    /// Intersect with another region
    pub fn intersect(&self, other: &Region) -> Option<Region> {
        let x0 = (self.x as i64).max(other.x as i64);
        let y0 = (self.y as i64).max(other.y as i64);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Region::new(
            x0 as i32,
            y0 as i32,
            (x1 - x0) as u32,
            (y1 - y0) as u32,
        ))
    }

    pub fn contains(&self, px: u32, py: u32) -> bool {
        let (px, py) = (px as i64, py as i64);
        px >= self.x as i64 && px < self.right() && py >= self.y as i64 && py < self.bottom()
    }
}

/// The five region transforms
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Fog,
    Pixelate,
    Blur,
    Erase,
    ShiftNoise,
}

impl EffectKind {
    pub const ALL: [EffectKind; 5] = [
        EffectKind::Fog,
        EffectKind::Pixelate,
        EffectKind::Blur,
        EffectKind::Erase,
        EffectKind::ShiftNoise,
    ];

    /// Get the effect implementation
    pub fn effect(&self) -> &'static dyn RegionEffect {
        match self {
            EffectKind::Fog => &Fog,
            EffectKind::Pixelate => &Pixelate,
            EffectKind::Blur => &Blur,
            EffectKind::Erase => &Erase,
            EffectKind::ShiftNoise => &ShiftNoise,
        }
    }

    /// Get display name for logs
    pub fn display_name(&self) -> &'static str {
        match self {
            EffectKind::Fog => "Fog",
            EffectKind::Pixelate => "Pixelate",
            EffectKind::Blur => "Blur",
            EffectKind::Erase => "Erase",
            EffectKind::ShiftNoise => "Shift+Noise",
        }
    }

    /// Apply this effect, see [`RegionEffect::apply`]
    pub fn apply(
        &self,
        target: &mut RgbaImage,
        source: &RgbaImage,
        region: Region,
        intensity: f32,
        rng: &mut dyn RngCore,
    ) {
        self.effect().apply(target, source, region, intensity, rng);
    }
}

/// A transform over a rectangular clip of a raster
pub trait RegionEffect: Send + Sync {
    /// Which transform this is
    fn kind(&self) -> EffectKind;

    /// Apply the transform to `region` of `target`
    ///
    /// `source` is the raster sampled by effects that read pixels (usually
    /// the pristine frame for the current tick). It must have the same
    /// dimensions as `target`; pixels outside either raster are never read
    /// or written.
    fn apply(
        &self,
        target: &mut RgbaImage,
        source: &RgbaImage,
        region: Region,
        intensity: f32,
        rng: &mut dyn RngCore,
    );
}

/// Clamp an intensity to `[0, 1]`, mapping NaN to 0
pub fn clamp_intensity(intensity: f32) -> f32 {
    if intensity.is_nan() {
        0.0
    } else {
        intensity.clamp(0.0, 1.0)
    }
}

/// Clip `region` against both rasters
pub(crate) fn clip_pair(target: &RgbaImage, source: &RgbaImage, region: Region) -> Option<Region> {
    let (tw, th) = target.dimensions();
    let (sw, sh) = source.dimensions();
    region.clip(tw.min(sw), th.min(sh))
}

/// Source-over blend of a flat colour onto one pixel
pub(crate) fn blend_over(pixel: &mut Rgba<u8>, color: [u8; 3], alpha: f32) {
    if alpha <= 0.0 {
        return;
    }
    let alpha = alpha.min(1.0);
    let dst_a = pixel[3] as f32 / 255.0;
    let out_a = alpha + dst_a * (1.0 - alpha);
    if out_a <= 0.0 {
        *pixel = Rgba([0, 0, 0, 0]);
        return;
    }
    for c in 0..3 {
        let src = color[c] as f32;
        let dst = pixel[c] as f32;
        let out = (src * alpha + dst * dst_a * (1.0 - alpha)) / out_a;
        pixel[c] = out.round().clamp(0.0, 255.0) as u8;
    }
    pixel[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

#[cfg(test)]
pub(crate) mod test_util {
    use image::{Rgba, RgbaImage};

    /// Deterministic, non-uniform test raster
    pub fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([
                (x * 7 % 256) as u8,
                (y * 5 % 256) as u8,
                ((x * 3 + y * 11) % 256) as u8,
                255,
            ])
        })
    }

    /// Pixels of `a` and `b` differing outside `region`
    pub fn changed_outside(a: &RgbaImage, b: &RgbaImage, region: super::Region) -> usize {
        a.enumerate_pixels()
            .filter(|(x, y, p)| !region.contains(*x, *y) && *p != b.get_pixel(*x, *y))
            .count()
    }
}
