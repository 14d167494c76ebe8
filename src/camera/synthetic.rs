//! Moving test pattern source

use std::sync::atomic::{AtomicU64, Ordering};

use image::{Rgba, RgbaImage};

use super::{Frame, FrameSource};

/// Side of the moving squares
const SQUARE: u32 = 48;

/// Renders a dim gradient with two bright squares crossing the frame
pub struct SyntheticSource {
    width: u32,
    height: u32,
    /// Pixels the squares travel per frame
    speed: u32,
    frame_count: AtomicU64,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            speed: 4,
            frame_count: AtomicU64::new(0),
        }
    }

    pub fn with_speed(mut self, speed: u32) -> Self {
        self.speed = speed;
        self
    }

    /// Render frame `n` of the pattern
    pub fn render(&self, n: u64) -> RgbaImage {
        let (w, h) = (self.width, self.height);
        let span_x = w.saturating_sub(SQUARE).max(1) as u64;
        let span_y = h.saturating_sub(SQUARE).max(1) as u64;
        let travel = n * self.speed as u64;

        // First square sweeps horizontally, second bounces diagonally
        let a = ((travel % span_x) as u32, h / 3);
        let bounce = |t: u64, span: u64| {
            let p = t % (2 * span);
            (if p < span { p } else { 2 * span - p }) as u32
        };
        let b = (bounce(travel / 2 + span_x / 2, span_x), bounce(travel / 2, span_y));

        let inside = |x: u32, y: u32, (sx, sy): (u32, u32)| {
            x >= sx && x < sx + SQUARE && y >= sy && y < sy + SQUARE
        };

        RgbaImage::from_fn(w, h, |x, y| {
            if inside(x, y, a) {
                Rgba([240, 200, 60, 255])
            } else if inside(x, y, b) {
                Rgba([60, 200, 240, 255])
            } else {
                let g = (x * 60 / w.max(1)) as u8;
                let v = (y * 40 / h.max(1)) as u8;
                Rgba([20 + g, 24 + v, 32 + g / 2, 255])
            }
        })
    }
}

impl FrameSource for SyntheticSource {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn is_ready(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    fn latest_frame(&self) -> Option<Frame> {
        if !self.is_ready() {
            return None;
        }
        let n = self.frame_count.fetch_add(1, Ordering::Relaxed);
        Some(Frame::new(self.render(n), n))
    }
}
