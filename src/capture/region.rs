use serde::{Deserialize, Serialize};

/// A rectangle in logical (DPI independent) screen pixels, as the UI sees it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CaptureRegion {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Scales into device pixels, rounding each edge independently so
    /// fractional scale factors never leave sub-pixel offsets.
    pub fn to_physical(&self, scale_factor: f64) -> PhysicalRect {
        let scale = |value: f64| (value * scale_factor).round() as i64;
        PhysicalRect {
            left: scale(self.x),
            top: scale(self.y),
            width: scale(self.width),
            height: scale(self.height),
        }
    }
}

/// Device-pixel rectangle before it has been fitted to a real buffer; any
/// field may be negative or oversized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalRect {
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

/// A rectangle guaranteed to lie inside the buffer it was clamped against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClampedRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl PhysicalRect {
    /// Fits the rectangle into a `real_width` x `real_height` buffer, keeping
    /// at least one pixel in each dimension. `None` only for an empty buffer.
    pub fn clamp_to(self, real_width: u32, real_height: u32) -> Option<ClampedRect> {
        if real_width == 0 || real_height == 0 {
            return None;
        }

        let real_w = i64::from(real_width);
        let real_h = i64::from(real_height);

        let left = self.left.clamp(0, real_w - 1);
        let top = self.top.clamp(0, real_h - 1);
        let width = self.width.min(real_w - left).max(1);
        let height = self.height.min(real_h - top).max(1);

        Some(ClampedRect {
            left: left as u32,
            top: top as u32,
            width: width as u32,
            height: height as u32,
        })
    }
}
