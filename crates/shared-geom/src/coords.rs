//! Coordinate conversion between page space and device space
//!
//! Page space: PDF points, origin bottom-left. Device space: pixels at a
//! view scale, origin top-left. These functions are pure and never fail;
//! out-of-range inputs are clamped.

use serde::{Deserialize, Serialize};

/// Width/height pair in points (page space) or pixels (device space).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// A point in [0,1] x [0,1] relative to a page's bounds, independent of
/// zoom or view size. Construction clamps, never rejects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormPoint {
    x: f64,
    y: f64,
}

impl NormPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: clamp_unit(x),
            y: clamp_unit(y),
        }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }
}

/// A page's intrinsic bounds in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageBounds {
    pub width: f64,
    pub height: f64,
}

impl PageBounds {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }

    /// US Letter, 8.5 x 11 inches at 72 dpi.
    pub fn letter() -> Self {
        Self {
            width: 612.0,
            height: 792.0,
        }
    }

    pub fn a4() -> Self {
        Self {
            width: 595.0,
            height: 842.0,
        }
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        return 0.0;
    }
    v.clamp(0.0, 1.0)
}

/// Compute the device-space draw rectangle for an element centered at a
/// normalized page position.
///
/// `normalized` is the element center relative to the page, origin
/// bottom-left. The returned rect is in device space (origin top-left) at
/// `view_scale`, so it can be handed straight to a rasterizer.
pub fn to_device_rect(
    normalized: NormPoint,
    element: Size,
    page: PageBounds,
    view_scale: f64,
) -> Rect {
    let scale = if view_scale > 0.0 { view_scale } else { 1.0 };

    // Element center in page space, then flip to top-left origin.
    let cx = normalized.x() * page.width * scale;
    let cy = (1.0 - normalized.y()) * page.height * scale;

    let w = element.width.max(0.0) * scale;
    let h = element.height.max(0.0) * scale;

    Rect::new(cx - w / 2.0, cy - h / 2.0, w, h)
}

/// Convert a device-space point back to a normalized page position.
///
/// `page_display` is the page's rectangle in the same device space
/// (origin top-left). Inverse of [`to_device_rect`] within 1e-3 for any
/// value that was not clamped.
pub fn to_normalized(device: Point, page_display: Rect) -> NormPoint {
    let w = page_display.width.max(1e-9);
    let h = page_display.height.max(1e-9);

    let nx = (device.x - page_display.x) / w;
    // Flip back to bottom-left origin.
    let ny = 1.0 - (device.y - page_display.y) / h;

    NormPoint::new(nx, ny)
}
