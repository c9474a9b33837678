//! Zoom and pan: `screen = scene * scale + offset`

use crate::geometry::{Bounds, Point, Viewport};
use serde::{Deserialize, Serialize};

pub const MIN_SCALE: f64 = 0.15;
pub const MAX_SCALE: f64 = 4.0;
/// Auto-fit never zooms in further than this
pub const FIT_SCALE_CAP: f64 = 1.5;
pub const ZOOM_STEP: f64 = 1.2;
pub const FIT_PADDING: f64 = 40.0;
pub const MIN_TOP_MARGIN: f64 = 24.0;

/// Direction of a fixed-step zoom
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

/// Affine view transform; scale is always within `[MIN_SCALE, MAX_SCALE]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

impl Camera {
    /// Camera with `scale` clamped into bounds
    pub fn new(scale: f64, offset_x: f64, offset_y: f64) -> Self {
        Self {
            scale: scale.clamp(MIN_SCALE, MAX_SCALE),
            offset_x,
            offset_y,
        }
    }

    /// Current zoom factor
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Screen position of the scene origin
    pub fn offset(&self) -> (f64, f64) {
        (self.offset_x, self.offset_y)
    }

    /// Scene point to screen point
    pub fn to_screen(&self, p: Point) -> Point {
        Point::new(p.x * self.scale + self.offset_x, p.y * self.scale + self.offset_y)
    }

    /// Screen point to scene point
    pub fn to_scene(&self, p: Point) -> Point {
        Point::new((p.x - self.offset_x) / self.scale, (p.y - self.offset_y) / self.scale)
    }

    /// Rescale by `factor` keeping the scene point under `pointer` fixed on screen
    pub fn zoom_at(&mut self, pointer: Point, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let anchor = self.to_scene(pointer);
        self.scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
        self.offset_x = pointer.x - anchor.x * self.scale;
        self.offset_y = pointer.y - anchor.y * self.scale;
    }

    /// Mouse-wheel zoom: scrolling down zooms out. Returns false for a zero
    /// (horizontal-only) or non-finite delta, which leaves the camera alone.
    pub fn zoom_wheel(&mut self, pointer: Point, delta: f64) -> bool {
        if delta == 0.0 || !delta.is_finite() {
            return false;
        }
        let factor = if delta > 0.0 { 0.9 } else { 1.1 };
        self.zoom_at(pointer, factor);
        true
    }

    /// Translate by a screen-space delta; panning is unbounded
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.offset_x += dx;
        self.offset_y += dy;
    }

    /// Fixed-factor zoom about the viewport centre
    pub fn zoom_step(&mut self, direction: ZoomDirection, viewport: Viewport) {
        let factor = match direction {
            ZoomDirection::In => ZOOM_STEP,
            ZoomDirection::Out => 1.0 / ZOOM_STEP,
        };
        self.zoom_at(viewport.center(), factor);
    }

    /// Frame `content` in the viewport, centred, never above `MIN_TOP_MARGIN`
    pub fn fit(content: Bounds, viewport: Viewport) -> Self {
        let padded = content.padded(FIT_PADDING);
        let width = padded.width().max(1.0);
        let height = padded.height().max(1.0);

        let scale = (viewport.width / width)
            .min(viewport.height / height)
            .min(FIT_SCALE_CAP)
            .clamp(MIN_SCALE, MAX_SCALE);

        let center = padded.center();
        let offset_x = viewport.width / 2.0 - center.x * scale;
        let offset_y = viewport.height / 2.0 - center.y * scale;
        let top = padded.min_y * scale + offset_y;
        let offset_y = if top < MIN_TOP_MARGIN {
            offset_y + (MIN_TOP_MARGIN - top)
        } else {
            offset_y
        };

        Self {
            scale,
            offset_x,
            offset_y,
        }
    }
}
