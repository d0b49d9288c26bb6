//! Virtual-camera transform shared by rendering and input mapping.
//!
//! The display surface itself never pans — zoom and pan only change
//! which sub-region of the remote image is sampled. That keeps
//! viewport coordinates stable, so the gesture layer can map touches
//! to remote coordinates through the same transform the renderer
//! samples with.

use std::sync::{Arc, Mutex};

/// Minimum zoom scale (1 = whole image visible).
pub const MIN_SCALE: f64 = 1.0;

/// Maximum zoom scale.
pub const MAX_SCALE: f64 = 5.0;

const SCALE_EPSILON: f64 = 1e-9;

/// Shared handle to a [`Camera`], wired between the viewport and the
/// gesture recognizer at startup.
pub type SharedCamera = Arc<Mutex<Camera>>;

// ── Rect ─────────────────────────────────────────────────────────

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    /// Whether `(px, py)` lies inside the rectangle.
    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px < self.x + self.w && py >= self.y && py < self.y + self.h
    }

    /// Center point.
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }
}

// ── Camera ───────────────────────────────────────────────────────

/// The virtual-camera state: scale, focal point, and the sizes the
/// derived rectangles are computed from.
///
/// The focal point is a normalized coordinate in [0,1]² of remote
/// image space. Geometry is undefined (returns `None`) until both a
/// viewport size and an image size are known.
#[derive(Debug, Clone)]
pub struct Camera {
    scale: f64,
    focal: (f64, f64),
    viewport: (f64, f64),
    image: (f64, f64),
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera {
    pub fn new() -> Self {
        Self {
            scale: MIN_SCALE,
            focal: (0.5, 0.5),
            viewport: (0.0, 0.0),
            image: (0.0, 0.0),
        }
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn focal(&self) -> (f64, f64) {
        self.focal
    }

    /// Whether the camera is zoomed past the identity view.
    pub fn is_zoomed(&self) -> bool {
        self.scale > MIN_SCALE + SCALE_EPSILON
    }

    pub fn set_viewport_size(&mut self, w: f64, h: f64) {
        self.viewport = (w, h);
    }

    /// Record the intrinsic size of the decoded remote image.
    pub fn set_image_size(&mut self, w: f64, h: f64) {
        self.image = (w, h);
    }

    fn has_geometry(&self) -> bool {
        self.viewport.0 > 0.0 && self.viewport.1 > 0.0 && self.image.0 > 0.0 && self.image.1 > 0.0
    }

    // ── Derived rectangles ───────────────────────────────────────

    /// Focal point clamped so the source rectangle stays fully inside
    /// the image. The clamp works in normalized units: at scale `s`
    /// the source half-extent is `1/(2s)` per axis.
    fn clamped_focal(&self) -> (f64, f64) {
        let half = 1.0 / (2.0 * self.scale);
        (
            self.focal.0.clamp(half, 1.0 - half),
            self.focal.1.clamp(half, 1.0 - half),
        )
    }

    /// Region of the remote image currently sampled for display.
    pub fn source_rect(&self) -> Option<Rect> {
        if !self.has_geometry() {
            return None;
        }
        let (iw, ih) = self.image;
        let w = iw / self.scale;
        let h = ih / self.scale;
        let (fx, fy) = self.clamped_focal();
        Some(Rect {
            x: fx * iw - w / 2.0,
            y: fy * ih - h / 2.0,
            w,
            h,
        })
    }

    /// Largest aspect-fit rectangle centered in the viewport. The
    /// aspect ratio is the remote image's, so letterbox margins may
    /// appear on one axis.
    pub fn draw_rect(&self) -> Option<Rect> {
        if !self.has_geometry() {
            return None;
        }
        let (vw, vh) = self.viewport;
        let (iw, ih) = self.image;
        let fit = (vw / iw).min(vh / ih);
        let w = iw * fit;
        let h = ih * fit;
        Some(Rect {
            x: (vw - w) / 2.0,
            y: (vh - h) / 2.0,
            w,
            h,
        })
    }

    // ── Mutations ────────────────────────────────────────────────

    /// Apply a zoom step centered on the viewport point `(vx, vy)`.
    ///
    /// The new scale is `scale × factor` clamped to [1, 5]; a clamp
    /// that produces the current scale is a no-op and leaves the
    /// focal point untouched. Otherwise the focal point is re-centered
    /// on the image-space position under `(vx, vy)` using the current
    /// transform before the new scale is applied, keeping the point
    /// under the gesture stationary on screen.
    pub fn zoom(&mut self, factor: f64, vx: f64, vy: f64) {
        let new_scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
        if (new_scale - self.scale).abs() < SCALE_EPSILON {
            return;
        }
        if let Some((rx, ry)) = self.viewport_to_remote(vx, vy) {
            self.focal = (rx / self.image.0, ry / self.image.1);
        }
        self.scale = new_scale;
    }

    /// Shift the view by a viewport-space delta.
    ///
    /// No-op at scale 1 (the whole image is already visible). The
    /// delta is converted to a normalized image-space delta; a
    /// positive `dx` (finger moving right) moves the focal point
    /// left, so the content follows the finger.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        if !self.is_zoomed() {
            return;
        }
        let (Some(src), Some(draw)) = (self.source_rect(), self.draw_rect()) else {
            return;
        };
        let ndx = dx * src.w / draw.w / self.image.0;
        let ndy = dy * src.h / draw.h / self.image.1;
        self.focal = (
            (self.focal.0 - ndx).clamp(0.0, 1.0),
            (self.focal.1 - ndy).clamp(0.0, 1.0),
        );
    }

    /// Return to the identity view: scale 1, focal point centered.
    pub fn reset(&mut self) {
        self.scale = MIN_SCALE;
        self.focal = (0.5, 0.5);
    }

    // ── Coordinate mapping ───────────────────────────────────────

    /// Inverse-map a viewport point to remote-image pixel
    /// coordinates.
    ///
    /// Returns `None` when the point lies outside the draw rectangle
    /// (in a letterbox margin) or geometry is not yet known.
    pub fn viewport_to_remote(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let (src, draw) = (self.source_rect()?, self.draw_rect()?);
        if !draw.contains(x, y) {
            return None;
        }
        let rx = src.x + (x - draw.x) / draw.w * src.w;
        let ry = src.y + (y - draw.y) / draw.h * src.h;
        Some((rx, ry))
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(vw: f64, vh: f64, iw: f64, ih: f64) -> Camera {
        let mut cam = Camera::new();
        cam.set_viewport_size(vw, vh);
        cam.set_image_size(iw, ih);
        cam
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-6, "{a} != {b}");
    }

    #[test]
    fn identity_view_fills_aspect_matched_viewport() {
        // Image 1000x800 into viewport 500x400: same aspect ratio.
        let cam = camera(500.0, 400.0, 1000.0, 800.0);

        let draw = cam.draw_rect().unwrap();
        assert_eq!(draw, Rect { x: 0.0, y: 0.0, w: 500.0, h: 400.0 });

        let src = cam.source_rect().unwrap();
        assert_eq!(src, Rect { x: 0.0, y: 0.0, w: 1000.0, h: 800.0 });
    }

    #[test]
    fn draw_rect_letterboxes_mismatched_aspect() {
        // Wide image in a square viewport: margins top and bottom.
        let cam = camera(400.0, 400.0, 800.0, 400.0);
        let draw = cam.draw_rect().unwrap();
        assert_eq!(draw, Rect { x: 0.0, y: 100.0, w: 400.0, h: 200.0 });
    }

    #[test]
    fn no_geometry_before_first_frame() {
        let mut cam = Camera::new();
        cam.set_viewport_size(500.0, 400.0);
        assert!(cam.source_rect().is_none());
        assert!(cam.draw_rect().is_none());
        assert!(cam.viewport_to_remote(10.0, 10.0).is_none());
    }

    #[test]
    fn zoom_clamps_to_bounds() {
        let mut cam = camera(500.0, 400.0, 1000.0, 800.0);

        cam.zoom(100.0, 250.0, 200.0);
        assert_close(cam.scale(), MAX_SCALE);

        cam.zoom(0.0001, 250.0, 200.0);
        assert_close(cam.scale(), MIN_SCALE);
    }

    #[test]
    fn zoom_at_ceiling_leaves_focal_untouched() {
        let mut cam = camera(500.0, 400.0, 1000.0, 800.0);
        cam.zoom(5.0, 250.0, 200.0);
        let focal = cam.focal();

        // Already at max: a further zoom-in clamps to the same scale
        // and must not move the focal point.
        cam.zoom(2.0, 10.0, 10.0);
        assert_close(cam.scale(), MAX_SCALE);
        assert_eq!(cam.focal(), focal);
    }

    #[test]
    fn unit_zoom_is_noop() {
        let mut cam = camera(500.0, 400.0, 1000.0, 800.0);
        cam.zoom(2.0, 100.0, 100.0);
        let before = (cam.scale(), cam.focal());
        cam.zoom(1.0, 400.0, 300.0);
        assert_eq!((cam.scale(), cam.focal()), before);
    }

    #[test]
    fn draw_center_maps_to_focal_at_any_scale() {
        for scale in [1.0, 1.5, 2.0, 3.0, 4.0, 5.0] {
            let mut cam = camera(500.0, 400.0, 1000.0, 800.0);
            cam.zoom(scale, 250.0, 200.0);
            assert_close(cam.scale(), scale);

            let (cx, cy) = cam.draw_rect().unwrap().center();
            let (rx, ry) = cam.viewport_to_remote(cx, cy).unwrap();
            let (fx, fy) = cam.focal();
            assert_close(rx, fx * 1000.0);
            assert_close(ry, fy * 800.0);
        }
    }

    #[test]
    fn source_rect_stays_inside_image() {
        let mut cam = camera(500.0, 400.0, 1000.0, 800.0);
        cam.zoom(2.0, 0.0, 0.0); // focal pulled toward the top-left corner
        let src = cam.source_rect().unwrap();
        assert!(src.x >= 0.0 && src.y >= 0.0);
        assert!(src.x + src.w <= 1000.0 + 1e-6);
        assert!(src.y + src.h <= 800.0 + 1e-6);
    }

    #[test]
    fn letterbox_margin_has_no_mapping() {
        let cam = camera(400.0, 400.0, 800.0, 400.0);
        // Draw rect spans y in [100, 300); y=50 is margin.
        assert!(cam.viewport_to_remote(200.0, 50.0).is_none());
        assert!(cam.viewport_to_remote(200.0, 200.0).is_some());
    }

    #[test]
    fn pan_is_noop_at_identity_scale() {
        let mut cam = camera(500.0, 400.0, 1000.0, 800.0);
        cam.pan(50.0, 50.0);
        assert_eq!(cam.focal(), (0.5, 0.5));
    }

    #[test]
    fn pan_shifts_and_clamps_focal() {
        let mut cam = camera(500.0, 400.0, 1000.0, 800.0);
        cam.zoom(2.0, 250.0, 200.0);

        let before = cam.focal();
        cam.pan(50.0, 0.0);
        assert!(cam.focal().0 < before.0, "content follows the finger");

        // A huge pan clamps at the normalized bounds.
        cam.pan(1e6, 1e6);
        assert_eq!(cam.focal(), (0.0, 0.0));
    }

    #[test]
    fn reset_restores_identity() {
        let mut cam = camera(500.0, 400.0, 1000.0, 800.0);
        cam.zoom(3.0, 100.0, 100.0);
        cam.pan(20.0, 20.0);
        cam.reset();
        assert_close(cam.scale(), MIN_SCALE);
        assert_eq!(cam.focal(), (0.5, 0.5));
        assert!(!cam.is_zoomed());
    }

    #[test]
    fn zoom_recenters_on_gesture_point() {
        let mut cam = camera(500.0, 400.0, 1000.0, 800.0);
        // Zoom in on the top-left quadrant point (125, 100), which at
        // identity maps to remote (250, 200) = normalized (0.25, 0.25).
        cam.zoom(2.0, 125.0, 100.0);
        let (fx, fy) = cam.focal();
        assert_close(fx, 0.25);
        assert_close(fy, 0.25);
    }
}
