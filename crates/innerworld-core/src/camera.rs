//! Camera module for the viewport pan/zoom transform.
//!
//! The camera is local to one screen. It is never persisted, never
//! shared, and never touches the store.

use kurbo::{Affine, Point, Size, Vec2};

use crate::config::CameraConfig;

/// Camera manages the view transform for the canvas.
///
/// `offset` is `(cameraX, cameraY)` in world units: a world point `p`
/// lands on screen at `viewport_center + scale * (p + offset)`.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Current pan offset in world units.
    pub offset: Vec2,
    /// Current zoom level (1.0 = 100%).
    pub scale: f64,
    viewport: Size,
    limits: CameraConfig,
}

impl Camera {
    /// Create an unbounded camera for a viewport of the given size.
    pub fn new(viewport: Size) -> Self {
        Self::with_limits(viewport, CameraConfig::default())
    }

    pub fn with_limits(viewport: Size, limits: CameraConfig) -> Self {
        let mut camera = Self {
            offset: Vec2::ZERO,
            scale: 1.0,
            viewport,
            limits,
        };
        camera.clamp();
        camera
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
    }

    fn screen_center(&self) -> Vec2 {
        Vec2::new(self.viewport.width / 2.0, self.viewport.height / 2.0)
    }

    /// World-to-screen transform for rendering.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.screen_center())
            * Affine::scale(self.scale)
            * Affine::translate(self.offset)
    }

    /// Screen-to-world transform for input handling.
    pub fn inverse_transform(&self) -> Affine {
        Affine::translate(-self.offset)
            * Affine::scale(1.0 / self.scale)
            * Affine::translate(-self.screen_center())
    }

    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    pub fn world_to_screen(&self, world_point: Point) -> Point {
        self.transform() * world_point
    }

    /// World point currently shown at the center of the viewport.
    /// New shapes are placed here.
    pub fn viewport_center(&self) -> Point {
        (-self.offset).to_point()
    }

    /// Apply one frame of a pan gesture.
    ///
    /// The delta is in screen pixels; dividing by `scale` keeps the
    /// content moving 1:1 with the finger at any zoom level.
    pub fn pan(&mut self, screen_delta: Vec2) {
        self.offset += screen_delta / self.scale;
        self.clamp();
    }

    /// Apply one frame of a pinch gesture with its incremental factor.
    pub fn pinch(&mut self, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        self.scale *= factor;
        self.clamp();
    }

    /// Zoom, keeping the given screen point fixed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let world_point = self.screen_to_world(screen_point);
        self.scale *= factor;
        self.clamp();

        let from_center = screen_point.to_vec2() - self.screen_center();
        self.offset = from_center / self.scale - world_point.to_vec2();
        self.clamp();
    }

    /// Reset camera to the world origin at 100%.
    pub fn reset(&mut self) {
        self.offset = Vec2::ZERO;
        self.scale = 1.0;
        self.clamp();
    }

    fn clamp(&mut self) {
        if let Some(min) = self.limits.min_scale {
            self.scale = self.scale.max(min);
        }
        if let Some(max) = self.limits.max_scale {
            self.scale = self.scale.min(max);
        }
        if let Some(bounds) = self.limits.pan_bounds {
            let center = self.viewport_center();
            let clamped = Point::new(
                center.x.clamp(bounds.x0, bounds.x1),
                center.y.clamp(bounds.y0, bounds.y1),
            );
            self.offset = -clamped.to_vec2();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Rect;

    const EPS: f64 = 1e-9;

    fn camera() -> Camera {
        Camera::new(Size::new(400.0, 800.0))
    }

    #[test]
    fn test_default_camera_centers_origin() {
        let camera = camera();
        let screen = camera.world_to_screen(Point::ZERO);
        assert!((screen.x - 200.0).abs() < EPS);
        assert!((screen.y - 400.0).abs() < EPS);
        assert_eq!(camera.viewport_center(), Point::ZERO);
    }

    #[test]
    fn test_pan_is_scale_compensated() {
        let mut camera = camera();
        camera.scale = 2.0;
        let before = camera.world_to_screen(Point::new(10.0, 10.0));

        camera.pan(Vec2::new(40.0, -20.0));

        assert!((camera.offset.x - 20.0).abs() < EPS);
        assert!((camera.offset.y + 10.0).abs() < EPS);
        let after = camera.world_to_screen(Point::new(10.0, 10.0));
        assert!((after.x - before.x - 40.0).abs() < EPS);
        assert!((after.y - before.y + 20.0).abs() < EPS);
    }

    #[test]
    fn test_pinch_multiplies_scale() {
        let mut camera = camera();
        camera.pinch(1.5);
        camera.pinch(2.0);
        assert!((camera.scale - 3.0).abs() < EPS);

        camera.pinch(0.0);
        camera.pinch(f64::NAN);
        assert!((camera.scale - 3.0).abs() < EPS);
    }

    #[test]
    fn test_roundtrip_conversion() {
        let mut camera = camera();
        camera.offset = Vec2::new(30.0, -20.0);
        camera.scale = 1.5;

        let original = Point::new(123.0, 456.0);
        let back = camera.world_to_screen(camera.screen_to_world(original));
        assert!((back.x - original.x).abs() < 1e-10);
        assert!((back.y - original.y).abs() < 1e-10);
    }

    #[test]
    fn test_zoom_at_keeps_focal_point() {
        let mut camera = camera();
        camera.offset = Vec2::new(15.0, 5.0);
        let focal = Point::new(100.0, 300.0);
        let world_before = camera.screen_to_world(focal);

        camera.zoom_at(focal, 2.5);

        let world_after = camera.screen_to_world(focal);
        assert!((world_after.x - world_before.x).abs() < 1e-9);
        assert!((world_after.y - world_before.y).abs() < 1e-9);
    }

    #[test]
    fn test_unbounded_by_default() {
        let mut camera = camera();
        for _ in 0..1000 {
            camera.pan(Vec2::new(1.0e6, 0.0));
        }
        camera.pinch(1.0e-6);
        assert!((camera.offset.x - 1.0e9).abs() < EPS);
        assert!((camera.scale - 1.0e-6).abs() < EPS);
    }

    #[test]
    fn test_configured_limits_clamp() {
        let limits = CameraConfig {
            min_scale: Some(0.5),
            max_scale: Some(3.0),
            pan_bounds: Some(Rect::new(-100.0, -100.0, 100.0, 100.0)),
        };
        let mut camera = Camera::with_limits(Size::new(400.0, 400.0), limits);

        camera.pinch(10.0);
        assert!((camera.scale - 3.0).abs() < EPS);
        camera.pinch(0.01);
        assert!((camera.scale - 0.5).abs() < EPS);

        camera.pan(Vec2::new(-10_000.0, 0.0));
        assert!((camera.viewport_center().x - 100.0).abs() < EPS);
    }

    #[test]
    fn test_reset() {
        let mut camera = camera();
        camera.pan(Vec2::new(5.0, 5.0));
        camera.pinch(2.0);
        camera.reset();
        assert_eq!(camera.offset, Vec2::ZERO);
        assert!((camera.scale - 1.0).abs() < EPS);
    }
}
