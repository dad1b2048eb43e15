//! Exclusive selection, context menu and selection handles.

use kurbo::{Affine, Point, Size};
use serde::{Deserialize, Serialize};

use crate::model::{Shape, ShapeId};

/// Distance from the top edge to the rotation handle (in world units).
pub const ROTATE_HANDLE_OFFSET: f64 = 25.0;

/// Type of selection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleKind {
    Corner(Corner),
    /// Rotation marker above the top edge.
    Rotate,
}

/// Corner positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

/// A selection handle. Handles are drawn only; they do not take input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handle {
    /// Position in world coordinates.
    pub position: Point,
    pub kind: HandleKind,
}

/// Handles for a shape at its persisted transform.
pub fn handles(shape: &Shape) -> Vec<Handle> {
    handles_for(shape.transform(), shape.size())
}

/// Handles for an arbitrary shape-local transform, e.g. the live
/// transform of a shape being manipulated.
pub fn handles_for(transform: Affine, size: Size) -> Vec<Handle> {
    let half_w = size.width / 2.0;
    let half_h = size.height / 2.0;
    let at = |x: f64, y: f64| transform * Point::new(x, y);
    vec![
        Handle { position: at(-half_w, -half_h), kind: HandleKind::Corner(Corner::TopLeft) },
        Handle { position: at(half_w, -half_h), kind: HandleKind::Corner(Corner::TopRight) },
        Handle { position: at(half_w, half_h), kind: HandleKind::Corner(Corner::BottomRight) },
        Handle { position: at(-half_w, half_h), kind: HandleKind::Corner(Corner::BottomLeft) },
        Handle { position: at(0.0, -half_h - ROTATE_HANDLE_OFFSET), kind: HandleKind::Rotate },
    ]
}

/// Topmost shape under a world-space point. Later shapes draw on top.
pub fn hit_test<'a>(shapes: &'a [Shape], point: Point) -> Option<&'a Shape> {
    shapes.iter().rev().find(|shape| shape.contains(point))
}

/// Entries of the floating context menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextAction {
    Enter,
    EditText,
    Delete,
    Dismiss,
}

impl ContextAction {
    /// Menu entries for a shape, in display order.
    pub fn menu_for(shape: &Shape) -> [ContextAction; 3] {
        let primary = if shape.is_text() { Self::EditText } else { Self::Enter };
        [primary, Self::Delete, Self::Dismiss]
    }
}

/// At most one active shape at a time.
#[derive(Debug, Clone, Default)]
pub struct SelectionController {
    active: Option<ShapeId>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `shape_id` the active shape. Returns the one it replaced.
    pub fn select(&mut self, shape_id: impl Into<ShapeId>) -> Option<ShapeId> {
        let shape_id = shape_id.into();
        if self.active.as_ref() == Some(&shape_id) {
            return None;
        }
        self.active.replace(shape_id)
    }

    pub fn clear(&mut self) -> Option<ShapeId> {
        self.active.take()
    }

    pub fn active(&self) -> Option<&ShapeId> {
        self.active.as_ref()
    }

    pub fn is_active(&self, shape_id: &str) -> bool {
        self.active.as_deref() == Some(shape_id)
    }

    /// Drop the selection if its shape is no longer present.
    pub fn retain(&mut self, shapes: &[Shape]) {
        let Some(active) = &self.active else {
            return;
        };
        if !shapes.iter().any(|s| &s.id == active) {
            log::debug!("Selected shape {} disappeared; clearing selection", active);
            self.active = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ShapeKind;
    use crate::model::tests::sample_shape;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_select_is_exclusive() {
        let mut selection = SelectionController::new();
        assert_eq!(selection.select("a"), None);
        assert_eq!(selection.select("b"), Some("a".to_string()));
        assert!(selection.is_active("b"));
        assert!(!selection.is_active("a"));
        assert_eq!(selection.select("b"), None);
        assert_eq!(selection.clear(), Some("b".to_string()));
        assert!(selection.active().is_none());
    }

    #[test]
    fn test_retain_clears_vanished_shape() {
        let mut selection = SelectionController::new();
        selection.select("gone");
        selection.retain(&[sample_shape("a", ShapeKind::Sticker)]);
        assert!(selection.active().is_none());

        selection.select("a");
        selection.retain(&[sample_shape("a", ShapeKind::Sticker)]);
        assert!(selection.is_active("a"));
    }

    #[test]
    fn test_handles_follow_rotation() {
        let mut shape = sample_shape("a", ShapeKind::Sticker);
        shape.x = 10.0;
        shape.rotation = 90.0;

        let handles = handles(&shape);
        assert_eq!(handles.len(), 5);

        // 100x50 rotated 90 degrees: the top-left corner swings to the right.
        let top_left = handles[0].position;
        assert!((top_left.x - 35.0).abs() < EPS);
        assert!((top_left.y + 50.0).abs() < EPS);

        let rotate = handles[4];
        assert_eq!(rotate.kind, HandleKind::Rotate);
        assert!((rotate.position.x - 60.0).abs() < EPS);
        assert!(rotate.position.y.abs() < EPS);
    }

    #[test]
    fn test_hit_test_prefers_topmost() {
        let bottom = sample_shape("bottom", ShapeKind::Sticker);
        let top = sample_shape("top", ShapeKind::Sticker);
        let shapes = vec![bottom, top];

        assert_eq!(hit_test(&shapes, Point::new(10.0, 10.0)).map(|s| s.id.as_str()), Some("top"));
        assert!(hit_test(&shapes, Point::new(500.0, 0.0)).is_none());
    }

    #[test]
    fn test_menu_for_text_offers_edit() {
        let text = sample_shape("t", ShapeKind::Text);
        let sticker = sample_shape("s", ShapeKind::Sticker);
        assert_eq!(ContextAction::menu_for(&text)[0], ContextAction::EditText);
        assert_eq!(ContextAction::menu_for(&sticker)[0], ContextAction::Enter);
        assert!(ContextAction::menu_for(&sticker).contains(&ContextAction::Dismiss));
    }
}
