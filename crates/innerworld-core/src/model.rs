//! Persisted entities: worlds and the shapes placed inside them.
//!
//! These are plain data. The store client is the only owner of their
//! authoritative state; every in-memory copy is a cache.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::presets::parse_hex_color;

/// Identifier assigned to a world by the document store.
pub type WorldId = String;

/// Identifier assigned to a shape by the document store (or a local
/// placeholder id while an optimistic insert is in flight).
pub type ShapeId = String;

static LAST_TIMESTAMP: AtomicU64 = AtomicU64::new(0);

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Current time, strictly greater than any timestamp previously
    /// returned in this process.
    pub fn now() -> Self {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let mut last = LAST_TIMESTAMP.load(Ordering::Relaxed);
        loop {
            let next = wall.max(last + 1);
            match LAST_TIMESTAMP.compare_exchange_weak(
                last,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Self(next),
                Err(actual) => last = actual,
            }
        }
    }

    pub fn as_millis(self) -> u64 {
        self.0
    }
}

/// The account/persona pair a scene belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerIdentity {
    pub system_id: String,
    pub persona_id: String,
}

impl OwnerIdentity {
    pub fn new(system_id: impl Into<String>, persona_id: impl Into<String>) -> Self {
        Self {
            system_id: system_id.into(),
            persona_id: persona_id.into(),
        }
    }
}

/// A named, boundless 2D scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    pub id: WorldId,
    pub owner_system_id: String,
    pub owner_persona_id: String,
    pub name: String,
    pub background_color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: Timestamp,
    /// Bumped by every mutation of a shape in this world.
    pub updated_at: Timestamp,
}

impl World {
    /// Background as a render color, if the stored value is a valid hex color.
    pub fn background(&self) -> Option<Color> {
        parse_hex_color(&self.background_color)
    }

    pub fn is_owned_by(&self, owner: &OwnerIdentity) -> bool {
        self.owner_system_id == owner.system_id
    }
}

/// Fields supplied when creating a world. Timestamps are filled in by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldDraft {
    pub owner_system_id: String,
    pub owner_persona_id: String,
    pub name: String,
    pub background_color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl WorldDraft {
    pub fn new(
        owner: &OwnerIdentity,
        name: impl Into<String>,
        background_color: impl Into<String>,
    ) -> Self {
        Self {
            owner_system_id: owner.system_id.clone(),
            owner_persona_id: owner.persona_id.clone(),
            name: name.into(),
            background_color: background_color.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// What a shape displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Sticker,
    Text,
    Custom,
}

/// A positioned object inside exactly one world.
///
/// `x`/`y` is the shape's center in world space (origin at the world
/// center). `rotation` is in degrees and is never normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: ShapeId,
    pub world_id: WorldId,
    pub owner_system_id: String,
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub rotation: f64,
    /// Display label, or the text content for text shapes.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_world_id: Option<WorldId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intention: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_radius: Option<f64>,
    pub created_at: Timestamp,
}

impl Shape {
    /// Materialize a draft locally, e.g. for an optimistic insert.
    pub fn from_draft(
        id: ShapeId,
        draft: &ShapeDraft,
        owner_system_id: &str,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            world_id: draft.world_id.clone(),
            owner_system_id: owner_system_id.to_string(),
            kind: draft.kind,
            x: draft.x,
            y: draft.y,
            width: draft.width,
            height: draft.height,
            rotation: draft.rotation,
            name: draft.name.clone(),
            icon: draft.icon.clone(),
            font_size: draft.font_size,
            color: draft.color.clone(),
            linked_world_id: None,
            emotion: draft.emotion.clone(),
            intention: draft.intention.clone(),
            image_url: draft.image_url.clone(),
            border_radius: draft.border_radius,
            created_at,
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn is_text(&self) -> bool {
        self.kind == ShapeKind::Text
    }

    pub fn is_linked(&self) -> bool {
        self.linked_world_id.is_some()
    }

    /// Unrotated bounds centered on the shape position.
    pub fn bounds(&self) -> Rect {
        Rect::from_center_size(self.position(), self.size())
    }

    /// Local-to-world transform: translate to the center, then rotate.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.position().to_vec2()) * Affine::rotate(self.rotation.to_radians())
    }

    /// Corners in world space, clockwise from top-left, rotation applied.
    pub fn corners(&self) -> [Point; 4] {
        let half = Vec2::new(self.width / 2.0, self.height / 2.0);
        let t = self.transform();
        [
            t * Point::new(-half.x, -half.y),
            t * Point::new(half.x, -half.y),
            t * Point::new(half.x, half.y),
            t * Point::new(-half.x, half.y),
        ]
    }

    /// Hit test against the rotated body of the shape.
    pub fn contains(&self, point: Point) -> bool {
        let local = self.transform().inverse() * point;
        local.x.abs() <= self.width / 2.0 && local.y.abs() <= self.height / 2.0
    }
}

/// Fields supplied when placing a new shape. Identity, owner and
/// creation time are assigned when it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeDraft {
    pub world_id: WorldId,
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub rotation: f64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intention: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_radius: Option<f64>,
}

impl ShapeDraft {
    /// Width and height must be strictly positive and finite.
    pub fn has_valid_size(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// A partial update to a shape. Only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_world_id: Option<WorldId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intention: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_radius: Option<f64>,
}

impl ShapePatch {
    pub fn position(position: Point) -> Self {
        Self {
            x: Some(position.x),
            y: Some(position.y),
            ..Self::default()
        }
    }

    pub fn rotation(degrees: f64) -> Self {
        Self {
            rotation: Some(degrees),
            ..Self::default()
        }
    }

    pub fn size(size: Size, font_size: Option<f64>) -> Self {
        Self {
            width: Some(size.width),
            height: Some(size.height),
            font_size,
            ..Self::default()
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn link(world_id: impl Into<WorldId>) -> Self {
        Self {
            linked_world_id: Some(world_id.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge the patch into a local copy of the shape.
    ///
    /// An existing `linked_world_id` is never replaced.
    pub fn apply_to(&self, shape: &mut Shape) {
        if let Some(x) = self.x {
            shape.x = x;
        }
        if let Some(y) = self.y {
            shape.y = y;
        }
        if let Some(width) = self.width {
            shape.width = width;
        }
        if let Some(height) = self.height {
            shape.height = height;
        }
        if let Some(rotation) = self.rotation {
            shape.rotation = rotation;
        }
        if let Some(name) = &self.name {
            shape.name = name.clone();
        }
        if self.font_size.is_some() {
            shape.font_size = self.font_size;
        }
        if self.color.is_some() {
            shape.color = self.color.clone();
        }
        if self.icon.is_some() {
            shape.icon = self.icon.clone();
        }
        if let Some(link) = &self.linked_world_id {
            match &shape.linked_world_id {
                Some(existing) if existing != link => {
                    log::warn!(
                        "Ignoring relink of shape {} from {} to {}",
                        shape.id,
                        existing,
                        link
                    );
                }
                _ => shape.linked_world_id = Some(link.clone()),
            }
        }
        if self.emotion.is_some() {
            shape.emotion = self.emotion.clone();
        }
        if self.intention.is_some() {
            shape.intention = self.intention.clone();
        }
        if self.image_url.is_some() {
            shape.image_url = self.image_url.clone();
        }
        if self.border_radius.is_some() {
            shape.border_radius = self.border_radius;
        }
    }
}

/// The user-editable description of a shape, as saved by the edit form.
///
/// `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeDetails {
    pub name: Option<String>,
    pub emotion: Option<String>,
    pub intention: Option<String>,
    pub image_url: Option<String>,
}

impl From<ShapeDetails> for ShapePatch {
    fn from(details: ShapeDetails) -> Self {
        Self {
            name: details.name,
            emotion: details.emotion,
            intention: details.intention,
            image_url: details.image_url,
            ..Self::default()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_shape(id: &str, kind: ShapeKind) -> Shape {
        Shape {
            id: id.to_string(),
            world_id: "w1".to_string(),
            owner_system_id: "sys".to_string(),
            kind,
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 50.0,
            rotation: 0.0,
            name: "Tree".to_string(),
            icon: Some("leaf".to_string()),
            font_size: None,
            color: None,
            linked_world_id: None,
            emotion: None,
            intention: None,
            image_url: None,
            border_radius: None,
            created_at: Timestamp(1),
        }
    }

    #[test]
    fn test_timestamp_strictly_increases() {
        let a = Timestamp::now();
        let b = Timestamp::now();
        assert!(b > a);
    }

    #[test]
    fn test_shape_serializes_kind_as_type() {
        let shape = sample_shape("s1", ShapeKind::Sticker);
        let json = serde_json::to_value(&shape).unwrap();
        assert_eq!(json["type"], "sticker");
        assert!(json.get("linked_world_id").is_none());
    }

    #[test]
    fn test_contains_respects_rotation() {
        let mut shape = sample_shape("s1", ShapeKind::Sticker);
        assert!(shape.contains(Point::new(45.0, 0.0)));
        assert!(!shape.contains(Point::new(0.0, 45.0)));

        shape.rotation = 90.0;
        assert!(!shape.contains(Point::new(45.0, 0.0)));
        assert!(shape.contains(Point::new(0.0, 45.0)));
    }

    #[test]
    fn test_patch_apply_merges_fields() {
        let mut shape = sample_shape("s1", ShapeKind::Text);
        shape.font_size = Some(24.0);

        ShapePatch::position(Point::new(10.0, -5.0)).apply_to(&mut shape);
        ShapePatch::size(Size::new(150.0, 75.0), Some(36.0)).apply_to(&mut shape);

        assert_eq!(shape.position(), Point::new(10.0, -5.0));
        assert_eq!(shape.size(), Size::new(150.0, 75.0));
        assert_eq!(shape.font_size, Some(36.0));
        assert_eq!(shape.name, "Tree");
    }

    #[test]
    fn test_details_patch_touches_only_described_fields() {
        let mut shape = sample_shape("s1", ShapeKind::Custom);
        shape.emotion = Some("calm".to_string());

        let patch = ShapePatch::from(ShapeDetails {
            intention: Some("rest".to_string()),
            image_url: Some("file:///garden.png".to_string()),
            ..ShapeDetails::default()
        });
        patch.apply_to(&mut shape);

        assert_eq!(shape.name, "Tree");
        assert_eq!(shape.emotion.as_deref(), Some("calm"));
        assert_eq!(shape.intention.as_deref(), Some("rest"));
        assert_eq!(shape.image_url.as_deref(), Some("file:///garden.png"));
        assert!(patch.x.is_none() && patch.linked_world_id.is_none());
    }

    #[test]
    fn test_patch_sets_border_radius() {
        let mut shape = sample_shape("s1", ShapeKind::Custom);
        let patch = ShapePatch {
            border_radius: Some(12.0),
            ..ShapePatch::default()
        };
        patch.apply_to(&mut shape);
        assert_eq!(shape.border_radius, Some(12.0));
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "border_radius": 12.0 }));
    }

    #[test]
    fn test_patch_never_relinks() {
        let mut shape = sample_shape("s1", ShapeKind::Sticker);
        ShapePatch::link("child-a").apply_to(&mut shape);
        ShapePatch::link("child-b").apply_to(&mut shape);
        assert_eq!(shape.linked_world_id.as_deref(), Some("child-a"));
    }

    #[test]
    fn test_patch_serializes_only_set_fields() {
        let patch = ShapePatch::rotation(370.0);
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "rotation": 370.0 }));
        assert!(ShapePatch::default().is_empty());
    }
}
