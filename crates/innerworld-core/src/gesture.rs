//! Per-shape gesture composition.
//!
//! Drag, rotate and pinch can run at the same time on one shape. Each
//! writes only its own transform component, so the three never fight
//! over shared state:
//!
//! - drag:   `offset   = persisted_position + translation / camera_scale`
//! - rotate: `rotation = persisted_rotation + degrees`
//! - pinch:  `scale    = ratio` (relative to the persisted size)
//!
//! Updates only touch these transient values. Finishing a gesture folds
//! its component into the persisted values and produces exactly one
//! [`ShapeCommit`], handed to the control context through a
//! [`CommandSender`].

use kurbo::{Affine, Point, Size, Vec2};
use std::collections::HashMap;

use crate::commands::{CommandSender, ShapeCommit};
use crate::model::{Shape, ShapeId, ShapePatch, WorldId};

/// The three recognizers a shape hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureKind {
    Drag,
    Rotate,
    Pinch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    Idle,
    Active,
}

/// Events reported by a platform gesture recognizer.
///
/// Update values are totals since the gesture began, not per-frame deltas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    Begin(GestureKind),
    /// Screen-space translation and the camera scale it was made at.
    Drag { translation: Vec2, camera_scale: f64 },
    Rotate { degrees: f64 },
    Pinch { scale: f64 },
    End(GestureKind),
    /// The platform interrupted the gesture; nothing is committed.
    Cancel(GestureKind),
}

/// Last known persisted geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Persisted {
    position: Point,
    rotation: f64,
    size: Size,
    font_size: Option<f64>,
}

impl From<&Shape> for Persisted {
    fn from(shape: &Shape) -> Self {
        Self {
            position: shape.position(),
            rotation: shape.rotation,
            size: shape.size(),
            font_size: shape.font_size,
        }
    }
}

/// Transient transform state for one shape.
#[derive(Debug, Clone)]
pub struct ShapeTransformComposer {
    shape_id: ShapeId,
    world_id: WorldId,
    persisted: Persisted,
    /// World-space displacement of the active drag.
    drag: Option<Vec2>,
    /// Degrees of the active rotation.
    rotate: Option<f64>,
    /// Ratio of the active pinch.
    pinch: Option<f64>,
    offset: Point,
    rotation: f64,
    scale_factor: f64,
}

impl ShapeTransformComposer {
    pub fn new(shape: &Shape) -> Self {
        let mut composer = Self {
            shape_id: shape.id.clone(),
            world_id: shape.world_id.clone(),
            persisted: Persisted::from(shape),
            drag: None,
            rotate: None,
            pinch: None,
            offset: Point::ZERO,
            rotation: 0.0,
            scale_factor: 1.0,
        };
        composer.recompute();
        composer
    }

    pub fn shape_id(&self) -> &ShapeId {
        &self.shape_id
    }

    /// Reseed from a reconciled snapshot.
    ///
    /// Idle components snap to the new persisted values; active ones keep
    /// their gesture delta on top of them.
    pub fn sync_persisted(&mut self, shape: &Shape) {
        self.world_id = shape.world_id.clone();
        self.persisted = Persisted::from(shape);
        self.recompute();
    }

    pub fn phase(&self, kind: GestureKind) -> GesturePhase {
        let active = match kind {
            GestureKind::Drag => self.drag.is_some(),
            GestureKind::Rotate => self.rotate.is_some(),
            GestureKind::Pinch => self.pinch.is_some(),
        };
        if active { GesturePhase::Active } else { GesturePhase::Idle }
    }

    /// Whether any gesture is in progress (drives the pressed emphasis).
    pub fn is_active(&self) -> bool {
        self.drag.is_some() || self.rotate.is_some() || self.pinch.is_some()
    }

    pub fn begin(&mut self, kind: GestureKind) {
        match kind {
            GestureKind::Drag => self.drag = Some(Vec2::ZERO),
            GestureKind::Rotate => self.rotate = Some(0.0),
            GestureKind::Pinch => self.pinch = Some(1.0),
        }
        self.recompute();
    }

    /// Ignored unless a drag is active.
    pub fn update_drag(&mut self, translation: Vec2, camera_scale: f64) {
        if self.drag.is_none() || !camera_scale.is_finite() || camera_scale <= 0.0 {
            return;
        }
        self.drag = Some(translation / camera_scale);
        self.recompute();
    }

    /// Ignored unless a rotation is active.
    pub fn update_rotate(&mut self, degrees: f64) {
        if self.rotate.is_none() || !degrees.is_finite() {
            return;
        }
        self.rotate = Some(degrees);
        self.recompute();
    }

    /// Ignored unless a pinch is active. Ratios must be positive.
    pub fn update_pinch(&mut self, scale: f64) {
        if self.pinch.is_none() || !scale.is_finite() || scale <= 0.0 {
            return;
        }
        self.pinch = Some(scale);
        self.recompute();
    }

    /// Fold the gesture into the persisted values and build its commit.
    ///
    /// Returns `None` if that gesture was not active.
    pub fn finalize(&mut self, kind: GestureKind) -> Option<ShapeCommit> {
        let patch = match kind {
            GestureKind::Drag => {
                let delta = self.drag.take()?;
                self.persisted.position += delta;
                ShapePatch::position(self.persisted.position)
            }
            GestureKind::Rotate => {
                let degrees = self.rotate.take()?;
                self.persisted.rotation += degrees;
                ShapePatch::rotation(self.persisted.rotation)
            }
            GestureKind::Pinch => {
                let ratio = self.pinch.take()?;
                self.persisted.size = self.persisted.size * ratio;
                self.persisted.font_size = self.persisted.font_size.map(|f| f * ratio);
                ShapePatch::size(self.persisted.size, self.persisted.font_size)
            }
        };
        self.recompute();
        Some(ShapeCommit {
            shape_id: self.shape_id.clone(),
            world_id: self.world_id.clone(),
            gesture: kind,
            patch,
        })
    }

    /// Discard an in-progress gesture without committing.
    pub fn cancel(&mut self, kind: GestureKind) {
        match kind {
            GestureKind::Drag => self.drag = None,
            GestureKind::Rotate => self.rotate = None,
            GestureKind::Pinch => self.pinch = None,
        }
        self.recompute();
    }

    /// Dispatch a recognizer event. Returns the commit for `End` events.
    pub fn handle(&mut self, event: GestureEvent) -> Option<ShapeCommit> {
        match event {
            GestureEvent::Begin(kind) => self.begin(kind),
            GestureEvent::Drag {
                translation,
                camera_scale,
            } => self.update_drag(translation, camera_scale),
            GestureEvent::Rotate { degrees } => self.update_rotate(degrees),
            GestureEvent::Pinch { scale } => self.update_pinch(scale),
            GestureEvent::End(kind) => return self.finalize(kind),
            GestureEvent::Cancel(kind) => self.cancel(kind),
        }
        None
    }

    fn recompute(&mut self) {
        self.offset = self.persisted.position + self.drag.unwrap_or(Vec2::ZERO);
        self.rotation = self.persisted.rotation + self.rotate.unwrap_or(0.0);
        self.scale_factor = self.pinch.unwrap_or(1.0);
    }

    /// Live position (world space).
    pub fn offset(&self) -> Point {
        self.offset
    }

    /// Live rotation in degrees.
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// Live scale relative to the persisted size.
    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn live_size(&self) -> Size {
        self.persisted.size * self.scale_factor
    }

    /// Composed transform: translate, then rotate, then scale.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset.to_vec2())
            * Affine::rotate(self.rotation.to_radians())
            * Affine::scale(self.scale_factor)
    }

    /// Transform with the pressed emphasis applied while manipulated.
    pub fn render_transform(&self, pressed_emphasis: f64) -> Affine {
        if self.is_active() {
            self.transform() * Affine::scale(pressed_emphasis)
        } else {
            self.transform()
        }
    }
}

/// Render-context owner of every shape's composer.
///
/// Finished gestures are sent to the control context; nothing here
/// blocks or touches the store.
#[derive(Debug)]
pub struct GestureLayer {
    composers: HashMap<ShapeId, ShapeTransformComposer>,
    sender: CommandSender,
}

impl GestureLayer {
    pub fn new(sender: CommandSender) -> Self {
        Self {
            composers: HashMap::new(),
            sender,
        }
    }

    /// Align composers with the latest rendered shape list.
    pub fn sync_shapes(&mut self, shapes: &[Shape]) {
        self.composers
            .retain(|id, _| shapes.iter().any(|shape| &shape.id == id));
        for shape in shapes {
            self.composers
                .entry(shape.id.clone())
                .and_modify(|composer| composer.sync_persisted(shape))
                .or_insert_with(|| ShapeTransformComposer::new(shape));
        }
    }

    /// Route an event to a shape. Returns false for unknown shapes.
    pub fn handle(&mut self, shape_id: &str, event: GestureEvent) -> bool {
        let Some(composer) = self.composers.get_mut(shape_id) else {
            return false;
        };
        if let Some(commit) = composer.handle(event) {
            self.sender.send(commit);
        }
        true
    }

    pub fn composer(&self, shape_id: &str) -> Option<&ShapeTransformComposer> {
        self.composers.get(shape_id)
    }

    pub fn len(&self) -> usize {
        self.composers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.composers.is_empty()
    }
}
