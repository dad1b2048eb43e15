//! Nested-world navigation.
//!
//! Entering a non-text shape either walks into its linked child world or
//! asks to create one. A shape moves Unlinked → Creating → Linked and
//! never back. Text shapes always open the text editor instead.

use std::collections::HashSet;

use crate::model::{Shape, ShapeId, WorldId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    Unlinked,
    Creating,
    Linked(WorldId),
}

/// One step along the breadcrumb path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationStep {
    pub world_id: WorldId,
    /// Number of worlds above this one on the path.
    pub depth: usize,
    /// The world was already on the path (the link graph has a cycle).
    pub revisits_ancestor: bool,
}

/// What entering a shape should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnterOutcome {
    EditText { shape_id: ShapeId },
    /// Ask the user before creating a child world.
    ConfirmCreate { shape_id: ShapeId, proposed_name: String },
    Navigate(NavigationStep),
    /// A child world for this shape is already being created.
    CreationPending { shape_id: ShapeId },
}

#[derive(Debug, Clone)]
pub struct Navigator {
    path: Vec<WorldId>,
    creating: HashSet<ShapeId>,
}

impl Navigator {
    pub fn new(root: impl Into<WorldId>) -> Self {
        Self {
            path: vec![root.into()],
            creating: HashSet::new(),
        }
    }

    /// The world currently shown.
    pub fn current(&self) -> &WorldId {
        // The path always holds the root.
        &self.path[self.path.len() - 1]
    }

    pub fn path(&self) -> &[WorldId] {
        &self.path
    }

    pub fn depth(&self) -> usize {
        self.path.len() - 1
    }

    /// The world `back()` would return to.
    pub fn parent(&self) -> Option<&WorldId> {
        self.path.len().checked_sub(2).map(|i| &self.path[i])
    }

    pub fn link_state(&self, shape: &Shape) -> LinkState {
        match &shape.linked_world_id {
            Some(world_id) => LinkState::Linked(world_id.clone()),
            None if self.creating.contains(&shape.id) => LinkState::Creating,
            None => LinkState::Unlinked,
        }
    }

    /// Decide what entering `shape` does. Navigates immediately when linked.
    pub fn enter(&mut self, shape: &Shape, fallback_name: &str) -> EnterOutcome {
        if shape.is_text() {
            return EnterOutcome::EditText {
                shape_id: shape.id.clone(),
            };
        }
        match self.link_state(shape) {
            LinkState::Linked(world_id) => EnterOutcome::Navigate(self.navigate_to(world_id)),
            LinkState::Creating => EnterOutcome::CreationPending {
                shape_id: shape.id.clone(),
            },
            LinkState::Unlinked => EnterOutcome::ConfirmCreate {
                shape_id: shape.id.clone(),
                proposed_name: child_world_name(shape, fallback_name),
            },
        }
    }

    /// Mark a shape as Creating. Returns false if it cannot start.
    pub fn begin_create(&mut self, shape: &Shape) -> bool {
        if shape.is_text() || shape.is_linked() {
            return false;
        }
        self.creating.insert(shape.id.clone())
    }

    /// Like [`Navigator::begin_create`], but the mark is cleared again when
    /// the returned guard is dropped without completing.
    pub fn pending_create(&mut self, shape: &Shape) -> Option<PendingCreate<'_>> {
        if !self.begin_create(shape) {
            return None;
        }
        Some(PendingCreate {
            navigator: self,
            shape_id: shape.id.clone(),
            completed: false,
        })
    }

    /// The child world exists and the shape is linked: walk into it.
    pub fn complete_create(&mut self, shape_id: &str, world_id: WorldId) -> NavigationStep {
        self.creating.remove(shape_id);
        log::info!("Linked shape {} to child world {}", shape_id, world_id);
        self.navigate_to(world_id)
    }

    /// Creation failed; the shape goes back to Unlinked.
    pub fn abort_create(&mut self, shape_id: &str) {
        self.creating.remove(shape_id);
    }

    pub fn is_creating(&self, shape_id: &str) -> bool {
        self.creating.contains(shape_id)
    }

    pub fn navigate_to(&mut self, world_id: WorldId) -> NavigationStep {
        let revisits_ancestor = self.path.contains(&world_id);
        if revisits_ancestor {
            log::warn!("Entering world {} which is already on the navigation path", world_id);
        }
        self.path.push(world_id.clone());
        NavigationStep {
            world_id,
            depth: self.depth(),
            revisits_ancestor,
        }
    }

    /// Leave the current world. Returns the world now shown, or `None`
    /// at the root.
    pub fn back(&mut self) -> Option<&WorldId> {
        if self.path.len() <= 1 {
            return None;
        }
        self.path.pop();
        Some(self.current())
    }
}

/// A child world being created for one shape.
///
/// Dropping it before [`PendingCreate::complete`] (on error, or because
/// the creating future was cancelled) puts the shape back to Unlinked.
pub struct PendingCreate<'a> {
    navigator: &'a mut Navigator,
    shape_id: ShapeId,
    completed: bool,
}

impl PendingCreate<'_> {
    pub fn shape_id(&self) -> &str {
        &self.shape_id
    }

    pub fn complete(mut self, world_id: WorldId) -> NavigationStep {
        self.completed = true;
        self.navigator.complete_create(&self.shape_id, world_id)
    }
}

impl Drop for PendingCreate<'_> {
    fn drop(&mut self) {
        if !self.completed {
            log::debug!("Creation of a world for shape {} was abandoned", self.shape_id);
            self.navigator.abort_create(&self.shape_id);
        }
    }
}

/// Name for a shape's child world: the shape's label, or the fallback.
pub fn child_world_name(shape: &Shape, fallback: &str) -> String {
    let name = shape.name.trim();
    if name.is_empty() { fallback.to_string() } else { name.to_string() }
}
