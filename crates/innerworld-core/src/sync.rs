//! Scene synchronizer.
//!
//! Holds the rendered shape list of one world and keeps it aligned with
//! the live store subscription. Every delivery is a full snapshot that
//! replaces the list outright; optimistic local edits only bridge the gap
//! until the next snapshot arrives.

use std::collections::HashMap;
use uuid::Uuid;

use crate::model::{Shape, ShapeDraft, ShapeId, ShapePatch, Timestamp, WorldId};
use crate::store::{SceneStoreClient, ShapeSubscription, StoreError, StoreResult};

/// Prefix of ids assigned to shapes not yet confirmed by the store.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Subscription health.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncStatus {
    /// Waiting for the first snapshot.
    Connecting,
    Live,
    /// The stream ended with an error; no further updates will arrive.
    Stopped(StoreError),
}

/// What changed between the previous list and an applied snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotDiff {
    pub added: Vec<ShapeId>,
    pub removed: Vec<ShapeId>,
    pub changed: Vec<ShapeId>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Result of one [`SceneSynchronizer::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum SyncUpdate {
    /// Nothing was pending.
    Idle,
    Snapshot(SnapshotDiff),
    /// The stream just stopped.
    Stopped(StoreError),
}

pub struct SceneSynchronizer {
    world_id: WorldId,
    owner_system_id: String,
    shapes: Vec<Shape>,
    subscription: ShapeSubscription,
    status: SyncStatus,
}

impl SceneSynchronizer {
    /// Subscribe to a world's shapes.
    pub fn open(
        client: &SceneStoreClient,
        world_id: &str,
        owner_system_id: &str,
    ) -> StoreResult<Self> {
        let subscription = client.subscribe_shapes(world_id, owner_system_id)?;
        Ok(Self {
            world_id: world_id.to_string(),
            owner_system_id: owner_system_id.to_string(),
            shapes: Vec::new(),
            subscription,
            status: SyncStatus::Connecting,
        })
    }

    /// Apply the newest pending delivery, if any.
    ///
    /// A stream error is logged and stops the synchronizer for good.
    /// Leaving and re-entering the world is the recovery path.
    pub fn poll(&mut self) -> SyncUpdate {
        if matches!(self.status, SyncStatus::Stopped(_)) {
            return SyncUpdate::Idle;
        }
        match self.subscription.latest() {
            None => SyncUpdate::Idle,
            Some(Ok(snapshot)) => {
                self.status = SyncStatus::Live;
                SyncUpdate::Snapshot(self.apply_snapshot(snapshot))
            }
            Some(Err(e)) => {
                log::warn!("Shape stream for world {} stopped: {}", self.world_id, e);
                self.status = SyncStatus::Stopped(e.clone());
                SyncUpdate::Stopped(e)
            }
        }
    }

    /// Replace the local list with an authoritative snapshot.
    pub fn apply_snapshot(&mut self, snapshot: Vec<Shape>) -> SnapshotDiff {
        let previous: HashMap<&str, &Shape> =
            self.shapes.iter().map(|s| (s.id.as_str(), s)).collect();
        let mut diff = SnapshotDiff::default();

        for shape in &snapshot {
            match previous.get(shape.id.as_str()) {
                None => diff.added.push(shape.id.clone()),
                Some(old) if *old != shape => diff.changed.push(shape.id.clone()),
                Some(_) => {}
            }
        }
        diff.removed = self
            .shapes
            .iter()
            .filter(|old| !snapshot.iter().any(|s| s.id == old.id))
            .map(|old| old.id.clone())
            .collect();

        self.shapes = snapshot;
        log::debug!(
            "World {} snapshot: {} shapes (+{} -{} ~{})",
            self.world_id,
            self.shapes.len(),
            diff.added.len(),
            diff.removed.len(),
            diff.changed.len()
        );
        diff
    }

    /// Show a shape before the store confirms it. Returns its local id.
    pub fn insert_optimistic(&mut self, draft: &ShapeDraft) -> ShapeId {
        let id = format!("{}{}", LOCAL_ID_PREFIX, Uuid::new_v4());
        let shape = Shape::from_draft(id.clone(), draft, &self.owner_system_id, Timestamp::now());
        self.shapes.push(shape);
        id
    }

    /// Apply a patch locally. Returns false for unknown shapes.
    pub fn update_optimistic(&mut self, shape_id: &str, patch: &ShapePatch) -> bool {
        match self.shapes.iter_mut().find(|s| s.id == shape_id) {
            Some(shape) => {
                patch.apply_to(shape);
                true
            }
            None => false,
        }
    }

    pub fn remove_optimistic(&mut self, shape_id: &str) -> Option<Shape> {
        let index = self.shapes.iter().position(|s| s.id == shape_id)?;
        Some(self.shapes.remove(index))
    }

    pub fn is_local_id(shape_id: &str) -> bool {
        shape_id.starts_with(LOCAL_ID_PREFIX)
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn get(&self, shape_id: &str) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.id == shape_id)
    }

    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    pub fn world_id(&self) -> &WorldId {
        &self.world_id
    }
}
