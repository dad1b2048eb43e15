//! Control-context editor for one world at a time.
//!
//! `SceneEditor` is the only code that talks to the store. The render
//! context hands it finished gestures through a [`CommandSender`]; the
//! embedding screen calls [`SceneEditor::pump`] whenever it is idle and
//! drives the discrete actions (add, select, delete, enter, back).
//!
//! Failures never abort the session. They are logged and queued as
//! [`Notification`]s for the UI to show.

use kurbo::Point;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::commands::{CommandReceiver, CommandSender, ShapeCommit, command_channel};
use crate::config::EditorConfig;
use crate::graph::SceneGraph;
use crate::model::{
    OwnerIdentity, Shape, ShapeDetails, ShapeId, ShapePatch, World, WorldDraft, WorldId,
};
use crate::navigator::{EnterOutcome, NavigationStep, Navigator, child_world_name};
use crate::presets::ShapeTemplate;
use crate::selection::{ContextAction, SelectionController, hit_test};
use crate::store::{SceneStoreClient, StoreError};
use crate::sync::{SceneSynchronizer, SnapshotDiff, SyncStatus, SyncUpdate};

#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Unknown shape: {0}")]
    UnknownShape(ShapeId),
    #[error("No shape is selected")]
    NoSelection,
    #[error("Shape {0} cannot hold a world")]
    NotEnterable(ShapeId),
    #[error("A world for shape {0} is already being created")]
    LinkInProgress(ShapeId),
}

/// User-facing failure report.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A create, update or delete was rejected. Local state is not rolled back.
    WriteFailed { shape_id: Option<ShapeId>, message: String },
    /// A world is missing or not ours; the editor stayed where it was.
    WorldUnavailable { world_id: WorldId, message: String },
    /// Creating a child world failed; the shape is still unlinked.
    LinkFailed { shape_id: ShapeId, message: String },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteFailed { message, .. } => {
                write!(f, "Could not save your change: {}", message)
            }
            Self::WorldUnavailable { message, .. } => {
                write!(f, "This world is not available: {}", message)
            }
            Self::LinkFailed { message, .. } => {
                write!(f, "Could not create the inner world: {}", message)
            }
        }
    }
}

/// What one [`SceneEditor::pump`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PumpReport {
    pub commits_applied: usize,
    pub commits_failed: usize,
    pub snapshot: Option<SnapshotDiff>,
    pub stream_stopped: bool,
}

pub struct SceneEditor {
    client: SceneStoreClient,
    identity: OwnerIdentity,
    config: EditorConfig,
    world: World,
    sync: SceneSynchronizer,
    graph: SceneGraph,
    navigator: Navigator,
    selection: SelectionController,
    sender: CommandSender,
    commands: CommandReceiver,
    /// Local optimistic ids mapped to the ids the store assigned, kept
    /// until a snapshot replaces the local shape.
    confirmed: HashMap<ShapeId, ShapeId>,
    notifications: Vec<Notification>,
}

impl SceneEditor {
    /// Open a world owned by `identity`.
    pub async fn open(
        client: SceneStoreClient,
        identity: OwnerIdentity,
        world_id: &str,
        config: EditorConfig,
    ) -> Result<Self, EditorError> {
        let world = load_world(&client, &identity, world_id).await?;
        let sync = SceneSynchronizer::open(&client, world_id, &identity.system_id)?;
        let mut graph = SceneGraph::new();
        graph.insert_world(world.clone());
        let (sender, commands) = command_channel();
        log::info!("Opened world {} ({})", world.id, world.name);

        Ok(Self {
            client,
            identity,
            config,
            navigator: Navigator::new(world.id.clone()),
            world,
            sync,
            graph,
            selection: SelectionController::new(),
            sender,
            commands,
            confirmed: HashMap::new(),
            notifications: Vec::new(),
        })
    }

    /// Handle for the render context.
    pub fn command_sender(&self) -> CommandSender {
        self.sender.clone()
    }

    /// Commit pending gestures, then take in the newest snapshot.
    pub async fn pump(&mut self) -> PumpReport {
        let mut report = PumpReport::default();
        for commit in self.commands.drain() {
            if self.apply_commit(commit).await {
                report.commits_applied += 1;
            } else {
                report.commits_failed += 1;
            }
        }

        match self.sync.poll() {
            SyncUpdate::Idle => {}
            SyncUpdate::Snapshot(diff) => {
                let replaced = self.graph.replace_world_shapes(&self.world.id, self.sync.shapes());
                if let Err(e) = replaced {
                    log::warn!("Scene graph out of step with world {}: {}", self.world.id, e);
                }
                self.selection.retain(self.sync.shapes());
                let sync = &self.sync;
                self.confirmed.retain(|local_id, _| sync.get(local_id).is_some());
                report.snapshot = Some(diff);
            }
            SyncUpdate::Stopped(_) => report.stream_stopped = true,
        }
        report
    }

    async fn apply_commit(&mut self, commit: ShapeCommit) -> bool {
        if commit.world_id == self.world.id {
            self.sync.update_optimistic(&commit.shape_id, &commit.patch);
        }
        let Some(shape_id) = self.resolve_id(&commit.shape_id) else {
            log::warn!(
                "Dropping {:?} commit for unsaved shape {}",
                commit.gesture,
                commit.shape_id
            );
            return false;
        };
        log::debug!("Committing {:?} on shape {}", commit.gesture, shape_id);
        match self
            .client
            .update_shape(&shape_id, &commit.world_id, &commit.patch)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                self.write_failed(Some(shape_id), e);
                false
            }
        }
    }

    /// Place a shape. It shows immediately and stays visible even if the
    /// write fails, until the next snapshot.
    pub async fn add_shape(
        &mut self,
        template: &ShapeTemplate,
        center: Point,
    ) -> Result<ShapeId, EditorError> {
        let draft = template.to_draft(&self.world.id, center, &self.config);
        let local_id = self.sync.insert_optimistic(&draft);
        match self.client.add_shape(&draft, &self.identity.system_id).await {
            Ok(id) => {
                self.confirmed.insert(local_id, id.clone());
                Ok(id)
            }
            Err(e) => Err(self.write_failed(None, e)),
        }
    }

    /// Replace a shape's label or text content.
    pub async fn update_shape_text(
        &mut self,
        shape_id: &str,
        text: &str,
    ) -> Result<(), EditorError> {
        self.write_patch(shape_id, ShapePatch::text(text)).await
    }

    /// Save the edit form: name, emotion, intention and picked image.
    pub async fn update_shape_details(
        &mut self,
        shape_id: &str,
        details: ShapeDetails,
    ) -> Result<(), EditorError> {
        self.write_patch(shape_id, details.into()).await
    }

    /// Show a patch locally, then write it through.
    async fn write_patch(&mut self, shape_id: &str, patch: ShapePatch) -> Result<(), EditorError> {
        if patch.is_empty() {
            return Ok(());
        }
        if !self.sync.update_optimistic(shape_id, &patch) {
            return Err(EditorError::UnknownShape(shape_id.to_string()));
        }
        let id = self
            .resolve_id(shape_id)
            .ok_or_else(|| EditorError::UnknownShape(shape_id.to_string()))?;
        let world_id = self.world.id.clone();
        match self.client.update_shape(&id, &world_id, &patch).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.write_failed(Some(id), e)),
        }
    }

    /// Make a shape active. Returns the context menu to show.
    pub fn select(&mut self, shape_id: &str) -> Result<[ContextAction; 3], EditorError> {
        let shape = self
            .sync
            .get(shape_id)
            .ok_or_else(|| EditorError::UnknownShape(shape_id.to_string()))?;
        let menu = ContextAction::menu_for(shape);
        self.selection.select(shape_id);
        Ok(menu)
    }

    /// Select the topmost shape under a world-space point, or clear.
    pub fn select_at(&mut self, point: Point) -> Option<ShapeId> {
        match hit_test(self.sync.shapes(), point) {
            Some(shape) => {
                let id = shape.id.clone();
                self.selection.select(id.clone());
                Some(id)
            }
            None => {
                self.selection.clear();
                None
            }
        }
    }

    pub fn dismiss(&mut self) {
        self.selection.clear();
    }

    /// Delete the active shape and clear the selection.
    pub async fn delete_active(&mut self) -> Result<ShapeId, EditorError> {
        let shape_id = self.selection.clear().ok_or(EditorError::NoSelection)?;
        self.sync.remove_optimistic(&shape_id);
        let id = self
            .resolve_id(&shape_id)
            .ok_or_else(|| EditorError::UnknownShape(shape_id.clone()))?;
        let world_id = self.world.id.clone();
        match self.client.delete_shape(&id, &world_id).await {
            Ok(()) => Ok(id),
            Err(e) => Err(self.write_failed(Some(id), e)),
        }
    }

    /// Enter the active shape.
    ///
    /// Linked shapes switch worlds right away. Unlinked ones return
    /// [`EnterOutcome::ConfirmCreate`]; follow up with
    /// [`SceneEditor::confirm_create_child`].
    pub async fn enter_active(&mut self) -> Result<EnterOutcome, EditorError> {
        let shape = self.active_shape()?.clone();
        let outcome = self
            .navigator
            .enter(&shape, &self.config.child_world_fallback_name);
        match &outcome {
            EnterOutcome::Navigate(step) => {
                if let Err(e) = self.switch_world(&step.world_id).await {
                    self.navigator.back();
                    return Err(e);
                }
            }
            EnterOutcome::CreationPending { shape_id } => {
                return Err(EditorError::LinkInProgress(shape_id.clone()));
            }
            EnterOutcome::EditText { .. } | EnterOutcome::ConfirmCreate { .. } => {}
        }
        Ok(outcome)
    }

    /// Create the child world for a shape, link it and walk into it.
    ///
    /// A shape that is already linked is simply entered.
    pub async fn confirm_create_child(
        &mut self,
        shape_id: &str,
    ) -> Result<NavigationStep, EditorError> {
        let shape = self
            .sync
            .get(shape_id)
            .cloned()
            .ok_or_else(|| EditorError::UnknownShape(shape_id.to_string()))?;
        if shape.is_text() {
            return Err(EditorError::NotEnterable(shape.id));
        }
        if let Some(world_id) = shape.linked_world_id.clone() {
            let step = self.navigator.navigate_to(world_id);
            if let Err(e) = self.switch_world(&step.world_id).await {
                self.navigator.back();
                return Err(e);
            }
            return Ok(step);
        }
        let store_id = self.resolve_id(&shape.id);
        let Some(pending) = self.navigator.pending_create(&shape) else {
            return Err(EditorError::LinkInProgress(shape.id));
        };

        let child = create_and_link(
            &self.client,
            &self.identity,
            &self.world,
            &self.config.child_world_fallback_name,
            &shape,
            store_id,
        )
        .await;
        let child_id = match child {
            Ok(child_id) => child_id,
            Err(e) => {
                drop(pending);
                log::error!("Failed to create inner world for shape {}: {}", shape.id, e);
                self.notifications.push(Notification::LinkFailed {
                    shape_id: shape.id.clone(),
                    message: e.to_string(),
                });
                return Err(e.into());
            }
        };

        self.sync.update_optimistic(&shape.id, &ShapePatch::link(child_id.clone()));
        let step = pending.complete(child_id);
        if let Err(e) = self.switch_world(&step.world_id).await {
            self.navigator.back();
            return Err(e);
        }
        let linked_id = self.resolve_id(&shape.id).unwrap_or(shape.id);
        if let Err(e) = self.graph.link(&linked_id, &step.world_id) {
            log::warn!("Scene graph could not record link: {}", e);
        }
        Ok(step)
    }

    /// Return to the parent world. `Ok(None)` at the root.
    pub async fn back(&mut self) -> Result<Option<WorldId>, EditorError> {
        let Some(parent) = self.navigator.parent().cloned() else {
            return Ok(None);
        };
        self.switch_world(&parent).await?;
        self.navigator.back();
        Ok(Some(parent))
    }

    /// Load and subscribe to another world. On failure nothing changes
    /// and a notification is queued.
    async fn switch_world(&mut self, world_id: &str) -> Result<(), EditorError> {
        let loaded = match load_world(&self.client, &self.identity, world_id).await {
            Ok(world) => SceneSynchronizer::open(&self.client, world_id, &self.identity.system_id)
                .map(|sync| (world, sync))
                .map_err(EditorError::from),
            Err(e) => Err(e),
        };
        let (world, sync) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                log::warn!("World {} is unavailable: {}", world_id, e);
                self.notifications.push(Notification::WorldUnavailable {
                    world_id: world_id.to_string(),
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        self.graph.insert_world(world.clone());
        if let Some(parent) = self.graph.parent_of(world_id).map(|s| s.id.clone()) {
            log::debug!("World {} is held by shape {}", world_id, parent);
        }
        if let Some(cycle) = self.graph.find_link_cycle() {
            log::warn!("Linked worlds form a cycle: {}", cycle.join(" -> "));
        }
        self.world = world;
        self.sync = sync;
        self.selection.clear();
        log::info!("Switched to world {} ({})", self.world.id, self.world.name);
        Ok(())
    }

    fn active_shape(&self) -> Result<&Shape, EditorError> {
        let id = self.selection.active().ok_or(EditorError::NoSelection)?;
        self.sync
            .get(id)
            .ok_or_else(|| EditorError::UnknownShape(id.clone()))
    }

    /// Store id for a shape, or `None` if it was never saved.
    fn resolve_id(&self, shape_id: &str) -> Option<ShapeId> {
        if !SceneSynchronizer::is_local_id(shape_id) {
            return Some(shape_id.to_string());
        }
        self.confirmed.get(shape_id).cloned()
    }

    fn write_failed(&mut self, shape_id: Option<ShapeId>, error: StoreError) -> EditorError {
        log::error!("Store write failed in world {}: {}", self.world.id, error);
        self.notifications.push(Notification::WriteFailed {
            shape_id,
            message: error.to_string(),
        });
        EditorError::Store(error)
    }

    pub fn shapes(&self) -> &[Shape] {
        self.sync.shapes()
    }

    pub fn shape(&self, shape_id: &str) -> Option<&Shape> {
        self.sync.get(shape_id)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn scene_graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn sync_status(&self) -> &SyncStatus {
        self.sync.status()
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Undo is not available.
    pub fn can_undo(&self) -> bool {
        false
    }

    /// Redo is not available.
    pub fn can_redo(&self) -> bool {
        false
    }
}

async fn load_world(
    client: &SceneStoreClient,
    identity: &OwnerIdentity,
    world_id: &str,
) -> Result<World, EditorError> {
    let world = client.get_world(world_id).await?;
    if !world.is_owned_by(identity) {
        let message = format!("world {} belongs to another owner", world_id);
        return Err(StoreError::PermissionDenied(message).into());
    }
    Ok(world)
}

/// Create a shape's child world and link the shape to it.
async fn create_and_link(
    client: &SceneStoreClient,
    identity: &OwnerIdentity,
    parent: &World,
    fallback_name: &str,
    shape: &Shape,
    store_id: Option<ShapeId>,
) -> Result<WorldId, StoreError> {
    let Some(shape_id) = store_id else {
        return Err(StoreError::NotFound(format!("shape {} is not saved yet", shape.id)));
    };
    let name = child_world_name(shape, fallback_name);
    let draft = WorldDraft::new(identity, name, parent.background_color.clone());
    let child_id = client.create_world(&draft).await?;
    let link = ShapePatch::link(child_id.clone());
    if let Err(e) = client.update_shape(&shape_id, &shape.world_id, &link).await {
        log::warn!("World {} was created but could not be linked to shape {}", child_id, shape_id);
        return Err(e);
    }
    Ok(child_id)
}
