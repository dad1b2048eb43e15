//! Inner World Core Library
//!
//! Platform-agnostic core of the Inner World canvas: a boundless 2D scene
//! of stickers and text that can be panned, zoomed and manipulated with
//! simultaneous gestures, nested through linked child worlds, and kept in
//! sync with a push-based document store.

pub mod camera;
pub mod commands;
pub mod config;
pub mod editor;
pub mod gesture;
pub mod graph;
pub mod model;
pub mod navigator;
pub mod presets;
pub mod selection;
pub mod store;
pub mod sync;

pub use camera::Camera;
pub use commands::{CommandReceiver, CommandSender, ShapeCommit, command_channel};
pub use config::{CameraConfig, ConfigError, EditorConfig};
pub use editor::{EditorError, Notification, PumpReport, SceneEditor};
pub use gesture::{GestureEvent, GestureKind, GestureLayer, GesturePhase, ShapeTransformComposer};
pub use graph::{GraphError, SceneGraph};
pub use model::{
    OwnerIdentity, Shape, ShapeDetails, ShapeDraft, ShapeId, ShapeKind, ShapePatch, Timestamp,
    World, WorldDraft, WorldId,
};
pub use navigator::{EnterOutcome, LinkState, NavigationStep, Navigator, PendingCreate};
pub use presets::{BACKGROUND_PRESETS, BackgroundPreset, ShapeTemplate};
pub use selection::{ContextAction, Handle, HandleKind, SelectionController};
pub use store::{DocumentStore, FileStore, MemoryStore, SceneStoreClient, StoreError, StoreResult};
pub use sync::{SceneSynchronizer, SnapshotDiff, SyncStatus, SyncUpdate};
