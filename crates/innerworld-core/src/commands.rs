//! One-way hand-off from the gesture/render context to the control context.
//!
//! The render side only ever sends; it never waits for a reply and
//! never touches the store.

use std::sync::mpsc::{Receiver, Sender, channel};

use crate::gesture::GestureKind;
use crate::model::{ShapeId, ShapePatch, WorldId};

/// The result of one finished gesture, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeCommit {
    pub shape_id: ShapeId,
    pub world_id: WorldId,
    pub gesture: GestureKind,
    pub patch: ShapePatch,
}

/// Render-side handle. Cheap to clone, one per gesture surface.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: Sender<ShapeCommit>,
}

impl CommandSender {
    /// Fire-and-forget.
    pub fn send(&self, commit: ShapeCommit) {
        if self.tx.send(commit).is_err() {
            log::warn!("Control context is gone; dropping shape commit");
        }
    }
}

/// Control-side handle, owned by the editor.
#[derive(Debug)]
pub struct CommandReceiver {
    rx: Receiver<ShapeCommit>,
}

impl CommandReceiver {
    /// Take every pending commit in send order (non-blocking).
    pub fn drain(&self) -> Vec<ShapeCommit> {
        self.rx.try_iter().collect()
    }
}

pub fn command_channel() -> (CommandSender, CommandReceiver) {
    let (tx, rx) = channel();
    (CommandSender { tx }, CommandReceiver { rx })
}
