//! Undo/redo history.
//!
//! The history is a bounded, linear list of full-scene snapshots with a
//! cursor. Structural changes *request* a snapshot; requests coalesce over a
//! short debounce window so a burst of edits lands as one entry. Undo and
//! redo move the cursor synchronously and hand back the snapshot to replay;
//! until every replay (and the image loads it triggers) has drained the
//! history refuses new snapshot requests, so replaying never records itself.

use crate::error::EditorError;
use annot_core::Color;
use annot_core::model::{Scene, SceneObject};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Immutable serialized scene (MessagePack).
pub type Snapshot = Arc<[u8]>;

#[derive(Serialize, Deserialize)]
struct SnapshotBody {
    objects: Vec<SceneObject>,
    background: Color,
}

/// Serialize the exportable part of `scene`. Crop guides and other
/// transient objects never enter the history.
pub fn encode_snapshot(scene: &Scene) -> Result<Snapshot, EditorError> {
    let body = SnapshotBody {
        objects: scene.exportable().cloned().collect(),
        background: scene.background,
    };
    let bytes = rmp_serde::to_vec_named(&body)?;
    Ok(bytes.into())
}

pub fn decode_snapshot(bytes: &[u8]) -> Result<Scene, EditorError> {
    let body: SnapshotBody = rmp_serde::from_slice(bytes)?;
    Ok(Scene {
        objects: body.objects,
        background: body.background,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    Idle,
    /// `in_flight` counts scheduled replays plus the image loads they started.
    Replaying { in_flight: usize },
}

pub struct History {
    entries: VecDeque<Snapshot>,
    index: usize,
    limit: usize,
    debounce: Duration,
    deadline: Option<Duration>,
    state: ReplayState,
}

impl History {
    pub fn new(limit: usize, debounce: Duration) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit.min(64)),
            index: 0,
            limit: limit.max(1),
            debounce,
            deadline: None,
            state: ReplayState::Idle,
        }
    }

    /// Start over with `snapshot` as the only entry.
    pub fn set_baseline(&mut self, snapshot: Snapshot) {
        self.entries.clear();
        self.entries.push_back(snapshot);
        self.index = 0;
        self.deadline = None;
        log::debug!("history baseline set");
    }

    /// Ask for a snapshot once things settle. Each request restarts the
    /// debounce window. Returns false if the request was dropped.
    pub fn request_snapshot(&mut self, now: Duration) -> bool {
        if self.is_replaying() {
            log::trace!("snapshot request ignored during replay");
            return false;
        }
        self.deadline = Some(now + self.debounce);
        true
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Whether the pending request's window has elapsed.
    pub fn due(&self, now: Duration) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }

    /// Clear the pending request, returning whether there was one.
    pub fn take_pending(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Append a snapshot after the cursor, discarding any redo entries and
    /// evicting the oldest entry beyond the limit.
    pub fn commit(&mut self, snapshot: Snapshot) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push_back(snapshot);
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
        self.index = self.entries.len() - 1;
        log::debug!("snapshot committed ({}/{})", self.index + 1, self.entries.len());
    }

    /// Step back one entry. The returned snapshot must be replayed and the
    /// replay released with [`History::release`].
    pub fn undo(&mut self) -> Option<Snapshot> {
        if self.index == 0 || self.entries.is_empty() {
            return None;
        }
        self.index -= 1;
        self.start_replay()
    }

    pub fn redo(&mut self) -> Option<Snapshot> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        self.start_replay()
    }

    fn start_replay(&mut self) -> Option<Snapshot> {
        self.deadline = None;
        self.hold();
        log::debug!("replaying history entry {}", self.index);
        self.entries.get(self.index).cloned()
    }

    /// Register one more piece of outstanding replay work.
    pub fn hold(&mut self) {
        self.state = match self.state {
            ReplayState::Idle => ReplayState::Replaying { in_flight: 1 },
            ReplayState::Replaying { in_flight } => ReplayState::Replaying {
                in_flight: in_flight + 1,
            },
        };
    }

    /// Mark one piece of replay work as done. Returns true when the history
    /// has just gone back to idle.
    pub fn release(&mut self) -> bool {
        match self.state {
            ReplayState::Replaying { in_flight } if in_flight > 1 => {
                self.state = ReplayState::Replaying {
                    in_flight: in_flight - 1,
                };
                false
            }
            ReplayState::Replaying { .. } => {
                self.state = ReplayState::Idle;
                log::debug!("replay finished");
                true
            }
            ReplayState::Idle => false,
        }
    }

    pub fn state(&self) -> ReplayState {
        self.state
    }

    pub fn is_replaying(&self) -> bool {
        matches!(self.state, ReplayState::Replaying { .. })
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.entries.get(self.index)
    }
}
