//! Cross-device sync of the classroom through a shared remote document.
//!
//! The reconciliation loop pulls the document on startup and then on a fixed
//! period, skipping a tick when this device edited or published recently so a
//! slightly stale read cannot undo an edit made moments ago. The
//! publisher pushes a full snapshot once local edits go quiet. Conflicts are
//! settled by whoever wrote last; the quiet window is a heuristic, not a
//! guarantee.

mod engine;
mod gateway;
#[cfg(test)]
pub mod memory;
mod publisher;
mod reconcile;
mod scheduler;

pub use engine::*;
pub use gateway::*;
#[cfg(test)]
pub use reconcile::PollOutcome;
pub use scheduler::*;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;

use crate::classroom::Classroom;
use crate::config::Config;
use crate::db::Preferences;
use crate::models::{PresetClass, PRESET_CLASSES};
use crate::session::SessionManager;

/// What the front end shows about sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Offline,
    Syncing,
    Synced,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Offline => "offline",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Synced => "synced",
        }
    }
}

/// Timings and seed data for the sync loops.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub poll_interval: Duration,
    pub guard_window: Duration,
    pub debounce: Duration,
    /// Roster seeded into a session that has no document yet
    pub presets: &'static [PresetClass],
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            guard_window: Duration::from_secs(5),
            debounce: Duration::from_millis(1000),
            presets: PRESET_CLASSES,
        }
    }
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval,
            guard_window: config.guard_window,
            debounce: config.debounce,
            ..Self::default()
        }
    }
}

/// State shared by the loops of one engine.
pub(crate) struct SyncContext<R> {
    pub classroom: Arc<Classroom>,
    pub remote: R,
    pub sessions: SessionManager,
    pub prefs: Arc<Preferences>,
    pub settings: SyncSettings,
    pub status: watch::Sender<SyncStatus>,
    pub last_publish: Mutex<Option<Instant>>,
    /// Local edits not yet handed to the publisher
    pub dirty: AtomicBool,
}

impl<R: RemoteStore> SyncContext<R> {
    pub fn set_status(&self, status: SyncStatus) {
        self.status.send_replace(status);
    }

    /// True while the last local edit or publish is younger than the guard window.
    pub async fn guard_active(&self) -> bool {
        let last_write = self.classroom.last_local_write().await;
        let last_publish = *self.last_publish.lock().await;
        last_write
            .into_iter()
            .chain(last_publish)
            .max()
            .is_some_and(|at| at.elapsed() < self.settings.guard_window)
    }

    pub async fn cache_locally(&self) {
        let document = self.classroom.snapshot().await;
        self.prefs
            .save_snapshot(&document.students, &document.logs)
            .await;
    }
}
