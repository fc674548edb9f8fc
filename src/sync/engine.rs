//! The sync engine: startup load, polling, debounced publishing, teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use super::publisher::{publish_pending, publish_to, Publisher};
use super::reconcile::{self, WhenMissing};
use super::{RemoteStore, SyncContext, SyncSettings, SyncStatus, Ticker};
use crate::classroom::Classroom;
use crate::db::Preferences;
use crate::errors::AppError;
use crate::session::{SessionId, SessionManager};

/// Keeps one classroom in sync with its session's remote document.
///
/// Nothing runs until [`start`](Self::start). [`shutdown`](Self::shutdown),
/// or dropping the engine, stops the poll timer and discards any pending
/// publish.
pub struct SyncEngine<R: RemoteStore> {
    ctx: Arc<SyncContext<R>>,
    ticker: Option<Ticker>,
    publisher: Option<Publisher>,
}

impl<R: RemoteStore> SyncEngine<R> {
    pub fn new(
        classroom: Arc<Classroom>,
        remote: R,
        sessions: SessionManager,
        prefs: Arc<Preferences>,
        settings: SyncSettings,
    ) -> Self {
        let (status, _) = watch::channel(SyncStatus::Offline);
        let ctx = SyncContext {
            classroom,
            remote,
            sessions,
            prefs,
            settings,
            status,
            last_publish: Mutex::new(None),
            dirty: AtomicBool::new(false),
        };
        Self {
            ctx: Arc::new(ctx),
            ticker: None,
            publisher: None,
        }
    }

    /// Load the initial state, then start polling and publishing.
    pub async fn start(&mut self) -> SyncStatus {
        let status = reconcile::startup(&self.ctx).await;
        tracing::info!("Sync engine started, status {}", status.as_str());

        self.publisher = Some(Publisher::spawn(self.ctx.clone()));

        let ctx = self.ctx.clone();
        self.ticker = Some(Ticker::spawn(self.ctx.settings.poll_interval, move || {
            let ctx = ctx.clone();
            async move {
                reconcile::poll_once(&ctx).await;
            }
        }));

        status
    }

    pub fn classroom(&self) -> &Arc<Classroom> {
        &self.ctx.classroom
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.ctx.sessions
    }

    pub fn status(&self) -> SyncStatus {
        *self.ctx.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.ctx.status.subscribe()
    }

    /// Start sharing this classroom under `code`, or under a new code. The
    /// current roster is published right away, replacing anything stored
    /// there.
    pub async fn create_session(&self, code: Option<SessionId>) -> (SessionId, SyncStatus) {
        let code = self.ctx.sessions.establish(code).await;
        self.ctx.dirty.store(false, Ordering::SeqCst);
        let status = match publish_to(&self.ctx, &code).await {
            Ok(()) => SyncStatus::Synced,
            Err(_) => SyncStatus::Offline,
        };
        (code, status)
    }

    /// Switch to an existing session and load its document. A code nobody
    /// has written to yet is created from the current roster.
    pub async fn join_session(&self, code: SessionId) -> SyncStatus {
        self.ctx.sessions.establish(Some(code.clone())).await;
        reconcile::load(&self.ctx, &code, WhenMissing::PublishLocal).await
    }

    /// Fetch the remote document now, ignoring the guard window.
    pub async fn refresh(&self) -> SyncStatus {
        match self.ctx.sessions.current().await {
            Some(code) => reconcile::load(&self.ctx, &code, WhenMissing::Ignore).await,
            None => self.status(),
        }
    }

    /// Run one guarded poll, as the timer would.
    #[cfg(test)]
    pub async fn poll_now(&self) -> reconcile::PollOutcome {
        reconcile::poll_once(&self.ctx).await
    }

    /// Publish edits that are still waiting out the debounce.
    pub async fn flush(&self) -> Result<(), AppError> {
        if self.ctx.dirty.load(Ordering::SeqCst) {
            publish_pending(&self.ctx).await?;
        }
        Ok(())
    }

    pub fn shutdown(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
        if let Some(publisher) = self.publisher.take() {
            publisher.shutdown();
        }
        tracing::debug!("Sync engine stopped");
    }
}

impl<R: RemoteStore> Drop for SyncEngine<R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
