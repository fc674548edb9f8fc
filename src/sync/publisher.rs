//! Debounced publishing of local edits.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{Debouncer, RemoteStore, SyncContext, SyncStatus};
use crate::errors::AppError;
use crate::session::SessionId;

/// Watches the classroom and publishes once local edits settle.
pub(crate) struct Publisher {
    debouncer: Debouncer,
    watcher: JoinHandle<()>,
}

impl Publisher {
    pub fn spawn<R: RemoteStore>(ctx: Arc<SyncContext<R>>) -> Self {
        let action_ctx = ctx.clone();
        let debouncer = Debouncer::spawn(ctx.settings.debounce, move || {
            let ctx = action_ctx.clone();
            async move {
                // Failures already show up as the offline status.
                let _ = publish_pending(&ctx).await;
            }
        });

        let poker = debouncer.poker();
        let mut changes = ctx.classroom.subscribe();
        let watcher = tokio::spawn(async move {
            // Whatever the classroom holds when we start watching was loaded,
            // not edited, so it is the baseline rather than a change.
            let mut seen_local = changes.borrow_and_update().local_seq;
            while changes.changed().await.is_ok() {
                let stamp = *changes.borrow_and_update();
                if stamp.local_seq != seen_local {
                    seen_local = stamp.local_seq;
                    ctx.dirty.store(true, Ordering::SeqCst);
                    poker.poke();
                }
            }
        });

        Self { debouncer, watcher }
    }

    pub fn shutdown(&self) {
        self.watcher.abort();
        self.debouncer.cancel();
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Save the classroom locally and, when a session is active, publish it.
pub(crate) async fn publish_pending<R: RemoteStore>(ctx: &SyncContext<R>) -> Result<(), AppError> {
    ctx.dirty.store(false, Ordering::SeqCst);
    ctx.cache_locally().await;

    let Some(code) = ctx.sessions.current().await else {
        tracing::debug!("No session yet, keeping changes on this device");
        return Ok(());
    };
    publish_to(ctx, &code).await
}

/// Publish a full snapshot to `code`.
pub(crate) async fn publish_to<R: RemoteStore>(
    ctx: &SyncContext<R>,
    code: &SessionId,
) -> Result<(), AppError> {
    let document = ctx.classroom.snapshot().await;
    ctx.set_status(SyncStatus::Syncing);

    match ctx.remote.publish(code, &document).await {
        Ok(()) => {
            *ctx.last_publish.lock().await = Some(Instant::now());
            ctx.set_status(SyncStatus::Synced);
            tracing::debug!(
                "Published {} students and {} log entries to {}",
                document.students.len(),
                document.logs.len(),
                code
            );
            Ok(())
        }
        Err(e) => {
            tracing::warn!("Publishing to {} failed, now offline: {}", code, e);
            ctx.set_status(SyncStatus::Offline);
            Err(e)
        }
    }
}
