//! Pulling the remote document into the classroom.

use super::publisher::publish_to;
use super::{RemoteStore, SyncContext, SyncStatus};
use crate::classroom::ChangeOrigin;
use crate::errors::AppError;
use crate::models::{default_roster, SyncDocument};
use crate::session::SessionId;

/// What a scheduled poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// No session established yet
    NoSession,
    /// Skipped because this device was active within the guard window
    Suppressed,
    /// Remote document fetched; `changed` tells whether it differed
    Applied { changed: bool },
    /// Fetch failed; the classroom was left alone
    Failed,
}

/// What to do when the session has no remote document yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WhenMissing {
    /// Seed the default roster if the classroom is empty, then publish
    Seed,
    /// Publish whatever the classroom holds
    PublishLocal,
    /// Leave everything alone and go offline
    Ignore,
}

/// Startup: restore the offline cache, then load the resolved session.
pub(crate) async fn startup<R: RemoteStore>(ctx: &SyncContext<R>) -> SyncStatus {
    if let Some((students, logs)) = ctx.prefs.load_snapshot().await {
        tracing::info!("Restored {} students from the local cache", students.len());
        ctx.classroom
            .replace_all(students, logs, ChangeOrigin::Initial)
            .await;
    }

    let Some(code) = ctx.sessions.resolve().await else {
        if ctx.classroom.is_empty().await {
            tracing::info!("No session and no cached roster, starting from the default roster");
            seed_defaults(ctx).await;
            ctx.cache_locally().await;
        }
        ctx.set_status(SyncStatus::Offline);
        return SyncStatus::Offline;
    };

    ctx.sessions.establish(Some(code.clone())).await;
    load(ctx, &code, WhenMissing::Seed).await
}

/// Fetch `code` and apply it, whatever the guard says.
pub(crate) async fn load<R: RemoteStore>(
    ctx: &SyncContext<R>,
    code: &SessionId,
    when_missing: WhenMissing,
) -> SyncStatus {
    ctx.set_status(SyncStatus::Syncing);

    match ctx.remote.fetch(code).await {
        Ok(document) => {
            apply(ctx, document).await;
            ctx.set_status(SyncStatus::Synced);
            SyncStatus::Synced
        }
        Err(AppError::NotFound(_)) if when_missing != WhenMissing::Ignore => {
            if when_missing == WhenMissing::Seed && ctx.classroom.is_empty().await {
                tracing::info!("Session {} is new, seeding the default roster", code);
                seed_defaults(ctx).await;
            } else {
                tracing::info!("Session {} is new, publishing the current roster", code);
            }
            ctx.cache_locally().await;
            match publish_to(ctx, code).await {
                Ok(()) => SyncStatus::Synced,
                Err(_) => SyncStatus::Offline,
            }
        }
        Err(e) => {
            tracing::warn!("Loading session {} failed, working offline: {}", code, e);
            ctx.set_status(SyncStatus::Offline);
            SyncStatus::Offline
        }
    }
}

/// One scheduled poll.
pub(crate) async fn poll_once<R: RemoteStore>(ctx: &SyncContext<R>) -> PollOutcome {
    let Some(code) = ctx.sessions.current().await else {
        return PollOutcome::NoSession;
    };
    if ctx.guard_active().await {
        tracing::debug!("Recent local activity, skipping poll of {}", code);
        return PollOutcome::Suppressed;
    }

    ctx.set_status(SyncStatus::Syncing);
    let document = match ctx.remote.fetch(&code).await {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!("Polling {} failed: {}", code, e);
            ctx.set_status(SyncStatus::Offline);
            return PollOutcome::Failed;
        }
    };

    // An edit made while the request was in flight wins over what we read.
    if ctx.guard_active().await || ctx.sessions.current().await.as_ref() != Some(&code) {
        tracing::debug!("Classroom changed during poll of {}, discarding the result", code);
        ctx.set_status(SyncStatus::Synced);
        return PollOutcome::Suppressed;
    }

    let changed = apply(ctx, document).await;
    ctx.set_status(SyncStatus::Synced);
    PollOutcome::Applied { changed }
}

/// Overwrite the classroom with a remote document. Returns whether anything changed.
async fn apply<R: RemoteStore>(ctx: &SyncContext<R>, document: SyncDocument) -> bool {
    if ctx.classroom.snapshot().await == document {
        return false;
    }
    tracing::debug!(
        "Applying remote document: {} students, {} log entries",
        document.students.len(),
        document.logs.len()
    );
    ctx.classroom
        .replace_all(document.students, document.logs, ChangeOrigin::Remote)
        .await;
    ctx.cache_locally().await;
    true
}

async fn seed_defaults<R: RemoteStore>(ctx: &SyncContext<R>) {
    ctx.classroom
        .replace_all(
            default_roster(ctx.settings.presets),
            Vec::new(),
            ChangeOrigin::Initial,
        )
        .await;
}
