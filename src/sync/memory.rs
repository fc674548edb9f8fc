//! In-memory remote store for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use super::RemoteStore;
use crate::errors::AppError;
use crate::models::SyncDocument;
use crate::session::SessionId;

#[derive(Clone, Default)]
pub struct MemoryStore {
    documents: Arc<Mutex<HashMap<String, SyncDocument>>>,
    fetches: Arc<AtomicUsize>,
    publishes: Arc<AtomicUsize>,
    offline: Arc<AtomicBool>,
    fetch_delay_ms: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, id: &str, document: SyncDocument) {
        self.documents.lock().await.insert(id.to_string(), document);
    }

    pub async fn document(&self, id: &str) -> Option<SyncDocument> {
        self.documents.lock().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) {
        self.documents.lock().await.remove(id);
    }

    /// Make every fetch take `delay` before it reads the document.
    pub fn set_fetch_delay(&self, delay: Duration) {
        self.fetch_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn publish_count(&self) -> usize {
        self.publishes.load(Ordering::SeqCst)
    }

    /// Make every call fail with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), AppError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::Transport("store unreachable".to_string()));
        }
        Ok(())
    }
}

impl RemoteStore for MemoryStore {
    async fn fetch(&self, id: &SessionId) -> Result<SyncDocument, AppError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = self.fetch_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.check_online()?;
        self.documents
            .lock()
            .await
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| AppError::NotFound(id.to_string()))
    }

    async fn publish(&self, id: &SessionId, document: &SyncDocument) -> Result<(), AppError> {
        self.publishes.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        self.documents
            .lock()
            .await
            .insert(id.to_string(), document.clone());
        Ok(())
    }
}
