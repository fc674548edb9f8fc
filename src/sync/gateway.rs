//! Access to the remote document store.

use std::future::Future;

use reqwest::{Client, StatusCode};

use crate::errors::AppError;
use crate::models::SyncDocument;
use crate::session::SessionId;

/// A key-value store of whole documents. Reads and writes are full
/// replacements; nothing is retried here.
pub trait RemoteStore: Send + Sync + 'static {
    /// `NotFound` when nothing has been written under `id` yet.
    fn fetch(&self, id: &SessionId)
        -> impl Future<Output = Result<SyncDocument, AppError>> + Send;

    fn publish(
        &self,
        id: &SessionId,
        document: &SyncDocument,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// `GET`/`PUT /{id}` against an npoint-style JSON store.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn document_url(&self, id: &SessionId) -> String {
        format!("{}/{}", self.base_url, id)
    }
}

impl RemoteStore for HttpGateway {
    async fn fetch(&self, id: &SessionId) -> Result<SyncDocument, AppError> {
        let response = self.client.get(self.document_url(id)).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("No document for session {}", id)));
        }
        if !status.is_success() {
            return Err(AppError::Transport(format!(
                "Fetching session {} returned {}",
                id, status
            )));
        }

        Ok(response.json::<SyncDocument>().await?)
    }

    async fn publish(&self, id: &SessionId, document: &SyncDocument) -> Result<(), AppError> {
        let response = self
            .client
            .put(self.document_url(id))
            .json(document)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Transport(format!(
                "Publishing session {} returned {}",
                id, status
            )));
        }
        Ok(())
    }
}
