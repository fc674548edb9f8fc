//! Document endpoints.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use crate::errors::AppError;
use crate::session::SessionId;
use crate::AppState;

fn document_key(raw: &str) -> Result<SessionId, AppError> {
    SessionId::parse(raw)
        .ok_or_else(|| AppError::Validation(format!("Invalid document key: {:?}", raw)))
}

/// GET /{key} - The stored document, byte for byte.
pub async fn get_document(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let key = document_key(&key)?;

    let document = state
        .repo
        .get_document(key.as_str())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Document '{}' not found", key)))?;

    Ok(([(header::CONTENT_TYPE, "application/json")], document.body).into_response())
}

/// PUT /{key} - Replace the document. The body must be a JSON object.
pub async fn put_document(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let key = document_key(&key)?;

    if !body.is_object() {
        return Err(AppError::Validation(
            "Document must be a JSON object".to_string(),
        ));
    }

    let text = serde_json::to_string(&body)?;
    let stored = state.repo.put_document(key.as_str(), &text).await?;
    tracing::debug!("Stored document {} ({} bytes)", stored.key, stored.body.len());

    Ok(Json(body))
}
