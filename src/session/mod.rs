//! Session codes: which remote document this device reads and writes.
//!
//! A code comes from, in order: the `code` query parameter of the link the
//! app was opened with, the code this device used last time, the configured
//! shared code. Establishing a code persists it and rewrites the share link
//! so that the link alone is enough to join from another device.

use std::fmt;
use std::sync::Arc;

use reqwest::Url;
use tokio::sync::Mutex;

use crate::db::Preferences;
use crate::errors::AppError;

/// Query parameter carrying the session code.
pub const CODE_PARAM: &str = "code";

/// Length of generated codes.
const GENERATED_LEN: usize = 8;

/// Key of one shared remote document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Accept a code typed by a person or found in a link. Surrounding
    /// whitespace is ignored; the code must be non-empty and URL-safe.
    pub fn parse(raw: &str) -> Option<Self> {
        let code = raw.trim();
        let valid = !code.is_empty()
            && code
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| Self(code.to_string()))
    }

    /// A fresh short code, e.g. `3F9A0C1B`.
    pub fn generate() -> Self {
        let mut code = uuid::Uuid::new_v4().simple().to_string();
        code.truncate(GENERATED_LEN);
        Self(code.to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the startup environment says about the session, gathered up
/// front instead of read ambiently.
#[derive(Debug, Clone)]
pub struct SessionSources {
    /// The address the app was opened with
    pub launch_link: Url,
    /// Shared code for single-tenant deployments
    pub configured: Option<SessionId>,
}

impl SessionSources {
    /// `link` is the address the app was opened with; `share_url` is used when
    /// there is none.
    pub fn new(
        link: Option<&str>,
        share_url: &str,
        configured: Option<&str>,
    ) -> Result<Self, AppError> {
        let raw = link.unwrap_or(share_url);
        let launch_link = Url::parse(raw)
            .map_err(|e| AppError::Config(format!("Invalid link {:?}: {}", raw, e)))?;
        Ok(Self {
            launch_link,
            configured: configured.and_then(SessionId::parse),
        })
    }

    /// The code carried by the launch link, if any.
    pub fn link_code(&self) -> Option<SessionId> {
        code_from_link(&self.launch_link)
    }
}

pub fn code_from_link(url: &Url) -> Option<SessionId> {
    url.query_pairs()
        .find(|(key, _)| *key == CODE_PARAM)
        .and_then(|(_, value)| SessionId::parse(&value))
}

/// `url` with its `code` parameter set to `code`, other parameters kept.
pub fn link_with_code(url: &Url, code: &SessionId) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| *key != CODE_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut url = url.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(CODE_PARAM, code.as_str());
    url
}

pub struct SessionManager {
    prefs: Arc<Preferences>,
    sources: SessionSources,
    link: Mutex<Url>,
    current: Mutex<Option<SessionId>>,
}

impl SessionManager {
    pub fn new(prefs: Arc<Preferences>, sources: SessionSources) -> Self {
        let link = sources.launch_link.clone();
        Self {
            prefs,
            sources,
            link: Mutex::new(link),
            current: Mutex::new(None),
        }
    }

    /// Work out which session to join: link, then this device's last code,
    /// then the configured code. `None` means the caller has to establish one.
    pub async fn resolve(&self) -> Option<SessionId> {
        if let Some(code) = self.sources.link_code() {
            tracing::debug!("Session {} taken from launch link", code);
            return Some(code);
        }
        if let Some(code) = self
            .prefs
            .session_code()
            .await
            .and_then(|code| SessionId::parse(&code))
        {
            tracing::debug!("Session {} restored from local storage", code);
            return Some(code);
        }
        self.sources.configured.clone()
    }

    /// Adopt `explicit`, or a freshly generated code. The code is saved on this
    /// device and written into the share link in place.
    pub async fn establish(&self, explicit: Option<SessionId>) -> SessionId {
        let code = explicit.unwrap_or_else(SessionId::generate);

        self.prefs.save_session_code(code.as_str()).await;
        {
            let mut link = self.link.lock().await;
            *link = link_with_code(&link, &code);
        }
        *self.current.lock().await = Some(code.clone());

        tracing::info!("Session {} established", code);
        code
    }

    /// The session currently in use.
    pub async fn current(&self) -> Option<SessionId> {
        self.current.lock().await.clone()
    }

    /// A link that joins the current session, once there is one.
    pub async fn share_link(&self) -> Option<Url> {
        self.current.lock().await.as_ref()?;
        Some(self.link.lock().await.clone())
    }
}
