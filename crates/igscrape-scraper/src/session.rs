//! Durable per-backend session state.
//!
//! Each backend/account pair owns one JSON file under the session
//! directory. The credential blob inside is opaque here; only the owning
//! backend client knows its shape.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use igscrape_core::{persist, BackendId, PersistError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub backend: BackendId,
    pub account: String,
    /// Backend-specific serialized client state (tokens, cookies, device ids).
    pub credentials: serde_json::Value,
    pub created_at: DateTime<Utc>,
    /// Best-effort validity flag; cleared when a call fails authentication.
    #[serde(default = "default_valid")]
    pub valid: bool,
}

fn default_valid() -> bool {
    true
}

impl Session {
    #[must_use]
    pub fn new(backend: BackendId, account: &str, credentials: serde_json::Value) -> Self {
        Self {
            backend,
            account: account.to_owned(),
            credentials,
            created_at: Utc::now(),
            valid: true,
        }
    }

    pub fn invalidate(&mut self) {
        self.valid = false;
    }
}

/// Loads and saves [`Session`]s as JSON files in one directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the session for `backend` and `account`.
    #[must_use]
    pub fn path_for(&self, backend: BackendId, account: &str) -> PathBuf {
        let account: String = account
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{backend}_{account}.session.json"))
    }

    /// Loads a cached session. Missing, unreadable or mismatched files all
    /// yield `None` so the caller falls back to a fresh login.
    #[must_use]
    pub fn load(&self, backend: BackendId, account: &str) -> Option<Session> {
        let path = self.path_for(backend, account);
        match persist::read_json::<Session>(&path) {
            Ok(Some(session)) if session.backend == backend => {
                tracing::debug!(%backend, path = %path.display(), "loaded cached session");
                Some(session)
            }
            Ok(Some(session)) => {
                tracing::warn!(
                    %backend,
                    found = %session.backend,
                    path = %path.display(),
                    "session file belongs to another backend; ignoring"
                );
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(%backend, error = %e, "could not read cached session; ignoring");
                None
            }
        }
    }

    /// Persists `session` atomically, replacing any previous file.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the file cannot be written.
    pub fn save(&self, session: &Session) -> Result<(), PersistError> {
        let path = self.path_for(session.backend, &session.account);
        persist::write_json_atomic(&path, session)?;
        tracing::debug!(backend = %session.backend, path = %path.display(), "saved session");
        Ok(())
    }
}
