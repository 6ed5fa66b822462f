use igscrape_core::{BackendId, ErrorDescriptor, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{backend} authentication failed: {reason}")]
    Authentication { backend: BackendId, reason: String },

    #[error("{target} not found or inaccessible: {reason}")]
    NotFound { target: String, reason: String },

    #[error("rate limited by {backend} backend{}", .retry_after_secs.map(|s| format!(" (retry after {s}s)")).unwrap_or_default())]
    RateLimited {
        backend: BackendId,
        retry_after_secs: Option<u64>,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid base URL \"{url}\": {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl ScraperError {
    /// Maps the error onto the per-item error taxonomy.
    ///
    /// Transport, decoding and unexpected-status failures are all
    /// [`ErrorKind::Transient`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScraperError::Authentication { .. } => ErrorKind::Authentication,
            ScraperError::NotFound { .. } => ErrorKind::NotFound,
            ScraperError::RateLimited { .. } => ErrorKind::RateLimited,
            ScraperError::Http(_)
            | ScraperError::Deserialize { .. }
            | ScraperError::UnexpectedStatus { .. }
            | ScraperError::InvalidBaseUrl { .. } => ErrorKind::Transient,
        }
    }

    #[must_use]
    pub fn is_authentication(&self) -> bool {
        self.kind() == ErrorKind::Authentication
    }

    /// Serializable form recorded in a failed `ScrapeResult`.
    #[must_use]
    pub fn to_descriptor(&self) -> ErrorDescriptor {
        ErrorDescriptor {
            kind: self.kind(),
            message: self.to_string(),
        }
    }

    pub(crate) fn not_found(target: &str, reason: impl Into<String>) -> Self {
        ScraperError::NotFound {
            target: target.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn auth(backend: BackendId, reason: impl Into<String>) -> Self {
        ScraperError::Authentication {
            backend,
            reason: reason.into(),
        }
    }
}
