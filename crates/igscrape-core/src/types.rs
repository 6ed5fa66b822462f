//! Normalized data model shared by the backends, the orchestrator and the
//! result file.
//!
//! Every type here is backend-neutral: adapters convert their native
//! response shapes (URLs, timestamps, media-type enums) into these plain
//! string/number representations before returning.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one of the two client backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendId {
    /// Private mobile API client (Provider A).
    Mobile,
    /// Public web API client (Provider B).
    Web,
}

impl BackendId {
    pub const ALL: [BackendId; 2] = [BackendId::Mobile, BackendId::Web];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BackendId::Mobile => "mobile",
            BackendId::Web => "web",
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mobile" => Ok(BackendId::Mobile),
            "web" => Ok(BackendId::Web),
            other => Err(format!("unknown backend \"{other}\" (expected mobile or web)")),
        }
    }
}

/// What a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestMode {
    /// Profile snapshot plus up to `post_limit` most recent posts.
    ProfileWithPosts,
    /// One post looked up by shortcode.
    SinglePost,
}

/// One unit of work, built from an input row and consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRequest {
    /// Username, numeric user id, or post shortcode depending on `mode`.
    pub target: String,
    pub mode: RequestMode,
    pub post_limit: usize,
    /// Original permalink for single-post requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
    /// Passthrough of the input row the request was built from.
    #[serde(default)]
    pub origin_metadata: BTreeMap<String, String>,
}

impl ScrapeRequest {
    /// `true` when the target is an all-digit user id rather than a username.
    #[must_use]
    pub fn is_numeric_target(&self) -> bool {
        self.mode == RequestMode::ProfileWithPosts
            && !self.target.is_empty()
            && self.target.bytes().all(|b| b.is_ascii_digit())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub username: String,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub follower_count: Option<u64>,
    pub following_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub post_id: String,
    pub shortcode: String,
    pub caption: Option<String>,
    /// ISO-8601 (RFC 3339) timestamp, `None` when the backend has none.
    pub published_at: Option<String>,
    /// Only ever populated for video posts whose backend reports a count.
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
}

/// Error categories recorded against a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    NotFound,
    RateLimited,
    Transient,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::NotFound => "not_found",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Transient => "transient",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of one processed request.
///
/// Build with [`ScrapeResult::success`] or [`ScrapeResult::failure`]; a
/// failed result never carries a profile or posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub request: ScrapeRequest,
    pub backend_used: Option<BackendId>,
    pub profile: Option<ProfileRecord>,
    pub posts: Vec<PostRecord>,
    pub error: Option<ErrorDescriptor>,
}

impl ScrapeResult {
    /// Builds a successful result. `posts` is truncated to the request's
    /// `post_limit` for profile requests.
    #[must_use]
    pub fn success(
        request: ScrapeRequest,
        backend: BackendId,
        profile: Option<ProfileRecord>,
        mut posts: Vec<PostRecord>,
    ) -> Self {
        if request.mode == RequestMode::ProfileWithPosts {
            posts.truncate(request.post_limit);
        }
        Self {
            request,
            backend_used: Some(backend),
            profile,
            posts,
            error: None,
        }
    }

    #[must_use]
    pub fn failure(request: ScrapeRequest, backend: Option<BackendId>, error: ErrorDescriptor) -> Self {
        Self {
            request,
            backend_used: backend,
            profile: None,
            posts: Vec::new(),
            error: Some(error),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
