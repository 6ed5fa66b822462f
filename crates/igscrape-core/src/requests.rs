//! Classification of input rows into [`ScrapeRequest`]s and the FIFO
//! [`RequestQueue`] the orchestrator drains.
//!
//! A row whose permalink column contains `/p/<shortcode>` becomes a
//! single-post request. Any other row becomes a profile request keyed by the
//! first non-empty identifier column. Rows with neither are dropped with a
//! warning.

use std::collections::{BTreeMap, VecDeque};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::types::{RequestMode, ScrapeRequest};

/// Input column holding a post permalink.
pub const PERMALINK_COLUMN: &str = "link";

/// Identifier columns, highest priority first.
pub const IDENTIFIER_COLUMNS: [&str; 3] = ["app_unique_id", "name", "username"];

const POST_DELIMITER: &str = "/p/";

static SHORTCODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid shortcode regex"));

/// Why an input row could not be turned into a request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestParseError {
    #[error("row has neither a post permalink nor an identifier column")]
    NoIdentifier,
}

/// Extracts the shortcode from a permalink such as
/// `https://www.instagram.com/p/CqzmmWjy95o/?igsh=abc`.
///
/// Returns `None` when the delimiter is absent or the segment after it is
/// empty or contains characters a shortcode cannot have.
#[must_use]
pub fn extract_shortcode(link: &str) -> Option<String> {
    let (_, remainder) = link.split_once(POST_DELIMITER)?;
    let code = remainder
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .trim();
    if code.is_empty() || !SHORTCODE_RE.is_match(code) {
        return None;
    }
    Some(code.to_owned())
}

/// Classifies one input row.
///
/// # Errors
///
/// Returns [`RequestParseError::NoIdentifier`] when the row yields neither a
/// shortcode nor an identifier.
pub fn classify_record(
    row: &BTreeMap<String, String>,
    post_limit: usize,
) -> Result<ScrapeRequest, RequestParseError> {
    let link = row
        .get(PERMALINK_COLUMN)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty());

    if let Some(link) = link {
        if let Some(shortcode) = extract_shortcode(link) {
            return Ok(ScrapeRequest {
                target: shortcode,
                mode: RequestMode::SinglePost,
                post_limit: 1,
                permalink: Some(link.to_owned()),
                origin_metadata: row.clone(),
            });
        }
    }

    let identifier = IDENTIFIER_COLUMNS
        .iter()
        .filter_map(|col| row.get(*col))
        .map(|v| v.trim().trim_start_matches('@'))
        .find(|v| !v.is_empty())
        .ok_or(RequestParseError::NoIdentifier)?;

    Ok(ScrapeRequest {
        target: identifier.to_owned(),
        mode: RequestMode::ProfileWithPosts,
        post_limit,
        permalink: None,
        origin_metadata: row.clone(),
    })
}

/// Ordered, immutable-once-built sequence of requests.
#[derive(Debug, Default)]
pub struct RequestQueue {
    requests: VecDeque<ScrapeRequest>,
    dropped: usize,
}

impl RequestQueue {
    /// Builds the queue from rows in input order, dropping unusable rows.
    pub fn from_records<I>(rows: I, post_limit: usize) -> Self
    where
        I: IntoIterator<Item = BTreeMap<String, String>>,
    {
        let mut queue = Self::default();
        for (index, row) in rows.into_iter().enumerate() {
            match classify_record(&row, post_limit) {
                Ok(request) => queue.requests.push_back(request),
                Err(e) => {
                    queue.dropped += 1;
                    tracing::warn!(row = index + 1, error = %e, ?row, "skipping input row");
                }
            }
        }
        queue
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Number of rows dropped while building the queue.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScrapeRequest> {
        self.requests.iter()
    }

    pub fn pop(&mut self) -> Option<ScrapeRequest> {
        self.requests.pop_front()
    }
}

#[cfg(test)]
#[path = "requests_test.rs"]
mod tests;
