//! HTTP plumbing shared by the backend clients: client construction, base
//! URL handling and status classification.

use std::sync::LazyLock;
use std::time::Duration;

use igscrape_core::{AppConfig, BackendId};
use rand::seq::IndexedRandom;
use regex::Regex;
use reqwest::{Client, ClientBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::error::ScraperError;

pub(crate) const MOBILE_USER_AGENT: &str = "Instagram 269.0.0.18.75 Android (26/8.0.0; 480dpi; 1080x1920; OnePlus; 6T Dev; devitron; qcom; en_US; 314665256)";
pub(crate) const WEB_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._]{1,30}$").expect("valid username regex"));

/// Connection settings for one backend client.
#[derive(Clone)]
pub struct HttpSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Proxy URL for every request made by this client.
    pub proxy: Option<String>,
    /// Additional attempts after a transient failure.
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl std::fmt::Debug for HttpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSettings")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("proxy", &self.proxy.as_ref().map(|_| "[redacted]"))
            .field("max_retries", &self.max_retries)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .finish()
    }
}

impl HttpSettings {
    /// Settings for `backend` with a proxy drawn at random from the pool.
    #[must_use]
    pub fn from_config(config: &AppConfig, backend: BackendId) -> Self {
        let base_url = match backend {
            BackendId::Mobile => config.mobile_base_url.clone(),
            BackendId::Web => config.web_base_url.clone(),
        };
        let proxy = config.proxies.choose(&mut rand::rng()).cloned();
        if proxy.is_some() {
            tracing::debug!(%backend, pool = config.proxies.len(), "using proxy from pool");
        }
        Self {
            base_url,
            timeout_secs: config.request_timeout_secs,
            user_agent: default_user_agent(backend).to_owned(),
            proxy,
            max_retries: config.max_retries,
            backoff_base_ms: config.retry_backoff_base_ms,
        }
    }

    /// Direct connection to `base_url` without retries. Used against mock
    /// servers.
    #[must_use]
    pub fn for_base_url(backend: BackendId, base_url: &str) -> Self {
        Self {
            base_url: base_url.to_owned(),
            timeout_secs: 30,
            user_agent: default_user_agent(backend).to_owned(),
            proxy: None,
            max_retries: 0,
            backoff_base_ms: 0,
        }
    }
}

fn default_user_agent(backend: BackendId) -> &'static str {
    match backend {
        BackendId::Mobile => MOBILE_USER_AGENT,
        BackendId::Web => WEB_USER_AGENT,
    }
}

/// Builds the `reqwest` client for `settings`.
///
/// # Errors
///
/// Returns [`ScraperError::Http`] if the proxy URL is invalid or the client
/// cannot be constructed.
pub(crate) fn build_client(settings: &HttpSettings) -> Result<Client, ScraperError> {
    Ok(client_builder(settings)?.build()?)
}

/// Client builder with the timeouts, user agent and proxy of `settings`
/// applied, for callers that need to add more before building.
pub(crate) fn client_builder(settings: &HttpSettings) -> Result<ClientBuilder, ScraperError> {
    let mut builder = Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(settings.user_agent.as_str());
    if let Some(proxy) = &settings.proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
    }
    Ok(builder)
}

/// Parses `raw`, forcing exactly one trailing slash so that relative joins
/// append to the path instead of replacing its last segment.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, ScraperError> {
    let normalised = format!("{}/", raw.trim_end_matches('/'));
    Url::parse(&normalised).map_err(|e| ScraperError::InvalidBaseUrl {
        url: raw.to_owned(),
        reason: e.to_string(),
    })
}

pub(crate) fn join_url(base: &Url, path: &str) -> Result<Url, ScraperError> {
    base.join(path).map_err(|e| ScraperError::InvalidBaseUrl {
        url: format!("{base}{path}"),
        reason: e.to_string(),
    })
}

/// Usernames the platform can resolve. Anything else cannot exist remotely.
pub(crate) fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

/// Passes 2xx responses through and classifies everything else.
///
/// `target` names the profile or post being fetched and is used for
/// not-found errors.
pub(crate) async fn check_response(
    backend: BackendId,
    target: &str,
    response: Response,
) -> Result<Response, ScraperError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let retry_after_secs = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok());
    // The body only refines the classification; an unreadable body is
    // classified from the status alone.
    let body = response.text().await.unwrap_or_default();

    Err(classify_failure(
        backend,
        target,
        status,
        &url,
        &body,
        retry_after_secs,
    ))
}

fn classify_failure(
    backend: BackendId,
    target: &str,
    status: StatusCode,
    url: &str,
    body: &str,
    retry_after_secs: Option<u64>,
) -> ScraperError {
    let lowered = body.to_ascii_lowercase();
    let auth_marker = ["login_required", "challenge_required", "checkpoint_required"]
        .iter()
        .find(|m| lowered.contains(*m));

    match status.as_u16() {
        429 => ScraperError::RateLimited {
            backend,
            retry_after_secs,
        },
        401 => ScraperError::auth(backend, format!("HTTP 401 from {url}")),
        400 | 403 if auth_marker.is_some() => {
            ScraperError::auth(backend, auth_marker.copied().unwrap_or("login_required"))
        }
        400 if lowered.contains("please wait") || lowered.contains("spam") => {
            ScraperError::RateLimited {
                backend,
                retry_after_secs,
            }
        }
        400 if lowered.contains("not authorized to view") || lowered.contains("user not found") => {
            ScraperError::not_found(target, "private or missing account (HTTP 400)")
        }
        403 => ScraperError::not_found(target, "private or restricted (HTTP 403)"),
        404 => ScraperError::not_found(target, "HTTP 404"),
        code => ScraperError::UnexpectedStatus {
            status: code,
            url: url.to_owned(),
        },
    }
}

/// Reads the body of a successful response as `T`.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: Response,
    context: impl FnOnce() -> String,
) -> Result<T, ScraperError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ScraperError::Deserialize {
        context: context(),
        source: e,
    })
}
