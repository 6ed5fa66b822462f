use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use igscrape_core::{BackendId, Credentials, PostRecord, ProfileRecord};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::normalize::{normalize_media, normalize_user};
use super::shortcode::media_id_from_shortcode;
use super::types::{
    LoginResponse, MediaInfoResponse, MobileUser, UserFeedResponse, UserInfoResponse,
};
use crate::auth::{LoginFlow, LoginOutcome, TwoFactorChallenge};
use crate::backend::BackendClient;
use crate::error::ScraperError;
use crate::http::{
    build_client, check_response, is_valid_username, join_url, parse_base_url, read_json,
    HttpSettings,
};
use crate::retry::retry_with_backoff;

const BACKEND: BackendId = BackendId::Mobile;
const APP_ID: &str = "567067343352427";
const AUTH_HEADER: &str = "ig-set-authorization";

/// Items requested per feed page.
const FEED_PAGE_SIZE: usize = 12;

/// Upper bound on feed pages per call. Guards against cursors that never end.
const MAX_PAGES: usize = 50;

/// Serialized into the session file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MobileState {
    device_id: String,
    #[serde(default)]
    authorization: Option<String>,
    #[serde(default)]
    user_id: Option<u64>,
}

/// Client for the platform's private mobile API.
///
/// Authenticates with a bearer token obtained at login. Profiles resolve by
/// username or by numeric user id; single posts resolve through the numeric
/// media id encoded in the shortcode.
#[derive(Debug)]
pub struct MobileClient {
    http: Client,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
    state: MobileState,
    /// Username to user id, filled as profiles are resolved.
    user_ids: HashMap<String, u64>,
}

impl MobileClient {
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidBaseUrl`] for a malformed base URL and
    /// [`ScraperError::Http`] if the HTTP client cannot be built.
    pub fn new(settings: &HttpSettings) -> Result<Self, ScraperError> {
        Ok(Self {
            http: build_client(settings)?,
            base_url: parse_base_url(&settings.base_url)?,
            max_retries: settings.max_retries,
            backoff_base_ms: settings.backoff_base_ms,
            state: MobileState {
                device_id: format!("android-{}", uuid::Uuid::new_v4().simple()),
                authorization: None,
                user_id: None,
            },
            user_ids: HashMap::new(),
        })
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.state.authorization.is_some()
    }

    /// Id of the logged-in account, when known.
    #[must_use]
    pub fn account_id(&self) -> Option<u64> {
        self.state.user_id
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut req = self
            .http
            .request(method, url)
            .header("X-IG-App-ID", APP_ID)
            .header("X-IG-Device-ID", self.state.device_id.as_str());
        if let Some(token) = &self.state.authorization {
            req = req.header(reqwest::header::AUTHORIZATION, token.as_str());
        }
        req
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        target: &str,
    ) -> Result<T, ScraperError> {
        let url = join_url(&self.base_url, path)?;
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            async move {
                let response = self.request(Method::GET, url).query(query).send().await?;
                let response = check_response(BACKEND, target, response).await?;
                read_json(response, || format!("mobile {path} for {target}")).await
            }
        })
        .await
    }

    /// Looks a profile up by username, or by user id when `target` is
    /// all digits. Private accounts are reported as not found.
    async fn fetch_user(&mut self, target: &str) -> Result<MobileUser, ScraperError> {
        let path = if is_numeric(target) {
            format!("users/{target}/info/")
        } else if is_valid_username(target) {
            format!("users/{target}/usernameinfo/")
        } else {
            return Err(ScraperError::not_found(target, "not a valid username"));
        };
        let info: UserInfoResponse = self.get_json(&path, &[], target).await?;
        if info.user.is_private {
            return Err(ScraperError::not_found(target, "private account"));
        }
        self.user_ids.insert(target.to_owned(), info.user.pk);
        Ok(info.user)
    }

    async fn user_id(&mut self, target: &str) -> Result<u64, ScraperError> {
        if is_numeric(target) {
            return target
                .parse()
                .map_err(|_| ScraperError::not_found(target, "user id out of range"));
        }
        if let Some(id) = self.user_ids.get(target) {
            return Ok(*id);
        }
        Ok(self.fetch_user(target).await?.pk)
    }

    /// Applies a login (or second-factor) response to the client state.
    async fn finish_login(&mut self, response: Response) -> Result<LoginOutcome, ScraperError> {
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ScraperError::RateLimited {
                backend: BACKEND,
                retry_after_secs: None,
            });
        }
        let token = response
            .headers()
            .get(AUTH_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
            .map(str::to_owned);
        let body = response.text().await?;
        let parsed: LoginResponse = serde_json::from_str(&body).map_err(|_| {
            ScraperError::auth(BACKEND, format!("unreadable login response (HTTP {status})"))
        })?;

        if parsed.two_factor_required {
            return match parsed.two_factor_info {
                Some(info) => Ok(LoginOutcome::TwoFactorRequired(TwoFactorChallenge {
                    identifier: info.two_factor_identifier,
                })),
                None => Err(ScraperError::auth(
                    BACKEND,
                    "two-factor required but no challenge identifier returned",
                )),
            };
        }

        let reason = parsed.failure_reason();
        match (status.is_success(), parsed.logged_in_user, token) {
            (true, Some(user), Some(token)) => {
                tracing::debug!(
                    backend = %BACKEND,
                    user_id = user.pk,
                    username = ?user.username,
                    "mobile login accepted"
                );
                self.state.authorization = Some(token);
                self.state.user_id = Some(user.pk);
                Ok(LoginOutcome::LoggedIn)
            }
            (true, Some(_), None) => Err(ScraperError::auth(
                BACKEND,
                "login accepted but no authorization token returned",
            )),
            _ => Err(ScraperError::auth(BACKEND, reason)),
        }
    }
}

fn is_numeric(target: &str) -> bool {
    !target.is_empty() && target.bytes().all(|b| b.is_ascii_digit())
}

fn encrypted_password(password: &str) -> String {
    format!("#PWD_INSTAGRAM:0:{}:{password}", Utc::now().timestamp())
}

#[async_trait]
impl LoginFlow for MobileClient {
    fn backend(&self) -> BackendId {
        BACKEND
    }

    fn restore(&mut self, state: &serde_json::Value) -> Result<(), ScraperError> {
        let restored: MobileState = serde_json::from_value(state.clone())
            .map_err(|e| ScraperError::auth(BACKEND, format!("malformed session state: {e}")))?;
        if restored.authorization.is_none() {
            return Err(ScraperError::auth(BACKEND, "session has no authorization token"));
        }
        self.state = restored;
        Ok(())
    }

    fn clear(&mut self) {
        self.state.authorization = None;
        self.state.user_id = None;
    }

    fn export(&self) -> serde_json::Value {
        serde_json::to_value(&self.state).unwrap_or_default()
    }

    async fn probe(&self) -> Result<bool, ScraperError> {
        if !self.is_logged_in() {
            return Ok(false);
        }
        let url = join_url(&self.base_url, "feed/timeline/")?;
        let response = self.request(Method::GET, url).send().await?;
        match check_response(BACKEND, "timeline", response).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_authentication() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn login(&mut self, credentials: &Credentials) -> Result<LoginOutcome, ScraperError> {
        let url = join_url(&self.base_url, "accounts/login/")?;
        let form = [
            ("username", credentials.username.clone()),
            ("enc_password", encrypted_password(&credentials.password)),
            ("device_id", self.state.device_id.clone()),
            ("login_attempt_count", "0".to_owned()),
        ];
        let response = self.request(Method::POST, url).form(&form).send().await?;
        self.finish_login(response).await
    }

    async fn complete_two_factor(
        &mut self,
        credentials: &Credentials,
        challenge: &TwoFactorChallenge,
        code: &str,
    ) -> Result<(), ScraperError> {
        let url = join_url(&self.base_url, "accounts/two_factor_login/")?;
        let form = [
            ("username", credentials.username.clone()),
            ("verification_code", code.trim().to_owned()),
            ("two_factor_identifier", challenge.identifier.clone()),
            ("device_id", self.state.device_id.clone()),
            ("trust_this_device", "1".to_owned()),
            ("verification_method", "1".to_owned()),
        ];
        let response = self.request(Method::POST, url).form(&form).send().await?;
        match self.finish_login(response).await? {
            LoginOutcome::LoggedIn => Ok(()),
            LoginOutcome::TwoFactorRequired(_) => {
                Err(ScraperError::auth(BACKEND, "verification code rejected"))
            }
        }
    }
}

#[async_trait]
impl BackendClient for MobileClient {
    async fn fetch_profile(&mut self, target: &str) -> Result<ProfileRecord, ScraperError> {
        let user = self.fetch_user(target).await?;
        Ok(normalize_user(user))
    }

    async fn fetch_posts(
        &mut self,
        target: &str,
        limit: usize,
    ) -> Result<Vec<PostRecord>, ScraperError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let user_id = self.user_id(target).await?;
        let path = format!("feed/user/{user_id}/");

        let mut posts = Vec::with_capacity(limit);
        let mut max_id: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let mut query = vec![("count", (limit - posts.len()).min(FEED_PAGE_SIZE).to_string())];
            if let Some(cursor) = &max_id {
                query.push(("max_id", cursor.clone()));
            }
            let page: UserFeedResponse = self.get_json(&path, &query, target).await?;
            posts.extend(page.items.into_iter().map(normalize_media));

            if posts.len() >= limit || !page.more_available {
                break;
            }
            match page.next_max_id {
                Some(next) if max_id.as_deref() != Some(next.as_str()) => max_id = Some(next),
                _ => break,
            }
        }
        posts.truncate(limit);
        Ok(posts)
    }

    async fn fetch_single_post(&mut self, shortcode: &str) -> Result<PostRecord, ScraperError> {
        let media_id = media_id_from_shortcode(shortcode)
            .ok_or_else(|| ScraperError::not_found(shortcode, "not a valid shortcode"))?;
        let info: MediaInfoResponse = self
            .get_json(&format!("media/{media_id}/info/"), &[], shortcode)
            .await?;
        info.items
            .into_iter()
            .next()
            .map(normalize_media)
            .ok_or_else(|| ScraperError::not_found(shortcode, "media info returned no items"))
    }
}
