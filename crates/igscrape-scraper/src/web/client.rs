use std::sync::{Arc, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use igscrape_core::{BackendId, Credentials, PostRecord, ProfileRecord, ScrapeRequest};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use reqwest_cookie_store::{CookieStore, CookieStoreMutex};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::normalize::{normalize_media, normalize_user};
use super::types::{
    CurrentUserResponse, LoginResponse, MediaConnection, ProfileInfoResponse,
    ShortcodeQueryResponse, TimelineQueryResponse, WebUser,
};
use crate::auth::{LoginFlow, LoginOutcome, TwoFactorChallenge};
use crate::backend::BackendClient;
use crate::error::ScraperError;
use crate::http::{
    check_response, client_builder, is_valid_username, join_url, parse_base_url, read_json,
    HttpSettings,
};
use crate::retry::retry_with_backoff;

const BACKEND: BackendId = BackendId::Web;
const APP_ID: &str = "936619743392459";
const TIMELINE_QUERY_HASH: &str = "003056d32c2554def87228bc3fd9668a";
const SHORTCODE_QUERY_HASH: &str = "2b0673e0dc4580674a88d426fe00ea90";
const CSRF_COOKIE: &str = "csrftoken";
const SESSION_COOKIE: &str = "sessionid";

/// Largest `first` the timeline query accepts.
const TIMELINE_PAGE_SIZE: usize = 50;

/// Upper bound on timeline pages per call.
const MAX_PAGES: usize = 50;

/// Serialized into the session file. `cookies` is the cookie store in its
/// own JSON format, expired and session-only cookies included.
#[derive(Debug, Serialize, Deserialize)]
struct WebState {
    cookies: String,
}

/// Timeline data returned alongside a profile, kept so the posts call for
/// the same target does not refetch it.
#[derive(Debug)]
struct FirstPage {
    target: String,
    user_id: String,
    timeline: MediaConnection,
}

/// Client for the platform's web endpoints.
///
/// The session is the browser cookie store (`sessionid`, `csrftoken`,
/// `ds_user_id`), shared with the HTTP client so every response updates it.
/// Only usernames can be resolved; numeric ids are not supported.
pub struct WebClient {
    http: Client,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
    cookies: Arc<CookieStoreMutex>,
    /// Timeline of the most recently fetched profile.
    first_page: Option<FirstPage>,
}

impl std::fmt::Debug for WebClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebClient")
            .field("base_url", &self.base_url.as_str())
            .field("max_retries", &self.max_retries)
            .field("logged_in", &self.is_logged_in())
            .field("first_page", &self.first_page.as_ref().map(|p| p.target.as_str()))
            .finish_non_exhaustive()
    }
}

impl WebClient {
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidBaseUrl`] for a malformed base URL and
    /// [`ScraperError::Http`] if the HTTP client cannot be built.
    pub fn new(settings: &HttpSettings) -> Result<Self, ScraperError> {
        let cookies = Arc::new(CookieStoreMutex::default());
        let http = client_builder(settings)?
            .cookie_provider(Arc::clone(&cookies))
            .build()?;
        Ok(Self {
            http,
            base_url: parse_base_url(&settings.base_url)?,
            max_retries: settings.max_retries,
            backoff_base_ms: settings.backoff_base_ms,
            cookies,
            first_page: None,
        })
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.cookie(SESSION_COOKIE).is_some()
    }

    /// Value of the unexpired cookie `name`, if the store holds one.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.store()
            .iter_unexpired()
            .find(|c| c.name() == name)
            .map(|c| c.value().to_owned())
    }

    fn store(&self) -> MutexGuard<'_, CookieStore> {
        self.cookies.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut req = self
            .http
            .request(method, url)
            .header("X-IG-App-ID", APP_ID)
            .header("X-Requested-With", "XMLHttpRequest")
            .header(reqwest::header::REFERER, self.base_url.as_str());
        if let Some(csrf) = self.cookie(CSRF_COOKIE) {
            req = req.header("X-CSRFToken", csrf);
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
                read_json(response, || format!("web {path} for {target}")).await
            }
        })
        .await
    }

    async fn profile_info(&self, target: &str) -> Result<WebUser, ScraperError> {
        if !is_valid_username(target) {
            return Err(ScraperError::not_found(target, "not a valid username"));
        }
        let info: ProfileInfoResponse = self
            .get_json(
                "api/v1/users/web_profile_info/",
                &[("username", target.to_owned())],
                target,
            )
            .await?;
        let user = info
            .data
            .user
            .ok_or_else(|| ScraperError::not_found(target, "user does not exist"))?;
        if user.is_private {
            return Err(ScraperError::not_found(target, "private account"));
        }
        Ok(user)
    }

    async fn timeline_page(
        &self,
        target: &str,
        user_id: &str,
        first: usize,
        after: &str,
    ) -> Result<MediaConnection, ScraperError> {
        let variables = serde_json::json!({ "id": user_id, "first": first, "after": after });
        let page: TimelineQueryResponse = self
            .get_json(
                "graphql/query/",
                &[
                    ("query_hash", TIMELINE_QUERY_HASH.to_owned()),
                    ("variables", variables.to_string()),
                ],
                target,
            )
            .await?;
        page.data
            .user
            .map(|u| u.edge_owner_to_timeline_media)
            .ok_or_else(|| ScraperError::not_found(target, "timeline query returned no user"))
    }

    /// Fetches the CSRF cookie the login form requires.
    async fn prime_csrf(&mut self) -> Result<(), ScraperError> {
        let response = self
            .request(Method::GET, self.base_url.clone())
            .send()
            .await?;
        check_response(BACKEND, "login page", response).await?;
        if self.cookie(CSRF_COOKIE).is_some() {
            Ok(())
        } else {
            Err(ScraperError::auth(BACKEND, "login page did not set a CSRF token"))
        }
    }

    async fn finish_login(&mut self, response: Response) -> Result<LoginOutcome, ScraperError> {
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ScraperError::RateLimited {
                backend: BACKEND,
                retry_after_secs: None,
            });
        }
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

        if parsed.authenticated && self.is_logged_in() {
            tracing::debug!(
                backend = %BACKEND,
                user_id = ?parsed.user_id,
                "web login accepted"
            );
            Ok(LoginOutcome::LoggedIn)
        } else if parsed.authenticated {
            Err(ScraperError::auth(BACKEND, "login accepted but no session cookie set"))
        } else {
            Err(ScraperError::auth(BACKEND, parsed.failure_reason()))
        }
    }
}

fn encrypted_password(password: &str) -> String {
    format!("#PWD_INSTAGRAM_BROWSER:0:{}:{password}", Utc::now().timestamp())
}

#[async_trait]
impl LoginFlow for WebClient {
    fn backend(&self) -> BackendId {
        BACKEND
    }

    fn restore(&mut self, state: &serde_json::Value) -> Result<(), ScraperError> {
        let malformed = |e: &dyn std::fmt::Display| {
            ScraperError::auth(BACKEND, format!("malformed session state: {e}"))
        };
        let restored: WebState =
            serde_json::from_value(state.clone()).map_err(|e| malformed(&e))?;
        // Expired cookies are dropped on load.
        let store = cookie_store::serde::json::load(restored.cookies.as_bytes())
            .map_err(|e| malformed(&e))?;
        if !store.iter_unexpired().any(|c| c.name() == SESSION_COOKIE) {
            return Err(ScraperError::auth(BACKEND, "session has no live sessionid cookie"));
        }
        *self.store() = store;
        self.first_page = None;
        Ok(())
    }

    fn clear(&mut self) {
        self.store().clear();
        self.first_page = None;
    }

    fn export(&self) -> serde_json::Value {
        let mut buf = Vec::new();
        if let Err(e) =
            cookie_store::serde::json::save_incl_expired_and_nonpersistent(&self.store(), &mut buf)
        {
            tracing::warn!(backend = %BACKEND, error = %e, "failed to serialize cookie store");
            return serde_json::Value::Null;
        }
        let state = WebState {
            cookies: String::from_utf8_lossy(&buf).into_owned(),
        };
        serde_json::to_value(&state).unwrap_or_default()
    }

    async fn probe(&self) -> Result<bool, ScraperError> {
        if !self.is_logged_in() {
            return Ok(false);
        }
        let url = join_url(&self.base_url, "api/v1/accounts/current_user/")?;
        let response = self
            .request(Method::GET, url)
            .query(&[("edit", "true")])
            .send()
            .await?;
        let response = match check_response(BACKEND, "current user", response).await {
            Ok(response) => response,
            Err(e) if e.is_authentication() => return Ok(false),
            Err(e) => return Err(e),
        };
        // Logged-out sessions are redirected to the login page.
        if response.url().path().contains("/accounts/login") {
            return Ok(false);
        }
        let body = response.text().await?;
        Ok(serde_json::from_str::<CurrentUserResponse>(&body)
            .is_ok_and(|current| current.user.is_some()))
    }

    async fn login(&mut self, credentials: &Credentials) -> Result<LoginOutcome, ScraperError> {
        self.prime_csrf().await?;
        let url = join_url(&self.base_url, "api/v1/web/accounts/login/ajax/")?;
        let form = [
            ("username", credentials.username.clone()),
            ("enc_password", encrypted_password(&credentials.password)),
            ("queryParams", "{}".to_owned()),
            ("optIntoOneTap", "false".to_owned()),
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
        let url = join_url(&self.base_url, "api/v1/web/accounts/login/ajax/two_factor/")?;
        let form = [
            ("username", credentials.username.clone()),
            ("verificationCode", code.trim().to_owned()),
            ("identifier", challenge.identifier.clone()),
            ("queryParams", "{}".to_owned()),
            ("trust_signal", "true".to_owned()),
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
impl BackendClient for WebClient {
    fn supports(&self, request: &ScrapeRequest) -> bool {
        !request.is_numeric_target()
    }

    async fn fetch_profile(&mut self, target: &str) -> Result<ProfileRecord, ScraperError> {
        self.first_page = None;
        let mut user = self.profile_info(target).await?;
        let profile = normalize_user(&user);
        self.first_page = user
            .edge_owner_to_timeline_media
            .take()
            .map(|timeline| FirstPage {
                target: target.to_owned(),
                user_id: user.id,
                timeline,
            });
        Ok(profile)
    }

    async fn fetch_posts(
        &mut self,
        target: &str,
        limit: usize,
    ) -> Result<Vec<PostRecord>, ScraperError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let first = match self.first_page.take().filter(|first| first.target == target) {
            Some(first) => first,
            None => {
                let user = self.profile_info(target).await?;
                FirstPage {
                    target: target.to_owned(),
                    user_id: user.id,
                    timeline: user.edge_owner_to_timeline_media.unwrap_or_default(),
                }
            }
        };

        let mut posts: Vec<PostRecord> = Vec::with_capacity(limit);
        let mut page = first.timeline;
        for _ in 0..MAX_PAGES {
            posts.extend(page.edges.into_iter().map(|edge| normalize_media(edge.node)));
            if posts.len() >= limit || !page.page_info.has_next_page {
                break;
            }
            let Some(cursor) = page.page_info.end_cursor else {
                break;
            };
            let want = (limit - posts.len()).min(TIMELINE_PAGE_SIZE);
            page = self
                .timeline_page(target, &first.user_id, want, &cursor)
                .await?;
        }
        posts.truncate(limit);
        Ok(posts)
    }

    async fn fetch_single_post(&mut self, shortcode: &str) -> Result<PostRecord, ScraperError> {
        let variables = serde_json::json!({ "shortcode": shortcode });
        let resp: ShortcodeQueryResponse = self
            .get_json(
                "graphql/query/",
                &[
                    ("query_hash", SHORTCODE_QUERY_HASH.to_owned()),
                    ("variables", variables.to_string()),
                ],
                shortcode,
            )
            .await?;
        resp.data
            .shortcode_media
            .map(normalize_media)
            .ok_or_else(|| ScraperError::not_found(shortcode, "post does not exist"))
    }
}
