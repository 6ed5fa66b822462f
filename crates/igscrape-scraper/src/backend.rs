//! The capability interface the orchestrator drives, and the session-aware
//! adapter that turns a raw platform client into a [`Backend`].

use async_trait::async_trait;
use igscrape_core::{BackendId, PostRecord, ProfileRecord, ScrapeRequest};

use crate::auth::{authenticate, login_fresh, AuthContext, LoginFlow};
use crate::error::ScraperError;
use crate::session::Session;

/// One way of retrieving profile and post data.
///
/// Implementations own their authenticated session. Every fetch returns
/// normalized records or a [`ScraperError`] whose [`ScraperError::kind`]
/// places it in the shared taxonomy.
#[async_trait]
pub trait Backend: Send {
    fn id(&self) -> BackendId;

    /// Whether this backend can serve `request` at all.
    fn supports(&self, request: &ScrapeRequest) -> bool {
        let _ = request;
        true
    }

    /// Restores or establishes a session.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Authentication`] if no session could be
    /// established.
    async fn authenticate(&mut self) -> Result<(), ScraperError>;

    async fn fetch_profile(&mut self, target: &str) -> Result<ProfileRecord, ScraperError>;

    /// Most recent posts of `target`, newest first, at most `limit`.
    async fn fetch_posts(
        &mut self,
        target: &str,
        limit: usize,
    ) -> Result<Vec<PostRecord>, ScraperError>;

    async fn fetch_single_post(&mut self, shortcode: &str) -> Result<PostRecord, ScraperError>;
}

/// Raw platform client: login primitives plus unauthenticated-by-contract
/// fetch calls. [`SessionBackend`] adds session handling on top.
#[async_trait]
pub trait BackendClient: LoginFlow {
    fn supports(&self, request: &ScrapeRequest) -> bool {
        let _ = request;
        true
    }

    async fn fetch_profile(&mut self, target: &str) -> Result<ProfileRecord, ScraperError>;

    async fn fetch_posts(
        &mut self,
        target: &str,
        limit: usize,
    ) -> Result<Vec<PostRecord>, ScraperError>;

    async fn fetch_single_post(&mut self, shortcode: &str) -> Result<PostRecord, ScraperError>;
}

/// Wraps a [`BackendClient`] with session restore, login and a single
/// re-login when a call reports lost authentication.
#[derive(Debug)]
pub struct SessionBackend<C> {
    client: C,
    auth: AuthContext,
    session: Option<Session>,
}

impl<C: BackendClient> SessionBackend<C> {
    pub fn new(client: C, auth: AuthContext) -> Self {
        Self {
            client,
            auth,
            session: None,
        }
    }

    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    async fn ensure_session(&mut self) -> Result<(), ScraperError> {
        if self.session.as_ref().is_some_and(|s| s.valid) {
            return Ok(());
        }
        let session = authenticate(&mut self.client, &self.auth).await?;
        self.session = Some(session);
        Ok(())
    }

    async fn relogin(&mut self, cause: &ScraperError) -> Result<(), ScraperError> {
        let backend = self.client.backend();
        tracing::warn!(%backend, error = %cause, "session rejected; logging in again");
        if let Some(session) = self.session.as_mut() {
            session.invalidate();
        }
        self.client.clear();
        match login_fresh(&mut self.client, &self.auth).await {
            Ok(session) => {
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                tracing::error!(%backend, error = %e, "re-login failed");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl<C: BackendClient> Backend for SessionBackend<C> {
    fn id(&self) -> BackendId {
        self.client.backend()
    }

    fn supports(&self, request: &ScrapeRequest) -> bool {
        self.client.supports(request)
    }

    async fn authenticate(&mut self) -> Result<(), ScraperError> {
        self.ensure_session().await
    }

    async fn fetch_profile(&mut self, target: &str) -> Result<ProfileRecord, ScraperError> {
        self.ensure_session().await?;
        match self.client.fetch_profile(target).await {
            Err(e) if e.is_authentication() => {
                self.relogin(&e).await?;
                self.client.fetch_profile(target).await
            }
            other => other,
        }
    }

    async fn fetch_posts(
        &mut self,
        target: &str,
        limit: usize,
    ) -> Result<Vec<PostRecord>, ScraperError> {
        self.ensure_session().await?;
        match self.client.fetch_posts(target, limit).await {
            Err(e) if e.is_authentication() => {
                self.relogin(&e).await?;
                self.client.fetch_posts(target, limit).await
            }
            other => other,
        }
    }

    async fn fetch_single_post(&mut self, shortcode: &str) -> Result<PostRecord, ScraperError> {
        self.ensure_session().await?;
        match self.client.fetch_single_post(shortcode).await {
            Err(e) if e.is_authentication() => {
                self.relogin(&e).await?;
                self.client.fetch_single_post(shortcode).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
#[path = "backend_test.rs"]
mod tests;
