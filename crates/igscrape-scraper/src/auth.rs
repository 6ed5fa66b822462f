//! Login orchestration shared by both backends.
//!
//! [`authenticate`] restores a cached session when a cheap authenticated
//! probe still succeeds, otherwise logs in with the configured credentials.
//! A second-factor challenge suspends the flow until the configured
//! [`VerificationCodeProvider`] hands back a code.

use std::io::{BufRead, Write};
use std::sync::Arc;

use async_trait::async_trait;
use igscrape_core::{BackendId, Credentials};

use crate::error::ScraperError;
use crate::session::{Session, SessionStore};

/// Second-factor challenge returned by a login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwoFactorChallenge {
    pub identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    LoggedIn,
    TwoFactorRequired(TwoFactorChallenge),
}

/// Login primitives a backend client exposes to [`authenticate`].
#[async_trait]
pub trait LoginFlow: Send {
    fn backend(&self) -> BackendId;

    /// Loads previously exported client state.
    ///
    /// # Errors
    ///
    /// Returns an error if `state` does not have the client's shape.
    fn restore(&mut self, state: &serde_json::Value) -> Result<(), ScraperError>;

    /// Drops any authentication state held by the client.
    fn clear(&mut self);

    /// Serializes the client state for the session store.
    fn export(&self) -> serde_json::Value;

    /// Cheap authenticated request. `Ok(false)` means the session is not
    /// (or no longer) logged in.
    async fn probe(&self) -> Result<bool, ScraperError>;

    async fn login(&mut self, credentials: &Credentials) -> Result<LoginOutcome, ScraperError>;

    async fn complete_two_factor(
        &mut self,
        credentials: &Credentials,
        challenge: &TwoFactorChallenge,
        code: &str,
    ) -> Result<(), ScraperError>;
}

/// Source of second-factor verification codes.
pub trait VerificationCodeProvider: Send + Sync {
    /// Blocks until a code for `backend` is available.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Authentication`] if no code can be obtained.
    fn verification_code(&self, backend: BackendId) -> Result<String, ScraperError>;
}

/// Reads the code from standard input.
#[derive(Debug, Default)]
pub struct PromptCodeProvider;

impl VerificationCodeProvider for PromptCodeProvider {
    fn verification_code(&self, backend: BackendId) -> Result<String, ScraperError> {
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "[{backend}] enter the 2FA code: ");
        let _ = stderr.flush();

        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| ScraperError::auth(backend, format!("could not read 2FA code: {e}")))?;
        let code = line.trim().to_owned();
        if code.is_empty() {
            return Err(ScraperError::auth(backend, "no 2FA code entered"));
        }
        Ok(code)
    }
}

/// Hands out a code supplied ahead of time (for example from configuration).
#[derive(Debug, Clone)]
pub struct StaticCodeProvider(pub String);

impl VerificationCodeProvider for StaticCodeProvider {
    fn verification_code(&self, _backend: BackendId) -> Result<String, ScraperError> {
        Ok(self.0.clone())
    }
}

/// Everything a backend needs to (re-)authenticate.
#[derive(Clone)]
pub struct AuthContext {
    pub credentials: Credentials,
    pub sessions: Arc<SessionStore>,
    pub codes: Arc<dyn VerificationCodeProvider>,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("credentials", &self.credentials)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

/// Restores or establishes a logged-in session for `flow`.
///
/// # Errors
///
/// Returns [`ScraperError::Authentication`] if the login (including a
/// second-factor retry) does not succeed, whatever the underlying cause.
pub async fn authenticate<F>(flow: &mut F, ctx: &AuthContext) -> Result<Session, ScraperError>
where
    F: LoginFlow + ?Sized,
{
    let backend = flow.backend();
    let account = ctx.credentials.username.as_str();

    if let Some(cached) = ctx.sessions.load(backend, account) {
        if let Some(session) = try_restore(flow, cached).await {
            tracing::info!(%backend, account, "restored cached session");
            return Ok(session);
        }
        flow.clear();
    }

    login_fresh(flow, ctx).await
}

/// Logs in with the configured credentials, ignoring any cached session,
/// and persists the new session.
///
/// # Errors
///
/// Returns [`ScraperError::Authentication`] if the login fails.
pub async fn login_fresh<F>(flow: &mut F, ctx: &AuthContext) -> Result<Session, ScraperError>
where
    F: LoginFlow + ?Sized,
{
    let backend = flow.backend();
    let account = ctx.credentials.username.as_str();

    tracing::info!(%backend, account, "logging in");
    let outcome = flow
        .login(&ctx.credentials)
        .await
        .map_err(|e| into_auth_error(backend, e))?;

    if let LoginOutcome::TwoFactorRequired(challenge) = outcome {
        tracing::warn!(%backend, account, "two-factor verification required");
        let code = ctx.codes.verification_code(backend)?;
        flow.complete_two_factor(&ctx.credentials, &challenge, &code)
            .await
            .map_err(|e| into_auth_error(backend, e))?;
        tracing::info!(%backend, account, "two-factor login succeeded");
    } else {
        tracing::info!(%backend, account, "login succeeded");
    }

    let session = Session::new(backend, account, flow.export());
    if let Err(e) = ctx.sessions.save(&session) {
        tracing::warn!(%backend, error = %e, "could not persist session; next run will log in again");
    }
    Ok(session)
}

async fn try_restore<F>(flow: &mut F, cached: Session) -> Option<Session>
where
    F: LoginFlow + ?Sized,
{
    let backend = flow.backend();
    if let Err(e) = flow.restore(&cached.credentials) {
        tracing::warn!(%backend, error = %e, "cached session has an unexpected shape");
        return None;
    }
    match flow.probe().await {
        Ok(true) => Some(Session {
            valid: true,
            ..cached
        }),
        Ok(false) => {
            tracing::info!(%backend, "cached session is no longer logged in");
            None
        }
        Err(e) => {
            tracing::warn!(%backend, error = %e, "session probe failed");
            None
        }
    }
}

fn into_auth_error(backend: BackendId, err: ScraperError) -> ScraperError {
    match err {
        ScraperError::Authentication { .. } => err,
        other => ScraperError::auth(backend, other.to_string()),
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
