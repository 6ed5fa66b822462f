//! Platform backends for igscrape.
//!
//! Two clients reach the same data through different surfaces: [`MobileClient`]
//! speaks the private mobile API and [`WebClient`] the browser endpoints. Both
//! sit behind the [`Backend`] trait via [`SessionBackend`], which restores,
//! establishes and renews their sessions.

pub mod auth;
pub mod backend;
pub mod error;
mod http;
pub mod mobile;
mod normalize;
pub mod pacing;
mod retry;
pub mod session;
pub mod web;

pub use auth::{
    authenticate, login_fresh, AuthContext, LoginFlow, LoginOutcome, PromptCodeProvider,
    StaticCodeProvider, TwoFactorChallenge, VerificationCodeProvider,
};
pub use backend::{Backend, BackendClient, SessionBackend};
pub use error::ScraperError;
pub use http::HttpSettings;
pub use mobile::{MobileBackend, MobileClient};
pub use pacing::RateLimiter;
pub use session::{Session, SessionStore};
pub use web::{WebBackend, WebClient};
