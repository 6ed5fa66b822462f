//! Provider B: the platform's web endpoints, authenticated by cookies.

mod client;
mod normalize;
mod types;

pub use client::WebClient;

use crate::backend::SessionBackend;

/// Web client with session handling.
pub type WebBackend = SessionBackend<WebClient>;
