//! Provider A: the platform's private mobile API.

mod client;
mod normalize;
mod shortcode;
mod types;

pub use client::MobileClient;

use crate::backend::SessionBackend;

/// Mobile client with session handling.
pub type MobileBackend = SessionBackend<MobileClient>;
