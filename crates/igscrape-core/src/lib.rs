//! Backend-neutral building blocks for igscrape: the normalized data model,
//! input row classification, configuration and crash-safe JSON persistence.

mod app_config;
mod config;
pub mod persist;
pub mod requests;
pub mod types;

use thiserror::Error;

pub use app_config::{AppConfig, Credentials, SelectionPolicy};
pub use config::{
    load_app_config, load_app_config_from_env, DEFAULT_MOBILE_BASE_URL, DEFAULT_WEB_BASE_URL,
};
pub use persist::{read_json, stage_json, write_json_atomic, PersistError, StagedFile};
pub use requests::{classify_record, extract_shortcode, RequestParseError, RequestQueue};
pub use types::{
    BackendId, ErrorDescriptor, ErrorKind, PostRecord, ProfileRecord, RequestMode, ScrapeRequest,
    ScrapeResult,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
