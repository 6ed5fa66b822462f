use std::path::PathBuf;

use crate::app_config::{AppConfig, Credentials, SelectionPolicy};
use crate::types::BackendId;
use crate::ConfigError;

pub const DEFAULT_MOBILE_BASE_URL: &str = "https://i.instagram.com/api/v1/";
pub const DEFAULT_WEB_BASE_URL: &str = "https://www.instagram.com/";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Parsing and validation are decoupled from the real environment so tests can
/// drive them with a plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .trim()
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .trim()
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .trim()
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_secs = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let value = or_default(var, default)
            .trim()
            .parse::<f64>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if !value.is_finite() || value < 0.0 {
            return Err(invalid(var, format!("must be a non-negative number, got {value}")));
        }
        Ok(value)
    };

    let username = require("IG_USERNAME")?;
    let password = require("IG_PASSWORD")?;

    let proxies = parse_proxies(&or_default("IGSCRAPE_PROXIES", ""));

    let min_delay_secs = parse_secs("IGSCRAPE_MIN_DELAY_SECS", "3")?;
    let max_delay_secs = parse_secs("IGSCRAPE_MAX_DELAY_SECS", "7")?;
    if min_delay_secs > max_delay_secs {
        return Err(invalid(
            "IGSCRAPE_MIN_DELAY_SECS",
            format!("minimum delay {min_delay_secs}s exceeds maximum delay {max_delay_secs}s"),
        ));
    }

    let post_limit = parse_usize("IGSCRAPE_POST_LIMIT", "5")?;
    let input_path = PathBuf::from(or_default(
        "IGSCRAPE_INPUT_PATH",
        "data/media_data/items_rows.csv",
    ));
    let output_path = PathBuf::from(or_default(
        "IGSCRAPE_OUTPUT_PATH",
        "data/results/instagram_media.json",
    ));
    let session_dir = PathBuf::from(or_default("IGSCRAPE_SESSION_DIR", "data/sessions"));

    let request_timeout_secs = parse_u64("IGSCRAPE_REQUEST_TIMEOUT_SECS", "30")?;
    let max_retries = parse_u32("IGSCRAPE_MAX_RETRIES", "2")?;
    let retry_backoff_base_ms = parse_u64("IGSCRAPE_RETRY_BACKOFF_BASE_MS", "1000")?;

    let selection = parse_selection(&or_default("IGSCRAPE_SELECTION", "uniform"))?;
    let two_factor_code = lookup("IGSCRAPE_2FA_CODE")
        .ok()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    let log_level = or_default("IGSCRAPE_LOG_LEVEL", "info");
    let mobile_base_url = or_default("IGSCRAPE_MOBILE_BASE_URL", DEFAULT_MOBILE_BASE_URL);
    let web_base_url = or_default("IGSCRAPE_WEB_BASE_URL", DEFAULT_WEB_BASE_URL);

    Ok(AppConfig {
        credentials: Credentials { username, password },
        proxies,
        min_delay_secs,
        max_delay_secs,
        post_limit,
        input_path,
        output_path,
        session_dir,
        request_timeout_secs,
        max_retries,
        retry_backoff_base_ms,
        selection,
        two_factor_code,
        log_level,
        mobile_base_url,
        web_base_url,
    })
}

/// Split a comma-separated proxy list, dropping blank entries.
fn parse_proxies(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `IGSCRAPE_SELECTION`: `uniform`, a backend name, or
/// `weighted:<mobile>:<web>`.
fn parse_selection(raw: &str) -> Result<SelectionPolicy, ConfigError> {
    const VAR: &str = "IGSCRAPE_SELECTION";
    let invalid = |reason: String| ConfigError::InvalidEnvVar {
        var: VAR.to_string(),
        reason,
    };

    let raw = raw.trim().to_ascii_lowercase();
    if raw == "uniform" || raw == "random" {
        return Ok(SelectionPolicy::Uniform);
    }

    if let Some(weights) = raw.strip_prefix("weighted:") {
        let (mobile, web) = weights
            .split_once(':')
            .ok_or_else(|| invalid(format!("expected weighted:<mobile>:<web>, got \"{raw}\"")))?;
        let mobile = mobile
            .trim()
            .parse::<u32>()
            .map_err(|e| invalid(format!("mobile weight: {e}")))?;
        let web = web
            .trim()
            .parse::<u32>()
            .map_err(|e| invalid(format!("web weight: {e}")))?;
        if mobile == 0 && web == 0 {
            return Err(invalid("at least one weight must be non-zero".to_string()));
        }
        return Ok(SelectionPolicy::Weighted { mobile, web });
    }

    raw.parse::<BackendId>()
        .map(SelectionPolicy::Fixed)
        .map_err(invalid)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
