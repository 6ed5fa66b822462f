use std::path::PathBuf;

use crate::types::BackendId;

/// How the orchestrator picks a backend for each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Uniform random choice among available backends.
    Uniform,
    /// Always the named backend.
    Fixed(BackendId),
    /// Random choice proportional to the per-backend weights.
    Weighted { mobile: u32, web: u32 },
}

impl SelectionPolicy {
    /// Backends this policy can ever select. Backends outside this set are
    /// never authenticated.
    #[must_use]
    pub fn candidates(self) -> Vec<BackendId> {
        match self {
            SelectionPolicy::Uniform => BackendId::ALL.to_vec(),
            SelectionPolicy::Fixed(id) => vec![id],
            SelectionPolicy::Weighted { mobile, web } => {
                let mut ids = Vec::with_capacity(2);
                if mobile > 0 {
                    ids.push(BackendId::Mobile);
                }
                if web > 0 {
                    ids.push(BackendId::Web);
                }
                ids
            }
        }
    }

    /// Relative weight of `id` under this policy.
    #[must_use]
    pub fn weight(self, id: BackendId) -> u32 {
        match self {
            SelectionPolicy::Uniform => 1,
            SelectionPolicy::Fixed(fixed) => u32::from(fixed == id),
            SelectionPolicy::Weighted { mobile, web } => match id {
                BackendId::Mobile => mobile,
                BackendId::Web => web,
            },
        }
    }
}

impl std::fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionPolicy::Uniform => write!(f, "uniform"),
            SelectionPolicy::Fixed(id) => write!(f, "{id}"),
            SelectionPolicy::Weighted { mobile, web } => write!(f, "weighted:{mobile}:{web}"),
        }
    }
}

/// Account credentials shared by both backends.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub credentials: Credentials,
    pub proxies: Vec<String>,
    pub min_delay_secs: f64,
    pub max_delay_secs: f64,
    pub post_limit: usize,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub session_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub selection: SelectionPolicy,
    pub two_factor_code: Option<String>,
    pub log_level: String,
    pub mobile_base_url: String,
    pub web_base_url: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("credentials", &self.credentials)
            .field("proxies", &format_args!("[{} redacted]", self.proxies.len()))
            .field("min_delay_secs", &self.min_delay_secs)
            .field("max_delay_secs", &self.max_delay_secs)
            .field("post_limit", &self.post_limit)
            .field("input_path", &self.input_path)
            .field("output_path", &self.output_path)
            .field("session_dir", &self.session_dir)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("selection", &self.selection)
            .field(
                "two_factor_code",
                &self.two_factor_code.as_ref().map(|_| "[redacted]"),
            )
            .field("log_level", &self.log_level)
            .field("mobile_base_url", &self.mobile_base_url)
            .field("web_base_url", &self.web_base_url)
            .finish()
    }
}
