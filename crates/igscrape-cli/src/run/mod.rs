//! Command handlers for `run` and `login`.
//!
//! Both build the same backend set from configuration; `run` then hands
//! them to the [`Orchestrator`](runner::Orchestrator) while `login` only
//! authenticates them.

mod runner;
mod selection;

use std::path::PathBuf;
use std::sync::Arc;

use igscrape_core::{AppConfig, BackendId, RequestMode};
use igscrape_scraper::{
    AuthContext, Backend, HttpSettings, MobileBackend, MobileClient, PromptCodeProvider,
    RateLimiter, ScraperError, SessionStore, StaticCodeProvider, VerificationCodeProvider,
    WebBackend, WebClient,
};

use crate::input::load_queue;
use crate::results::ResultStore;
use runner::Orchestrator;
use selection::BackendSelector;

/// Per-invocation overrides for a scrape run.
#[derive(Debug, Clone, Default)]
pub(crate) struct RunOptions {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub post_limit: Option<usize>,
    pub dry_run: bool,
}

fn auth_context(config: &AppConfig) -> AuthContext {
    let codes: Arc<dyn VerificationCodeProvider> = match &config.two_factor_code {
        Some(code) => Arc::new(StaticCodeProvider(code.clone())),
        None => Arc::new(PromptCodeProvider),
    };
    AuthContext {
        credentials: config.credentials.clone(),
        sessions: Arc::new(SessionStore::new(&config.session_dir)),
        codes,
    }
}

fn build_backend(
    config: &AppConfig,
    id: BackendId,
    auth: AuthContext,
) -> Result<Box<dyn Backend>, ScraperError> {
    let settings = HttpSettings::from_config(config, id);
    tracing::debug!(backend = %id, settings = ?settings, "building backend client");
    let backend: Box<dyn Backend> = match id {
        BackendId::Mobile => Box::new(MobileBackend::new(MobileClient::new(&settings)?, auth)),
        BackendId::Web => Box::new(WebBackend::new(WebClient::new(&settings)?, auth)),
    };
    Ok(backend)
}

/// Builds one backend per id, sharing a single session store and code
/// provider.
///
/// # Errors
///
/// Returns an error if an HTTP client cannot be built (for example an
/// unparsable proxy URL).
pub(crate) fn build_backends(
    config: &AppConfig,
    ids: &[BackendId],
) -> Result<Vec<Box<dyn Backend>>, ScraperError> {
    let auth = auth_context(config);
    ids.iter()
        .map(|id| build_backend(config, *id, auth.clone()))
        .collect()
}

/// Scrapes every request in the input file and checkpoints results to the
/// output file.
///
/// When `dry_run` is `true` the classified queue is printed and nothing is
/// authenticated or written.
///
/// # Errors
///
/// Returns an error if the input file is missing or unreadable, no backend
/// can authenticate, every backend loses its session mid-run, or a
/// checkpoint cannot be written. Per-request failures are recorded in the
/// output, not propagated.
pub(crate) async fn run_scrape(config: &AppConfig, options: RunOptions) -> anyhow::Result<()> {
    let input = options.input.unwrap_or_else(|| config.input_path.clone());
    let output = options.output.unwrap_or_else(|| config.output_path.clone());
    let post_limit = options.post_limit.unwrap_or(config.post_limit);

    let queue = load_queue(&input, post_limit)?;
    if queue.is_empty() {
        tracing::warn!(input = %input.display(), dropped = queue.dropped(), "no usable requests in input");
        println!("no usable requests found in {}; nothing to do", input.display());
        return Ok(());
    }

    if options.dry_run {
        println!(
            "dry-run: would process {} requests ({} rows skipped), writing to {}",
            queue.len(),
            queue.dropped(),
            output.display()
        );
        if let Some(previous) = ResultStore::load(&output)? {
            println!("  existing output with {} results would be overwritten", previous.len());
        }
        for (i, request) in queue.iter().enumerate() {
            let mode = match request.mode {
                RequestMode::ProfileWithPosts => "profile",
                RequestMode::SinglePost => "post",
            };
            println!(
                "  {:>4}. {mode:<7} {} (post limit {})",
                i + 1,
                request.target,
                request.post_limit
            );
        }
        return Ok(());
    }

    let selector = BackendSelector::new(config.selection);
    let limiter = RateLimiter::from_config(config);
    let (min_delay, max_delay) = limiter.window();
    tracing::info!(
        requests = queue.len(),
        policy = %config.selection,
        min_delay,
        max_delay,
        output = %output.display(),
        "starting scrape run"
    );

    let backends = build_backends(config, &BackendId::ALL)?;
    let mut orchestrator = Orchestrator::new(backends, selector, limiter, ResultStore::new(&output));
    let summary = orchestrator.run(queue).await?;
    tracing::info!(
        state = %orchestrator.state(),
        processed = summary.processed,
        failed = summary.failed,
        "scrape run finished"
    );

    println!(
        "run complete: {} processed, {} succeeded, {} failed; results in {}",
        summary.processed,
        summary.succeeded,
        summary.failed,
        orchestrator.store().path().display()
    );
    Ok(())
}

/// Authenticates the named backend, or every backend, and reports which
/// sessions are now cached.
///
/// # Errors
///
/// Returns an error if a client cannot be built or no backend
/// authenticates.
pub(crate) async fn run_login(config: &AppConfig, backend: Option<BackendId>) -> anyhow::Result<()> {
    let ids: Vec<BackendId> = backend.map_or_else(|| BackendId::ALL.to_vec(), |id| vec![id]);
    let backends = build_backends(config, &ids)?;

    let mut ready = 0usize;
    for mut backend in backends {
        let id = backend.id();
        match backend.authenticate().await {
            Ok(()) => {
                ready += 1;
                println!("{id}: session ready ({})", config.session_dir.display());
            }
            Err(e) => {
                tracing::error!(backend = %id, error = %e, "login failed");
                println!("{id}: login failed: {e}");
            }
        }
    }

    if ready == 0 {
        anyhow::bail!("no backend could log in");
    }
    Ok(())
}
