//! The run state machine: authenticate backends, drain the queue one
//! request at a time, checkpoint after every result.

use std::fmt;

use igscrape_core::{
    BackendId, ErrorDescriptor, ErrorKind, PersistError, PostRecord, ProfileRecord, RequestMode,
    RequestQueue, ScrapeRequest, ScrapeResult,
};
use igscrape_scraper::{Backend, RateLimiter, ScraperError};
use thiserror::Error;

use super::selection::BackendSelector;
use crate::results::ResultStore;

/// Fatal run outcomes. Per-request failures are recorded in the results and
/// never surface here.
#[derive(Debug, Error)]
pub(crate) enum RunError {
    #[error("no backend could authenticate; nothing was processed")]
    NoBackendAvailable,

    #[error("every backend lost its session after {processed} processed requests")]
    AuthenticationExhausted { processed: usize },

    #[error("checkpoint write failed: {0}")]
    Persistence(#[from] PersistError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunState {
    Idle,
    SessionsReady,
    Processing,
    Draining,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::SessionsReady => "sessions_ready",
            RunState::Processing => "processing",
            RunState::Draining => "draining",
            RunState::Done => "done",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotStatus {
    Pending,
    Ready,
    /// Never selectable under the configured policy, so never authenticated.
    Deferred,
    /// Authentication failed at startup or could not be renewed mid-run.
    Retired,
}

struct Slot {
    backend: Box<dyn Backend>,
    status: SlotStatus,
}

/// Counts reported at the end of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RunSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// What happened to a single dequeued request.
enum ItemOutcome {
    Recorded(ScrapeResult),
    /// No backend is left with a usable session; the request is not
    /// recorded.
    Exhausted,
}

pub(crate) struct Orchestrator {
    slots: Vec<Slot>,
    selector: BackendSelector,
    limiter: RateLimiter,
    store: ResultStore,
    state: RunState,
}

impl Orchestrator {
    pub(crate) fn new(
        backends: Vec<Box<dyn Backend>>,
        selector: BackendSelector,
        limiter: RateLimiter,
        store: ResultStore,
    ) -> Self {
        let slots = backends
            .into_iter()
            .map(|backend| Slot {
                backend,
                status: SlotStatus::Pending,
            })
            .collect();
        Self {
            slots,
            selector,
            limiter,
            store,
            state: RunState::Idle,
        }
    }

    pub(crate) fn state(&self) -> RunState {
        self.state
    }

    pub(crate) fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Backends that currently hold a usable session.
    pub(crate) fn ready_backends(&self) -> Vec<BackendId> {
        self.slots
            .iter()
            .filter(|s| s.status == SlotStatus::Ready)
            .map(|s| s.backend.id())
            .collect()
    }

    fn transition(&mut self, next: RunState) {
        tracing::info!(from = %self.state, to = %next, "run state");
        self.state = next;
    }

    /// Authenticates every backend the selection policy can choose.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::NoBackendAvailable`] if none of them succeeds; the
    /// state stays [`RunState::Idle`] and nothing is written.
    pub(crate) async fn prepare_sessions(&mut self) -> Result<(), RunError> {
        let candidates = self.selector.policy().candidates();
        for slot in &mut self.slots {
            let backend = slot.backend.id();
            if !candidates.contains(&backend) {
                tracing::info!(%backend, policy = %self.selector.policy(), "backend not selectable; skipping authentication");
                slot.status = SlotStatus::Deferred;
                continue;
            }
            match slot.backend.authenticate().await {
                Ok(()) => {
                    tracing::info!(%backend, "backend ready");
                    slot.status = SlotStatus::Ready;
                }
                Err(e) => {
                    tracing::error!(%backend, error = %e, "backend authentication failed");
                    slot.status = SlotStatus::Retired;
                }
            }
        }

        if self.ready_backends().is_empty() {
            return Err(RunError::NoBackendAvailable);
        }
        self.transition(RunState::SessionsReady);
        Ok(())
    }

    /// Runs the whole queue and returns the final counts.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::NoBackendAvailable`] before any processing if no
    /// backend authenticates, [`RunError::AuthenticationExhausted`] if every
    /// backend loses its session mid-run (after a final checkpoint of the
    /// results so far), and [`RunError::Persistence`] if a checkpoint fails.
    pub(crate) async fn run(&mut self, mut queue: RequestQueue) -> Result<RunSummary, RunError> {
        if self.state == RunState::Idle {
            self.prepare_sessions().await?;
        }
        self.transition(RunState::Processing);

        let total = queue.len();
        let mut exhausted = false;
        while let Some(request) = queue.pop() {
            let position = self.store.len() + 1;
            match self.process(request).await {
                ItemOutcome::Recorded(result) => {
                    log_outcome(&result, position, total);
                    self.store.append_and_checkpoint(result)?;
                    self.limiter.pace().await;
                }
                ItemOutcome::Exhausted => {
                    tracing::error!(
                        processed = self.store.len(),
                        remaining = queue.len() + 1,
                        "no backend left with a usable session; stopping"
                    );
                    exhausted = true;
                    break;
                }
            }
        }

        self.transition(RunState::Draining);
        self.store.checkpoint()?;

        let processed = self.store.len();
        if exhausted {
            return Err(RunError::AuthenticationExhausted { processed });
        }

        self.transition(RunState::Done);
        let succeeded = self
            .store
            .results()
            .iter()
            .filter(|r| r.is_success())
            .count();
        Ok(RunSummary {
            processed,
            succeeded,
            failed: processed - succeeded,
        })
    }

    /// Paces, then serves `request` from a selected backend. A backend that
    /// reports lost authentication is retired and the request moves on to
    /// another one.
    async fn process(&mut self, request: ScrapeRequest) -> ItemOutcome {
        self.limiter.pace().await;
        loop {
            if self.ready_backends().is_empty() {
                return ItemOutcome::Exhausted;
            }

            let eligible: Vec<BackendId> = self
                .slots
                .iter()
                .filter(|s| s.status == SlotStatus::Ready && s.backend.supports(&request))
                .map(|s| s.backend.id())
                .collect();
            let Some(backend) = self.selector.choose(&eligible) else {
                return ItemOutcome::Recorded(ScrapeResult::failure(
                    request,
                    None,
                    ErrorDescriptor {
                        kind: ErrorKind::NotFound,
                        message: "no available backend can look up this target".to_owned(),
                    },
                ));
            };
            let Some(slot) = self.slots.iter_mut().find(|s| s.backend.id() == backend) else {
                return ItemOutcome::Exhausted;
            };

            tracing::debug!(%backend, target = %request.target, mode = ?request.mode, "dispatching request");
            match fetch(slot.backend.as_mut(), &request).await {
                Ok((profile, posts)) => {
                    return ItemOutcome::Recorded(ScrapeResult::success(
                        request, backend, profile, posts,
                    ));
                }
                Err(e) if e.is_authentication() => {
                    tracing::error!(%backend, error = %e, "backend retired for the rest of the run");
                    slot.status = SlotStatus::Retired;
                    self.limiter.pace().await;
                }
                Err(e) => {
                    return ItemOutcome::Recorded(ScrapeResult::failure(
                        request,
                        Some(backend),
                        e.to_descriptor(),
                    ));
                }
            }
        }
    }
}

async fn fetch(
    backend: &mut dyn Backend,
    request: &ScrapeRequest,
) -> Result<(Option<ProfileRecord>, Vec<PostRecord>), ScraperError> {
    match request.mode {
        RequestMode::SinglePost => {
            let post = backend.fetch_single_post(&request.target).await?;
            Ok((None, vec![post]))
        }
        RequestMode::ProfileWithPosts => {
            let profile = backend.fetch_profile(&request.target).await?;
            let posts = if request.post_limit == 0 {
                Vec::new()
            } else {
                backend
                    .fetch_posts(&request.target, request.post_limit)
                    .await?
            };
            Ok((Some(profile), posts))
        }
    }
}

fn log_outcome(result: &ScrapeResult, position: usize, total: usize) {
    let target = result.request.target.as_str();
    let backend = result.backend_used.map_or("none", BackendId::as_str);
    match &result.error {
        None => tracing::info!(
            position,
            total,
            target,
            backend,
            posts = result.posts.len(),
            "request succeeded"
        ),
        Some(error) => tracing::warn!(
            position,
            total,
            target,
            backend,
            kind = %error.kind,
            error = %error.message,
            "request failed"
        ),
    }
}

#[cfg(test)]
#[path = "runner_test.rs"]
mod tests;
