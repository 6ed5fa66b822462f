//! Per-request backend choice.

use igscrape_core::{BackendId, SelectionPolicy};
use rand::seq::IndexedRandom;

/// Applies a [`SelectionPolicy`] to whichever backends are usable for the
/// current request.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BackendSelector {
    policy: SelectionPolicy,
}

impl BackendSelector {
    pub(crate) fn new(policy: SelectionPolicy) -> Self {
        Self { policy }
    }

    pub(crate) fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Picks one of `eligible`.
    ///
    /// A single eligible backend is always chosen. With several, the choice
    /// is random in proportion to the policy weights; if every eligible
    /// backend has weight zero the choice falls back to uniform. Returns
    /// `None` only when `eligible` is empty.
    pub(crate) fn choose(&self, eligible: &[BackendId]) -> Option<BackendId> {
        match eligible {
            [] => None,
            [only] => Some(*only),
            _ => {
                let mut rng = rand::rng();
                eligible
                    .choose_weighted(&mut rng, |id| self.policy.weight(*id))
                    .ok()
                    .or_else(|| eligible.choose(&mut rng))
                    .copied()
            }
        }
    }
}
