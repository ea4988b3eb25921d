//! Caller-supplied knobs for a `verify` run.
//!
//! Mirrors the builder shape this codebase already uses for prune options:
//! a `Default` struct with chainable `with_*` setters.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::entry::Entry;

/// Bound on parallel integrity checks, capping both per-bucket verification
/// fan-out and content-GC fan-out.
pub const DEFAULT_CONCURRENCY: usize = 20;

pub type EntryFilter = Arc<dyn Fn(&Entry) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct VerifyOptions {
    pub(crate) filter: Option<EntryFilter>,
    pub(crate) concurrency: usize,
    pub(crate) cancel: Option<CancellationToken>,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl VerifyOptions {
    pub fn new() -> Self {
        Self {
            filter: None,
            concurrency: DEFAULT_CONCURRENCY,
            cancel: None,
        }
    }

    /// Called once per parsed bucket entry; a falsy return removes the
    /// entry from the rebuilt index.
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Entry) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, |c| c.is_cancelled())
    }

    pub(crate) fn concurrency(&self) -> usize {
        if self.concurrency == 0 {
            DEFAULT_CONCURRENCY
        } else {
            self.concurrency
        }
    }

    pub(crate) fn apply_filter(&self, entry: &Entry) -> bool {
        match &self.filter {
            Some(f) => f(entry),
            None => true,
        }
    }
}
