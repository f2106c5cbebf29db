//! Cancellation and progress primitives shared by every long-running
//! operation.
//!
//! The core assumes no cooperative async/await scheduling internally: CPU-
//! bound work (the eigensolver, PageRank, label propagation, betweenness)
//! runs to completion between explicit poll points. [`CancelToken`] is the
//! mechanism those poll points use; [`Deadline`] lets the adapter layer
//! express a wall-clock budget in the same terms without the core knowing
//! about wall-clock time itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cooperative cancellation flag, cheaply cloneable and shareable across
/// threads.
///
/// Polled (a) at each outer loop of an iterative solver, (b) between BFS
/// hops in `DiscoveryEngine`, (c) between linkage merges when reconstructing
/// the dendrogram. On cancellation the operation returns
/// `CoreError::Cancelled` without mutating shared state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn none() -> Self {
        Self::default()
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// True once `cancel` has been called on this token or any clone of it.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A wall-clock deadline. The core treats deadline expiration identically
/// to explicit cancellation ("Timeouts").
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    /// A deadline that has already passed.
    pub fn expired() -> Self {
        Self {
            at: Instant::now() - Duration::from_secs(1),
        }
    }

    /// A deadline far enough in the future it will not practically expire.
    pub fn never() -> Self {
        Self {
            at: Instant::now() + Duration::from_secs(60 * 60 * 24 * 365),
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::never()
    }
}

/// A combined cancellation check: either the token was cancelled, or the
/// deadline has expired. Call sites poll this once per loop iteration
/// rather than the two primitives separately.
#[derive(Debug, Clone)]
pub struct CancelGuard {
    token: CancelToken,
    deadline: Deadline,
}

impl CancelGuard {
    pub fn new(token: CancelToken, deadline: Deadline) -> Self {
        Self { token, deadline }
    }

    /// True if the operation carrying this guard should stop now.
    pub fn should_stop(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_expired()
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }
}

impl Default for CancelGuard {
    fn default() -> Self {
        Self::new(CancelToken::none(), Deadline::never())
    }
}

/// Progress reported by a long (>1s) operation. The callback receives a
/// monotonically increasing `completed` out of an optional `total`
/// (`None` when the total is not known in advance, e.g. solver iterations
/// before convergence).
pub type ProgressCallback<'a> = dyn FnMut(ProgressUpdate) + Send + 'a;

/// One progress tick.
#[derive(Debug, Clone, Copy)]
pub struct ProgressUpdate {
    pub stage: &'static str,
    pub completed: u64,
    pub total: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_propagates_across_clones() {
        let token = CancelToken::none();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn expired_deadline_reports_expired() {
        assert!(Deadline::expired().is_expired());
        assert!(!Deadline::never().is_expired());
    }

    #[test]
    fn guard_stops_on_either_signal() {
        let guard = CancelGuard::new(CancelToken::none(), Deadline::expired());
        assert!(guard.should_stop());

        let token = CancelToken::none();
        let guard = CancelGuard::new(token.clone(), Deadline::never());
        assert!(!guard.should_stop());
        token.cancel();
        assert!(guard.should_stop());
    }
}
