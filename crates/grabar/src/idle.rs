//! Application-idle waiting.
//!
//! Steps end with a settle wait: the page is considered idle once no tracked
//! request has been in flight for a quiet window. Request tracking is a plain
//! counter fed by response interceptors; the wait itself polls the counter and
//! restarts its quiet window whenever traffic reappears. Hitting the overall
//! timeout is a normal outcome, not an error; the step proceeds either way.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Overall idle-wait timeout (10 seconds)
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 10_000;

/// Quiet window with no in-flight requests (500ms)
pub const IDLE_QUIET_WINDOW_MS: u64 = 500;

/// Polling interval (50ms)
pub const IDLE_POLL_INTERVAL_MS: u64 = 50;

// =============================================================================
// REQUEST TRACKING
// =============================================================================

/// Shared in-flight request counter.
///
/// Cloned into request/response interceptors. The decrement floors at zero so
/// a response observed without its request (interceptor attached mid-flight)
/// cannot wedge the counter.
#[derive(Debug, Clone, Default)]
pub struct PendingRequests {
    in_flight: Arc<AtomicUsize>,
}

impl PendingRequests {
    /// Fresh counter with nothing in flight.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A request started.
    pub fn request_started(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    /// A request finished, failed, or was aborted.
    pub fn request_finished(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                Some(v.saturating_sub(1))
            });
    }

    /// Current in-flight count.
    #[must_use]
    pub fn count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// True when nothing is in flight.
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.count() == 0
    }
}

// =============================================================================
// IDLE WAIT
// =============================================================================

/// Tuning knobs for [`wait_for_app_idle`].
#[derive(Debug, Clone)]
pub struct IdleOptions {
    /// Overall deadline in milliseconds
    pub timeout_ms: u64,
    /// Required quiet window in milliseconds
    pub quiet_window_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for IdleOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            quiet_window_ms: IDLE_QUIET_WINDOW_MS,
            poll_interval_ms: IDLE_POLL_INTERVAL_MS,
        }
    }
}

impl IdleOptions {
    /// Defaults: 10s timeout, 500ms quiet window, 50ms poll.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the overall deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the required quiet window.
    #[must_use]
    pub const fn with_quiet_window(mut self, quiet_window_ms: u64) -> Self {
        self.quiet_window_ms = quiet_window_ms;
        self
    }
}

/// How an idle wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleOutcome {
    /// The quiet window elapsed with no in-flight requests
    Idle,
    /// The overall deadline hit first; the step continues regardless
    TimedOut,
}

/// Wait until the page has had no in-flight requests for the quiet window.
///
/// Infallible by design: a page that never settles yields
/// [`IdleOutcome::TimedOut`] after the deadline.
pub async fn wait_for_app_idle(pending: &PendingRequests, options: &IdleOptions) -> IdleOutcome {
    let deadline = Instant::now() + Duration::from_millis(options.timeout_ms);
    let quiet_window = Duration::from_millis(options.quiet_window_ms);
    let poll = Duration::from_millis(options.poll_interval_ms);

    let mut quiet_since: Option<Instant> = None;

    loop {
        let now = Instant::now();
        if pending.is_quiet() {
            let since = *quiet_since.get_or_insert(now);
            if now.duration_since(since) >= quiet_window {
                return IdleOutcome::Idle;
            }
        } else {
            // Traffic resets the window.
            quiet_since = None;
        }

        if now >= deadline {
            tracing::debug!(
                in_flight = pending.count(),
                timeout_ms = options.timeout_ms,
                "idle wait hit deadline, continuing"
            );
            return IdleOutcome::TimedOut;
        }

        tokio::time::sleep(poll).await;
    }
}
