//! Core rate limiter implementation.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::counter::{TimeWindow, WindowCounter};
use crate::config::LimiterConfig;
use crate::error::{CrptError, Result};

/// What `acquire` does when the current window is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdmissionPolicy {
    /// Suspend the caller until the next window opens
    #[default]
    Block,
    /// Fail immediately with `CrptError::RateLimitExceeded`
    Reject,
}

impl FromStr for AdmissionPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "block" => Ok(AdmissionPolicy::Block),
            "reject" => Ok(AdmissionPolicy::Reject),
            other => Err(format!("unknown admission policy: {}", other)),
        }
    }
}

/// State shared between callers and the reset task.
struct Shared {
    counter: WindowCounter,
    /// Wakes callers blocked on an exhausted window
    window_opened: Notify,
    closed: AtomicBool,
}

struct ResetTask {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Fixed-window rate limiter with a background reset task.
///
/// The limiter is thread-safe; share it behind an `Arc` or let a
/// `DocumentSubmitter` own it. It must be created inside a tokio runtime.
pub struct RateLimiter {
    shared: Arc<Shared>,
    window: Duration,
    policy: AdmissionPolicy,
    reset_task: Mutex<Option<ResetTask>>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("window", &self.window)
            .field("limit", &self.shared.counter.limit())
            .field("policy", &self.policy)
            .field("current_count", &self.shared.counter.current_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl RateLimiter {
    /// Create a new rate limiter admitting `max_requests` per `window`.
    ///
    /// Spawns the reset task on the current tokio runtime. The first reset
    /// fires one full window after construction.
    pub fn new(window: Duration, max_requests: u64, policy: AdmissionPolicy) -> Result<Self> {
        if max_requests == 0 {
            return Err(CrptError::InvalidConfiguration(
                "request limit must be greater than 0".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(CrptError::InvalidConfiguration(
                "window duration must be greater than 0".to_string(),
            ));
        }
        let first_reset = Instant::now().checked_add(window).ok_or_else(|| {
            CrptError::InvalidConfiguration(format!(
                "window duration {:?} is too large to schedule",
                window
            ))
        })?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            CrptError::InvalidConfiguration(
                "rate limiter must be created within a tokio runtime".to_string(),
            )
        })?;

        let shared = Arc::new(Shared {
            counter: WindowCounter::new(max_requests),
            window_opened: Notify::new(),
            closed: AtomicBool::new(false),
        });

        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = runtime.spawn(run_resets(
            Arc::clone(&shared),
            first_reset,
            window,
            shutdown_rx,
        ));

        info!(
            window = ?window,
            limit = max_requests,
            policy = ?policy,
            "Rate limiter started"
        );

        Ok(Self {
            shared,
            window,
            policy,
            reset_task: Mutex::new(Some(ResetTask { shutdown, handle })),
        })
    }

    /// Create a rate limiter admitting `limit` requests per `unit`.
    pub fn per_unit(unit: TimeWindow, limit: u64, policy: AdmissionPolicy) -> Result<Self> {
        Self::new(unit.duration(), limit, policy)
    }

    /// Create a rate limiter from configuration.
    pub fn from_config(config: &LimiterConfig) -> Result<Self> {
        Self::per_unit(config.time_unit, config.request_limit, config.policy)
    }

    /// Admit one request according to the configured policy.
    ///
    /// Under [`AdmissionPolicy::Block`] this waits for the next window when
    /// the current one is full; under [`AdmissionPolicy::Reject`] it fails
    /// with `RateLimitExceeded`. Dropping the returned future while it waits
    /// does not consume a slot.
    pub async fn acquire(&self) -> Result<()> {
        loop {
            // Register for the wakeup before checking, so a reset landing
            // between the check and the await is not missed.
            let window_opened = self.shared.window_opened.notified();
            tokio::pin!(window_opened);
            window_opened.as_mut().enable();

            if self.is_closed() {
                return Err(CrptError::Closed);
            }

            if self.shared.counter.try_acquire() {
                trace!(
                    count = self.shared.counter.current_count(),
                    limit = self.shared.counter.limit(),
                    "Request admitted"
                );
                return Ok(());
            }

            match self.policy {
                AdmissionPolicy::Reject => {
                    debug!(
                        limit = self.shared.counter.limit(),
                        window = ?self.window,
                        "Rate limit exceeded"
                    );
                    return Err(CrptError::RateLimitExceeded {
                        limit: self.shared.counter.limit(),
                        window: self.window,
                    });
                }
                AdmissionPolicy::Block => {
                    trace!("Window exhausted, waiting for reset");
                    window_opened.await;
                }
            }
        }
    }

    /// Like [`acquire`](Self::acquire), but gives up after `timeout`.
    ///
    /// A wait that times out leaves the counter unchanged.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.acquire()).await {
            Ok(result) => result,
            Err(_) => {
                debug!(timeout = ?timeout, "Timed out waiting for admission");
                Err(CrptError::AcquireTimeout(timeout))
            }
        }
    }

    /// Try to admit one request without waiting, regardless of policy.
    ///
    /// Returns `false` if the window is full or the limiter is closed.
    pub fn try_acquire(&self) -> bool {
        !self.is_closed() && self.shared.counter.try_acquire()
    }

    /// Shut the limiter down.
    ///
    /// Blocked callers fail with `CrptError::Closed`, the reset task is
    /// stopped and awaited. Calling this more than once is a no-op.
    pub async fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.window_opened.notify_waiters();

        let task = self.reset_task.lock().take();
        if let Some(ResetTask { shutdown, handle }) = task {
            let _ = shutdown.send(());
            if let Err(e) = handle.await {
                warn!(error = %e, "Rate limiter reset task ended abnormally");
            }
        }

        info!("Rate limiter closed");
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Get the number of requests admitted in the current window.
    pub fn current_count(&self) -> u64 {
        self.shared.counter.current_count()
    }

    /// Get the remaining quota in the current window.
    pub fn remaining(&self) -> u64 {
        self.shared.counter.remaining()
    }

    /// Get the maximum number of requests per window.
    pub fn limit(&self) -> u64 {
        self.shared.counter.limit()
    }

    /// Get the window duration.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Get the admission policy.
    pub fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    /// Get the number of resets performed since construction.
    pub fn windows_elapsed(&self) -> u64 {
        self.shared.counter.windows_elapsed()
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        if let Some(task) = self.reset_task.get_mut().take() {
            task.handle.abort();
        }
    }
}

/// Reset the counter once per window until shut down.
async fn run_resets(
    shared: Arc<Shared>,
    first_reset: Instant,
    window: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = interval_at(first_reset, window);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                debug!("Reset task shutting down");
                break;
            }
            _ = ticker.tick() => {
                let previous = shared.counter.reset();
                trace!(
                    previous_count = previous,
                    windows_elapsed = shared.counter.windows_elapsed(),
                    "Rate limit window reset"
                );
                shared.window_opened.notify_waiters();
            }
        }
    }
}
