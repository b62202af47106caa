//! Jittered exponential backoff for connection retries.
//!
//! Classic full-jitter scheme: the exponential curve caps the window, the
//! delay is drawn uniformly from `[0, window)`. A fleet of devices
//! reconnecting after a broker outage must not retry in lock-step, so the
//! jitter source is the hardware RNG on target (see
//! [`adapters::entropy`](crate::adapters::entropy)).
//!
//! The policy only computes delays — the caller owns the sleep.

use core::fmt;
use core::time::Duration;

use crate::app::ports::JitterRng;
use crate::config::SystemConfig;

/// All retry attempts have been consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetriesExhausted;

impl fmt::Display for RetriesExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "retry attempts exhausted")
    }
}

impl From<RetriesExhausted> for crate::error::Error {
    fn from(_: RetriesExhausted) -> Self {
        Self::RetriesExhausted
    }
}

/// Bookkeeping for one connection-retry sequence.
///
/// Created fresh at the start of each sequence; discarded on success or
/// exhaustion. A successful connection clears backoff memory — the next
/// sequence starts from the base interval again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryContext {
    attempts_done: u32,
    base_interval_ms: u32,
    max_interval_ms: u32,
    max_attempts: u32,
}

impl RetryContext {
    pub fn new(base_interval_ms: u32, max_interval_ms: u32, max_attempts: u32) -> Self {
        Self {
            attempts_done: 0,
            base_interval_ms,
            max_interval_ms,
            max_attempts,
        }
    }

    pub fn from_config(config: &SystemConfig) -> Self {
        Self::new(
            config.retry_base_interval_ms,
            config.retry_max_interval_ms,
            config.retry_max_attempts,
        )
    }

    /// Clear backoff memory (called after a successful connection).
    pub fn reset(&mut self) {
        self.attempts_done = 0;
    }

    pub fn attempts_done(&self) -> u32 {
        self.attempts_done
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts_done >= self.max_attempts
    }

    /// The current (pre-jitter) backoff window in milliseconds:
    /// `min(base * 2^attempts_done, max)`.
    fn window_ms(&self) -> u64 {
        let shift = self.attempts_done.min(31);
        let widened = u64::from(self.base_interval_ms) << shift;
        widened.min(u64::from(self.max_interval_ms))
    }
}

/// Compute the next retry delay.
///
/// Fails with [`RetriesExhausted`] once `max_attempts` delays have been
/// handed out — the context is not mutated further. Otherwise returns a
/// delay uniformly distributed in `[0, min(base * 2^attempts_done, max))`
/// and increments `attempts_done` by exactly one.
pub fn next_delay(
    ctx: &mut RetryContext,
    rng: &mut impl JitterRng,
) -> Result<Duration, RetriesExhausted> {
    if ctx.is_exhausted() {
        return Err(RetriesExhausted);
    }

    let window = ctx.window_ms();
    let jitter_ms = if window == 0 {
        0
    } else {
        u64::from(rng.next_u32()) % window
    };

    ctx.attempts_done += 1;
    Ok(Duration::from_millis(jitter_ms))
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
