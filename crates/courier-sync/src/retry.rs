//! # Retry Policy
//!
//! How long the uploader waits between failed attempts, and for how long it
//! keeps trying.
//!
//! ## Schedules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Retry Schedules                                  │
//! │                                                                         │
//! │  FIXED (Default, multiplier = 1.0)     EXPONENTIAL (multiplier > 1.0)   │
//! │  ─────────────────────────────────     ──────────────────────────────   │
//! │  Attempt 1 fails → wait 5s             Attempt 1 fails → wait 5s        │
//! │  Attempt 2 fails → wait 5s             Attempt 2 fails → wait 10s       │
//! │  Attempt 3 fails → wait 5s             Attempt 3 fails → wait 20s       │
//! │  ...                                   ...                              │
//! │                                        capped at max_delay (60s)        │
//! │                                                                         │
//! │  max_attempts = 0 → retry forever                                       │
//! │  max_attempts = n → give up after n failed attempts                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use backoff::backoff::{Backoff, Constant};
use backoff::ExponentialBackoffBuilder;

/// Delay between attempts of the same upload.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Wait after the first failure.
    /// Default: 5 seconds
    pub delay: Duration,

    /// Growth factor per failure. 1.0 keeps the delay fixed.
    pub multiplier: f64,

    /// Upper bound for a grown delay.
    /// Default: 60 seconds
    pub max_delay: Duration,

    /// Failed attempts before giving up. 0 = infinite.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::fixed(Duration::from_secs(5))
    }
}

impl RetryPolicy {
    /// Same delay after every failure, forever.
    pub fn fixed(delay: Duration) -> Self {
        RetryPolicy {
            delay,
            multiplier: 1.0,
            max_delay: Duration::from_secs(60),
            max_attempts: 0,
        }
    }

    /// Delay multiplied after every failure, capped at `max_delay`.
    pub fn exponential(initial: Duration, multiplier: f64, max_delay: Duration) -> Self {
        RetryPolicy {
            delay: initial,
            multiplier,
            max_delay,
            max_attempts: 0,
        }
    }

    /// Gives up after `attempts` failed attempts (0 = never).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Returns true if the policy never gives up.
    pub fn is_unbounded(&self) -> bool {
        self.max_attempts == 0
    }

    /// Starts a fresh schedule for one upload.
    pub fn schedule(&self) -> RetrySchedule {
        let backoff: Box<dyn Backoff + Send> = if self.multiplier <= 1.0 {
            Box::new(Constant::new(self.delay))
        } else {
            Box::new(
                ExponentialBackoffBuilder::new()
                    .with_initial_interval(self.delay)
                    .with_multiplier(self.multiplier)
                    .with_max_interval(self.max_delay.max(self.delay))
                    .with_randomization_factor(0.0)
                    .with_max_elapsed_time(None)
                    .build(),
            )
        };

        RetrySchedule {
            backoff,
            failures: 0,
            max_attempts: self.max_attempts,
        }
    }
}

/// Per-upload retry state.
pub struct RetrySchedule {
    backoff: Box<dyn Backoff + Send>,
    failures: u32,
    max_attempts: u32,
}

impl RetrySchedule {
    /// Records a failed attempt.
    ///
    /// Returns the wait before the next attempt, or `None` once the policy
    /// has run out of attempts.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.failures = self.failures.saturating_add(1);
        if self.max_attempts > 0 && self.failures >= self.max_attempts {
            return None;
        }
        self.backoff.next_backoff()
    }

    /// Number of failed attempts recorded so far.
    pub fn failures(&self) -> u32 {
        self.failures
    }
}
