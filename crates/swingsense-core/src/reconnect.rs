//! Reconnection backoff for the connection supervisor.
//!
//! [`ReconnectOptions`] holds the tunable constants; [`Backoff`] is the
//! running delay the supervisor sleeps after every unsuccessful cycle.

use std::time::Duration;

use crate::error::{Error, Result};

/// Options for automatic reconnection.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectOptions {
    /// Delay after the first unsuccessful cycle, and the value restored on connect.
    pub initial_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
    /// Multiplier applied after every unsuccessful cycle.
    pub backoff_multiplier: f64,
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 1.5,
        }
    }
}

impl ReconnectOptions {
    /// Create new reconnect options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set initial delay before first reconnection attempt.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay between attempts.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set backoff multiplier.
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Delay slept after `attempts` consecutive unsuccessful cycles have
    /// already been slept through.
    pub fn delay_after(&self, attempts: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempts.min(i32::MAX as u32) as i32);
        let secs = self.initial_delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }

    /// Validate the options and return an error if invalid.
    ///
    /// Checks that:
    /// - `backoff_multiplier` is >= 1.0
    /// - `initial_delay` is > 0
    /// - `max_delay` >= `initial_delay`
    pub fn validate(&self) -> Result<()> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(Error::InvalidConfig(
                "backoff_multiplier must be >= 1.0".to_string(),
            ));
        }
        if self.initial_delay.is_zero() {
            return Err(Error::InvalidConfig(
                "initial_delay must be > 0".to_string(),
            ));
        }
        if self.max_delay < self.initial_delay {
            return Err(Error::InvalidConfig(
                "max_delay must be >= initial_delay".to_string(),
            ));
        }
        Ok(())
    }
}

/// Running backoff delay.
///
/// Starts at [`ReconnectOptions::initial_delay`], grows by the multiplier on
/// every [`advance`](Self::advance) up to the cap, and returns to the initial
/// value on [`reset`](Self::reset).
#[derive(Debug, Clone)]
pub struct Backoff {
    options: ReconnectOptions,
    current: Duration,
}

impl Backoff {
    /// Create a backoff at its initial delay.
    pub fn new(options: ReconnectOptions) -> Self {
        let current = options.initial_delay;
        Self { options, current }
    }

    /// The delay the next unsuccessful cycle will sleep.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Take the current delay and grow the stored one for the next cycle.
    pub fn advance(&mut self) -> Duration {
        let delay = self.current;
        let next = self.current.as_secs_f64() * self.options.backoff_multiplier;
        self.current = if next.is_finite() && next < self.options.max_delay.as_secs_f64() {
            Duration::from_secs_f64(next)
        } else {
            self.options.max_delay
        };
        delay
    }

    /// Restore the initial delay.
    pub fn reset(&mut self) {
        self.current = self.options.initial_delay;
    }
}
