// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Reconnection backoff.
//!
//! Delay for the k-th consecutive failure (0-based):
//!
//! ```text
//! delay(k) = min(initial * multiplier^k * (1 + r * jitter), max)    r in [0, 1)
//! ```
//!
//! Jitter only ever lengthens a delay and is bounded by `multiplier - 1`,
//! so the sequence is non-decreasing and never exceeds `max_delay`.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// =============================================================================
// BackoffConfig
// =============================================================================

/// Reconnection backoff settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay after the first failure.
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Upper bound for any delay.
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Growth factor per consecutive failure.
    pub multiplier: f64,

    /// Jitter fraction added on top of the base delay (0.0 disables jitter).
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl BackoffConfig {
    /// Creates a configuration without jitter.
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier: 2.0,
            jitter: 0.0,
        }
    }

    /// Sets the multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the jitter fraction.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Validates the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_delay.is_zero() {
            return Err(ConfigError::invalid_value(
                "backoff.initial_delay",
                "must be greater than zero",
            ));
        }
        if self.max_delay < self.initial_delay {
            return Err(ConfigError::invalid_value(
                "backoff.max_delay",
                "must not be smaller than initial_delay",
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::invalid_value(
                "backoff.multiplier",
                "must be a finite number >= 1.0",
            ));
        }
        if !(0.0..=self.multiplier - 1.0).contains(&self.jitter) {
            return Err(ConfigError::invalid_value(
                "backoff.jitter",
                format!("must be between 0.0 and {}", self.multiplier - 1.0),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Backoff
// =============================================================================

/// Stateful backoff: counts consecutive failures until reset.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    /// Creates a backoff at attempt zero.
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Returns the delay for the current attempt and advances the counter.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.base_delay(self.attempt);
        let max = self.config.max_delay.as_secs_f64();

        let jittered = if self.config.jitter > 0.0 {
            let r: f64 = rand::thread_rng().gen_range(0.0..1.0);
            base * (1.0 + r * self.config.jitter)
        } else {
            base
        };

        self.attempt = self.attempt.saturating_add(1);
        Duration::from_secs_f64(jittered.min(max))
    }

    /// Un-jittered delay in seconds for the given attempt.
    fn base_delay(&self, attempt: u32) -> f64 {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        self.config.initial_delay.as_secs_f64() * self.config.multiplier.powi(exponent)
    }

    /// Returns to the initial delay.
    #[inline]
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Number of delays handed out since the last reset.
    #[inline]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns the configuration.
    #[inline]
    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubles_until_cap() {
        let mut backoff = Backoff::new(BackoffConfig::new(
            Duration::from_millis(100),
            Duration::from_millis(1000),
        ));

        let delays: Vec<_> = (0..6).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(delays, [100, 200, 400, 800, 1000, 1000]);
        assert_eq!(backoff.attempt(), 6);
    }

    #[test]
    fn test_reset() {
        let mut backoff = Backoff::new(BackoffConfig::new(
            Duration::from_millis(100),
            Duration::from_secs(10),
        ));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_jitter_is_monotonic_and_capped() {
        let config = BackoffConfig::new(Duration::from_millis(50), Duration::from_secs(5))
            .with_jitter(1.0);
        for _ in 0..50 {
            let mut backoff = Backoff::new(config.clone());
            let mut previous = Duration::ZERO;
            for _ in 0..20 {
                let delay = backoff.next_delay();
                assert!(delay >= previous);
                assert!(delay <= config.max_delay);
                previous = delay;
            }
        }
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let mut backoff = Backoff::new(BackoffConfig::default());
        for _ in 0..2000 {
            backoff.next_delay();
        }
        assert_eq!(backoff.next_delay(), Duration::from_secs(30));
    }

    #[test]
    fn test_validate() {
        assert!(BackoffConfig::default().validate().is_ok());
        assert!(BackoffConfig::new(Duration::ZERO, Duration::from_secs(1)).validate().is_err());
        assert!(BackoffConfig::new(Duration::from_secs(2), Duration::from_secs(1)).validate().is_err());
        assert!(BackoffConfig::default().with_multiplier(0.5).validate().is_err());
        assert!(BackoffConfig::default().with_jitter(1.5).validate().is_err());
        assert!(BackoffConfig::default().with_multiplier(1.0).with_jitter(0.0).validate().is_ok());
    }
}
