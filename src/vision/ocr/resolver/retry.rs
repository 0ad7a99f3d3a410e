// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Exponential backoff bounded by a total time budget

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total wall-clock budget for all attempts and sleeps
    pub max_total_time: Duration,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    /// Attempt cap on top of the time budget; `None` retries until the budget is spent
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_total_time: Duration::from_secs(30),
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            exponential_base: 2.0,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no sleeping, still bounded by the default time budget
    pub fn no_wait() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            exponential_base: 1.0,
            max_attempts: Some(1),
            ..Self::default()
        }
    }

    pub fn with_max_total_time(mut self, max_total_time: Duration) -> Self {
        self.max_total_time = max_total_time;
        self
    }

    /// Delay to sleep after the zero-based `attempt` failed
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.exponential_base.powi(attempt.min(i32::MAX as u32) as i32);
        let delay_secs = self.initial_delay.as_secs_f64() * factor;
        if !delay_secs.is_finite() || delay_secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        if delay_secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(delay_secs)
    }

    /// Whether another attempt may follow `attempts` failed ones after sleeping `delay`
    pub fn allows(&self, attempts: u32, elapsed: Duration, delay: Duration) -> bool {
        if self.max_attempts.is_some_and(|max| attempts >= max) {
            return false;
        }
        elapsed + delay < self.max_total_time
    }

    /// Time left for the next attempt, zero once the budget is spent
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.max_total_time.saturating_sub(elapsed)
    }
}
