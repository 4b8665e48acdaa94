// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Exponential backoff with jitter and an overall time budget.
///
/// Each delay is the current interval spread uniformly over
/// `[interval * (1 - randomization_factor), interval * (1 + randomization_factor)]`.
/// The interval then grows by `multiplier` up to `max_interval`. Once the
/// time spent plus the next delay would exceed `max_elapsed_time`, no more
/// delays are handed out. A zero `max_elapsed_time` never runs out.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub max_elapsed_time: Duration,
    pub multiplier: f64,
    pub randomization_factor: f64,
    current_interval: Duration,
}

impl ExponentialBackoff {
    pub fn new(
        initial_interval: Duration,
        max_interval: Duration,
        max_elapsed_time: Duration,
        multiplier: f64,
        randomization_factor: f64,
    ) -> Self {
        Self {
            initial_interval,
            max_interval,
            max_elapsed_time,
            multiplier,
            randomization_factor,
            current_interval: initial_interval,
        }
    }

    /// `None` when retrying is disabled.
    pub fn from_config(config: &RetryConfig) -> Option<Self> {
        config.enabled.then(|| {
            Self::new(
                config.initial_interval,
                config.max_interval,
                config.max_elapsed_time,
                config.multiplier,
                config.randomization_factor,
            )
        })
    }

    /// Delay before the next attempt, given the time spent so far, or `None`
    /// when the budget is spent.
    pub fn next_backoff(&mut self, elapsed: Duration) -> Option<Duration> {
        self.next_backoff_with(elapsed, &mut rand::thread_rng())
    }

    pub fn next_backoff_with<R: Rng + ?Sized>(
        &mut self,
        elapsed: Duration,
        rng: &mut R,
    ) -> Option<Duration> {
        let delay = self.randomized_interval(rng);
        self.advance();

        if !self.max_elapsed_time.is_zero()
            && elapsed.saturating_add(delay) > self.max_elapsed_time
        {
            return None;
        }
        Some(delay)
    }

    fn randomized_interval<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let interval = self.current_interval.as_nanos() as f64;
        if self.randomization_factor <= 0.0 || interval <= 0.0 {
            return self.current_interval;
        }
        let delta = self.randomization_factor * interval;
        let nanos = rng.gen_range((interval - delta)..=(interval + delta));
        Duration::from_nanos(nanos.round() as u64)
    }

    fn advance(&mut self) {
        let max = self.max_interval.as_nanos() as f64;
        let next = (self.current_interval.as_nanos() as f64 * self.multiplier).round();
        self.current_interval = if next.is_finite() && next < max {
            Duration::from_nanos(next as u64)
        } else {
            self.max_interval
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deterministic(max_elapsed: Duration) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(200),
            Duration::from_secs(5),
            max_elapsed,
            1.5,
            0.0,
        )
    }

    #[test]
    fn test_progression_and_cap() {
        let mut backoff = deterministic(Duration::ZERO);
        let delays: Vec<u128> = (0..12)
            .map(|_| backoff.next_backoff(Duration::ZERO).unwrap().as_millis())
            .collect();
        assert_eq!(
            delays,
            vec![200, 300, 450, 675, 1012, 1518, 2278, 3417, 5000, 5000, 5000, 5000]
        );
    }

    #[test]
    fn test_elapsed_budget() {
        let mut backoff = deterministic(Duration::from_secs(30));
        assert_eq!(
            backoff.next_backoff(Duration::from_secs(29)),
            Some(Duration::from_millis(200))
        );
        // 29.7s + 300ms lands exactly on the budget
        assert_eq!(
            backoff.next_backoff(Duration::from_millis(29_700)),
            Some(Duration::from_millis(300))
        );
        assert_eq!(backoff.next_backoff(Duration::from_millis(29_600)), None);
    }

    #[test]
    fn test_zero_budget_is_unbounded() {
        let mut backoff = deterministic(Duration::ZERO);
        assert!(backoff
            .next_backoff(Duration::from_secs(86_400 * 365))
            .is_some());
    }


    #[test]
    fn test_randomization_stays_within_bounds() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_secs(1),
            Duration::from_secs(1),
            Duration::ZERO,
            1.0,
            0.5,
        );
        for _ in 0..1_000 {
            let delay = backoff.next_backoff(Duration::ZERO).unwrap();
            assert!(delay >= Duration::from_millis(500), "{delay:?}");
            assert!(delay <= Duration::from_millis(1_500), "{delay:?}");
        }
    }

    #[test]
    fn test_disabled_retry_has_no_backoff() {
        let config = RetryConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(ExponentialBackoff::from_config(&config).is_none());
        assert!(ExponentialBackoff::from_config(&RetryConfig::default()).is_some());
    }
}
