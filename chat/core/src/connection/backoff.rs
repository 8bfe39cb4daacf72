//! Reconnection Backoff
//!
//! Exponential delay between reconnection attempts: starts at the initial
//! delay, doubles per attempt, and is capped. Attempts are unbounded; the
//! loop ends only when the session is closed.

use std::time::Duration;

use rand::Rng;

/// Reconnection timing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnection attempt
    pub initial_delay: Duration,
    /// Upper bound for any delay
    pub max_delay: Duration,
    /// Growth factor per attempt
    pub multiplier: u32,
    /// Random extra delay added to each wait (zero disables)
    pub jitter: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2,
            jitter: Duration::ZERO,
        }
    }
}

/// Backoff state for one session
#[derive(Debug)]
pub struct Backoff {
    policy: ReconnectPolicy,
    next: Duration,
    attempt: u32,
}

impl Backoff {
    /// Start a backoff sequence
    #[must_use]
    pub fn new(policy: ReconnectPolicy) -> Self {
        let next = policy.initial_delay.min(policy.max_delay);
        Self {
            policy,
            next,
            attempt: 0,
        }
    }

    /// Delay before the next attempt; advances the sequence
    pub fn next_delay(&mut self) -> Duration {
        let base = self.next;
        self.next = base
            .saturating_mul(self.policy.multiplier)
            .min(self.policy.max_delay);
        self.attempt = self.attempt.saturating_add(1);
        base + self.jitter()
    }

    /// Restart from the initial delay after a successful connection
    pub fn reset(&mut self) {
        self.next = self.policy.initial_delay.min(self.policy.max_delay);
        self.attempt = 0;
    }

    /// Number of delays handed out since the last reset
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    fn jitter(&self) -> Duration {
        if self.policy.jitter.is_zero() {
            return Duration::ZERO;
        }
        let max_ms = u64::try_from(self.policy.jitter.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sequence_doubles_and_caps() {
        let mut backoff = Backoff::new(ReconnectPolicy::default());
        let delays: Vec<u64> = (0..10)
            .map(|_| u64::try_from(backoff.next_delay().as_millis()).unwrap())
            .collect();

        assert_eq!(
            delays,
            vec![500, 1000, 2000, 4000, 8000, 16000, 30000, 30000, 30000, 30000]
        );
        assert_eq!(backoff.attempt(), 10);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut backoff = Backoff::new(ReconnectPolicy::default());
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();

        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_bounded() {
        let policy = ReconnectPolicy {
            jitter: Duration::from_millis(100),
            ..ReconnectPolicy::default()
        };
        let mut backoff = Backoff::new(policy);
        for _ in 0..20 {
            backoff.reset();
            let delay = backoff.next_delay();
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(600));
        }
    }

    #[test]
    fn test_initial_above_cap_is_clamped() {
        let policy = ReconnectPolicy {
            initial_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(5),
            ..ReconnectPolicy::default()
        };
        let mut backoff = Backoff::new(policy);
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
    }
}
