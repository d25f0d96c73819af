//! Reconnect delay policy
//!
//! The default is a fixed delay retried forever. The exponential policy
//! doubles the delay per consecutive failed connection, caps it, and can give
//! up after a number of attempts.

use std::time::Duration;

/// Delay before the relay reconnects after an unexpected close
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Same delay every time, no retry limit
    Fixed { delay: Duration },
    /// `initial * 2^n` capped at `max`; stop after `max_attempts` if set
    Exponential {
        initial: Duration,
        max: Duration,
        max_attempts: Option<u32>,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Fixed {
            delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// Consecutive reconnect attempts since the last successful open
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl Backoff {
    pub(crate) fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Delay for the next attempt, or `None` when the policy gives up
    pub(crate) fn next_delay(&mut self) -> Option<Duration> {
        let delay = match &self.policy {
            ReconnectPolicy::Fixed { delay } => *delay,
            ReconnectPolicy::Exponential {
                initial,
                max,
                max_attempts,
            } => {
                if max_attempts.is_some_and(|limit| self.attempts >= limit) {
                    return None;
                }
                let multiplier = 2u32.saturating_pow(self.attempts);
                initial.saturating_mul(multiplier).min(*max)
            }
        };

        self.attempts = self.attempts.saturating_add(1);
        Some(delay)
    }

    pub(crate) fn reset(&mut self) {
        self.attempts = 0;
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_policy_never_gives_up() {
        let mut backoff = Backoff::new(ReconnectPolicy::default());
        for _ in 0..1000 {
            assert_eq!(backoff.next_delay(), Some(DEFAULT_RECONNECT_DELAY));
        }
        assert_eq!(backoff.attempts(), 1000);
    }

    #[test]
    fn test_exponential_policy_doubles_and_caps() {
        let mut backoff = Backoff::new(ReconnectPolicy::Exponential {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(10),
            max_attempts: None,
        });

        let delays: Vec<u64> = (0..6)
            .map(|_| backoff.next_delay().unwrap().as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);

        // Large attempt counts saturate instead of overflowing
        for _ in 0..100 {
            assert_eq!(backoff.next_delay(), Some(Duration::from_secs(10)));
        }
    }

    #[test]
    fn test_exponential_policy_gives_up() {
        let mut backoff = Backoff::new(ReconnectPolicy::Exponential {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(1),
            max_attempts: Some(2),
        });

        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert_eq!(backoff.next_delay(), None);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
    }
}
