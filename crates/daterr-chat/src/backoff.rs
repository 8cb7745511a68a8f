//! Reconnect delay policy.

use std::time::Duration;

/// Delay strategy between reconnect attempts.
///
/// Every policy is bounded by [`ReconnectPolicy::max_delay`] and retries forever;
/// only an explicit close stops a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Same delay before every attempt.
    Fixed(Duration),
    /// Delay grows by `factor` after each failure, capped at `max`.
    Exponential {
        initial: Duration,
        max: Duration,
        factor: u32,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Fixed(Duration::from_secs(5))
    }
}

impl ReconnectPolicy {
    /// Capped exponential backoff: 1s, 2s, 4s ... up to 30s.
    pub fn exponential() -> Self {
        Self::Exponential {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            factor: 2,
        }
    }

    /// Delay before reconnect attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential {
                initial,
                max,
                factor,
            } => {
                let mut delay = initial.min(max);
                for _ in 1..attempt {
                    let next = next_backoff(delay, max, factor);
                    if next == delay {
                        break;
                    }
                    delay = next;
                }
                delay
            }
        }
    }

    /// Upper bound on any delay this policy produces.
    pub fn max_delay(&self) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential { max, .. } => max,
        }
    }
}

/// Calculate the next backoff duration.
fn next_backoff(current: Duration, max: Duration, factor: u32) -> Duration {
    let next = current.saturating_mul(factor);
    if next > max {
        max
    } else {
        next
    }
}
