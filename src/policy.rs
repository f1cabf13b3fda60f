use std::collections::HashSet;
use std::time::Duration;

use crate::transport::TransportError;

/// Retry tuning for a request: attempt budget, backoff schedule, and the set
/// of HTTP status codes treated as transient.
///
/// Total attempts = `max_retries + 1`. Immutable and cheap to share across
/// many requests; call sites needing different tuning supply a different
/// value, not a different algorithm.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Ceiling on the computed backoff delay.
    pub max_delay: Duration,
    /// Exponential growth factor applied per retry. Values below 1 are
    /// treated as 1.
    pub backoff_multiplier: f64,
    /// Status codes eligible for retry.
    pub retryable_status_codes: HashSet<u16>,
}

impl Default for RetryPolicy {
    /// 3 retries, 1 s base delay, 30 s cap, ×2 growth,
    /// retryable on 408, 429, 500, 502, 503 and 504.
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            retryable_status_codes: HashSet::from([408, 429, 500, 502, 503, 504]),
        }
    }
}

impl RetryPolicy {
    /// Disables retries entirely: one attempt, first outcome is final.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Whether `status` is of a retryable kind, regardless of the attempt
    /// budget.
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }

    /// Whether a non-2xx `status` earns another attempt, given the number of
    /// zero-based `attempt`s already completed.
    pub fn should_retry_status(&self, status: u16, attempt: u32) -> bool {
        attempt < self.max_retries && self.is_retryable_status(status)
    }

    /// Whether a transport fault earns another attempt. Only transient faults
    /// (timeout, connection loss, DNS failure, ...) qualify.
    pub fn should_retry_transport(&self, error: &TransportError, attempt: u32) -> bool {
        attempt < self.max_retries && error.is_transient()
    }

    /// Backoff inserted after zero-based `attempt`:
    /// `min(base_delay × multiplier^attempt, max_delay)`.
    ///
    /// The cap bounds total wall-clock retry time even under pathological
    /// multipliers.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let factor = self.backoff_multiplier.max(1.0).powi(exponent);
        let secs = (self.base_delay.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_until_the_cap() {
        let policy = RetryPolicy::default();
        let schedule: Vec<Duration> = (0..5).map(|attempt| policy.delay_for(attempt)).collect();
        assert_eq!(
            schedule,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(16),
            ]
        );
        // 1 × 2^5 = 32 and 1 × 2^6 = 64 both clip to the 30 s ceiling.
        assert_eq!(policy.delay_for(5), Duration::from_secs(30));
        assert_eq!(policy.delay_for(6), Duration::from_secs(30));
    }

    #[test]
    fn pathological_multiplier_is_still_bounded_by_the_cap() {
        let policy = RetryPolicy {
            backoff_multiplier: 1e9,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for(40), Duration::from_secs(30));
    }

    #[test]
    fn sub_unit_multiplier_never_shrinks_the_delay() {
        let policy = RetryPolicy {
            backoff_multiplier: 0.5,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for(3), Duration::from_secs(1));
    }

    #[test]
    fn retryable_kind_ignores_the_attempt_budget() {
        let policy = RetryPolicy::none();
        assert!(policy.is_retryable_status(503));
        assert!(policy.is_retryable_status(429));
        assert!(!policy.is_retryable_status(404));
    }

    #[test]
    fn status_retry_requires_budget_and_membership() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry_status(503, 0));
        assert!(policy.should_retry_status(429, 2));
        // Budget spent: attempt index equals max_retries.
        assert!(!policy.should_retry_status(503, 3));
        // Not in the retryable set.
        assert!(!policy.should_retry_status(404, 0));
        assert!(!policy.should_retry_status(401, 0));
    }

    #[test]
    fn none_policy_denies_every_retry() {
        let policy = RetryPolicy::none();
        assert_eq!(policy.max_retries, 0);
        assert!(!policy.should_retry_status(503, 0));
        assert!(!policy.should_retry_transport(&TransportError::Timeout, 0));
    }

    #[test]
    fn transport_retry_requires_a_transient_fault() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry_transport(&TransportError::Timeout, 0));
        assert!(policy
            .should_retry_transport(&TransportError::ConnectionLost("reset".to_owned()), 1));
        let fatal = TransportError::Other("tls misconfiguration".into());
        assert!(!policy.should_retry_transport(&fatal, 0));
    }
}
