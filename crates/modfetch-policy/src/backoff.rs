use std::time::{Duration, SystemTime};

use rand::Rng;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    GiveUp,
}

/// The shared retry/backoff strategy: `(attempt, error, retry_after) -> (decision, delay)`.
///
/// Delay is a uniformly distributed duration in `[min_delay, max_delay]` — not
/// exponential — except when the server names an explicit `Retry-After`, which
/// takes precedence (clamped to `retry_after_cap`).
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub retry_after_cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            min_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(30_000),
            retry_after_cap: Duration::from_secs(120),
        }
    }
}

impl BackoffPolicy {
    pub fn decide(&self, attempt: u32, error: &EngineError) -> (RetryDecision, Duration) {
        if attempt >= self.max_attempts || !error.is_retryable() {
            return (RetryDecision::GiveUp, Duration::ZERO);
        }

        if let EngineError::RateLimited { retry_after: Some(d) } = error {
            return (RetryDecision::Retry, (*d).min(self.retry_after_cap));
        }

        let delay = if self.max_delay <= self.min_delay {
            self.min_delay
        } else {
            let millis = rand::thread_rng()
                .gen_range(self.min_delay.as_millis() as u64..=self.max_delay.as_millis() as u64);
            Duration::from_millis(millis)
        };
        (RetryDecision::Retry, delay)
    }
}

/// Parses a `Retry-After` header value, which the spec allows as either an
/// integer number of seconds or an HTTP-date.
pub fn parse_retry_after(value: &str, now: SystemTime) -> Option<Duration> {
    let trimmed = value.trim();
    if let Ok(seconds) = trimmed.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let target = httpdate::parse_http_date(trimmed).ok()?;
    target.duration_since(now).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn give_up_past_max_attempts() {
        let policy = BackoffPolicy::default();
        let (decision, _) = policy.decide(policy.max_attempts, &EngineError::Transient { cause: "reset".into() });
        assert_eq!(decision, RetryDecision::GiveUp);
    }

    #[test]
    fn non_retryable_errors_never_retry() {
        let policy = BackoffPolicy::default();
        let (decision, _) = policy.decide(0, &EngineError::AuthRejected { host: "h".into(), status: 401 });
        assert_eq!(decision, RetryDecision::GiveUp);
    }

    #[test]
    fn retry_after_overrides_jitter_and_is_capped() {
        let policy = BackoffPolicy { retry_after_cap: Duration::from_secs(10), ..Default::default() };
        let err = EngineError::RateLimited { retry_after: Some(Duration::from_secs(999)) };
        let (decision, delay) = policy.decide(0, &err);
        assert_eq!(decision, RetryDecision::Retry);
        assert_eq!(delay, Duration::from_secs(10));
    }

    #[test]
    fn jitter_delay_is_within_bounds() {
        let policy = BackoffPolicy { min_delay: Duration::from_millis(100), max_delay: Duration::from_millis(200), ..Default::default() };
        for _ in 0..50 {
            let (decision, delay) = policy.decide(0, &EngineError::Transient { cause: "x".into() });
            assert_eq!(decision, RetryDecision::Retry);
            assert!(delay >= Duration::from_millis(100) && delay <= Duration::from_millis(200));
        }
    }

    #[test]
    fn parse_retry_after_seconds() {
        let now = SystemTime::now();
        assert_eq!(parse_retry_after("120", now), Some(Duration::from_secs(120)));
    }

    #[test]
    fn parse_retry_after_http_date() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        let target = now + Duration::from_secs(30);
        let formatted = httpdate::fmt_http_date(target);
        let parsed = parse_retry_after(&formatted, now).unwrap();
        assert_eq!(parsed.as_secs(), 30);
    }
}
