//! Response classification and backoff for the call executor.

use std::time::Duration;

use rand::Rng;

use super::request::{RawResponse, Request};
use crate::config::{MutationRetry, RetryPolicy};
use crate::error::{Error, Result};

/// The only status the remote uses for success.
pub const SUCCESS_STATUS: u16 = 200;

/// Turns a raw response into an error unless it is a 200.
pub fn classify_response(endpoint: &str, response: &RawResponse) -> Result<()> {
    if response.status == SUCCESS_STATUS {
        Ok(())
    } else {
        Err(Error::api(endpoint, response.status))
    }
}

/// Decides whether `error` may be answered by re-sending `request`.
///
/// A transport failure leaves it unknown whether the remote applied the
/// call, so mutations are only re-sent when the policy opts in.
pub fn should_retry(error: &Error, request: &Request, mutations: MutationRetry) -> bool {
    match error {
        Error::RateLimitExceeded(_) | Error::Api { .. } => true,
        Error::Transport { .. } => request.is_idempotent() || mutations == MutationRetry::Always,
        _ => false,
    }
}

/// Delay schedule: `base * 2^(attempt-1)`, capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self
            .policy
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.policy.max_delay);

        if self.policy.jitter && !delay.is_zero() {
            // Jitter never exceeds the cap, so the schedule stays non-decreasing.
            let extra = rand::thread_rng().gen_range(0..=delay.as_millis() as u64 / 10);
            (delay + Duration::from_millis(extra)).min(self.policy.max_delay)
        } else {
            delay
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;

    fn response(status: u16) -> RawResponse {
        RawResponse {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    fn transport_error() -> Error {
        Error::Transport {
            endpoint: "/x".to_string(),
            message: "connection reset".to_string(),
            timeout: false,
        }
    }

    #[test]
    fn test_only_200_is_success() {
        assert!(classify_response("/x", &response(200)).is_ok());
        for status in [201, 204, 302, 400, 404, 429, 500, 503] {
            let err = classify_response("/x", &response(status)).unwrap_err();
            assert_eq!(err.status(), Some(status));
        }
    }

    #[test]
    fn test_api_errors_are_retried_for_any_method() {
        let get = Request::get("/x");
        let post = Request::post("/y", &serde_json::json!({})).unwrap();
        let err = Error::api("/x", 500);
        assert!(should_retry(&err, &get, MutationRetry::Never));
        assert!(should_retry(&err, &post, MutationRetry::Never));
    }

    #[test]
    fn test_transport_errors_retry_reads_only_by_default() {
        let get = Request::get("/x");
        let post = Request::post("/y", &serde_json::json!({})).unwrap();
        assert!(should_retry(&transport_error(), &get, MutationRetry::Never));
        assert!(!should_retry(&transport_error(), &post, MutationRetry::Never));
        assert!(should_retry(&transport_error(), &post, MutationRetry::Always));
    }

    #[test]
    fn test_session_and_decode_errors_are_not_retried() {
        let get = Request::get("/x");
        assert!(!should_retry(&Error::Session("gone".to_string()), &get, MutationRetry::Always));
        assert!(!should_retry(
            &Error::Decode {
                endpoint: "/x".to_string(),
                message: "bad".to_string()
            },
            &get,
            MutationRetry::Always
        ));
    }

    #[test]
    fn test_exponential_backoff() {
        let backoff = Backoff::new(RetryPolicy::default());
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(backoff.delay_for_attempt(4), Duration::from_secs(8));
    }

    #[test]
    fn test_max_delay_cap() {
        let backoff = Backoff::new(RetryPolicy::default());
        assert_eq!(backoff.delay_for_attempt(7), Duration::from_secs(60));
        assert_eq!(backoff.delay_for_attempt(40), Duration::from_secs(60));
    }

    #[test]
    fn test_jitter_only_adds_bounded_delay() {
        let backoff = Backoff::new(RetryPolicy {
            jitter: true,
            ..RetryPolicy::default()
        });
        for attempt in 1..=6 {
            let plain = Duration::from_secs(1 << (attempt - 1));
            let delay = backoff.delay_for_attempt(attempt);
            assert!(delay >= plain);
            assert!(delay <= plain + plain / 10);
        }
    }

    #[test]
    fn test_jittered_schedule_never_decreases_past_cap() {
        let backoff = Backoff::new(RetryPolicy {
            jitter: true,
            ..RetryPolicy::default()
        });
        for _ in 0..200 {
            let schedule: Vec<_> = (1..=12).map(|attempt| backoff.delay_for_attempt(attempt)).collect();
            assert!(
                schedule.windows(2).all(|pair| pair[0] <= pair[1]),
                "decreasing schedule: {:?}",
                schedule
            );
            assert!(schedule[6..].iter().all(|&d| d == Duration::from_secs(60)));
        }
    }

    #[test]
    fn test_jitter_respects_tight_cap() {
        let backoff = Backoff::new(RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_millis(4200),
            jitter: true,
        });
        for _ in 0..200 {
            let schedule: Vec<_> = (1..=6).map(|attempt| backoff.delay_for_attempt(attempt)).collect();
            assert!(schedule.windows(2).all(|pair| pair[0] <= pair[1]), "{:?}", schedule);
            assert!(schedule.iter().all(|&d| d <= Duration::from_millis(4200)));
        }
    }
}
