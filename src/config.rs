//! Client configuration: remote location, pacing, retry and session policy.

use std::time::Duration;

use reqwest::Url;

use crate::error::{Error, Result};

/// Default remote the client talks to.
pub const DEFAULT_BASE_URL: &str = "https://www.dominos.co.uk";

/// Default user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("dominos-rs/", env!("CARGO_PKG_VERSION"));

/// Maximum number of calls issued per rolling period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub calls: usize,
    pub period: Duration,
    /// Queue for a free slot. When false an over-budget call fails with
    /// `RateLimitExceeded` and is retried after the usual backoff.
    pub wait: bool,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            calls: 5,
            period: Duration::from_secs(1),
            wait: true,
        }
    }
}

/// Exponential backoff settings shared by every call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total dispatches allowed for one logical call, first attempt included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Adds up to 10% of the computed delay on top of it.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }
}

/// What to do with a state-changing call after an ambiguous transport failure.
///
/// The remote may or may not have applied the mutation, so re-sending it can
/// double-apply a basket change or a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationRetry {
    /// Surface the transport error to the caller.
    #[default]
    Never,
    /// Re-send like any idempotent read.
    Always,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub rate_limit: RateLimit,
    pub retry: RetryPolicy,
    pub mutation_retry: MutationRetry,
    /// Age after which `ensure_session` renews the session.
    pub session_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            rate_limit: RateLimit::default(),
            retry: RetryPolicy::default(),
            mutation_retry: MutationRetry::default(),
            session_ttl: Duration::from_secs(20 * 60),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_rate_limit(mut self, calls: usize, period: Duration) -> Self {
        self.rate_limit = RateLimit {
            calls,
            period,
            ..self.rate_limit
        };
        self
    }

    pub fn with_budget_wait(mut self, wait: bool) -> Self {
        self.rate_limit.wait = wait;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.retry.max_attempts = max_attempts;
        self
    }

    pub fn with_mutation_retry(mut self, policy: MutationRetry) -> Self {
        self.mutation_retry = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Parsed base URL.
    pub fn url(&self) -> Result<Url> {
        Url::parse(&self.base_url).map_err(|e| Error::InvalidUrl(format!("{}: {}", self.base_url, e)))
    }

    /// Value pinned into the `Host` header, including a non-default port.
    pub fn host(&self) -> Result<String> {
        let url = self.url()?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::InvalidUrl(format!("{}: missing host", self.base_url)))?;
        Ok(match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
    }

    /// Rejects settings the executor cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.calls == 0 {
            return Err(Error::Config("rate limit must allow at least one call".to_string()));
        }
        if self.rate_limit.period.is_zero() {
            return Err(Error::Config("rate limit period must be non-zero".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("max_attempts must be at least 1".to_string()));
        }
        self.host()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_remote_contract() {
        let config = ClientConfig::default();
        assert_eq!(config.rate_limit.calls, 5);
        assert_eq!(config.rate_limit.period, Duration::from_secs(1));
        assert!(config.rate_limit.wait);
        assert_eq!(config.retry.max_attempts, 10);
        assert_eq!(config.mutation_retry, MutationRetry::Never);
        assert_eq!(config.host().unwrap(), "www.dominos.co.uk");
    }

    #[test]
    fn test_host_keeps_explicit_port() {
        let config = ClientConfig::default().with_base_url("http://127.0.0.1:4321/");
        assert_eq!(config.base_url, "http://127.0.0.1:4321");
        assert_eq!(config.host().unwrap(), "127.0.0.1:4321");
    }

    #[test]
    fn test_validate_rejects_zero_budget() {
        let config = ClientConfig::default().with_rate_limit(0, Duration::from_secs(1));
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_with_rate_limit_keeps_budget_mode() {
        let config = ClientConfig::default()
            .with_budget_wait(false)
            .with_rate_limit(2, Duration::from_secs(10));
        assert_eq!(config.rate_limit.calls, 2);
        assert!(!config.rate_limit.wait);
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let config = ClientConfig::default().with_max_attempts(0);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = ClientConfig::default().with_base_url("not a url");
        assert!(matches!(config.validate(), Err(Error::InvalidUrl(_))));
    }
}
