use std::{fmt, time::Duration};

use reqwest::Url;

use crate::{BonuslyError, ErrorCatcher, Result, RetryPolicy};

/// Base URL of the production Bonusly API.
pub const PRODUCTION_BASE_URL: &str = "https://bonus.ly/api/v1";

/// Configures authentication, endpoint, timeout and retry behavior.
#[derive(Clone, Eq, PartialEq)]
pub struct ClientOptions {
    /// Bonusly API access token, sent as a bearer token.
    pub access_token: String,
    /// API root, without trailing slash.
    pub base_url: String,
    /// Bound on each call, retries included.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("access_token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            base_url: PRODUCTION_BASE_URL.to_owned(),
            timeout: Duration::from_secs(5 * 60),
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientOptions {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Self::default()
        }
    }

    /// Reads options from environment variables.
    ///
    /// - `BONUSLY_TOKEN` — access token (required)
    /// - `BONUSLY_BASE_URL` — API root (optional, defaults to production)
    pub fn from_env() -> Result<Self> {
        let catcher = ErrorCatcher::new();
        let token = std::env::var("BONUSLY_TOKEN").unwrap_or_default();
        catcher.new_when(
            token.trim().is_empty(),
            "missing BONUSLY_TOKEN environment variable",
        );
        catcher.resolve()?;

        let mut options = Self::new(token.trim());
        if let Ok(base_url) = std::env::var("BONUSLY_BASE_URL") {
            if !base_url.trim().is_empty() {
                options.base_url = base_url.trim().to_owned();
            }
        }
        Ok(options)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Checks every option and reports all problems together.
    pub fn validate(&self) -> Result<()> {
        let catcher = ErrorCatcher::new();
        catcher.new_when(
            self.access_token.trim().is_empty(),
            "must specify an access token",
        );
        catcher.new_when(self.base_url.trim().is_empty(), "must specify a base URL");
        catcher.check_when(!self.base_url.trim().is_empty(), || {
            Url::parse(self.base_url.trim())
                .map(drop)
                .map_err(|err| format!("invalid base URL '{}': {err}", self.base_url))
        });
        catcher.new_when(self.timeout.is_zero(), "timeout must be greater than zero");
        catcher.check(|| self.retry.validate());
        catcher.resolve().map_err(BonuslyError::Config)
    }
}
