//! Retry policies and the retrying transport decorator.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Method, Request, Response, StatusCode};

use crate::{AggregateError, ErrorCatcher, Result, RoundTrip, TransportError, TransportErrorKind};

/// One try of a request, as seen by retry and delay decisions.
#[derive(Debug)]
pub struct Attempt<'a> {
    /// Zero-based attempt index.
    pub index: usize,
    pub request: &'a Request,
    pub response: Option<&'a Response>,
    pub error: Option<&'a TransportError>,
}

impl<'a> Attempt<'a> {
    pub fn new(
        index: usize,
        request: &'a Request,
        outcome: &'a std::result::Result<Response, TransportError>,
    ) -> Self {
        Self {
            index,
            request,
            response: outcome.as_ref().ok(),
            error: outcome.as_ref().err(),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.response.map(Response::status)
    }
}

/// Declarative retry rules.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Retry on connection resets, timeouts and similar transient failures.
    pub temporary_errors: bool,
    /// Methods eligible for retry. Empty means every method.
    pub methods: Vec<Method>,
    pub statuses: Vec<StatusCode>,
    pub errors: Vec<TransportErrorKind>,
    /// Matched against the error's display text.
    pub error_strings: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 50,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(5),
            temporary_errors: true,
            methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::PATCH,
            ],
            statuses: vec![
                StatusCode::INTERNAL_SERVER_ERROR,
                StatusCode::BAD_GATEWAY,
                StatusCode::SERVICE_UNAVAILABLE,
                StatusCode::GATEWAY_TIMEOUT,
                StatusCode::INSUFFICIENT_STORAGE,
                StatusCode::CONFLICT,
                StatusCode::REQUEST_TIMEOUT,
                StatusCode::PRECONDITION_FAILED,
                StatusCode::EXPECTATION_FAILED,
            ],
            errors: Vec::new(),
            error_strings: Vec::new(),
        }
    }
}

impl RetryPolicy {
    /// A policy with no retry triggers and the default delays.
    ///
    /// Without further triggers it retries temporary errors only.
    pub fn new(max_retries: usize) -> Self {
        Self {
            max_retries,
            temporary_errors: false,
            methods: Vec::new(),
            statuses: Vec::new(),
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_delays(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay = base;
        self.max_delay = max;
        self
    }

    pub fn with_temporary_errors(mut self, enabled: bool) -> Self {
        self.temporary_errors = enabled;
        self
    }

    pub fn with_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = StatusCode>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    pub fn with_errors(mut self, kinds: impl IntoIterator<Item = TransportErrorKind>) -> Self {
        self.errors = kinds.into_iter().collect();
        self
    }

    pub fn with_error_strings<I, S>(mut self, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.error_strings = messages.into_iter().map(Into::into).collect();
        self
    }

    /// Checks the policy, reporting every problem at once.
    pub fn validate(&self) -> std::result::Result<(), AggregateError> {
        let catcher = ErrorCatcher::new();
        catcher.errorf_when(
            self.base_delay > self.max_delay,
            format_args!(
                "base delay {:?} exceeds max delay {:?}",
                self.base_delay, self.max_delay
            ),
        );
        catcher.new_when(
            self.error_strings.iter().any(String::is_empty),
            "retryable error strings must not be empty",
        );
        catcher.resolve()
    }

    /// Turns on temporary-error retries when no other trigger is set.
    pub fn normalized(mut self) -> Self {
        if self.statuses.is_empty() && self.errors.is_empty() && self.error_strings.is_empty() {
            self.temporary_errors = true;
        }
        self
    }

    pub fn should_retry(&self, attempt: &Attempt<'_>) -> bool {
        if attempt.index >= self.max_retries {
            return false;
        }
        if !self.methods.is_empty() && !self.methods.contains(attempt.request.method()) {
            return false;
        }

        let by_status = attempt
            .status()
            .is_some_and(|status| self.statuses.contains(&status));
        let by_error = attempt.error.is_some_and(|err| {
            (self.temporary_errors && err.is_temporary())
                || self.errors.contains(&err.kind())
                || (!self.error_strings.is_empty()
                    && self.error_strings.contains(&err.to_string()))
        });
        by_status || by_error
    }

    pub fn delay(&self, attempt: &Attempt<'_>) -> Duration {
        exp_jitter_delay(self.base_delay, self.max_delay, attempt.index)
    }
}

/// Exponential backoff with full jitter.
///
/// Returns a uniformly random duration in `[0, min(max, base * 2^index)]`.
pub fn exp_jitter_delay(base: Duration, max: Duration, index: usize) -> Duration {
    let shift = index.min(31) as u32;
    let ceiling = base.saturating_mul(1u32 << shift).min(max);
    let ceiling_nanos = u64::try_from(ceiling.as_nanos()).unwrap_or(u64::MAX);
    if ceiling_nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::thread_rng().gen_range(0..=ceiling_nanos))
}

pub type RetryFn = Arc<dyn Fn(&Attempt<'_>) -> bool + Send + Sync>;
pub type DelayFn = Arc<dyn Fn(&Attempt<'_>) -> Duration + Send + Sync>;

/// Retry decision logic: a declarative policy or caller-supplied functions.
#[derive(Clone)]
pub enum RetryRules {
    Policy(RetryPolicy),
    Custom { retry: RetryFn, delay: DelayFn },
}

impl fmt::Debug for RetryRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Policy(policy) => f.debug_tuple("Policy").field(policy).finish(),
            Self::Custom { .. } => f.write_str("Custom"),
        }
    }
}

impl RetryRules {
    pub fn should_retry(&self, attempt: &Attempt<'_>) -> bool {
        match self {
            Self::Policy(policy) => policy.should_retry(attempt),
            Self::Custom { retry, .. } => retry(attempt),
        }
    }

    pub fn delay(&self, attempt: &Attempt<'_>) -> Duration {
        match self {
            Self::Policy(policy) => policy.delay(attempt),
            Self::Custom { delay, .. } => delay(attempt),
        }
    }
}

/// Decorates a transport so failed attempts are repeated per [`RetryRules`].
///
/// Retries are invisible to the caller apart from latency: the last
/// response or error is returned unchanged.
pub struct RetryingTransport<T> {
    inner: T,
    rules: RetryRules,
}

impl<T: fmt::Debug> fmt::Debug for RetryingTransport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryingTransport")
            .field("inner", &self.inner)
            .field("rules", &self.rules)
            .finish()
    }
}

impl<T: RoundTrip> RetryingTransport<T> {
    /// Wraps `inner` with `policy`, rejecting invalid policies.
    pub fn new(inner: T, policy: RetryPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self::from_rules(inner, RetryRules::Policy(policy.normalized())))
    }

    /// Wraps `inner` with rules that were already validated.
    pub(crate) fn from_rules(inner: T, rules: RetryRules) -> Self {
        Self { inner, rules }
    }

    /// Wraps `inner` with caller-supplied retry and delay functions.
    pub fn custom<R, D>(inner: T, retry: R, delay: D) -> Self
    where
        R: Fn(&Attempt<'_>) -> bool + Send + Sync + 'static,
        D: Fn(&Attempt<'_>) -> Duration + Send + Sync + 'static,
    {
        Self::from_rules(
            inner,
            RetryRules::Custom {
                retry: Arc::new(retry),
                delay: Arc::new(delay),
            },
        )
    }

    pub fn rules(&self) -> &RetryRules {
        &self.rules
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[async_trait]
impl<T: RoundTrip> RoundTrip for RetryingTransport<T> {
    async fn round_trip(
        &self,
        mut request: Request,
    ) -> std::result::Result<Response, TransportError> {
        let mut index = 0usize;
        loop {
            let Some(retained) = request.try_clone() else {
                #[cfg(feature = "tracing")]
                tracing::debug!(url = %request.url(), "request body cannot be replayed; sending once");
                return self.inner.round_trip(request).await;
            };

            let outcome = self.inner.round_trip(request).await;
            let wait = {
                let attempt = Attempt::new(index, &retained, &outcome);
                self.rules
                    .should_retry(&attempt)
                    .then(|| self.rules.delay(&attempt))
            };
            let Some(delay) = wait else {
                return outcome;
            };

            #[cfg(feature = "tracing")]
            tracing::debug!(
                attempt = index + 1,
                method = %retained.method(),
                url = %retained.url(),
                "retrying request after {} ms",
                delay.as_millis()
            );

            // Release the failed response before sleeping.
            drop(outcome);
            tokio::time::sleep(delay).await;
            request = retained;
            index += 1;
        }
    }
}
