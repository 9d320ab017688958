use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Request, Response};

use crate::{BonuslyError, RetryingTransport, TransportError};

/// Sends one request and returns one response or error.
#[async_trait]
pub trait RoundTrip: Send + Sync {
    async fn round_trip(&self, request: Request) -> Result<Response, TransportError>;
}

/// Baseline network settings for pooled clients.
///
/// The defaults are fixed policy values; build a custom value to change
/// them.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransportConfig {
    /// Bound on a whole call through a pooled client, retries included.
    pub request_timeout: Duration,
    /// TCP dial timeout.
    pub connect_timeout: Duration,
    /// TLS handshake timeout, added on top of the dial timeout.
    pub tls_handshake_timeout: Duration,
    /// How long an idle connection is kept around.
    pub idle_timeout: Duration,
    pub max_idle_per_host: usize,
    /// When disabled, connections are never reused and TCP keep-alive is off.
    pub keep_alive: bool,
    /// Accept gzip and brotli encoded responses.
    pub compression: bool,
    /// Honor `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY` from the environment.
    pub proxy_from_env: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5 * 60),
            connect_timeout: Duration::from_secs(30),
            tls_handshake_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(20),
            max_idle_per_host: 10,
            keep_alive: false,
            compression: true,
            proxy_from_env: true,
        }
    }
}

impl TransportConfig {
    /// Builds a `reqwest` client with these settings.
    ///
    /// `strict_tls = false` accepts invalid certificates.
    pub fn build_client(&self, strict_tls: bool) -> Result<reqwest::Client, BonuslyError> {
        // reqwest bounds dial and handshake together.
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout + self.tls_handshake_timeout)
            .pool_idle_timeout(self.idle_timeout)
            .gzip(self.compression)
            .brotli(self.compression)
            .danger_accept_invalid_certs(!strict_tls);

        builder = if self.keep_alive {
            builder
                .pool_max_idle_per_host(self.max_idle_per_host)
                .tcp_keepalive(self.idle_timeout)
        } else {
            builder.pool_max_idle_per_host(0).tcp_keepalive(None::<Duration>)
        };

        if !self.proxy_from_env {
            builder = builder.no_proxy();
        }

        builder.build().map_err(BonuslyError::Build)
    }
}

/// Undecorated transport backed by a `reqwest` client.
#[derive(Clone)]
pub struct BaseTransport {
    client: reqwest::Client,
    config: Arc<TransportConfig>,
    strict_tls: bool,
}

impl fmt::Debug for BaseTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseTransport")
            .field("strict_tls", &self.strict_tls)
            .finish_non_exhaustive()
    }
}

impl BaseTransport {
    pub(crate) fn new(client: reqwest::Client, config: Arc<TransportConfig>, strict_tls: bool) -> Self {
        Self {
            client,
            config,
            strict_tls,
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn is_strict_tls(&self) -> bool {
        self.strict_tls
    }

    /// Rebuilds the client so that invalid TLS certificates are accepted.
    pub fn danger_accept_invalid_certs(&mut self) -> Result<(), BonuslyError> {
        if self.strict_tls {
            self.client = self.config.build_client(false)?;
            self.strict_tls = false;
        }
        Ok(())
    }
}

#[async_trait]
impl RoundTrip for BaseTransport {
    async fn round_trip(&self, request: Request) -> Result<Response, TransportError> {
        self.client.execute(request).await.map_err(TransportError::from)
    }
}

/// The transports a pooled client can hold.
#[derive(Debug)]
pub enum Transport {
    Base(BaseTransport),
    Retrying(Box<RetryingTransport<Transport>>),
}

impl Transport {
    pub fn is_retrying(&self) -> bool {
        matches!(self, Self::Retrying(_))
    }

    /// The innermost, undecorated transport.
    pub fn base(&self) -> &BaseTransport {
        match self {
            Self::Base(base) => base,
            Self::Retrying(retrying) => retrying.inner().base(),
        }
    }

    pub fn base_mut(&mut self) -> &mut BaseTransport {
        match self {
            Self::Base(base) => base,
            Self::Retrying(retrying) => retrying.inner_mut().base_mut(),
        }
    }

    /// Number of retry decorations around the base transport.
    pub fn depth(&self) -> usize {
        match self {
            Self::Base(_) => 0,
            Self::Retrying(retrying) => 1 + retrying.inner().depth(),
        }
    }
}

#[async_trait]
impl RoundTrip for Transport {
    async fn round_trip(&self, request: Request) -> Result<Response, TransportError> {
        match self {
            Self::Base(base) => base.round_trip(request).await,
            Self::Retrying(retrying) => retrying.round_trip(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::TransportConfig;

    #[test]
    fn default_config_uses_fixed_constants() {
        let config = TransportConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(300));
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.tls_handshake_timeout, Duration::from_secs(10));
        assert_eq!(config.idle_timeout, Duration::from_secs(20));
        assert_eq!(config.max_idle_per_host, 10);
        assert!(!config.keep_alive);
        assert!(config.compression);
        assert!(config.proxy_from_env);
    }

    #[test]
    fn builds_strict_and_relaxed_clients() {
        let config = TransportConfig::default();
        assert!(config.build_client(true).is_ok());
        assert!(config.build_client(false).is_ok());
    }
}
