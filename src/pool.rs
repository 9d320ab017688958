use std::{
    future::Future,
    mem,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;
use reqwest::{IntoUrl, Method, Request, RequestBuilder, Response, StatusCode};
use tokio_util::sync::CancellationToken;

use crate::{
    retry::{Attempt, RetryRules},
    BaseTransport, BonuslyError, Result, RetryPolicy, RetryingTransport, RoundTrip, Transport,
    TransportConfig, TransportError,
};

/// A reusable client handle checked out of a [`ClientPool`].
#[derive(Debug)]
pub struct PooledClient {
    id: u64,
    transport: Transport,
    timeout: Duration,
}

impl PooledClient {
    /// Identifier assigned by the pool, stable across reuse.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn is_retrying(&self) -> bool {
        self.transport.is_retrying()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Bounds a whole call, attempts and retry delays together.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Accepts invalid TLS certificates until the client is released.
    pub fn danger_accept_invalid_certs(&mut self) -> Result<()> {
        self.transport.base_mut().danger_accept_invalid_certs()
    }

    /// Decorates the current transport with `policy`.
    ///
    /// An invalid policy is rejected and the client is left unchanged.
    pub fn add_retry(&mut self, policy: RetryPolicy) -> Result<()> {
        policy.validate()?;
        self.decorate(RetryRules::Policy(policy.normalized()));
        Ok(())
    }

    /// Decorates the current transport with caller-supplied retry logic.
    pub fn add_custom_retry<R, D>(&mut self, retry: R, delay: D)
    where
        R: Fn(&Attempt<'_>) -> bool + Send + Sync + 'static,
        D: Fn(&Attempt<'_>) -> Duration + Send + Sync + 'static,
    {
        self.decorate(RetryRules::Custom {
            retry: Arc::new(retry),
            delay: Arc::new(delay),
        });
    }

    fn decorate(&mut self, rules: RetryRules) {
        let placeholder = Transport::Base(self.transport.base().clone());
        let inner = mem::replace(&mut self.transport, placeholder);
        self.transport = Transport::Retrying(Box::new(RetryingTransport::from_rules(inner, rules)));
    }

    /// Starts building a request on the underlying `reqwest` client.
    pub fn request(&self, method: Method, url: impl IntoUrl) -> RequestBuilder {
        self.transport.base().client().request(method, url)
    }

    /// Sends a request through the transport, bounded by the client timeout.
    ///
    /// The bound ends once response headers arrive; reading the body is up to
    /// the caller. Use [`PooledClient::send_text`] to bound both.
    pub async fn send(&self, request: Request) -> Result<Response> {
        self.bounded(async {
            self.transport
                .round_trip(request)
                .await
                .map_err(BonuslyError::from)
        })
        .await
    }

    /// Sends a request and reads the whole body, all within the client
    /// timeout.
    pub async fn send_text(&self, request: Request) -> Result<(StatusCode, String)> {
        self.bounded(async {
            let response = self.transport.round_trip(request).await?;
            let status = response.status();
            let body = response.text().await.map_err(TransportError::from)?;
            Ok::<_, BonuslyError>((status, body))
        })
        .await
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or_else(|_| Err(BonuslyError::Timeout(self.timeout)))
    }

    /// Like [`PooledClient::send`], but gives up as soon as `cancel` fires,
    /// including while waiting between retries.
    pub async fn send_cancellable(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BonuslyError::Cancelled),
            result = self.send(request) => result,
        }
    }
}

/// Pool of reusable [`PooledClient`] handles.
///
/// Handles are created on demand and never capped. Released handles are
/// reset to the baseline transport before they are handed out again.
#[derive(Debug)]
pub struct ClientPool {
    config: Arc<TransportConfig>,
    baseline: reqwest::Client,
    idle: Mutex<Vec<PooledClient>>,
    next_id: AtomicU64,
}

impl ClientPool {
    /// Creates a pool with the default [`TransportConfig`].
    pub fn new() -> Result<Self> {
        Self::with_config(TransportConfig::default())
    }

    pub fn with_config(config: TransportConfig) -> Result<Self> {
        let baseline = config.build_client(true)?;
        Ok(Self {
            config: Arc::new(config),
            baseline,
            idle: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Number of handles waiting for reuse.
    pub fn idle_len(&self) -> usize {
        self.idle.lock().len()
    }

    /// Hands out an idle client, building a new one if none is available.
    pub fn acquire(&self) -> PooledClient {
        let reused = self.idle.lock().pop();
        if let Some(client) = reused {
            #[cfg(feature = "tracing")]
            tracing::trace!(client = client.id, "reusing pooled client");
            return client;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "tracing")]
        tracing::debug!(client = id, "pool empty; building client");
        PooledClient {
            id,
            transport: Transport::Base(self.baseline_transport()),
            timeout: self.config.request_timeout,
        }
    }

    /// Acquires a client decorated with `policy`.
    pub fn acquire_retrying(&self, policy: RetryPolicy) -> Result<PooledClient> {
        let mut client = self.acquire();
        if let Err(err) = client.add_retry(policy) {
            self.release(client);
            return Err(err);
        }
        Ok(client)
    }

    /// Acquires a client decorated with [`RetryPolicy::default`].
    pub fn acquire_default_retrying(&self) -> Result<PooledClient> {
        self.acquire_retrying(RetryPolicy::default())
    }

    /// Acquires a client decorated with caller-supplied retry logic.
    pub fn acquire_custom_retrying<R, D>(&self, retry: R, delay: D) -> PooledClient
    where
        R: Fn(&Attempt<'_>) -> bool + Send + Sync + 'static,
        D: Fn(&Attempt<'_>) -> Duration + Send + Sync + 'static,
    {
        let mut client = self.acquire();
        client.add_custom_retry(retry, delay);
        client
    }

    /// Resets `client` to the baseline and makes it available again.
    pub fn release(&self, client: PooledClient) {
        let PooledClient { id, transport, .. } = client;
        let client = PooledClient {
            id,
            transport: self.reset(transport),
            timeout: self.config.request_timeout,
        };
        #[cfg(feature = "tracing")]
        tracing::trace!(client = id, "returning client to pool");
        self.idle.lock().push(client);
    }

    fn reset(&self, transport: Transport) -> Transport {
        match transport {
            Transport::Retrying(retrying) => self.reset(retrying.into_inner()),
            Transport::Base(base) if base.is_strict_tls() => Transport::Base(base),
            Transport::Base(_) => Transport::Base(self.baseline_transport()),
        }
    }

    fn baseline_transport(&self) -> BaseTransport {
        BaseTransport::new(self.baseline.clone(), Arc::clone(&self.config), true)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use reqwest::StatusCode;

    use super::ClientPool;
    use crate::{RetryPolicy, Transport};

    fn pool() -> ClientPool {
        ClientPool::new().expect("pool must build")
    }

    #[test]
    fn acquire_builds_baseline_clients() {
        let pool = pool();
        let client = pool.acquire();

        assert!(!client.is_retrying());
        assert!(client.transport().base().is_strict_tls());
        assert_eq!(client.timeout(), Duration::from_secs(300));
        assert_eq!(pool.idle_len(), 0);
    }

    #[test]
    fn released_clients_are_reused() {
        let pool = pool();
        let client = pool.acquire();
        let id = client.id();

        pool.release(client);
        assert_eq!(pool.idle_len(), 1);

        let again = pool.acquire();
        assert_eq!(again.id(), id);
        assert_eq!(pool.idle_len(), 0);
    }

    #[test]
    fn release_strips_every_retry_decoration() {
        let pool = pool();
        let policy = RetryPolicy::new(3).with_statuses([StatusCode::BAD_GATEWAY]);
        let mut client = pool.acquire_retrying(policy.clone()).expect("valid policy");
        client.add_retry(policy).expect("valid policy");
        assert_eq!(client.transport().depth(), 2);

        pool.release(client);
        let client = pool.acquire();
        assert!(!client.is_retrying());
        assert!(matches!(client.transport(), Transport::Base(_)));

        pool.release(client);
        let client = pool
            .acquire_default_retrying()
            .expect("default policy is valid");
        assert_eq!(client.transport().depth(), 1);
        pool.release(client);
        assert_eq!(pool.acquire().transport().depth(), 0);
    }

    #[test]
    fn release_restores_strict_tls_and_timeout() {
        let pool = pool();
        let mut client = pool.acquire_custom_retrying(|_| false, |_| Duration::ZERO);
        client
            .danger_accept_invalid_certs()
            .expect("relaxed client must build");
        client.set_timeout(Duration::from_millis(10));
        assert!(!client.transport().base().is_strict_tls());

        pool.release(client);
        let client = pool.acquire();
        assert!(client.transport().base().is_strict_tls());
        assert_eq!(client.timeout(), pool.config().request_timeout);
    }

    #[test]
    fn invalid_policy_is_a_configuration_error() {
        let pool = pool();
        let policy = RetryPolicy::new(1).with_delays(Duration::from_secs(9), Duration::from_secs(1));
        let err = pool.acquire_retrying(policy).expect_err("policy is invalid");
        assert!(matches!(err, crate::BonuslyError::Config(_)));
        assert_eq!(pool.idle_len(), 1);
    }

    #[test]
    fn rejected_policy_leaves_the_client_usable() {
        let pool = pool();
        let mut client = pool.acquire();
        let id = client.id();
        let policy = RetryPolicy::new(1).with_error_strings([""]);

        assert!(client.add_retry(policy).is_err());
        assert!(!client.is_retrying());

        client
            .add_retry(RetryPolicy::new(1))
            .expect("valid policy");
        assert_eq!(client.transport().depth(), 1);

        pool.release(client);
        assert_eq!(pool.acquire().id(), id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_acquires_hand_out_distinct_clients() {
        let pool = Arc::new(pool());
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let pool = Arc::clone(&pool);
            tasks.push(tokio::spawn(async move {
                let client = pool.acquire();
                let id = client.id();
                tokio::task::yield_now().await;
                (id, client)
            }));
        }

        let mut clients = Vec::new();
        for task in tasks {
            clients.push(task.await.expect("task must not panic"));
        }
        let mut ids: Vec<u64> = clients.iter().map(|(id, _)| *id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 16);

        for (_, client) in clients {
            pool.release(client);
        }
        assert_eq!(pool.idle_len(), 16);
    }
}
