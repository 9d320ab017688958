use std::{fmt, sync::Arc};

use async_trait::async_trait;
use reqwest::{header, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::{
    wire::{Envelope, ErrorEnvelope},
    Bonus, BonuslyError, ClientOptions, ClientPool, CreateBonusRequest, ListBonusesRequest,
    ListRewardsRequest, PooledClient, Result, RewardCategory, TransportError, UserInfo,
};

const CONTENT_TYPE_JSON: &str = "application/json";

/// Bonusly API operations.
///
/// Implemented by [`BonuslyClient`]; with the `mock` feature, `MockClient`
/// implements it without any network access.
#[async_trait]
pub trait Client: Send + Sync {
    async fn create_bonus(&self, request: &CreateBonusRequest) -> Result<Bonus>;

    async fn get_bonus(&self, id: &str) -> Result<Bonus>;

    async fn update_bonus(&self, id: &str, reason: &str) -> Result<Bonus>;

    async fn delete_bonus(&self, id: &str) -> Result<()>;

    async fn list_bonuses(&self, request: &ListBonusesRequest) -> Result<Vec<Bonus>>;

    async fn list_rewards(&self, request: &ListRewardsRequest) -> Result<Vec<RewardCategory>>;

    async fn my_user_info(&self) -> Result<UserInfo>;

    /// Releases whatever the client holds.
    fn close(self)
    where
        Self: Sized;
}

/// HTTP client for the Bonusly REST API.
///
/// Requests go through a retrying client checked out of a [`ClientPool`].
/// Call [`BonuslyClient::close`] when done: dropping the client instead
/// discards its pooled handle rather than returning it to the pool.
pub struct BonuslyClient {
    http: PooledClient,
    pool: Arc<ClientPool>,
    base_url: String,
    authorization: String,
}

impl fmt::Debug for BonuslyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BonuslyClient")
            .field("base_url", &self.base_url)
            .field("authorization", &"<redacted>")
            .field("client", &self.http.id())
            .finish()
    }
}

impl BonuslyClient {
    /// Creates a client backed by its own pool.
    pub fn new(options: ClientOptions) -> Result<Self> {
        options.validate()?;
        let pool = Arc::new(ClientPool::new()?);
        Self::with_pool(options, pool)
    }

    /// Creates a client that borrows its HTTP client from a shared pool.
    pub fn with_pool(options: ClientOptions, pool: Arc<ClientPool>) -> Result<Self> {
        options.validate()?;
        let mut http = pool.acquire_retrying(options.retry)?;
        http.set_timeout(options.timeout);

        Ok(Self {
            http,
            pool,
            base_url: options.base_url.trim().trim_end_matches('/').to_owned(),
            authorization: format!("Bearer {}", options.access_token.trim()),
        })
    }

    /// Creates a client from `BONUSLY_TOKEN` / `BONUSLY_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientOptions::from_env()?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Gives a bonus.
    pub async fn create_bonus(&self, request: &CreateBonusRequest) -> Result<Bonus> {
        let builder = self.request(Method::POST, &["bonuses"]).json(request);
        self.fetch(builder).await
    }

    pub async fn get_bonus(&self, id: &str) -> Result<Bonus> {
        let builder = self.request(Method::GET, &["bonuses", id]);
        self.fetch(builder).await
    }

    pub async fn list_bonuses(&self, request: &ListBonusesRequest) -> Result<Vec<Bonus>> {
        let builder = self
            .request(Method::GET, &["bonuses"])
            .query(&request.query_pairs());
        self.fetch(builder).await
    }

    /// Replaces the reason of an existing bonus.
    pub async fn update_bonus(&self, id: &str, reason: &str) -> Result<Bonus> {
        let payload = CreateBonusRequest::new(reason);
        let builder = self.request(Method::PUT, &["bonuses", id]).json(&payload);
        self.fetch(builder).await
    }

    pub async fn delete_bonus(&self, id: &str) -> Result<()> {
        let builder = self.request(Method::DELETE, &["bonuses", id]);
        self.send(builder).await.map(drop)
    }

    pub async fn list_rewards(&self, request: &ListRewardsRequest) -> Result<Vec<RewardCategory>> {
        let builder = self
            .request(Method::GET, &["rewards"])
            .query(&request.query_pairs());
        self.fetch(builder).await
    }

    /// Returns the user that owns the access token.
    pub async fn my_user_info(&self) -> Result<UserInfo> {
        let builder = self.request(Method::GET, &["users", "me"]);
        self.fetch(builder).await
    }

    /// Returns the HTTP client to its pool.
    pub fn close(self) {
        self.pool.release(self.http);
    }

    fn request(&self, method: Method, parts: &[&str]) -> RequestBuilder {
        self.http
            .request(method, url_route(&self.base_url, parts))
            .header(header::AUTHORIZATION, &self.authorization)
            .header(header::CONTENT_TYPE, CONTENT_TYPE_JSON)
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let body = self.send(builder).await?;
        let envelope = serde_json::from_str::<Envelope<T>>(&body).map_err(|err| {
            BonuslyError::Decode(format!("received unexpected response body: {err}; body: {body}"))
        })?;

        if envelope.success == Some(false) {
            return Err(BonuslyError::Api {
                status: StatusCode::OK.as_u16(),
                message: envelope
                    .message
                    .unwrap_or_else(|| "request unsuccessful for unknown reason".to_owned()),
            });
        }
        envelope
            .result
            .ok_or_else(|| BonuslyError::Decode(format!("missing result in response body: {body}")))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<String> {
        let request = builder.build().map_err(TransportError::from)?;
        let (status, body) = self.http.send_text(request).await?;

        if status != StatusCode::OK {
            return Err(error_response(status, body));
        }
        Ok(body)
    }
}

#[async_trait]
impl Client for BonuslyClient {
    async fn create_bonus(&self, request: &CreateBonusRequest) -> Result<Bonus> {
        BonuslyClient::create_bonus(self, request).await
    }

    async fn get_bonus(&self, id: &str) -> Result<Bonus> {
        BonuslyClient::get_bonus(self, id).await
    }

    async fn update_bonus(&self, id: &str, reason: &str) -> Result<Bonus> {
        BonuslyClient::update_bonus(self, id, reason).await
    }

    async fn delete_bonus(&self, id: &str) -> Result<()> {
        BonuslyClient::delete_bonus(self, id).await
    }

    async fn list_bonuses(&self, request: &ListBonusesRequest) -> Result<Vec<Bonus>> {
        BonuslyClient::list_bonuses(self, request).await
    }

    async fn list_rewards(&self, request: &ListRewardsRequest) -> Result<Vec<RewardCategory>> {
        BonuslyClient::list_rewards(self, request).await
    }

    async fn my_user_info(&self) -> Result<UserInfo> {
        BonuslyClient::my_user_info(self).await
    }

    fn close(self) {
        BonuslyClient::close(self)
    }
}

fn url_route(base_url: &str, parts: &[&str]) -> String {
    let path: Vec<&str> = parts
        .iter()
        .map(|part| part.trim_matches('/'))
        .filter(|part| !part.is_empty())
        .collect();
    if path.is_empty() {
        return base_url.to_owned();
    }
    format!("{base_url}/{}", path.join("/"))
}

fn error_response(status: StatusCode, body: String) -> BonuslyError {
    let status = status.as_u16();
    match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(Envelope {
            message: Some(message),
            ..
        }) => BonuslyError::Api { status, message },
        Ok(Envelope {
            success: None | Some(false),
            ..
        }) => BonuslyError::Api {
            status,
            message: "request unsuccessful for unknown reason".to_owned(),
        },
        Ok(_) | Err(_) => BonuslyError::Http { status, body },
    }
}
