//! `bonusly-http` is an async HTTP client for the Bonusly API.
//!
//! The crate is built around a resilient transport layer:
//! - [`ClientPool`] hands out reusable [`PooledClient`] handles and resets
//!   them to a clean baseline on release.
//! - [`RetryingTransport`] decorates any [`RoundTrip`] with a [`RetryPolicy`]
//!   (exponential backoff with jitter) or custom retry functions.
//! - [`ErrorCatcher`] collects independent validation failures into one
//!   [`AggregateError`].
//!
//! [`BonuslyClient`] uses all three to talk to `https://bonus.ly/api/v1`.
//! Code written against the [`Client`] trait can be tested with
//! `MockClient` (feature `mock`).

mod catcher;
mod client;
mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod options;
mod pool;
pub mod retry;
mod transport;
mod types;
mod wire;

pub use catcher::{AggregateError, ErrorCatcher};
pub use client::{BonuslyClient, Client};
pub use error::{BonuslyError, TransportError, TransportErrorKind};
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockCall, MockClient};
pub use options::{ClientOptions, PRODUCTION_BASE_URL};
pub use pool::{ClientPool, PooledClient};
pub use retry::{Attempt, RetryPolicy, RetryingTransport};
pub use transport::{BaseTransport, RoundTrip, Transport, TransportConfig};
pub use types::{
    Bonus, CreateBonusRequest, ListBonusesRequest, ListRewardsRequest, Reward, RewardCategory,
    RewardDenomination, RewardDescription, UserInfo,
};

pub type Result<T> = std::result::Result<T, BonuslyError>;
