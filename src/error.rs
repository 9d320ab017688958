use std::{io, time::Duration};

use crate::AggregateError;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum BonuslyError {
    /// Invalid options or retry policy; every problem found is listed.
    #[error("invalid configuration: {0}")]
    Config(#[from] AggregateError),
    /// The underlying `reqwest` client could not be constructed.
    #[error("failed to build http client: {0}")]
    Build(reqwest::Error),
    /// Network or request execution error after retries were exhausted.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// The whole call, including retry delays, exceeded the client timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,
    /// Non-success HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// Non-success HTTP status code with a message from the Bonusly API.
    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },
    /// Response decoding error.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Failure of a single send through a [`RoundTrip`](crate::RoundTrip).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{0}")]
    Message(String),
}

/// Closed classification of transport failures.
///
/// Retry policies match on these kinds instead of on error identity.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TransportErrorKind {
    Connect,
    Timeout,
    Request,
    Body,
    Decode,
    Redirect,
    Io(io::ErrorKind),
    Other,
}

impl TransportError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    pub fn kind(&self) -> TransportErrorKind {
        match self {
            Self::Http(err) if err.is_timeout() => TransportErrorKind::Timeout,
            Self::Http(err) if err.is_connect() => TransportErrorKind::Connect,
            Self::Http(err) if err.is_redirect() => TransportErrorKind::Redirect,
            Self::Http(err) if err.is_body() => TransportErrorKind::Body,
            Self::Http(err) if err.is_decode() => TransportErrorKind::Decode,
            Self::Http(err) if err.is_request() => TransportErrorKind::Request,
            Self::Http(_) | Self::Message(_) => TransportErrorKind::Other,
            Self::Io(err) => TransportErrorKind::Io(err.kind()),
        }
    }

    /// Returns `true` for failures that are likely to go away on their own.
    pub fn is_temporary(&self) -> bool {
        match self.kind() {
            TransportErrorKind::Connect
            | TransportErrorKind::Timeout
            | TransportErrorKind::Request
            | TransportErrorKind::Body => true,
            TransportErrorKind::Io(kind) => matches!(
                kind,
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::WouldBlock
            ),
            TransportErrorKind::Decode | TransportErrorKind::Redirect | TransportErrorKind::Other => {
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::{TransportError, TransportErrorKind};

    #[test]
    fn io_errors_keep_their_kind() {
        let err = TransportError::from(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert_eq!(
            err.kind(),
            TransportErrorKind::Io(io::ErrorKind::ConnectionReset)
        );
        assert!(err.is_temporary());
    }

    #[test]
    fn permission_denied_is_not_temporary() {
        let err = TransportError::from(io::Error::new(io::ErrorKind::PermissionDenied, "nope"));
        assert!(!err.is_temporary());
    }

    #[test]
    fn message_errors_are_opaque() {
        let err = TransportError::message("unexpected EOF");
        assert_eq!(err.kind(), TransportErrorKind::Other);
        assert!(!err.is_temporary());
        assert_eq!(err.to_string(), "unexpected EOF");
    }
}
