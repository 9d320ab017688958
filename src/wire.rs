use serde::Deserialize;

/// Envelope wrapping every Bonusly API response.
///
/// Error bodies carry the same fields without a `result`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: Option<bool>,
    pub message: Option<String>,
    pub result: Option<T>,
}

/// Body of an error response; `result` is ignored.
pub type ErrorEnvelope = Envelope<serde::de::IgnoredAny>;
