use crate::transport::TransportError;

/// Error type returned by this crate.
///
/// Every terminal exit of a request maps to exactly one variant; intermediate
/// retryable failures are never surfaced to the caller.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Malformed target URL. Caller error, never retried.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    /// The transport produced no usable result.
    #[error("no response received")]
    NoResponse,
    /// The response shape was unusable (e.g. the body could not be read).
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// Terminal non-2xx status with raw response body.
    #[error("http error {code}: {body}")]
    Status { code: u16, body: String },
    /// The request timed out.
    #[error("request timed out")]
    Timeout,
    /// No network connectivity.
    #[error("network unavailable")]
    NetworkUnavailable,
    /// Response body JSON decoding failure (JSON convenience helpers only).
    #[error("decode error: {0}")]
    Decode(#[source] serde_json::Error),
    /// Request payload JSON encoding failure (JSON convenience helpers only).
    #[error("encode error: {0}")]
    Encode(#[source] serde_json::Error),
    /// Catch-all for a transport fault with no more specific classification.
    #[error("request failed: {0}")]
    RequestFailed(#[source] TransportError),
    /// All permitted attempts were consumed; wraps the most recent failure.
    #[error("retries exhausted: {0}")]
    RetryExhausted(#[source] Box<HttpError>),
    /// Operation aborted by caller-requested cancellation.
    #[error("request cancelled")]
    Cancelled,
}
