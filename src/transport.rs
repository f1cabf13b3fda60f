use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Url;

use crate::{HttpMethod, HttpResponse};

/// Fully lowered request handed to the transport for one attempt.
#[derive(Clone, Debug)]
pub struct TransportCall {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    pub timeout: Duration,
}

/// Transport-level fault from a single attempt. Not an HTTP status: a
/// completed exchange with a non-2xx status is a response, not a fault.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("attempt timed out")]
    Timeout,
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    #[error("network unavailable")]
    NetworkUnavailable,
    #[error("host resolution failed: {0}")]
    DnsFailure(String),
    #[error("host unreachable: {0}")]
    HostUnreachable(String),
    #[error("malformed server response: {0}")]
    MalformedResponse(String),
    #[error("no response produced")]
    NoResponse,
    #[error("transport fault: {0}")]
    Other(#[source] Box<dyn StdError + Send + Sync>),
}

impl TransportError {
    /// Transient faults are eligible for retry within the policy's attempt
    /// budget; everything else is terminal on first sight.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::ConnectionLost(_)
                | Self::NetworkUnavailable
                | Self::DnsFailure(_)
                | Self::HostUnreachable(_)
                | Self::MalformedResponse(_)
        )
    }
}

/// The black-box "perform one attempt" primitive the retry loop is built on.
///
/// Implementations perform exactly one request/response exchange and must be
/// safe for concurrent use. Test harnesses substitute a scripted
/// implementation here.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, call: TransportCall) -> Result<HttpResponse, TransportError>;
}

/// Production transport over a pooled [`reqwest::Client`].
///
/// Connection pooling, DNS and TLS are reqwest's concern; this type only
/// lowers a call and classifies the outcome.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport").finish()
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, call: TransportCall) -> Result<HttpResponse, TransportError> {
        let mut request = self
            .http
            .request(call.method.into(), call.url)
            .timeout(call.timeout);
        for (name, value) in &call.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = call.body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(classify_reqwest_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.to_string(), v.to_owned()))
            })
            .collect();
        // A failure while draining the body leaves no usable exchange; the
        // server spoke, but not in a shape we can hand to the caller.
        let body = response
            .bytes()
            .await
            .map_err(|err| TransportError::MalformedResponse(err.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout;
    }
    if err.is_connect() {
        // Refine by the underlying io error where one is present.
        return match io_error_kind(&err) {
            Some(std::io::ErrorKind::NotConnected) => TransportError::NetworkUnavailable,
            Some(std::io::ErrorKind::AddrNotAvailable) => {
                TransportError::HostUnreachable(err.to_string())
            }
            _ => TransportError::ConnectionLost(err.to_string()),
        };
    }
    if err.is_body() || err.is_decode() {
        return TransportError::MalformedResponse(err.to_string());
    }
    TransportError::Other(Box::new(err))
}

fn io_error_kind(err: &(dyn StdError + 'static)) -> Option<std::io::ErrorKind> {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            return Some(io.kind());
        }
        source = cause.source();
    }
    None
}
