use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    transport::{ReqwestTransport, Transport, TransportCall, TransportError},
    HttpError, HttpMethod, HttpRequest, HttpResponse, Result, RetryPolicy,
};

/// Resilient HTTP client.
///
/// Drives the sequential attempt loop for one logical request: invokes the
/// transport, consults the [`RetryPolicy`], sleeps the capped exponential
/// backoff between attempts, and maps every terminal exit into exactly one
/// [`HttpError`]. Holds no mutable state, so one instance is safely shared
/// across concurrent calls.
#[derive(Clone)]
pub struct ResilientClient {
    transport: Arc<dyn Transport>,
    default_policy: RetryPolicy,
}

impl fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientClient")
            .field("default_policy", &self.default_policy)
            .finish()
    }
}

impl Default for ResilientClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ResilientClient {
    /// Creates a client over the production reqwest transport with the
    /// default retry policy.
    pub fn new() -> Self {
        Self {
            transport: Arc::new(ReqwestTransport::new()),
            default_policy: RetryPolicy::default(),
        }
    }

    /// Substitutes the one-attempt transport. Test harnesses inject a
    /// scripted implementation here.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Sets the policy used by the convenience verbs.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// The policy the convenience verbs run under.
    pub fn default_policy(&self) -> &RetryPolicy {
        &self.default_policy
    }

    /// Performs `request` under `policy`, returning the first 2xx response
    /// or the classified terminal failure.
    pub async fn perform_request(
        &self,
        request: &HttpRequest,
        policy: &RetryPolicy,
    ) -> Result<HttpResponse> {
        self.perform_request_cancellable(request, policy, &CancellationToken::new())
            .await
    }

    /// [`perform_request`](Self::perform_request) with cooperative
    /// cancellation.
    ///
    /// `cancel` is observed at both suspension points: while an attempt is in
    /// flight (the attempt future is dropped, so a late completion can never
    /// finish the operation) and during the inter-attempt backoff. Once
    /// observed, no further attempts are made and no delay is honored.
    pub async fn perform_request_cancellable(
        &self,
        request: &HttpRequest,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse> {
        let call = lower_request(request)?;
        let mut last_error: Option<HttpError> = None;

        for attempt in 0..=policy.max_retries {
            if cancel.is_cancelled() {
                return Err(HttpError::Cancelled);
            }

            let started = Instant::now();
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(HttpError::Cancelled),
                outcome = self.transport.send(call.clone()) => outcome,
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(response) if response.is_success() => {
                    debug!(
                        url = %call.url,
                        status = response.status,
                        attempt,
                        elapsed_ms,
                        "request succeeded"
                    );
                    return Ok(response);
                }
                Ok(response) => {
                    let status = response.status;
                    if policy.should_retry_status(status, attempt) {
                        debug!(url = %call.url, status, attempt, elapsed_ms, "retryable status");
                        self.backoff(policy, attempt, cancel).await?;
                        continue;
                    }
                    let error = HttpError::Status {
                        code: status,
                        body: response.body_text(),
                    };
                    if policy.is_retryable_status(status) {
                        // Retryable kind with the attempt budget spent.
                        last_error = Some(error);
                        break;
                    }
                    warn!(url = %call.url, status, attempt, "terminal status");
                    return Err(error);
                }
                Err(fault) => {
                    if policy.should_retry_transport(&fault, attempt) {
                        debug!(
                            url = %call.url,
                            fault = %fault,
                            attempt,
                            elapsed_ms,
                            "transient transport fault"
                        );
                        self.backoff(policy, attempt, cancel).await?;
                        continue;
                    }
                    let transient = fault.is_transient();
                    let error = classify_transport_error(fault);
                    if transient {
                        last_error = Some(error);
                        break;
                    }
                    warn!(url = %call.url, error = %error, attempt, "terminal transport fault");
                    return Err(error);
                }
            }
        }

        let last = last_error.unwrap_or(HttpError::NoResponse);
        // With a zero retry budget the single attempt's own classification is
        // the terminal outcome; the exhaustion wrapper only applies when
        // retries were actually spent.
        if policy.max_retries == 0 {
            return Err(last);
        }
        warn!(url = %call.url, attempts = policy.max_retries + 1, last = %last, "retries exhausted");
        Err(HttpError::RetryExhausted(Box::new(last)))
    }

    async fn backoff(
        &self,
        policy: &RetryPolicy,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let delay = policy.delay_for(attempt);
        debug!(delay_ms = delay.as_millis() as u64, "waiting before retry");
        tokio::select! {
            _ = cancel.cancelled() => Err(HttpError::Cancelled),
            _ = sleep(delay) => Ok(()),
        }
    }

    /// GET `url` under the client's default policy.
    pub async fn get(&self, url: impl Into<String>) -> Result<HttpResponse> {
        self.perform_request(&HttpRequest::new(url), &self.default_policy)
            .await
    }

    /// POST `body` to `url` under the client's default policy.
    pub async fn post(
        &self,
        url: impl Into<String>,
        body: impl Into<Bytes>,
    ) -> Result<HttpResponse> {
        let request = HttpRequest::new(url)
            .with_method(HttpMethod::Post)
            .with_body(body);
        self.perform_request(&request, &self.default_policy).await
    }

    /// PUT `body` to `url` under the client's default policy.
    pub async fn put(
        &self,
        url: impl Into<String>,
        body: impl Into<Bytes>,
    ) -> Result<HttpResponse> {
        let request = HttpRequest::new(url)
            .with_method(HttpMethod::Put)
            .with_body(body);
        self.perform_request(&request, &self.default_policy).await
    }

    /// DELETE `url` under the client's default policy.
    pub async fn delete(&self, url: impl Into<String>) -> Result<HttpResponse> {
        let request = HttpRequest::new(url).with_method(HttpMethod::Delete);
        self.perform_request(&request, &self.default_policy).await
    }

    /// GET `url` and return only the body bytes.
    pub async fn download(&self, url: impl Into<String>) -> Result<Bytes> {
        Ok(self.get(url).await?.body)
    }

    /// POST `body` to `url` with an explicit content type.
    pub async fn upload(
        &self,
        url: impl Into<String>,
        body: impl Into<Bytes>,
        content_type: &str,
    ) -> Result<HttpResponse> {
        let request = HttpRequest::new(url)
            .with_method(HttpMethod::Post)
            .with_header("Content-Type", content_type)
            .with_body(body);
        self.perform_request(&request, &self.default_policy).await
    }

    /// GET `url` and decode the response body as JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, url: impl Into<String>) -> Result<T> {
        self.get(url).await?.json()
    }

    /// Serialize `payload` as JSON, POST it to `url`, and decode the JSON
    /// response.
    pub async fn post_json<B, T>(&self, url: impl Into<String>, payload: &B) -> Result<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let body = serde_json::to_vec(payload).map_err(HttpError::Encode)?;
        let request = HttpRequest::new(url)
            .with_method(HttpMethod::Post)
            .with_header("Content-Type", "application/json")
            .with_body(body);
        self.perform_request(&request, &self.default_policy)
            .await?
            .json()
    }
}

/// Validates and lowers a request into a transport call, once per operation.
///
/// A body without an explicit Content-Type gets a generic octet-stream
/// default; the JSON helpers set their own.
fn lower_request(request: &HttpRequest) -> Result<TransportCall> {
    let url: reqwest::Url = request
        .url
        .parse()
        .map_err(|_| HttpError::InvalidUrl(request.url.clone()))?;

    let mut headers = request.headers.clone();
    if request.body.is_some() && !request.has_header("content-type") {
        headers.insert(
            "Content-Type".to_owned(),
            "application/octet-stream".to_owned(),
        );
    }

    Ok(TransportCall {
        method: request.method,
        url,
        headers,
        body: request.body.clone(),
        timeout: request.timeout,
    })
}

fn classify_transport_error(fault: TransportError) -> HttpError {
    match fault {
        TransportError::Timeout => HttpError::Timeout,
        TransportError::NetworkUnavailable => HttpError::NetworkUnavailable,
        TransportError::NoResponse => HttpError::NoResponse,
        TransportError::MalformedResponse(detail) => HttpError::InvalidResponse(detail),
        other => HttpError::RequestFailed(other),
    }
}
