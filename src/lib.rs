//! `resilient-http` is a resilient outbound HTTP request layer.
//!
//! It turns a logical request into a completed response under unreliable
//! network and server conditions:
//! - bounded retry with capped exponential backoff ([`RetryPolicy`])
//! - cooperative cancellation at every suspension point
//! - a closed error taxonomy ([`HttpError`])
//! - a swappable one-attempt [`Transport`] seam for test harnesses
//!
//! The crate receives a fully-formed request and returns a response or a
//! classified failure; it does not know what the bytes mean.

mod client;
mod error;
mod policy;
mod request;
mod response;
mod transport;

pub use client::ResilientClient;
pub use error::HttpError;
pub use policy::RetryPolicy;
pub use request::{HttpMethod, HttpRequest, DEFAULT_TIMEOUT};
pub use response::HttpResponse;
pub use transport::{ReqwestTransport, Transport, TransportCall, TransportError};

pub type Result<T> = std::result::Result<T, HttpError>;
