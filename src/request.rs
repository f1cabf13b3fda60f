use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use bytes::Bytes;

/// Per-attempt timeout applied when the caller does not override it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP method of an outbound request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of one outbound request.
///
/// Header keys are unique as given; case-insensitive matching is the
/// transport's concern. Credential attachment (bearer tokens, Basic auth)
/// is the caller's responsibility, supplied as plain headers.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    pub timeout: Duration,
}

impl HttpRequest {
    /// Builds a GET request for `url` with the default timeout and no body.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            headers: HashMap::new(),
            body: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn has_header(&self, name: &str) -> bool {
        self.headers.keys().any(|key| key.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_request_defaults_to_get_with_default_timeout() {
        let request = HttpRequest::new("https://api.example.com/v1/models");
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.timeout, DEFAULT_TIMEOUT);
        assert!(request.headers.is_empty());
        assert!(request.body.is_none());
    }

    #[test]
    fn has_header_matches_case_insensitively() {
        let request = HttpRequest::new("https://api.example.com")
            .with_header("Content-Type", "application/json");
        assert!(request.has_header("content-type"));
        assert!(request.has_header("CONTENT-TYPE"));
        assert!(!request.has_header("authorization"));
    }
}
