use std::collections::HashMap;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::{HttpError, Result};

/// Completed HTTP exchange as produced by the transport.
///
/// Transport success is not HTTP success: a 500 is still a completed
/// exchange, carried here with its status and body intact.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Response body as lossy UTF-8 text.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decodes the body as JSON. Interpretation of the bytes belongs to the
    /// caller; this helper only maps the failure into [`HttpError::Decode`].
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(HttpError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::copy_from_slice(body.as_bytes()),
        }
    }

    #[test]
    fn success_covers_the_full_2xx_range() {
        assert!(response(200, "").is_success());
        assert!(response(204, "").is_success());
        assert!(response(299, "").is_success());
        assert!(!response(199, "").is_success());
        assert!(!response(300, "").is_success());
        assert!(!response(500, "").is_success());
    }

    #[test]
    fn json_decodes_body_or_reports_decode_error() {
        #[derive(Debug, serde::Deserialize)]
        struct Payload {
            id: u32,
        }

        let ok: Payload = response(200, r#"{"id": 7}"#).json().expect("valid JSON");
        assert_eq!(ok.id, 7);

        let err = response(200, "not json").json::<Payload>().expect_err("invalid JSON");
        assert!(matches!(err, HttpError::Decode(_)));
    }
}
