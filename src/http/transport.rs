use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use std::io::Cursor;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::{Headers, header_value, set_header_value};

pub const CONTENT_RANGE: &str = "Content-Range";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const LOCATION: &str = "Location";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request cancelled")]
    Cancelled,

    #[error("connection timeout")]
    Timeout,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An outbound request: verb, target, headers and a body buffer that is
/// filled incrementally before the exchange starts.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    url: String,
    headers: Headers,
    content_type: Option<String>,
    body: BytesMut,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            content_type: None,
            body: BytesMut::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        set_header_value(&mut self.headers, name, value);
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = Some(content_type.into());
    }

    /// Appends bytes to the request body.
    pub fn write_body(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }

    /// Replaces the request body.
    pub fn set_body(&mut self, data: impl AsRef<[u8]>) {
        self.body.clear();
        self.body.extend_from_slice(data.as_ref());
    }

    /// Serializes `value` as the JSON body.
    pub fn set_json<T: Serialize>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        let encoded = serde_json::to_vec(value)?;
        self.set_content_type(mime::APPLICATION_JSON.as_ref());
        self.set_body(encoded);
        Ok(())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body.freeze()
    }
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    pub fn from_parts(status: StatusCode, headers: Headers, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        set_header_value(&mut self.headers, name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_json(self, value: &serde_json::Value) -> Self {
        self.with_header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
            .with_body(value.to_string())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE)
    }

    pub fn location(&self) -> Option<&str> {
        self.header(LOCATION)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_bytes(&self) -> Bytes {
        self.body.clone()
    }

    pub fn body_reader(&self) -> Cursor<Bytes> {
        Cursor::new(self.body.clone())
    }

    /// True when the response carries a non-empty JSON document.
    pub fn has_json_body(&self) -> bool {
        !self.body.is_empty()
            && self
                .content_type()
                .and_then(|ct| ct.parse::<mime::Mime>().ok())
                .is_some_and(|m| {
                    m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON)
                })
    }
}

/// The capability that moves bytes over the wire.
///
/// Implementations must observe `cancel` while the exchange is in flight
/// and return [`TransportError::Cancelled`] once it fires.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, TransportError> {
        (**self).send(request, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_body_appends() {
        let mut request = HttpRequest::new(Method::PUT, "https://example.com/up");
        request.write_body(b"abc");
        request.write_body(b"def");
        assert_eq!(request.body(), b"abcdef");
        assert_eq!(request.into_body(), Bytes::from_static(b"abcdef"));
    }

    #[test]
    fn test_response_header_lookup_ignores_case() {
        let response = HttpResponse::new(StatusCode::ACCEPTED)
            .with_header("location", "https://example.com/monitor");
        assert_eq!(response.location(), Some("https://example.com/monitor"));
        assert_eq!(response.header("LOCATION"), Some("https://example.com/monitor"));
    }

    #[test]
    fn test_has_json_body() {
        let json = HttpResponse::new(StatusCode::OK).with_json(&serde_json::json!({"a": 1}));
        assert!(json.has_json_body());

        let with_charset = HttpResponse::new(StatusCode::OK)
            .with_header(CONTENT_TYPE, "application/json; charset=utf-8")
            .with_body("{}");
        assert!(with_charset.has_json_body());

        let empty = HttpResponse::new(StatusCode::SEE_OTHER)
            .with_header(CONTENT_TYPE, "application/json");
        assert!(!empty.has_json_body());

        let text = HttpResponse::new(StatusCode::OK)
            .with_header(CONTENT_TYPE, "text/plain")
            .with_body("hello");
        assert!(!text.has_json_body());
    }
}
