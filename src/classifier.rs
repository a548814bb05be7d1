//! Status classification and service error chains
//!
//! The service reports failures as a JSON document shaped like
//! `{"error": {"code": "...", "message": "...", "innererror": {...}}}`.
//! Each node may wrap a more specific one; the helpers here walk that
//! chain without ever mutating it.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::HttpResponse;

/// Coarse class of an HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseClass {
    Informational,
    Success,
    Redirection,
    ClientError,
    ServerError,
}

impl ResponseClass {
    /// Maps a numeric status onto its class. Anything outside 1xx-4xx is
    /// treated as a server error.
    pub fn of(status: u16) -> Self {
        match status {
            100..=199 => ResponseClass::Informational,
            200..=299 => ResponseClass::Success,
            300..=399 => ResponseClass::Redirection,
            400..=499 => ResponseClass::ClientError,
            _ => ResponseClass::ServerError,
        }
    }

    pub fn is_error(self) -> bool {
        matches!(self, ResponseClass::ClientError | ResponseClass::ServerError)
    }
}

impl From<StatusCode> for ResponseClass {
    fn from(status: StatusCode) -> Self {
        ResponseClass::of(status.as_u16())
    }
}

/// One node of a service error chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(
        rename = "innererror",
        alias = "innerError",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    inner_error: Option<Box<ErrorDetail>>,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            inner_error: None,
        }
    }

    /// Returns this node wrapping `inner` as its more specific cause.
    pub fn wrapping(mut self, inner: ErrorDetail) -> Self {
        self.inner_error = Some(Box::new(inner));
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn inner_error(&self) -> Option<&ErrorDetail> {
        self.inner_error.as_deref()
    }

    /// Iterates from this node inward.
    pub fn chain(&self) -> ErrorChain<'_> {
        ErrorChain { next: Some(self) }
    }
}

pub struct ErrorChain<'a> {
    next: Option<&'a ErrorDetail>,
}

impl<'a> Iterator for ErrorChain<'a> {
    type Item = &'a ErrorDetail;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.inner_error();
        Some(current)
    }
}

/// Top-level service error document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    error: ErrorDetail,
}

impl ErrorResponse {
    pub fn new(error: ErrorDetail) -> Self {
        Self { error }
    }

    pub fn detail(&self) -> &ErrorDetail {
        &self.error
    }

    /// The last node of the chain.
    pub fn innermost_detail(&self) -> &ErrorDetail {
        self.error.chain().last().unwrap_or(&self.error)
    }

    /// Walks inward while the next node has a non-empty message and returns
    /// the message of the node where the walk stopped.
    pub fn message(&self) -> &str {
        let mut current = &self.error;
        while let Some(inner) = current.inner_error() {
            if inner.message.is_empty() {
                break;
            }
            current = inner;
        }
        &current.message
    }

    /// Case-insensitive code match against every node that wraps a more
    /// specific one. The leaf's own code is never compared, so a
    /// single-node chain matches nothing.
    pub fn is_error_code(&self, expected: &str) -> bool {
        self.error
            .chain()
            .filter(|detail| detail.inner_error.is_some())
            .any(|detail| detail.code.eq_ignore_ascii_case(expected))
    }
}

/// A 4xx/5xx response converted into a structured error.
#[derive(Debug, Clone, Error)]
#[error(
    "service error (HTTP {}) {}: {}",
    .status.as_u16(),
    .response.detail().code(),
    .response.message()
)]
pub struct ServiceError {
    status: StatusCode,
    class: ResponseClass,
    response: ErrorResponse,
}

impl ServiceError {
    pub fn new(status: StatusCode, response: ErrorResponse) -> Self {
        Self {
            status,
            class: status.into(),
            response,
        }
    }

    /// Builds the error from a response. When the body is not a service
    /// error document, a single-node chain is synthesized from the status
    /// line and the body text.
    pub fn from_response(response: &HttpResponse) -> Self {
        let status = response.status();
        let decoded = serde_json::from_slice::<ErrorResponse>(response.body()).ok();
        let document = decoded.unwrap_or_else(|| {
            let reason = status.canonical_reason().unwrap_or("Unknown");
            let text = String::from_utf8_lossy(response.body()).trim().to_string();
            let message = if text.is_empty() { reason.to_string() } else { text };
            ErrorResponse::new(ErrorDetail::new(synthesized_code(status), message))
        });
        Self::new(status, document)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn class(&self) -> ResponseClass {
        self.class
    }

    pub fn response(&self) -> &ErrorResponse {
        &self.response
    }

    pub fn code(&self) -> &str {
        self.response.detail().code()
    }

    pub fn message(&self) -> &str {
        self.response.message()
    }

    pub fn is_error_code(&self, code: &str) -> bool {
        self.response.is_error_code(code)
    }
}

fn synthesized_code(status: StatusCode) -> String {
    match status {
        StatusCode::UNAUTHORIZED => "unauthenticated".to_string(),
        StatusCode::FORBIDDEN => "accessDenied".to_string(),
        StatusCode::NOT_FOUND => "itemNotFound".to_string(),
        StatusCode::CONFLICT => "nameAlreadyExists".to_string(),
        StatusCode::TOO_MANY_REQUESTS => "activityLimitReached".to_string(),
        s if s.is_server_error() => "serviceNotAvailable".to_string(),
        s => format!("http{}", s.as_u16()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_node_chain() -> ErrorResponse {
        ErrorResponse::new(
            ErrorDetail::new("invalidRequest", "Request is invalid").wrapping(
                ErrorDetail::new("nameConflict", "Name already in use")
                    .wrapping(ErrorDetail::new("lockedFile", "")),
            ),
        )
    }

    #[test]
    fn test_response_class_ranges() {
        assert_eq!(ResponseClass::of(100), ResponseClass::Informational);
        assert_eq!(ResponseClass::of(204), ResponseClass::Success);
        assert_eq!(ResponseClass::of(303), ResponseClass::Redirection);
        assert_eq!(ResponseClass::of(404), ResponseClass::ClientError);
        assert_eq!(ResponseClass::of(503), ResponseClass::ServerError);
        assert!(ResponseClass::of(429).is_error());
        assert!(!ResponseClass::of(202).is_error());
    }

    #[test]
    fn test_innermost_detail_is_third_node() {
        let chain = three_node_chain();
        assert_eq!(chain.innermost_detail().code(), "lockedFile");
    }

    #[test]
    fn test_message_stops_before_empty_message_node() {
        let chain = three_node_chain();
        assert_eq!(chain.message(), "Name already in use");
    }

    #[test]
    fn test_message_of_single_node() {
        let chain = ErrorResponse::new(ErrorDetail::new("generalException", "boom"));
        assert_eq!(chain.message(), "boom");
        assert_eq!(chain.innermost_detail().code(), "generalException");
    }

    #[test]
    fn test_is_error_code_case_insensitive() {
        let chain = three_node_chain();
        assert!(chain.is_error_code("NAMECONFLICT"));
        assert!(chain.is_error_code("invalidrequest"));
        assert!(!chain.is_error_code("quotaLimitReached"));
    }

    #[test]
    fn test_is_error_code_skips_leaf() {
        let chain = three_node_chain();
        assert!(!chain.is_error_code("lockedFile"));

        let single = ErrorResponse::new(ErrorDetail::new("itemNotFound", "gone"));
        assert!(!single.is_error_code("itemNotFound"));
        assert_eq!(single.detail().code(), "itemNotFound");
    }

    #[test]
    fn test_deserialize_service_document() {
        let json = r#"{
            "error": {
                "code": "invalidRequest",
                "message": "Bad thing",
                "innererror": { "code": "fragmentOverlap" }
            }
        }"#;
        let parsed: ErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.innermost_detail().code(), "fragmentOverlap");
        assert_eq!(parsed.message(), "Bad thing");
    }

    #[test]
    fn test_service_error_from_json_body() {
        let response = HttpResponse::new(StatusCode::CONFLICT).with_body(
            r#"{"error":{"code":"nameAlreadyExists","message":"Exists"}}"#,
        );
        let err = ServiceError::from_response(&response);
        assert_eq!(err.class(), ResponseClass::ClientError);
        assert_eq!(err.code(), "nameAlreadyExists");
        assert_eq!(err.message(), "Exists");
    }

    #[test]
    fn test_service_error_synthesized_from_plain_body() {
        let response = HttpResponse::new(StatusCode::BAD_GATEWAY).with_body("upstream down");
        let err = ServiceError::from_response(&response);
        assert_eq!(err.class(), ResponseClass::ServerError);
        assert_eq!(err.code(), "serviceNotAvailable");
        assert_eq!(err.message(), "upstream down");
        assert!(err.to_string().contains("502"));
    }
}
