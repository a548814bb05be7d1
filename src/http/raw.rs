//! Line-oriented parser for HTTP messages embedded as text
//!
//! Batch responses carry each sub-response as plain HTTP/1.1 text inside a
//! multipart part. The scan runs `FirstLine -> Headers -> Body`: the first
//! line is split on spaces, headers are split on the first `": "`, and
//! everything after the blank line is the body, kept byte for byte.

use bytes::Bytes;
use reqwest::{Method, StatusCode};
use std::io::Cursor;
use thiserror::Error;

use super::{Headers, HttpResponse, header_value, set_header_value};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("message is empty, expected an HTTP start line")]
    MissingStartLine,

    #[error("start line needs at least 3 space-separated tokens: {0:?}")]
    InvalidStartLine(String),

    #[error("invalid status code: {0:?}")]
    InvalidStatusCode(String),

    #[error("invalid HTTP method: {0:?}")]
    InvalidMethod(String),

    #[error("header line has no \": \" separator: {0:?}")]
    InvalidHeader(String),

    #[error("content type is not multipart: {0:?}")]
    NotMultipart(String),

    #[error("multipart content type has no boundary parameter: {0:?}")]
    MissingBoundary(String),

    #[error("multipart body ended before the closing boundary")]
    UnterminatedMultipart,

    #[error("multipart part headers are not valid UTF-8")]
    InvalidEncoding,

    #[error("expected part content type {expected:?}, found {found:?}")]
    UnexpectedPartType { expected: String, found: String },

    #[error("batch returned {actual} parts for {expected} commands")]
    PartCountMismatch { expected: usize, actual: usize },

    #[error("response is missing the {0} header")]
    MissingHeader(&'static str),

    #[error("server sent an invalid byte range: {0}")]
    InvalidRange(String),
}

/// A response decoded from raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHttpResponse {
    pub status: StatusCode,
    pub status_description: String,
    pub headers: Headers,
    pub body: Bytes,
}

impl RawHttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }

    pub fn body_reader(&self) -> Cursor<Bytes> {
        Cursor::new(self.body.clone())
    }
}

impl From<RawHttpResponse> for HttpResponse {
    fn from(raw: RawHttpResponse) -> Self {
        HttpResponse::from_parts(raw.status, raw.headers, raw.body)
    }
}

/// A request decoded from raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHttpRequest {
    pub method: Method,
    pub url: String,
    pub version: String,
    pub headers: Headers,
    pub body: Bytes,
}

impl RawHttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserMode {
    FirstLine,
    Headers,
    Body,
}

struct Scanned<'a> {
    start_tokens: Vec<&'a str>,
    headers: Headers,
    body: &'a str,
}

pub fn parse_response(text: &str) -> Result<RawHttpResponse, FormatError> {
    let scanned = scan(text)?;
    let code = scanned.start_tokens[1];
    let status = code
        .parse::<u16>()
        .ok()
        .and_then(|n| StatusCode::from_u16(n).ok())
        .ok_or_else(|| FormatError::InvalidStatusCode(code.to_string()))?;

    Ok(RawHttpResponse {
        status,
        status_description: scanned.start_tokens[2..].join(" "),
        headers: scanned.headers,
        body: Bytes::copy_from_slice(scanned.body.as_bytes()),
    })
}

pub fn parse_request(text: &str) -> Result<RawHttpRequest, FormatError> {
    let scanned = scan(text)?;
    let verb = scanned.start_tokens[0];
    let method = Method::from_bytes(verb.as_bytes())
        .map_err(|_| FormatError::InvalidMethod(verb.to_string()))?;

    Ok(RawHttpRequest {
        method,
        url: scanned.start_tokens[1].to_string(),
        version: scanned.start_tokens[2..].join(" "),
        headers: scanned.headers,
        body: Bytes::copy_from_slice(scanned.body.as_bytes()),
    })
}

/// Splits a `Name: Value` line on its first `": "`.
pub(crate) fn split_header(line: &str) -> Result<(&str, &str), FormatError> {
    match line.find(": ") {
        Some(split) if split > 0 => Ok((&line[..split], &line[split + 2..])),
        _ => Err(FormatError::InvalidHeader(line.to_string())),
    }
}

fn scan(text: &str) -> Result<Scanned<'_>, FormatError> {
    let mut mode = ParserMode::FirstLine;
    let mut rest = text;
    let mut start_tokens = Vec::new();
    let mut headers = Headers::new();
    let mut body = "";

    while !rest.is_empty() {
        if mode == ParserMode::Body {
            body = rest;
            break;
        }

        let (line, remainder) = next_line(rest);
        rest = remainder;

        if mode == ParserMode::FirstLine {
            start_tokens = line.split(' ').collect();
            if start_tokens.len() < 3 {
                return Err(FormatError::InvalidStartLine(line.to_string()));
            }
            mode = ParserMode::Headers;
        } else if line.is_empty() {
            mode = ParserMode::Body;
        } else {
            // later duplicates overwrite earlier ones
            let (name, value) = split_header(line)?;
            set_header_value(&mut headers, name, value);
        }
    }

    if start_tokens.is_empty() {
        return Err(FormatError::MissingStartLine);
    }

    Ok(Scanned {
        start_tokens,
        headers,
        body,
    })
}

/// Returns the next line without its terminator, and the text after it.
fn next_line(text: &str) -> (&str, &str) {
    match text.find('\n') {
        Some(end) => {
            let line = &text[..end];
            (line.strip_suffix('\r').unwrap_or(line), &text[end + 1..])
        }
        None => (text, ""),
    }
}
