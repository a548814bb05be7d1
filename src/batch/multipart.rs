use bytes::Bytes;
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use crate::http::{FormatError, Headers, HttpResponse, RawHttpResponse, parse_response, set_header_value};

pub const APPLICATION_HTTP: &str = "application/http";
pub const MULTIPART_MIXED: &str = "multipart/mixed";
const DEFAULT_TRANSFER_ENCODING: &str = "binary";
const LINE_END: &[u8] = b"\r\n";

/// Body of one part.
pub enum PartBody {
    Empty,
    Text(String),
    Bytes(Bytes),
    /// Copied into the output when the message is written.
    Stream(Box<dyn AsyncRead + Send + Unpin>),
}

impl fmt::Debug for PartBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartBody::Empty => f.write_str("Empty"),
            PartBody::Text(text) => f.debug_tuple("Text").field(text).finish(),
            PartBody::Bytes(bytes) => f.debug_tuple("Bytes").field(bytes).finish(),
            PartBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl PartBody {
    /// Text when the bytes are valid UTF-8, raw bytes otherwise.
    pub(crate) fn from_vec(data: Vec<u8>) -> Self {
        if data.is_empty() {
            return PartBody::Empty;
        }
        match String::from_utf8(data) {
            Ok(text) => PartBody::Text(text),
            Err(err) => PartBody::Bytes(Bytes::from(err.into_bytes())),
        }
    }
}

/// One part of a multipart message.
#[derive(Debug)]
pub struct MultipartContent {
    content_id: Option<String>,
    content_type: Option<String>,
    transfer_encoding: Option<String>,
    headers: Headers,
    body: PartBody,
}

impl Default for MultipartContent {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartContent {
    pub fn new() -> Self {
        Self {
            content_id: None,
            content_type: None,
            transfer_encoding: Some(DEFAULT_TRANSFER_ENCODING.to_string()),
            headers: Headers::new(),
            body: PartBody::Empty,
        }
    }

    pub fn text(content_type: impl Into<String>, text: impl Into<String>) -> Self {
        let mut part = Self::new();
        part.content_type = Some(content_type.into());
        part.body = PartBody::Text(text.into());
        part
    }

    pub fn stream(
        content_type: impl Into<String>,
        reader: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        let mut part = Self::new();
        part.content_type = Some(content_type.into());
        part.body = PartBody::Stream(Box::new(reader));
        part
    }

    pub fn with_content_id(mut self, content_id: impl Into<String>) -> Self {
        self.content_id = Some(content_id.into());
        self
    }

    /// Records a header, lifting `Content-Type`, `Content-Transfer-Encoding`
    /// and `Content-ID` into their own fields.
    pub fn add_header(&mut self, name: &str, value: &str) {
        if name.eq_ignore_ascii_case("content-type") {
            self.content_type = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("content-transfer-encoding") {
            self.transfer_encoding = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("content-id") {
            self.content_id = Some(value.to_string());
        } else {
            set_header_value(&mut self.headers, name, value);
        }
    }

    pub fn content_id(&self) -> Option<&str> {
        self.content_id.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn transfer_encoding(&self) -> Option<&str> {
        self.transfer_encoding.as_deref()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &PartBody {
        &self.body
    }

    pub(crate) fn set_body(&mut self, body: PartBody) {
        self.body = body;
    }

    /// Body as text, when it is held in memory as valid UTF-8.
    pub fn text_content(&self) -> Option<&str> {
        match &self.body {
            PartBody::Text(text) => Some(text),
            PartBody::Empty => Some(""),
            _ => None,
        }
    }

    /// Decodes the embedded HTTP response of an `application/http` part.
    pub fn to_http_response(&self) -> Result<RawHttpResponse, FormatError> {
        let found = self.content_type.as_deref().unwrap_or_default();
        let is_http = found
            .parse::<mime::Mime>()
            .is_ok_and(|m| m.essence_str() == APPLICATION_HTTP);
        if !is_http {
            return Err(FormatError::UnexpectedPartType {
                expected: APPLICATION_HTTP.to_string(),
                found: found.to_string(),
            });
        }
        let text = match &self.body {
            PartBody::Bytes(bytes) => {
                std::str::from_utf8(bytes).map_err(|_| FormatError::InvalidEncoding)?
            }
            _ => self.text_content().unwrap_or_default(),
        };
        parse_response(text)
    }

    /// Same as [`Self::to_http_response`], as a transport-level response.
    pub fn to_response(&self) -> Result<HttpResponse, FormatError> {
        self.to_http_response().map(HttpResponse::from)
    }

    fn header_text(&self) -> String {
        let mut text = String::new();
        if let Some(id) = self.content_id.as_deref().filter(|v| !v.is_empty()) {
            text.push_str(&format!("Content-ID: {id}\r\n"));
        }
        if let Some(ct) = self.content_type.as_deref().filter(|v| !v.is_empty()) {
            text.push_str(&format!("Content-Type: {ct}\r\n"));
        }
        if let Some(te) = self.transfer_encoding.as_deref().filter(|v| !v.is_empty()) {
            text.push_str(&format!("Content-Transfer-Encoding: {te}\r\n"));
        }
        for (name, value) in &self.headers {
            text.push_str(&format!("{name}: {value}\r\n"));
        }
        text.push_str("\r\n");
        text
    }
}

/// An ordered set of parts plus the boundary that frames them.
#[derive(Debug)]
pub struct MultipartBuilder {
    boundary: String,
    format: String,
    parts: Vec<MultipartContent>,
}

impl Default for MultipartBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartBuilder {
    /// `multipart/mixed` with a fresh random boundary.
    pub fn new() -> Self {
        Self::with_boundary(format!("batch_{}", Uuid::new_v4()))
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            format: MULTIPART_MIXED.to_string(),
            parts: Vec::new(),
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    /// Outer content type, e.g. `multipart/mixed; boundary="A100x"`.
    pub fn content_type(&self) -> String {
        format!("{}; boundary=\"{}\"", self.format, self.boundary)
    }

    pub fn push(&mut self, part: MultipartContent) {
        self.parts.push(part);
    }

    pub fn parts(&self) -> &[MultipartContent] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<MultipartContent> {
        self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Writes every part framed by `--boundary` lines, then the
    /// `--boundary--` terminator. Stream bodies are consumed.
    pub async fn write_to<W>(&mut self, writer: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        for part in &mut self.parts {
            writer.write_all(b"--").await?;
            writer.write_all(self.boundary.as_bytes()).await?;
            writer.write_all(LINE_END).await?;
            writer.write_all(part.header_text().as_bytes()).await?;

            match std::mem::replace(&mut part.body, PartBody::Empty) {
                PartBody::Empty => {}
                PartBody::Text(text) => {
                    writer.write_all(text.as_bytes()).await?;
                    part.body = PartBody::Text(text);
                }
                PartBody::Bytes(bytes) => {
                    writer.write_all(&bytes).await?;
                    part.body = PartBody::Bytes(bytes);
                }
                PartBody::Stream(mut reader) => {
                    tokio::io::copy(&mut reader, writer).await?;
                }
            }
            // the line break before the next delimiter belongs to the delimiter
            writer.write_all(LINE_END).await?;
        }

        writer.write_all(b"--").await?;
        writer.write_all(self.boundary.as_bytes()).await?;
        writer.write_all(b"--").await?;
        writer.write_all(LINE_END).await?;
        writer.flush().await
    }

    /// Renders the whole message into memory.
    pub async fn to_bytes(&mut self) -> std::io::Result<Bytes> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer).await?;
        Ok(Bytes::from(buffer))
    }
}
