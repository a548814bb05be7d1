use bon::Builder;
use reqwest::Method;

use crate::http::{Headers, HttpRequest, set_header_value};
use crate::models::ResultKind;

const LINE_END: &str = "\r\n";

/// An immutable description of one service call.
///
/// The same command can be sent on its own or serialized as a sub-request
/// of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct ServiceCommand {
    #[builder(default = Method::GET)]
    method: Method,
    #[builder(into)]
    url: String,
    #[builder(default)]
    headers: Headers,
    #[builder(into)]
    content_type: Option<String>,
    #[builder(into)]
    body: Option<String>,
    /// Model the response body decodes into.
    #[builder(default)]
    response_kind: ResultKind,
}

impl ServiceCommand {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn response_kind(&self) -> ResultKind {
        self.response_kind
    }

    /// Copy of this command with one more header.
    pub fn with_header(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut command = self.clone();
        set_header_value(&mut command.headers, name, value);
        command
    }

    /// Raw HTTP/1.1 request text: start line, `Content-Type`, the header
    /// map, then `Content-Length`, a blank line and the body when present.
    pub fn to_raw_http(&self) -> String {
        let mut text = format!("{} {} HTTP/1.1{LINE_END}", self.method, self.url);

        if let Some(content_type) = &self.content_type {
            text.push_str(&format!("Content-Type: {content_type}{LINE_END}"));
        }
        for (name, value) in &self.headers {
            text.push_str(&format!("{name}: {value}{LINE_END}"));
        }
        if let Some(body) = &self.body {
            text.push_str(&format!("Content-Length: {}{LINE_END}", body.len()));
        }
        text.push_str(LINE_END);
        if let Some(body) = &self.body {
            text.push_str(body);
        }
        text
    }

    /// Request ready for a transport.
    pub fn to_request(&self) -> HttpRequest {
        let mut request = HttpRequest::new(self.method.clone(), &self.url);
        for (name, value) in &self.headers {
            request.set_header(name, value);
        }
        if let Some(content_type) = &self.content_type {
            request.set_content_type(content_type);
        }
        if let Some(body) = &self.body {
            request.set_body(body);
        }
        request
    }
}
