//! reqwest-backed transport

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use super::Headers;
use crate::config::Config;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
    /// Sent with every request (authorization, accept, ...)
    pub default_headers: Headers,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
            user_agent: format!("fragstore/{}", env!("CARGO_PKG_VERSION")),
            default_headers: Headers::new(),
        }
    }
}

impl TransportConfig {
    pub fn from_config(config: &Config) -> Self {
        let mut default_headers = config.service.default_headers.clone();
        if let Some(token) = &config.service.access_token {
            default_headers.insert("Authorization".to_string(), format!("Bearer {token}"));
        }
        Self {
            connect_timeout: Duration::from_secs(config.http.connect_timeout_secs),
            request_timeout: Duration::from_secs(config.http.request_timeout_secs),
            user_agent: config.service.user_agent.clone(),
            default_headers,
        }
    }
}

/// Transport over a pooled reqwest client.
///
/// Redirects are never followed: completion of an async job is signalled
/// with a 303 that the monitor has to see.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );
        for (name, value) in &config.default_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::InvalidHeader(format!("{name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::InvalidHeader(format!("{name}: {e}")))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client })
    }

    async fn exchange(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = reqwest::Url::parse(request.url())
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {e}", request.url())))?;

        let method = request.method().clone();
        debug!(%method, %url, bytes = request.body().len(), "Sending request");

        let mut builder = self.client.request(method, url);
        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }
        if let Some(content_type) = request.content_type() {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        let body = request.into_body();
        if !body.is_empty() {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str().to_string(), value.to_string());
            }
        }

        let body = response.bytes().await.map_err(map_reqwest_error)?;
        debug!(status = status.as_u16(), size = body.len(), "Response received");

        Ok(HttpResponse::from_parts(status, headers, body))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = self.exchange(request) => result,
        }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::RequestFailed(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_config_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(300));
        assert!(config.user_agent.starts_with("fragstore/"));
    }

    #[test]
    fn test_access_token_becomes_authorization_header() {
        let mut config = Config::default();
        config.service.access_token = Some("secret".to_string());
        let transport = TransportConfig::from_config(&config);
        assert_eq!(
            transport.default_headers.get("Authorization").map(String::as_str),
            Some("Bearer secret")
        );
    }

    #[test]
    fn test_invalid_default_header_rejected() {
        let mut config = TransportConfig::default();
        config
            .default_headers
            .insert("bad header".to_string(), "x".to_string());
        assert!(ReqwestTransport::new(config).is_err());
    }

    #[tokio::test]
    async fn test_send_after_cancel_short_circuits() {
        let transport = ReqwestTransport::new(TransportConfig::default()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = transport
            .send(HttpRequest::get("http://127.0.0.1:9/never"), &cancel)
            .await;
        assert!(matches!(result, Err(TransportError::Cancelled)));
    }
}
