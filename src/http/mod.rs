//! HTTP plumbing: the transport capability, its reqwest implementation,
//! a scripted transport for unit tests, and the raw-HTTP text parser.

mod client;
#[cfg(test)]
pub(crate) mod mock;
pub mod raw;
mod transport;

use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use client::{ReqwestTransport, TransportConfig};
pub use raw::{FormatError, RawHttpRequest, RawHttpResponse, parse_request, parse_response};
pub use transport::{
    CONTENT_RANGE, CONTENT_TYPE, HttpRequest, HttpResponse, LOCATION, Transport, TransportError,
};

use crate::classifier::{ResponseClass, ServiceError};

pub type Headers = BTreeMap<String, String>;

/// Case-insensitive header lookup.
pub fn header_value<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Sets `name`, replacing any entry whose name differs only in case.
pub fn set_header_value(headers: &mut Headers, name: impl Into<String>, value: impl Into<String>) {
    let name = name.into();
    headers.retain(|key, _| !key.eq_ignore_ascii_case(&name));
    headers.insert(name, value.into());
}

/// Sends `request` and converts 4xx/5xx responses into
/// [`crate::Error::Service`]. Cancellation wins over classification.
pub async fn send_checked<T: Transport + ?Sized>(
    transport: &T,
    request: HttpRequest,
    cancel: &CancellationToken,
) -> crate::Result<HttpResponse> {
    let method = request.method().clone();
    let url = request.url().to_string();
    let response = transport.send(request, cancel).await?;

    if cancel.is_cancelled() {
        return Err(crate::Error::Cancelled);
    }

    let status = response.status();
    debug!(%method, url, status = status.as_u16(), "Exchange complete");

    if ResponseClass::from(status).is_error() {
        return Err(ServiceError::from_response(&response).into());
    }
    Ok(response)
}
