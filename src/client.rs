//! Service client
//!
//! Orchestrates the building blocks over one transport: simple and
//! fragmented uploads with session cleanup, async operations polled to
//! completion, and batch round trips.

use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::batch::{ServiceCommand, ServiceResponse, build_batch, decode_batch, parse};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::http::{
    CONTENT_TYPE, FormatError, HttpRequest, HttpResponse, ReqwestTransport, Transport,
    TransportConfig, send_checked,
};
use crate::models::{DataModel, DecoderRegistry, Item, UploadSessionInfo, decode_json};
use crate::monitor::{AsyncOperationMonitor, AsyncTaskStatus};
use crate::upload::{FragmentUploader, UploadOptions, UploadSession};

const PREFER: &str = "Prefer";
const RESPOND_ASYNC: &str = "respond-async";
const OCTET_STREAM: &str = "application/octet-stream";

pub struct Client<T: Transport = ReqwestTransport> {
    transport: T,
    registry: DecoderRegistry,
    batch_url: String,
    upload_options: UploadOptions,
    max_simple_upload_size: u64,
    poll_interval: Duration,
    max_polls: u32,
}

impl Client<ReqwestTransport> {
    /// Client over reqwest, configured from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = ReqwestTransport::new(TransportConfig::from_config(config))
            .map_err(Error::Transport)?;
        Self::new(transport, config)
    }
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T, config: &Config) -> Result<Self> {
        Ok(Self {
            transport,
            registry: DecoderRegistry::with_defaults(),
            batch_url: config.batch_url(),
            upload_options: UploadOptions::from_config(&config.upload)?,
            max_simple_upload_size: config.upload.max_simple_upload_size.as_u64(),
            poll_interval: Duration::from_millis(config.monitor.poll_interval_ms),
            max_polls: config.monitor.max_polls,
        })
    }

    pub fn with_registry(mut self, registry: DecoderRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    /// Upload options derived from configuration; a starting point for
    /// [`Self::upload_large`].
    pub fn upload_options(&self) -> UploadOptions {
        self.upload_options.clone()
    }

    /// Sends one command; 4xx/5xx replies become [`Error::Service`].
    pub async fn send(&self, command: &ServiceCommand, cancel: &CancellationToken) -> Result<HttpResponse> {
        send_checked(&self.transport, command.to_request(), cancel).await
    }

    /// GETs `url` and decodes the JSON body as `M`.
    pub async fn get_json<M: DeserializeOwned>(&self, url: &str, cancel: &CancellationToken) -> Result<M> {
        let response = send_checked(&self.transport, HttpRequest::get(url), cancel).await?;
        decode_json(response.body())
    }

    /// Sends `command` and decodes the reply as its declared result kind.
    pub async fn data_model(&self, command: &ServiceCommand, cancel: &CancellationToken) -> Result<DataModel> {
        let response = self.send(command, cancel).await?;
        if response.body().is_empty() {
            return Ok(DataModel::None);
        }
        self.registry.decode(command.response_kind(), response.body())
    }

    /// Uploads a small payload with a single PUT.
    pub async fn upload_simple(
        &self,
        url: &str,
        data: impl Into<Bytes>,
        cancel: &CancellationToken,
    ) -> Result<Item> {
        let data = data.into();
        if data.len() as u64 > self.max_simple_upload_size {
            return Err(Error::InvalidArgument(format!(
                "{} bytes exceeds the {}-byte simple upload limit; use a fragmented upload",
                data.len(),
                self.max_simple_upload_size
            )));
        }

        let mut request = HttpRequest::new(Method::PUT, url);
        request.set_content_type(OCTET_STREAM);
        request.set_body(&data);
        let response = send_checked(&self.transport, request, cancel).await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let item: Item = decode_json(response.body())?;
                info!(id = %item.id, bytes = data.len(), "Simple upload complete");
                Ok(item)
            }
            other => Err(Error::UnexpectedResponse {
                status: other.as_u16(),
                reason: "simple upload did not return the stored item".to_string(),
            }),
        }
    }

    /// Opens an upload session at `create_session_url`.
    pub async fn create_upload_session(
        &self,
        create_session_url: &str,
        cancel: &CancellationToken,
    ) -> Result<UploadSession> {
        let mut request = HttpRequest::new(Method::POST, create_session_url);
        request
            .set_json(&serde_json::json!({}))
            .map_err(|e| Error::serialization(b"{}", e))?;
        let response = send_checked(&self.transport, request, cancel).await?;

        let info: UploadSessionInfo = decode_json(response.body())?;
        if info.upload_url.is_empty() {
            return Err(Error::UnexpectedResponse {
                status: response.status().as_u16(),
                reason: "upload session has no uploadUrl".to_string(),
            });
        }
        let session =
            UploadSession::from_info(&info).map_err(|e| FormatError::InvalidRange(e.to_string()))?;
        info!(upload_url = session.upload_url(), expiration = ?session.expiration(), "Upload session created");
        Ok(session)
    }

    /// Creates a session and uploads `source` into it in fragments.
    pub async fn upload_large<R>(
        &self,
        create_session_url: &str,
        source: &mut R,
        len: u64,
        options: &UploadOptions,
        cancel: &CancellationToken,
    ) -> Result<Item>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let mut session = self.create_upload_session(create_session_url, cancel).await?;
        self.upload_to_session(&mut session, source, len, options, cancel)
            .await
    }

    /// Uploads `source` into an existing session. On cancellation the
    /// session is deleted before [`Error::Cancelled`] is returned; a failed
    /// delete is only logged.
    pub async fn upload_to_session<R>(
        &self,
        session: &mut UploadSession,
        source: &mut R,
        len: u64,
        options: &UploadOptions,
        cancel: &CancellationToken,
    ) -> Result<Item>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let result = FragmentUploader::new(&self.transport, options)
            .upload(session, source, len, cancel)
            .await;

        if matches!(result, Err(Error::Cancelled)) {
            info!(upload_url = session.upload_url(), "Upload cancelled, deleting session");
            // the caller's token is already cancelled
            if let Err(err) = self
                .cancel_upload_session(session, &CancellationToken::new())
                .await
            {
                warn!(upload_url = session.upload_url(), error = %err, "Failed to delete upload session");
            }
        }
        result
    }

    /// Deletes an upload session, releasing its server-side state.
    pub async fn cancel_upload_session(
        &self,
        session: &UploadSession,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let request = HttpRequest::new(Method::DELETE, session.upload_url());
        send_checked(&self.transport, request, cancel).await?;
        debug!(upload_url = session.upload_url(), "Upload session deleted");
        Ok(())
    }

    /// Sends `command` asking for asynchronous processing and starts
    /// monitoring it. The service must answer `202 Accepted` with a
    /// `Location` to poll.
    pub async fn start_async_operation(
        &self,
        command: &ServiceCommand,
        cancel: &CancellationToken,
    ) -> Result<AsyncTaskStatus> {
        let command = command.with_header(PREFER, RESPOND_ASYNC);
        let response = self.send(&command, cancel).await?;
        self.monitor().begin(&response, command.url(), cancel).await
    }

    /// One status fetch for `task`.
    pub async fn refresh_async_operation(
        &self,
        task: &mut AsyncTaskStatus,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.monitor().refresh(task, cancel).await
    }

    /// Polls `task` every `poll_interval` until it is terminal, giving up
    /// after `max_polls` fetches (0 disables the limit).
    pub async fn wait_for_async_operation(
        &self,
        mut task: AsyncTaskStatus,
        cancel: &CancellationToken,
    ) -> Result<AsyncTaskStatus> {
        let monitor = self.monitor();
        let mut polls = 0u32;

        while !task.is_terminal() {
            if self.max_polls != 0 && polls >= self.max_polls {
                warn!(status_uri = task.status_uri(), polls, "Giving up on async operation");
                return Err(Error::PollLimitExceeded(polls));
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
            monitor.refresh(&mut task, cancel).await?;
            polls += 1;
            debug!(
                status_uri = task.status_uri(),
                percent = task.percent_complete(),
                state = ?task.state(),
                "Async operation progress"
            );
        }
        Ok(task)
    }

    /// Picks up an async operation from its monitor URL and waits for it.
    pub async fn resume_async_operation(
        &self,
        status_uri: &str,
        cancel: &CancellationToken,
    ) -> Result<AsyncTaskStatus> {
        let mut task = AsyncTaskStatus::new(status_uri, status_uri);
        self.monitor().refresh(&mut task, cancel).await?;
        self.wait_for_async_operation(task, cancel).await
    }

    /// Sends `commands` as one multipart request to `<root>/$batch` and
    /// pairs each response part with its command, in order.
    pub async fn batch(
        &self,
        commands: &[ServiceCommand],
        cancel: &CancellationToken,
    ) -> Result<Vec<ServiceResponse>> {
        let mut message = build_batch(commands);
        let mut request = HttpRequest::new(Method::POST, &self.batch_url);
        request.set_content_type(message.content_type());
        request.set_body(message.to_bytes().await?);

        debug!(url = %self.batch_url, commands = commands.len(), boundary = message.boundary(), "Sending batch");
        let response = send_checked(&self.transport, request, cancel).await?;

        let content_type = response
            .content_type()
            .ok_or(FormatError::MissingHeader(CONTENT_TYPE))?;
        let parsed = parse(content_type, response.body())?;
        decode_batch(commands, parsed)
    }

    fn monitor(&self) -> AsyncOperationMonitor<'_, T> {
        AsyncOperationMonitor::new(&self.transport)
    }
}
