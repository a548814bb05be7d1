//! Long-running operation monitor
//!
//! The service accepts some requests with `202 Accepted` and a `Location`
//! to poll. Each poll either returns a JSON status document or, once the
//! job is done, `303 See Other` pointing at the finished resource.
//!
//! [`AsyncOperationMonitor::refresh`] performs exactly one poll; looping
//! and pacing belong to the caller.

use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::http::{FormatError, HttpRequest, HttpResponse, LOCATION, Transport, send_checked};
use crate::models::{AsyncJobState, AsyncJobStatus, Item, decode_json};

/// Where the monitor is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Created,
    Polling,
    Complete,
    Failed,
    Canceled,
}

impl MonitorState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MonitorState::Complete | MonitorState::Failed | MonitorState::Canceled
        )
    }
}

/// Client-side record of one async job.
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncTaskStatus {
    status_uri: String,
    request_uri: String,
    operation: Option<String>,
    percent_complete: f64,
    status: AsyncJobState,
    finished_item: Option<Item>,
    state: MonitorState,
}

impl AsyncTaskStatus {
    pub fn new(status_uri: impl Into<String>, request_uri: impl Into<String>) -> Self {
        Self {
            status_uri: status_uri.into(),
            request_uri: request_uri.into(),
            operation: None,
            percent_complete: 0.0,
            status: AsyncJobState::Waiting,
            finished_item: None,
            state: MonitorState::Created,
        }
    }

    pub fn status_uri(&self) -> &str {
        &self.status_uri
    }

    pub fn request_uri(&self) -> &str {
        &self.request_uri
    }

    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    pub fn percent_complete(&self) -> f64 {
        self.percent_complete
    }

    pub fn status(&self) -> AsyncJobState {
        self.status
    }

    /// Set only once the job completed through a redirect.
    pub fn finished_item(&self) -> Option<&Item> {
        self.finished_item.as_ref()
    }

    pub fn into_finished_item(self) -> Option<Item> {
        self.finished_item
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// True once no further poll can change the record.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn apply(&mut self, job: AsyncJobStatus) {
        if job.operation.is_some() {
            self.operation = job.operation;
        }
        self.percent_complete = job.percentage_complete.clamp(0.0, 100.0);
        self.status = job.status;
        self.state = match job.status {
            AsyncJobState::Complete => MonitorState::Complete,
            AsyncJobState::Failed => MonitorState::Failed,
            AsyncJobState::Waiting | AsyncJobState::InProgress => MonitorState::Polling,
        };
    }

    fn complete_with(&mut self, item: Item) {
        self.status = AsyncJobState::Complete;
        self.percent_complete = 100.0;
        self.finished_item = Some(item);
        self.state = MonitorState::Complete;
    }
}

/// Drives [`AsyncTaskStatus`] records against the service.
pub struct AsyncOperationMonitor<'a, T: Transport + ?Sized> {
    transport: &'a T,
}

impl<'a, T: Transport + ?Sized> AsyncOperationMonitor<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    /// Starts monitoring from the `202 Accepted` reply to `request_uri` and
    /// performs the first status fetch.
    pub async fn begin(
        &self,
        accepted: &HttpResponse,
        request_uri: &str,
        cancel: &CancellationToken,
    ) -> Result<AsyncTaskStatus> {
        if accepted.status() != StatusCode::ACCEPTED {
            return Err(Error::UnexpectedResponse {
                status: accepted.status().as_u16(),
                reason: "async operation was not accepted".to_string(),
            });
        }
        let status_uri = accepted
            .location()
            .ok_or(FormatError::MissingHeader(LOCATION))?;

        info!(request_uri, status_uri, "Async operation accepted");
        let mut task = AsyncTaskStatus::new(status_uri, request_uri);
        self.refresh(&mut task, cancel).await?;
        Ok(task)
    }

    /// Performs one status fetch and updates `task`. A no-op once the task
    /// is terminal. Cancellation moves the task to [`MonitorState::Canceled`].
    pub async fn refresh(&self, task: &mut AsyncTaskStatus, cancel: &CancellationToken) -> Result<()> {
        if task.is_terminal() {
            return Ok(());
        }
        let result = self.poll_once(task, cancel).await;
        if matches!(result, Err(Error::Cancelled)) {
            task.state = MonitorState::Canceled;
        }
        result
    }

    async fn poll_once(&self, task: &mut AsyncTaskStatus, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        task.state = MonitorState::Polling;

        let response = send_checked(self.transport, HttpRequest::get(task.status_uri()), cancel).await?;

        if response.has_json_body() {
            let job: AsyncJobStatus = decode_json(response.body())?;
            task.apply(job);
            debug!(
                status_uri = task.status_uri(),
                status = ?task.status(),
                percent = task.percent_complete(),
                "Async operation polled"
            );
            return Ok(());
        }

        if response.status() == StatusCode::SEE_OTHER {
            let location = response
                .location()
                .ok_or(FormatError::MissingHeader(LOCATION))?
                .to_string();
            debug!(status_uri = task.status_uri(), location = %location, "Async operation redirected");

            let finished = send_checked(self.transport, HttpRequest::get(&location), cancel).await?;
            let item: Item = decode_json(finished.body())?;
            info!(id = %item.id, name = %item.name, "Async operation complete");
            task.complete_with(item);
            return Ok(());
        }

        Err(Error::UnexpectedResponse {
            status: response.status().as_u16(),
            reason: "status poll returned neither a status document nor a redirect".to_string(),
        })
    }
}
