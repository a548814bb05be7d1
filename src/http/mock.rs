//! Scripted in-memory transport
//!
//! Replays queued replies in order and records every request it receives.
//! Compiled for unit tests only.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use super::transport::{HttpRequest, HttpResponse, Transport, TransportError};

/// One scripted reply.
#[derive(Debug)]
pub enum MockReply {
    Response(HttpResponse),
    Error(TransportError),
    /// Never answers; resolves only when the request is cancelled.
    Hang,
}

#[derive(Default)]
struct MockState {
    replies: VecDeque<MockReply>,
    requests: Vec<HttpRequest>,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: HttpResponse) {
        self.lock().replies.push_back(MockReply::Response(response));
    }

    pub fn push_reply(&self, reply: MockReply) {
        self.lock().replies.push_back(reply);
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    pub fn remaining_replies(&self) -> usize {
        self.lock().replies.len()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // a panicking test thread must not hide the recorded requests
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, TransportError> {
        let reply = {
            let mut state = self.lock();
            state.requests.push(request);
            state.replies.pop_front()
        };

        match reply {
            Some(MockReply::Response(response)) => Ok(response),
            Some(MockReply::Error(err)) => Err(err),
            Some(MockReply::Hang) => {
                cancel.cancelled().await;
                Err(TransportError::Cancelled)
            }
            None => Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "mock transport has no scripted reply",
            ))),
        }
    }
}
