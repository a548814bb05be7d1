use reqwest::{Method, StatusCode};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::UploadOptions;
use super::progress::TransferProgress;
use super::range::{ContentRange, fragment_ranges};
use super::session::UploadSession;
use crate::error::{Error, Result};
use crate::http::{CONTENT_RANGE, FormatError, HttpRequest, HttpResponse, Transport, send_checked};
use crate::models::{Item, UploadSessionInfo, decode_json};

/// Outcome of one fragment PUT.
enum FragmentReply {
    Accepted,
    Completed(Item),
}

/// Sends a byte stream to an upload session as ordered fragment PUTs.
///
/// Fragments go out strictly in ascending offset order, one at a time.
/// The uploader does not retry; a failed fragment surfaces as an error and
/// has to be resent whole.
pub struct FragmentUploader<'a, T: Transport + ?Sized> {
    transport: &'a T,
    options: &'a UploadOptions,
}

impl<'a, T: Transport + ?Sized> FragmentUploader<'a, T> {
    pub fn new(transport: &'a T, options: &'a UploadOptions) -> Self {
        Self { transport, options }
    }

    /// Uploads `total` bytes read from `source`, returning the finished item.
    ///
    /// Cancellation is observed before each fragment, between write chunks
    /// and during every exchange, and is reported as [`Error::Cancelled`].
    /// Releasing the server-side session is left to the caller.
    pub async fn upload<R>(
        &self,
        session: &mut UploadSession,
        source: &mut R,
        total: u64,
        cancel: &CancellationToken,
    ) -> Result<Item>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        if total == 0 {
            return Err(Error::InvalidArgument(
                "fragmented upload needs a non-empty source".to_string(),
            ));
        }
        if self.options.allow_parallel_upload() {
            debug!("Parallel fragment upload requested; sending fragments sequentially");
        }

        let fragment_size = self.options.fragment_size();
        info!(
            url = session.upload_url(),
            total,
            fragment_size,
            fragments = fragment_ranges(total, fragment_size).len(),
            "Starting fragmented upload"
        );

        for range in fragment_ranges(total, fragment_size) {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let request = self.compose(session, source, &range, cancel).await?;
            let response = send_checked(self.transport, request, cancel).await?;

            match self.inspect(session, &range, &response)? {
                FragmentReply::Accepted => {
                    self.report(range.last_byte() + 1, total);
                }
                FragmentReply::Completed(item) => {
                    self.report(total, total);
                    info!(id = %item.id, name = %item.name, size = item.size, "Upload complete");
                    return Ok(item);
                }
            }
        }

        Err(Error::UnexpectedResponse {
            status: StatusCode::ACCEPTED.as_u16(),
            reason: "server never completed the upload".to_string(),
        })
    }

    /// Builds the PUT for `range`, copying its bytes in write-buffer chunks.
    async fn compose<R>(
        &self,
        session: &UploadSession,
        source: &mut R,
        range: &ContentRange,
        cancel: &CancellationToken,
    ) -> Result<HttpRequest>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let mut request = HttpRequest::new(Method::PUT, session.upload_url());
        request.set_header(CONTENT_RANGE, range.to_header_value());

        let mut buffer = vec![0u8; self.options.write_buffer_size()];
        let mut remaining = range.bytes_in_range();
        while remaining > 0 {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let want = buffer.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
            let read = source.read(&mut buffer[..want]).await?;
            if read == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!(
                        "source ended with {remaining} bytes of {} still to send",
                        range.to_header_value()
                    ),
                )));
            }
            request.write_body(&buffer[..read]);
            remaining -= read as u64;
        }

        debug!(range = %range, bytes = range.bytes_in_range(), "Sending fragment");
        Ok(request)
    }

    fn inspect(
        &self,
        session: &mut UploadSession,
        range: &ContentRange,
        response: &HttpResponse,
    ) -> Result<FragmentReply> {
        match response.status() {
            StatusCode::ACCEPTED => {
                if range.is_final() {
                    return Err(Error::UnexpectedResponse {
                        status: StatusCode::ACCEPTED.as_u16(),
                        reason: "final fragment accepted without a finished item".to_string(),
                    });
                }
                session.record_accepted(range);
                if response.has_json_body() {
                    let info: UploadSessionInfo = decode_json(response.body())?;
                    session
                        .apply_server_state(&info)
                        .map_err(|e| FormatError::InvalidRange(e.to_string()))?;
                }
                if session.next_offset() != range.last_byte() + 1 {
                    warn!(
                        expected = session.next_offset(),
                        sent = range.last_byte() + 1,
                        "Server expects a different next offset"
                    );
                }
                Ok(FragmentReply::Accepted)
            }
            StatusCode::OK | StatusCode::CREATED => {
                Ok(FragmentReply::Completed(decode_json(response.body())?))
            }
            other => Err(Error::UnexpectedResponse {
                status: other.as_u16(),
                reason: format!("unexpected reply to fragment {range}"),
            }),
        }
    }

    fn report(&self, bytes_transferred: u64, total: u64) {
        if let Some(observer) = self.options.observer() {
            observer.on_progress(TransferProgress::new(bytes_transferred, total));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::{MockReply, MockTransport};
    use serde_json::json;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const MIB: u64 = 1024 * 1024;
    const SESSION_URL: &str = "https://up.example.com/session/1";

    fn source(len: u64) -> Cursor<Vec<u8>> {
        Cursor::new((0..len).map(|i| (i % 251) as u8).collect())
    }

    fn accepted(next: u64) -> HttpResponse {
        HttpResponse::new(StatusCode::ACCEPTED).with_json(&json!({
            "uploadUrl": SESSION_URL,
            "expirationDateTime": "2026-10-19T08:00:00Z",
            "nextExpectedRanges": [format!("{next}-")]
        }))
    }

    fn created(size: u64) -> HttpResponse {
        HttpResponse::new(StatusCode::CREATED).with_json(&json!({
            "id": "A1", "name": "big.bin", "size": size
        }))
    }

    fn four_mib_options() -> UploadOptions {
        UploadOptions::default()
            .with_alignment(MIB)
            .unwrap()
            .with_fragment_size(4 * MIB)
            .unwrap()
    }

    #[tokio::test]
    async fn test_ten_mib_in_three_fragments() {
        let transport = MockTransport::new();
        transport.push_response(accepted(4 * MIB));
        transport.push_response(accepted(8 * MIB));
        transport.push_response(created(10 * MIB));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let options = four_mib_options()
            .with_observer(move |p: TransferProgress| sink.lock().unwrap().push(p));

        let mut session = UploadSession::new(SESSION_URL);
        let item = FragmentUploader::new(&transport, &options)
            .upload(&mut session, &mut source(10 * MIB), 10 * MIB, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(item.id, "A1");
        assert_eq!(item.size, 10 * MIB);

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        let ranges: Vec<&str> = requests
            .iter()
            .map(|r| r.header(CONTENT_RANGE).unwrap())
            .collect();
        assert_eq!(
            ranges,
            vec![
                "bytes 0-4194303/10485760",
                "bytes 4194304-8388607/10485760",
                "bytes 8388608-10485759/10485760",
            ]
        );
        assert!(requests.iter().all(|r| *r.method() == Method::PUT && r.url() == SESSION_URL));
        assert_eq!(requests[0].body().len() as u64, 4 * MIB);
        assert_eq!(requests[2].body().len() as u64, 2 * MIB);
        // bytes go out in source order
        assert_eq!(requests[1].body()[0], ((4 * MIB) % 251) as u8);

        let percents: Vec<u8> = seen.lock().unwrap().iter().map(|p| p.percent_complete()).collect();
        assert_eq!(percents, vec![40, 80, 100]);
        assert_eq!(seen.lock().unwrap()[0].bytes_transferred, 4 * MIB);
        assert_eq!(session.accepted_bytes(), 8 * MIB);
    }

    #[tokio::test]
    async fn test_cancel_during_second_fragment() {
        let transport = MockTransport::new();
        transport.push_response(accepted(4 * MIB));
        transport.push_reply(MockReply::Hang);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let options = four_mib_options();
        let mut session = UploadSession::new(SESSION_URL);
        let err = FragmentUploader::new(&transport, &options)
            .upload(&mut session, &mut source(10 * MIB), 10 * MIB, &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(transport.request_count(), 2);
        assert_eq!(session.accepted_bytes(), 4 * MIB);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_sends_nothing() {
        let transport = MockTransport::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let options = four_mib_options();
        let err = FragmentUploader::new(&transport, &options)
            .upload(&mut UploadSession::new(SESSION_URL), &mut source(MIB), MIB, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_service_error_stops_upload() {
        let transport = MockTransport::new();
        transport.push_response(accepted(4 * MIB));
        transport.push_response(HttpResponse::new(StatusCode::RANGE_NOT_SATISFIABLE).with_json(
            &json!({"error": {"code": "invalidRange", "message": "Fragment overlaps"}}),
        ));

        let options = four_mib_options();
        let err = FragmentUploader::new(&transport, &options)
            .upload(
                &mut UploadSession::new(SESSION_URL),
                &mut source(10 * MIB),
                10 * MIB,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        let service = err.service_error().unwrap();
        assert_eq!(service.code(), "invalidRange");
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_final_fragment_must_complete() {
        let transport = MockTransport::new();
        transport.push_response(HttpResponse::new(StatusCode::ACCEPTED));

        let options = four_mib_options();
        let err = FragmentUploader::new(&transport, &options)
            .upload(&mut UploadSession::new(SESSION_URL), &mut source(100), 100, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse { status: 202, .. }));
    }

    #[tokio::test]
    async fn test_malformed_server_range_is_format_error() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpResponse::new(StatusCode::ACCEPTED)
                .with_json(&json!({"nextExpectedRanges": ["soon-ish"]})),
        );

        let options = four_mib_options();
        let err = FragmentUploader::new(&transport, &options)
            .upload(
                &mut UploadSession::new(SESSION_URL),
                &mut source(10 * MIB),
                10 * MIB,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Format(FormatError::InvalidRange(_))));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_short_source_and_empty_source() {
        let transport = MockTransport::new();
        let options = four_mib_options();
        let uploader = FragmentUploader::new(&transport, &options);

        let err = uploader
            .upload(&mut UploadSession::new(SESSION_URL), &mut source(10), 20, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof));

        let err = uploader
            .upload(&mut UploadSession::new(SESSION_URL), &mut source(0), 0, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(transport.request_count(), 0);
    }
}
