//! Multipart body parser
//!
//! Splits a multipart message into parts by scanning it line by line.
//! Line terminators inside a part body are kept; the single terminator
//! before each boundary line belongs to the boundary and is dropped.

use mime::Mime;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::trace;

use super::multipart::{MultipartBuilder, MultipartContent, PartBody};
use crate::http::FormatError;
use crate::http::raw::split_header;

/// Boundary and format from a `multipart/*` content type.
pub fn boundary_of(content_type: &str) -> Result<(String, String), FormatError> {
    let mime: Mime = content_type
        .parse()
        .map_err(|_| FormatError::NotMultipart(content_type.to_string()))?;
    if mime.type_() != mime::MULTIPART {
        return Err(FormatError::NotMultipart(content_type.to_string()));
    }
    let boundary = mime
        .get_param(mime::BOUNDARY)
        .map(|b| b.as_str().trim_matches('"').to_string())
        .filter(|b| !b.is_empty())
        .ok_or_else(|| FormatError::MissingBoundary(content_type.to_string()))?;
    Ok((boundary, mime.essence_str().to_string()))
}

/// Parses an in-memory multipart body.
pub fn parse(content_type: &str, body: &[u8]) -> Result<MultipartBuilder, FormatError> {
    let mut scanner = PartScanner::new(content_type)?;
    for line in body.split_inclusive(|b| *b == b'\n') {
        scanner.feed(line)?;
    }
    scanner.finish()
}

/// Parses a multipart body read from `reader` until end of input.
pub async fn parse_stream<R>(content_type: &str, reader: &mut R) -> crate::Result<MultipartBuilder>
where
    R: AsyncBufRead + Unpin,
{
    let mut scanner = PartScanner::new(content_type)?;
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        scanner.feed(&line)?;
    }
    Ok(scanner.finish()?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Preamble,
    Headers,
    Body,
    Done,
}

/// Incremental line scanner; feed lines with their terminators.
struct PartScanner {
    delimiter: Vec<u8>,
    terminator: Vec<u8>,
    state: ScanState,
    current: Option<MultipartContent>,
    body: Vec<u8>,
    message: MultipartBuilder,
}

impl PartScanner {
    fn new(content_type: &str) -> Result<Self, FormatError> {
        let (boundary, format) = boundary_of(content_type)?;
        Ok(Self {
            delimiter: format!("--{boundary}").into_bytes(),
            terminator: format!("--{boundary}--").into_bytes(),
            state: ScanState::Preamble,
            current: None,
            body: Vec::new(),
            message: MultipartBuilder::with_boundary(boundary).with_format(format),
        })
    }

    fn feed(&mut self, line: &[u8]) -> Result<(), FormatError> {
        if self.state == ScanState::Done {
            return Ok(());
        }

        // any line opening with the delimiter is a boundary, padding included
        let content = trim_line_end(line);
        if content.starts_with(&self.terminator) {
            self.close_part();
            self.state = ScanState::Done;
            return Ok(());
        }
        if content.starts_with(&self.delimiter) {
            self.close_part();
            self.current = Some(MultipartContent::new());
            self.state = ScanState::Headers;
            return Ok(());
        }

        match self.state {
            ScanState::Preamble | ScanState::Done => {}
            ScanState::Headers => {
                let text = std::str::from_utf8(trim_line_end(line))
                    .map_err(|_| FormatError::InvalidEncoding)?;
                if text.is_empty() {
                    self.state = ScanState::Body;
                } else if let Some(part) = self.current.as_mut() {
                    let (name, value) = split_header(text)?;
                    part.add_header(name, value);
                }
            }
            ScanState::Body => self.body.extend_from_slice(line),
        }
        Ok(())
    }

    fn close_part(&mut self) {
        let Some(mut part) = self.current.take() else {
            return;
        };
        let mut body = std::mem::take(&mut self.body);
        let kept = trim_line_end(&body).len();
        body.truncate(kept);
        part.set_body(PartBody::from_vec(body));
        trace!(
            content_id = part.content_id().unwrap_or_default(),
            content_type = part.content_type().unwrap_or_default(),
            "Parsed multipart part"
        );
        self.message.push(part);
    }

    fn finish(self) -> Result<MultipartBuilder, FormatError> {
        if self.state != ScanState::Done {
            return Err(FormatError::UnterminatedMultipart);
        }
        Ok(self.message)
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::multipart::APPLICATION_HTTP;

    const BODY: &str = "preamble is ignored\r\n\
--A100x\r\n\
Content-Type: application/http\r\n\
Content-ID: 1\r\n\
\r\n\
HTTP/1.1 200 OK\r\n\
Content-Type: application/json\r\n\
\r\n\
{\"id\":\"A1\",\"name\":\"a.txt\"}\r\n\
--A100x\r\n\
Content-Type: application/http\r\n\
\r\n\
HTTP/1.1 404 Not Found\r\n\
\r\n\
\r\n\
--A100x--\r\n\
epilogue\r\n";

    #[test]
    fn test_boundary_of() {
        let (boundary, format) = boundary_of("multipart/mixed; boundary=\"A100x\"").unwrap();
        assert_eq!(boundary, "A100x");
        assert_eq!(format, "multipart/mixed");

        let (boundary, _) = boundary_of("multipart/related; boundary=plain").unwrap();
        assert_eq!(boundary, "plain");
    }

    #[test]
    fn test_boundary_of_rejects_non_multipart() {
        assert!(matches!(
            boundary_of("application/json"),
            Err(FormatError::NotMultipart(_))
        ));
        assert!(matches!(
            boundary_of("multipart/mixed"),
            Err(FormatError::MissingBoundary(_))
        ));
    }

    #[test]
    fn test_parse_parts_in_order() {
        let message = parse("multipart/mixed; boundary=A100x", BODY.as_bytes()).unwrap();
        assert_eq!(message.boundary(), "A100x");
        assert_eq!(message.len(), 2);

        let first = &message.parts()[0];
        assert_eq!(first.content_type(), Some(APPLICATION_HTTP));
        assert_eq!(first.content_id(), Some("1"));
        assert_eq!(first.transfer_encoding(), Some("binary"));
        let response = first.to_http_response().unwrap();
        assert_eq!(response.status.as_u16(), 200);
        assert_eq!(&response.body[..], br#"{"id":"A1","name":"a.txt"}"#);

        let second = message.parts()[1].to_http_response().unwrap();
        assert_eq!(second.status.as_u16(), 404);
        assert!(second.body.is_empty());
    }

    #[test]
    fn test_missing_terminator() {
        let body = "--b\r\nContent-Type: text/plain\r\n\r\nhello\r\n";
        assert_eq!(
            parse("multipart/mixed; boundary=b", body.as_bytes()).unwrap_err(),
            FormatError::UnterminatedMultipart
        );
    }

    #[test]
    fn test_boundary_lines_match_by_prefix() {
        let body = "--b \t\r\nContent-Type: text/plain\r\n\r\none\r\n--b;pad\r\n\r\ntwo\r\n--b-- done\r\nepilogue\r\n";
        let message = parse("multipart/mixed; boundary=b", body.as_bytes()).unwrap();
        assert_eq!(message.len(), 2);
        assert_eq!(message.parts()[0].text_content(), Some("one"));
        assert_eq!(message.parts()[1].text_content(), Some("two"));
    }

    #[test]
    fn test_bad_part_header() {
        let body = "--b\r\nnot a header\r\n\r\n--b--\r\n";
        assert!(matches!(
            parse("multipart/mixed; boundary=b", body.as_bytes()),
            Err(FormatError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_body_line_breaks_preserved() {
        let body = "--b\n\nline one\n\nline three\n--b--\n";
        let message = parse("multipart/mixed; boundary=b", body.as_bytes()).unwrap();
        assert_eq!(
            message.parts()[0].text_content(),
            Some("line one\n\nline three")
        );
    }

    #[tokio::test]
    async fn test_build_then_parse_is_exact() {
        let mut built = MultipartBuilder::with_boundary("rt");
        built.push(MultipartContent::text("text/plain", "a\r\n\r\nb\r\n").with_content_id("x"));
        built.push(MultipartContent::new());
        let bytes = built.to_bytes().await.unwrap();

        let parsed = parse(&built.content_type(), &bytes).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.parts()[0].text_content(), Some("a\r\n\r\nb\r\n"));
        assert_eq!(parsed.parts()[0].content_id(), Some("x"));
        assert_eq!(parsed.parts()[1].text_content(), Some(""));
    }

    #[tokio::test]
    async fn test_parse_stream_matches_parse() {
        let mut reader = tokio::io::BufReader::new(BODY.as_bytes());
        let message = parse_stream("multipart/mixed; boundary=A100x", &mut reader)
            .await
            .unwrap();
        assert_eq!(message.len(), 2);
        assert_eq!(message.parts()[0].content_id(), Some("1"));
    }
}
