//! Batch codec
//!
//! Packs several [`ServiceCommand`]s into one `multipart/mixed` body of
//! `application/http` parts, and unpacks the multipart response into one
//! [`ServiceResponse`] per command.

mod command;
mod multipart;
mod parser;
mod response;

pub use command::ServiceCommand;
pub use multipart::{APPLICATION_HTTP, MULTIPART_MIXED, MultipartBuilder, MultipartContent, PartBody};
pub use parser::{boundary_of, parse, parse_stream};
pub use response::ServiceResponse;

use crate::http::FormatError;

/// Builds the multipart request body for `commands` with a fresh boundary.
pub fn build_batch(commands: &[ServiceCommand]) -> MultipartBuilder {
    build_batch_with_boundary(commands, MultipartBuilder::new())
}

/// Same as [`build_batch`] on a caller-supplied (usually empty) builder.
pub fn build_batch_with_boundary(
    commands: &[ServiceCommand],
    mut builder: MultipartBuilder,
) -> MultipartBuilder {
    for (index, command) in commands.iter().enumerate() {
        builder.push(
            MultipartContent::text(APPLICATION_HTTP, command.to_raw_http())
                .with_content_id((index + 1).to_string()),
        );
    }
    builder
}

/// Pairs each parsed part with the command at the same position.
pub fn decode_batch(
    commands: &[ServiceCommand],
    message: MultipartBuilder,
) -> crate::Result<Vec<ServiceResponse>> {
    if message.len() != commands.len() {
        return Err(FormatError::PartCountMismatch {
            expected: commands.len(),
            actual: message.len(),
        }
        .into());
    }

    message
        .into_parts()
        .into_iter()
        .zip(commands)
        .map(|(part, command)| -> crate::Result<ServiceResponse> {
            let raw = part.to_http_response()?;
            let description = raw.status_description.clone();
            Ok(ServiceResponse::new(command.clone(), raw.into(), description))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::parse_request;
    use crate::models::ResultKind;
    use reqwest::Method;

    fn commands() -> Vec<ServiceCommand> {
        vec![
            ServiceCommand::builder()
                .url("https://api.example.com/v1.0/drive/items/A1")
                .build(),
            ServiceCommand::builder()
                .method(Method::PATCH)
                .url("https://api.example.com/v1.0/drive/items/A2")
                .content_type("application/json")
                .body(r#"{"name":"renamed.txt"}"#)
                .build(),
        ]
    }

    #[tokio::test]
    async fn test_two_commands_frame_with_a100x() {
        let commands = commands();
        let mut builder =
            build_batch_with_boundary(&commands, MultipartBuilder::with_boundary("A100x"));
        assert_eq!(builder.content_type(), "multipart/mixed; boundary=\"A100x\"");

        let bytes = builder.to_bytes().await.unwrap();
        let text = std::str::from_utf8(&bytes).unwrap();
        let separators = text.lines().filter(|l| *l == "--A100x").count();
        let terminators = text.lines().filter(|l| *l == "--A100x--").count();
        assert_eq!(separators, 2);
        assert_eq!(terminators, 1);

        let parsed = parse(&builder.content_type(), &bytes).unwrap();
        assert_eq!(parsed.len(), 2);
        for (part, command) in parsed.parts().iter().zip(&commands) {
            assert_eq!(part.content_type(), Some(APPLICATION_HTTP));
            let request = parse_request(part.text_content().unwrap()).unwrap();
            assert_eq!(&request.method, command.method());
            assert_eq!(request.url, command.url());
        }
        assert_eq!(parsed.parts()[0].content_id(), Some("1"));
        assert_eq!(parsed.parts()[1].content_id(), Some("2"));
    }

    #[tokio::test]
    async fn test_part_bodies_round_trip() {
        let commands = commands();
        let mut builder = build_batch(&commands);
        let bytes = builder.to_bytes().await.unwrap();
        let parsed = parse(&builder.content_type(), &bytes).unwrap();

        for (part, command) in parsed.parts().iter().zip(&commands) {
            assert_eq!(part.text_content(), Some(command.to_raw_http().as_str()));
        }
    }

    #[test]
    fn test_decode_batch_pairs_in_order() {
        let body = "--r\r\n\
Content-Type: application/http\r\n\
\r\n\
HTTP/1.1 200 OK\r\n\
Content-Type: application/json\r\n\
\r\n\
{\"id\":\"A1\",\"name\":\"a.txt\"}\r\n\
--r\r\n\
Content-Type: application/http\r\n\
\r\n\
HTTP/1.1 409 Conflict\r\n\
Content-Type: application/json\r\n\
\r\n\
{\"error\":{\"code\":\"nameAlreadyExists\",\"message\":\"taken\",\"innererror\":{\"code\":\"conflict\"}}}\r\n\
--r--\r\n";
        let commands = commands();
        let message = parse("multipart/mixed; boundary=r", body.as_bytes()).unwrap();
        let responses = decode_batch(&commands, message).unwrap();

        assert_eq!(responses.len(), 2);
        assert!(!responses[0].was_error());
        assert_eq!(responses[0].command().url(), commands[0].url());
        assert_eq!(responses[0].command().response_kind(), ResultKind::Item);
        assert!(responses[1].was_error());
        assert_eq!(responses[1].status_description(), "Conflict");
        assert!(responses[1].error().unwrap().is_error_code("nameAlreadyExists"));
    }

    #[test]
    fn test_decode_batch_count_mismatch() {
        let body = "--r\r\nContent-Type: application/http\r\n\r\nHTTP/1.1 204 No Content\r\n\r\n\r\n--r--\r\n";
        let message = parse("multipart/mixed; boundary=r", body.as_bytes()).unwrap();
        let err = decode_batch(&commands(), message).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Format(FormatError::PartCountMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }
}
