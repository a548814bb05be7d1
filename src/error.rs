//! Crate-level error type
//!
//! Every fallible operation in the crate surfaces one of these variants.
//! Cancellation is modelled as its own variant rather than a fault so
//! callers can tell "stopped on request" apart from "went wrong".

use thiserror::Error;

use crate::classifier::ServiceError;
use crate::http::{FormatError, TransportError};

#[derive(Debug, Error)]
pub enum Error {
    /// Connection-level failure; the underlying cause is kept as the source.
    #[error("transport failure: {0}")]
    Transport(#[source] TransportError),

    /// The service answered with a 4xx/5xx status.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Malformed raw-HTTP text or multipart framing.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    #[error("operation cancelled")]
    Cancelled,

    /// A response body could not be mapped onto the expected model.
    #[error("failed to deserialize response body: {source}")]
    Serialization {
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A non-error status the operation has no transition for.
    #[error("unexpected response: HTTP {status}: {reason}")]
    UnexpectedResponse { status: u16, reason: String },

    #[error("async operation still pending after {0} polls")]
    PollLimitExceeded(u32),
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Service error code chain, if this is a service error.
    pub fn service_error(&self) -> Option<&ServiceError> {
        match self {
            Error::Service(err) => Some(err),
            _ => None,
        }
    }

    pub(crate) fn serialization(raw: &[u8], source: serde_json::Error) -> Self {
        Error::Serialization {
            raw: String::from_utf8_lossy(raw).into_owned(),
            source,
        }
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Cancelled => Error::Cancelled,
            other => Error::Transport(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
