//! Fragmented resumable upload
//!
//! A large source is sent to an upload session as a sequence of PUTs, each
//! carrying one aligned byte range with a `Content-Range` header. The
//! service acknowledges intermediate fragments with 202 and answers the
//! final one with the finished item.

mod engine;
mod progress;
mod range;
mod session;

use std::fmt;
use std::sync::Arc;

pub use engine::FragmentUploader;
pub use progress::{ProgressObserver, TransferProgress, watch_progress};
pub use range::{ContentRange, FragmentRanges, RangeError, fragment_ranges};
pub use session::{ByteRange, UploadSession};

use crate::config::UploadConfig;
use crate::error::{Error, Result};

/// Fragment sizes must be a multiple of this many bytes.
pub const FRAGMENT_ALIGNMENT: u64 = 320 * 1024;
pub const DEFAULT_FRAGMENT_SIZE: u64 = 16 * FRAGMENT_ALIGNMENT;
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 64 * 1024;
/// Largest payload sent as a single PUT.
pub const MAX_SIMPLE_UPLOAD_SIZE: u64 = 60 * 1024 * 1024;

/// Per-upload settings.
#[derive(Clone)]
pub struct UploadOptions {
    fragment_size: u64,
    alignment: u64,
    write_buffer_size: usize,
    allow_parallel_upload: bool,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadOptions")
            .field("fragment_size", &self.fragment_size)
            .field("alignment", &self.alignment)
            .field("write_buffer_size", &self.write_buffer_size)
            .field("allow_parallel_upload", &self.allow_parallel_upload)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            fragment_size: DEFAULT_FRAGMENT_SIZE,
            alignment: FRAGMENT_ALIGNMENT,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            allow_parallel_upload: false,
            observer: None,
        }
    }
}

impl UploadOptions {
    pub fn from_config(config: &UploadConfig) -> Result<Self> {
        Self::default()
            .with_alignment(config.fragment_alignment.as_u64())?
            .with_fragment_size(config.fragment_size.as_u64())?
            .with_write_buffer_size(config.write_buffer_size.as_usize())
            .map(|options| options.with_parallel_upload(config.allow_parallel_upload))
    }

    /// Changes the alignment unit. The current fragment size is rounded
    /// down to the new unit (but never below one unit).
    pub fn with_alignment(mut self, alignment: u64) -> Result<Self> {
        if alignment == 0 {
            return Err(Error::InvalidArgument(
                "fragment alignment must be positive".to_string(),
            ));
        }
        self.alignment = alignment;
        self.fragment_size = (self.fragment_size / alignment).max(1) * alignment;
        Ok(self)
    }

    pub fn with_fragment_size(mut self, size: u64) -> Result<Self> {
        if size == 0 || size % self.alignment != 0 {
            return Err(Error::InvalidArgument(format!(
                "fragment size {size} must be a positive multiple of {}",
                self.alignment
            )));
        }
        self.fragment_size = size;
        Ok(self)
    }

    pub fn with_write_buffer_size(mut self, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidArgument(
                "write buffer size must be positive".to_string(),
            ));
        }
        self.write_buffer_size = size;
        Ok(self)
    }

    pub fn with_observer(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Recorded only. Fragments are always sent one after another.
    pub fn with_parallel_upload(mut self, allow: bool) -> Self {
        self.allow_parallel_upload = allow;
        self
    }

    pub fn fragment_size(&self) -> u64 {
        self.fragment_size
    }

    pub fn alignment(&self) -> u64 {
        self.alignment
    }

    pub fn write_buffer_size(&self) -> usize {
        self.write_buffer_size
    }

    pub fn allow_parallel_upload(&self) -> bool {
        self.allow_parallel_upload
    }

    pub fn observer(&self) -> Option<&dyn ProgressObserver> {
        self.observer.as_deref()
    }
}
