use super::models::Config;
use reqwest::Url;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid service root URL '{url}': {reason}")]
    InvalidRootUrl { url: String, reason: String },

    #[error("Fragment alignment must be positive")]
    ZeroFragmentAlignment,

    #[error("Fragment size must be positive")]
    ZeroFragmentSize,

    #[error("Fragment size {size} is not a multiple of the {alignment}-byte alignment")]
    UnalignedFragmentSize { size: u64, alignment: u64 },

    #[error("Write buffer size must be positive")]
    ZeroWriteBuffer,

    #[error("Poll interval must be positive")]
    ZeroPollInterval,

    #[error("Timeout must be positive: {field}")]
    ZeroTimeout { field: &'static str },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_service(config)?;
    validate_http(config)?;
    validate_upload(config)?;
    validate_monitor(config)?;
    Ok(())
}

/// Root URL must be an absolute http(s) URL
fn validate_service(config: &Config) -> Result<(), ValidationError> {
    let root = &config.service.root_url;
    let url = Url::parse(root).map_err(|e| ValidationError::InvalidRootUrl {
        url: root.clone(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ValidationError::InvalidRootUrl {
            url: root.clone(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(())
}

fn validate_http(config: &Config) -> Result<(), ValidationError> {
    if config.http.connect_timeout_secs == 0 {
        return Err(ValidationError::ZeroTimeout {
            field: "connect_timeout_secs",
        });
    }
    if config.http.request_timeout_secs == 0 {
        return Err(ValidationError::ZeroTimeout {
            field: "request_timeout_secs",
        });
    }
    Ok(())
}

fn validate_upload(config: &Config) -> Result<(), ValidationError> {
    let alignment = config.upload.fragment_alignment.as_u64();
    let size = config.upload.fragment_size.as_u64();

    if alignment == 0 {
        return Err(ValidationError::ZeroFragmentAlignment);
    }
    if size == 0 {
        return Err(ValidationError::ZeroFragmentSize);
    }
    if size % alignment != 0 {
        return Err(ValidationError::UnalignedFragmentSize { size, alignment });
    }
    if config.upload.write_buffer_size.as_u64() == 0 {
        return Err(ValidationError::ZeroWriteBuffer);
    }
    Ok(())
}

fn validate_monitor(config: &Config) -> Result<(), ValidationError> {
    if config.monitor.poll_interval_ms == 0 {
        return Err(ValidationError::ZeroPollInterval);
    }
    Ok(())
}
