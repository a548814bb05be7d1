use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// Remote service endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// API root; the batch endpoint is `<root_url>/$batch`
    #[serde(default = "default_root_url")]
    pub root_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Extra headers sent with every request
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
    /// Bearer token (loaded from environment, not from config file)
    #[serde(skip)]
    pub access_token: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            root_url: default_root_url(),
            user_agent: default_user_agent(),
            default_headers: BTreeMap::new(),
            access_token: None,
        }
    }
}

fn default_root_url() -> String {
    "https://api.onedrive.com/v1.0".to_string()
}

fn default_user_agent() -> String {
    format!("fragstore/{}", env!("CARGO_PKG_VERSION"))
}

/// Transport timeouts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    300
}

/// Fragmented upload tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    /// Bytes per fragment PUT; must be a multiple of `fragment_alignment`
    #[serde(default = "default_fragment_size")]
    pub fragment_size: ByteSize,
    #[serde(default = "default_fragment_alignment")]
    pub fragment_alignment: ByteSize,
    /// Chunk size used when copying a fragment into the request body
    #[serde(default = "default_write_buffer_size")]
    pub write_buffer_size: ByteSize,
    /// Payloads up to this size go through a single PUT
    #[serde(default = "default_max_simple_upload_size")]
    pub max_simple_upload_size: ByteSize,
    /// Accepted for compatibility; fragments are always sent in order
    #[serde(default)]
    pub allow_parallel_upload: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            fragment_size: default_fragment_size(),
            fragment_alignment: default_fragment_alignment(),
            write_buffer_size: default_write_buffer_size(),
            max_simple_upload_size: default_max_simple_upload_size(),
            allow_parallel_upload: false,
        }
    }
}

fn default_fragment_size() -> ByteSize {
    ByteSize::kib(320 * 16) // 5 MiB
}

fn default_fragment_alignment() -> ByteSize {
    ByteSize::kib(320)
}

fn default_write_buffer_size() -> ByteSize {
    ByteSize::kib(64)
}

fn default_max_simple_upload_size() -> ByteSize {
    ByteSize::mib(60)
}

/// Async operation polling
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound on status fetches per wait; 0 means unbounded
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_polls() -> u32 {
    600
}
