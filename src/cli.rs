use clap::{Args, Parser, Subcommand};
use fragstore::humanize::ByteSize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fragstore")]
#[command(about = "Fragmented uploads, async operation polling and batch decoding", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $FRAGSTORE_CONFIG or config/fragstore.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a file in fragments
    Upload(UploadArgs),
    /// Poll an async operation until it finishes
    Poll(PollArgs),
    /// Decode a saved multipart batch response
    DecodeBatch(DecodeBatchArgs),
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// File to upload
    pub file: PathBuf,

    /// URL that creates a new upload session
    #[arg(long, conflicts_with = "session_url", required_unless_present = "session_url")]
    pub create_url: Option<String>,

    /// Existing upload session URL
    #[arg(long)]
    pub session_url: Option<String>,

    /// Override the configured fragment size (e.g. "3200KiB")
    #[arg(long)]
    pub fragment_size: Option<ByteSize>,
}

#[derive(Args, Debug)]
pub struct PollArgs {
    /// Monitor URL from the operation's Location header
    pub status_url: String,
}

#[derive(Args, Debug)]
pub struct DecodeBatchArgs {
    /// File holding the raw multipart body
    pub file: PathBuf,

    /// Content type of the response, including the boundary parameter
    #[arg(long)]
    pub content_type: String,
}
