use fragstore::batch;
use fragstore::config::Config;
use fragstore::upload::{TransferProgress, UploadSession};
use fragstore::{Client, Error};
use tokio::fs::File;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::{DecodeBatchArgs, PollArgs, UploadArgs};

pub type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub async fn upload(config: &Config, args: UploadArgs, cancel: CancellationToken) -> Result<(), AnyError> {
    let client = Client::from_config(config)?;

    let mut options = client
        .upload_options()
        .with_observer(|progress: TransferProgress| {
            info!(
                bytes = progress.bytes_transferred,
                total = progress.total_bytes,
                percent = progress.percent_complete(),
                "Upload progress"
            );
        });
    if let Some(size) = args.fragment_size {
        options = options.with_fragment_size(size.as_u64())?;
    }

    let mut file = File::open(&args.file).await?;
    let len = file.metadata().await?.len();
    info!(file = %args.file.display(), bytes = len, "Uploading");

    let result = match (&args.session_url, &args.create_url) {
        (Some(session_url), _) => {
            let mut session = UploadSession::new(session_url.as_str());
            client
                .upload_to_session(&mut session, &mut file, len, &options, &cancel)
                .await
        }
        (None, Some(create_url)) => {
            client
                .upload_large(create_url, &mut file, len, &options, &cancel)
                .await
        }
        (None, None) => Err(Error::InvalidArgument(
            "either --create-url or --session-url is required".to_string(),
        )),
    };

    let item = result?;
    println!("{}", serde_json::to_string_pretty(&item)?);
    Ok(())
}

pub async fn poll(config: &Config, args: PollArgs, cancel: CancellationToken) -> Result<(), AnyError> {
    let client = Client::from_config(config)?;
    let task = client.resume_async_operation(&args.status_url, &cancel).await?;

    println!(
        "{:?} ({:?}, {:.0}%)",
        task.state(),
        task.status(),
        task.percent_complete()
    );
    if let Some(item) = task.finished_item() {
        println!("{}", serde_json::to_string_pretty(item)?);
    }
    Ok(())
}

pub async fn decode_batch(args: DecodeBatchArgs) -> Result<(), AnyError> {
    let body = tokio::fs::read(&args.file).await?;
    let message = batch::parse(&args.content_type, &body)?;

    for (index, part) in message.parts().iter().enumerate() {
        let id = part.content_id().unwrap_or("-");
        match part.to_http_response() {
            Ok(response) => println!(
                "{index} [{id}] {} {} ({} bytes)",
                response.status.as_u16(),
                response.status_description,
                response.body.len()
            ),
            Err(err) => println!("{index} [{id}] undecodable part: {err}"),
        }
    }
    Ok(())
}

/// Cancels `cancel` on Ctrl+C or SIGTERM.
pub async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, cancelling");
    cancel.cancel();
}
