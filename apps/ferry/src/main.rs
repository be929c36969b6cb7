//! ferry entry point.

mod cli;
mod config;
mod progress;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ferry_data_channel::{FileClient, FileServer};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, DownloadArgs, ServerArgs, UploadArgs};
use crate::config::Config;
use crate::progress::Bars;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they do not fight the progress bars.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        match cli.command {
            Command::Server(args) => run_server(&config, &args).await,
            Command::Upload(args) => run_upload(&config, &args).await,
            Command::Download(args) => run_download(&config, &args).await,
        }
    })
}

async fn run_server(config: &Config, args: &ServerArgs) -> anyhow::Result<()> {
    let server =
        FileServer::new(config.server_config(args))?.with_progress(Arc::new(Bars::new()));
    let root = &server.config().root_path;
    tokio::fs::create_dir_all(root)
        .await
        .with_context(|| format!("creating {}", root.display()))?;

    let cancel = server.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received");
            cancel.cancel();
        }
    });

    server.run().await?;
    tracing::info!("server shut down cleanly");
    Ok(())
}

async fn run_upload(config: &Config, args: &UploadArgs) -> anyhow::Result<()> {
    let client = FileClient::new(config.transfer_config(&args.client))?
        .with_progress(Arc::new(Bars::new()));

    let stats = client
        .upload_file(&args.file)
        .await
        .with_context(|| format!("uploading {}", args.file.display()))?;

    tracing::info!(
        file = %args.file.display(),
        bytes = stats.bytes,
        started_at = %stats.started_at,
        finished_at = %stats.finished_at,
        elapsed_ms = stats.elapsed().num_milliseconds(),
        bytes_per_sec = stats.bytes_per_second() as u64,
        "upload finished"
    );
    Ok(())
}

async fn run_download(config: &Config, args: &DownloadArgs) -> anyhow::Result<()> {
    let client = FileClient::new(config.transfer_config(&args.client))?
        .with_progress(Arc::new(Bars::new()));

    match client.download_file(&args.file, &args.write).await {
        Ok(stats) => {
            tracing::info!(
                file = %args.file,
                write = %args.write.display(),
                bytes = stats.bytes,
                "download finished"
            );
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            anyhow::bail!("file {} does not exist on the server", args.file)
        }
        Err(e) => Err(e).with_context(|| format!("downloading {}", args.file)),
    }
}
