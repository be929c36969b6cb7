//! Command-line flags.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Point-to-point chunked file transfer.
#[derive(Parser, Debug)]
#[command(name = "ferry", version, about, long_about = None)]
pub struct Cli {
    /// TOML file with `[client]` and `[server]` defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve a directory for uploads and downloads.
    Server(ServerArgs),
    /// Upload a local file to a server.
    Upload(UploadArgs),
    /// Download a file from a server.
    Download(DownloadArgs),
}

#[derive(Args, Debug, Default)]
pub struct ServerArgs {
    /// Port to listen on [default: 1213]
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory to serve [default: ./]
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Bytes per download chunk [default: 4096]
    #[arg(long, alias = "chunkSize")]
    pub chunk_size: Option<usize>,
}

#[derive(Args, Debug, Default)]
pub struct ClientArgs {
    /// Remote server, host:port [default: 0.0.0.0:1213]
    #[arg(long)]
    pub host: Option<String>,

    /// Bytes per chunk [default: 4096]
    #[arg(long, alias = "chunkSize")]
    pub chunk_size: Option<usize>,

    /// gzip chunk content on the wire
    #[arg(long)]
    pub compress: bool,
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    #[command(flatten)]
    pub client: ClientArgs,

    /// Local file to upload
    #[arg(long)]
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub client: ClientArgs,

    /// Remote file to download
    #[arg(long)]
    pub file: String,

    /// Local path to write
    #[arg(long)]
    pub write: PathBuf,
}
