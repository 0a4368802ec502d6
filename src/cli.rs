use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::download::format::{AudioFormat, DownloadMode, Quality};

#[derive(Parser)]
#[command(name = "doraweb")]
#[command(author, version, about = "Web service for downloading YouTube, TikTok and Instagram media", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the web server (default)
    Serve {
        /// Address to bind, overrides WEB_HOST
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on, overrides WEB_PORT
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print what a URL points to without downloading it
    Info {
        /// Media URL
        url: String,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Download a URL into a local directory
    Download {
        /// Media URL
        url: String,

        /// video or audio
        #[arg(short, long, default_value = "video")]
        mode: DownloadMode,

        /// best, 1080p, 720p, 480p or 360p
        #[arg(short, long, default_value = "best")]
        quality: Quality,

        /// mp3 or m4a (audio mode only)
        #[arg(long, default_value = "mp3")]
        audio_format: AudioFormat,

        /// Output directory (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
