use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clipgrab")]
#[command(author, version, about = "Personal video grabber with live download progress", long_about = None)]
pub struct Cli {
    /// Path to a TOML config file (default: ./clipgrab.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve {
        /// Override the bind host
        #[arg(long)]
        host: Option<String>,

        /// Override the listen port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the title of a video
    Info {
        /// Video URL
        url: String,
    },

    /// Download a video from the terminal, printing progress frames
    Fetch {
        /// Video URL
        url: String,

        /// Directory the finished file is moved into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Print raw SSE frames instead of one status line per event
        #[arg(long)]
        raw: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
