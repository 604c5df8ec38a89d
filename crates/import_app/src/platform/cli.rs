use std::path::PathBuf;

use clap::{Parser, Subcommand};
use import_core::ImportType;

use super::config::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "recipe-import", version, about = "Submit and track recipe imports")]
pub struct Cli {
    /// Config file (RON). Defaults to ./recipe_import.ron when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Import server base URL.
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Directory holding the persisted job list.
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    /// Also log to the terminal.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit a video, website or photo for recipe extraction.
    Submit {
        #[arg(long = "type")]
        import_type: ImportType,
        /// URL or local file path.
        source: String,
        /// Page content captured client-side.
        #[arg(long)]
        content: Option<String>,
        /// Keep polling until the import finishes.
        #[arg(long)]
        watch: bool,
    },
    /// Show tracked imports, newest first.
    List,
    /// Poll until no import is pending or processing.
    Watch,
    /// Resubmit a failed import.
    Retry { job_id: String },
    /// Forget an import locally.
    Discard { job_id: String },
    /// Cancel an import on the server and forget it.
    Cancel { job_id: String },
    /// Forget every completed or failed import.
    Clear,
}

impl Cli {
    /// Applies command-line overrides on top of the file config.
    pub fn apply_to(&self, mut config: AppConfig) -> AppConfig {
        if let Some(server) = &self.server {
            config.server_url = server.clone();
        }
        if let Some(state_dir) = &self.state_dir {
            config.state_dir = state_dir.clone();
        }
        if self.verbose {
            config.log_destination = super::config::LogTarget::Both;
        }
        config
    }
}
