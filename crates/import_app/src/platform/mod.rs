mod app;
mod cli;
mod config;
mod render;

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use import_logging::import_info;

pub use cli::Cli;
pub use config::{AppConfig, LOG_FILENAME};

pub async fn run_app() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.apply_to(AppConfig::load(cli.config.as_deref())?);

    import_logging::initialize(
        config.log_destination.into(),
        config.log_level(),
        Path::new(LOG_FILENAME),
    );
    import_info!(
        "recipe-import starting: server={} state_dir={:?}",
        config.server_url,
        config.state_dir
    );

    let app = app::App::new(&config)?;
    app.run(cli.command).await
}
