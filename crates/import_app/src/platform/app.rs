use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use import_core::Admission;
use import_engine::{
    AppLifecycle, HttpStatusChannel, ImportService, JobRegistry, JsonFileStore, PollSettings,
    PollingCoordinator, StatusChannel, SubmitRequest,
};
use import_logging::{import_info, import_warn};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::cli::Command;
use super::config::AppConfig;
use super::render::render;

/// Owns the process-wide registry and the services built on it.
pub struct App {
    service: ImportService,
    registry: Arc<JobRegistry>,
    channel: Arc<dyn StatusChannel>,
    poll: PollSettings,
}

impl App {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let channel: Arc<dyn StatusChannel> = Arc::new(
            HttpStatusChannel::new(config.channel_settings())
                .context("failed to set up the import server connection")?,
        );
        let registry = Arc::new(JobRegistry::open(JsonFileStore::new(&config.state_dir)));
        let service = ImportService::new(registry.clone(), channel.clone());
        Ok(Self {
            service,
            registry,
            channel,
            poll: config.poll_settings(),
        })
    }

    pub async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Submit {
                import_type,
                source,
                content,
                watch,
            } => {
                if !self.service.has_capacity() {
                    bail!("three imports are already in progress; wait for one to finish");
                }
                let request = SubmitRequest::new(import_type, source).with_raw_content(content);
                let outcome = self.service.submit(request).await?;
                match outcome.admission {
                    Admission::Admitted => println!("Submitted {}", outcome.job.job_id),
                    Admission::Evicted(evicted) => println!(
                        "Submitted {} (dropped finished import {})",
                        outcome.job.job_id, evicted.job_id
                    ),
                    Admission::Rejected | Admission::Duplicate => {
                        println!(
                            "Submitted {} but it could not be tracked locally",
                            outcome.job.job_id
                        );
                    }
                }
                if watch {
                    self.watch().await?;
                }
            }
            Command::List => println!("{}", render(&self.registry.list(), Utc::now())),
            Command::Watch => self.watch().await?,
            Command::Retry { job_id } => {
                let job = self.service.retry(&job_id).await?;
                println!("Retrying {} as {}", job_id, job.job_id);
            }
            Command::Discard { job_id } => match self.service.discard(&job_id) {
                Some(_) => println!("Discarded {job_id}"),
                None => println!("No import {job_id}"),
            },
            Command::Cancel { job_id } => {
                self.service.cancel(&job_id).await?;
                println!("Cancelled {job_id}");
            }
            Command::Clear => {
                let removed = self.service.clear_terminal();
                println!("Cleared {removed} finished imports");
            }
        }

        let registry = self.registry.clone();
        tokio::task::spawn_blocking(move || registry.flush())
            .await
            .context("failed to flush import state")?;
        Ok(())
    }

    /// Polls until nothing is active or the user interrupts.
    async fn watch(&self) -> Result<()> {
        let coordinator = Arc::new(PollingCoordinator::new(
            self.registry.clone(),
            self.channel.clone(),
            self.poll.clone(),
        ));
        let (_lifecycle_tx, lifecycle_rx) = watch::channel(AppLifecycle::Foreground);
        let shutdown = CancellationToken::new();
        let supervisor = tokio::spawn(coordinator.clone().run(lifecycle_rx, shutdown.clone()));

        let mut changes = self.registry.subscribe();
        println!("{}", render(&changes.borrow_and_update(), Utc::now()));
        loop {
            if self.registry.active_count() == 0 {
                break;
            }
            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let jobs = changes.borrow_and_update().clone();
                    println!("\n{}", render(&jobs, Utc::now()));
                }
                interrupted = tokio::signal::ctrl_c() => {
                    if let Err(err) = interrupted {
                        import_warn!("Failed to listen for Ctrl-C: {}", err);
                    }
                    import_info!("Watch interrupted");
                    break;
                }
            }
        }

        shutdown.cancel();
        supervisor.await.context("poll supervisor panicked")?;
        Ok(())
    }
}
