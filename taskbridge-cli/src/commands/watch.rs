//! `taskbridge watch` — fixed-interval sync loop.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use taskbridge_daemon as daemon;
use taskbridge_notion::NotionStore;
use taskbridge_sync::{Reconciler, SyncMode};

use super::load_config;

/// Arguments for `taskbridge watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Seconds between cycles (default: config `interval_secs`).
    #[arg(long)]
    pub interval: Option<u64>,
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config()?;
        let interval = Duration::from_secs(self.interval.unwrap_or(config.interval_secs));

        let mut store =
            NotionStore::connect(&config).context("failed to connect to remote store")?;

        println!(
            "Watching '{}': one cycle every {}s (ctrl-c to stop)",
            config.ledger.display(),
            interval.as_secs(),
        );

        let job_config = config.clone();
        daemon::start_blocking(interval, move || {
            Reconciler::from_config(&mut store, &job_config, false).run(SyncMode::Bidirectional)
        })
        .context("watch loop failed")
    }
}
