//! `taskbridge sync` — one reconciliation cycle.

use anyhow::{bail, Context, Result};
use clap::Args;

use taskbridge_notion::NotionStore;
use taskbridge_sync::{CycleReport, Reconciler, SyncMode};

use super::load_config;

/// Arguments for `taskbridge sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Only pull and merge remote changes into the ledger.
    #[arg(long, conflicts_with = "push_only")]
    pub pull_only: bool,

    /// Only push the ledger's projection to the mirror.
    #[arg(long)]
    pub push_only: bool,

    /// Show what would change without writing anywhere.
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config()?;
        let mut store =
            NotionStore::connect(&config).context("failed to connect to remote store")?;

        let mode = if self.pull_only {
            SyncMode::PullOnly
        } else if self.push_only {
            SyncMode::PushOnly
        } else {
            SyncMode::Bidirectional
        };

        let report = Reconciler::from_config(&mut store, &config, self.dry_run).run(mode);
        print_report(&report, self.dry_run);

        if report.is_failed() {
            let phase = report
                .failed_in
                .map(|p| p.to_string())
                .unwrap_or_else(|| "unknown".to_owned());
            match report.error {
                Some(err) => bail!("sync failed during {phase}: {err}"),
                None => bail!("sync failed during {phase}"),
            }
        }
        Ok(())
    }
}

fn print_report(report: &CycleReport, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    let stats = &report.stats;
    if report.is_failed() {
        println!("{prefix}✗ sync cycle failed");
        return;
    }
    println!(
        "{prefix}✓ cycle complete: pulled {}, merged {} status(es), appended {}, created {}, updated {}, {} error(s)",
        stats.pulled,
        stats.status_updates,
        stats.appended,
        stats.created,
        stats.updated,
        stats.errors,
    );
    if stats.merge_deferred {
        println!("{prefix}  merge deferred: ledger locked by another agent");
    }
}
