//! `taskbridge update` — rewrite one task line's status and metadata.

use anyhow::{bail, Context, Result};
use clap::Args;

use taskbridge_core::ledger::{format_task_line, Ledger};
use taskbridge_core::types::TaskStatus;
use taskbridge_sync::write_atomic;

use super::load_config;

/// Arguments for `taskbridge update`.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// 1-based line number of the task to update.
    #[arg(long, conflicts_with = "matcher")]
    pub line: Option<usize>,

    /// Case-insensitive content substring locating the task.
    #[arg(long = "match", value_name = "TEXT")]
    pub matcher: Option<String>,

    /// New status (e.g. DONE, FAILED, WAITING_APPROVAL).
    #[arg(long)]
    pub status: String,

    /// Metadata tail to set (e.g. "draft: data/drafts/x.md").
    #[arg(long)]
    pub metadata: Option<String>,

    /// Append to existing metadata instead of replacing it.
    #[arg(long, requires = "metadata")]
    pub append_metadata: bool,
}

impl UpdateArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config()?;
        let ledger = Ledger::load(&config.ledger)
            .with_context(|| format!("failed to read ledger '{}'", config.ledger.display()))?;

        let line_idx = match (self.line, self.matcher.as_deref()) {
            (Some(line), _) => line.checked_sub(1).context("line numbers are 1-based")?,
            (None, Some(matcher)) => {
                let needle = matcher.to_lowercase();
                let record = ledger
                    .records
                    .iter()
                    .find(|r| r.content.to_lowercase().contains(&needle))
                    .with_context(|| format!("no task matching '{matcher}'"))?;
                println!("Found task at line {}", record.line_number());
                record.line_idx
            }
            (None, None) => bail!("provide --line or --match"),
        };

        let record = ledger
            .records
            .iter()
            .find(|r| r.line_idx == line_idx)
            .with_context(|| format!("line {} is not a task line", line_idx + 1))?;

        let metadata = match self.metadata {
            Some(new) if self.append_metadata && !record.metadata_raw.is_empty() => {
                format!("{}, {new}", record.metadata_raw)
            }
            Some(new) => new,
            // No new metadata: keep whatever the line already carries.
            None => record.metadata_raw.clone(),
        };

        let new_status = TaskStatus::parse(&self.status);
        let new_line = format_task_line(&new_status, &record.content, &metadata);

        let mut lines = ledger.lines.clone();
        lines[line_idx] = new_line;
        write_atomic(&config.ledger, &lines.join("\n")).context("failed to write ledger")?;

        println!("Updated line {}:", line_idx + 1);
        println!("  Old: [{}] {}", record.status, clip(&record.content));
        println!("  New: [{new_status}] {}", clip(&record.content));
        if !metadata.is_empty() {
            println!("  Metadata: {metadata}");
        }
        Ok(())
    }
}

fn clip(content: &str) -> String {
    if content.chars().count() <= 50 {
        return content.to_owned();
    }
    let mut cut: String = content.chars().take(50).collect();
    cut.push_str("...");
    cut
}
