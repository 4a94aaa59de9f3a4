//! `taskbridge status` — parsed ledger visibility.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use taskbridge_core::ledger::Ledger;
use taskbridge_core::types::{Record, TaskStatus};

use super::load_config;

/// Arguments for `taskbridge status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Filter to one status (e.g. TODO, WAITING_APPROVAL).
    #[arg(long)]
    pub status: Option<String>,

    /// Filter to one kind (github_commit, from_summary, free_form,
    /// ticket_process, unknown).
    #[arg(long)]
    pub kind: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config()?;
        let ledger = Ledger::load(&config.ledger)
            .with_context(|| format!("failed to read ledger '{}'", config.ledger.display()))?;
        let total = ledger.records.len();

        let mut records = ledger.records;
        if let Some(wanted) = self.status.as_deref() {
            let wanted = TaskStatus::parse(wanted);
            records.retain(|r| r.status == wanted);
        }
        if let Some(wanted) = self.kind.as_deref() {
            records.retain(|r| r.kind.label() == wanted);
        }

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&records)
                    .context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_table(&config.ledger.display().to_string(), total, &records);
        Ok(())
    }
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "line")]
    line: usize,
    #[tabled(rename = "")]
    indicator: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "kind")]
    kind: String,
    #[tabled(rename = "content")]
    content: String,
}

fn print_table(ledger_name: &str, total: usize, records: &[Record]) {
    println!(
        "taskbridge v{} | {} | {} record(s), {} shown",
        env!("CARGO_PKG_VERSION"),
        ledger_name,
        total,
        records.len(),
    );

    if records.is_empty() {
        println!("No records to show.");
        return;
    }

    let rows: Vec<StatusTableRow> = records
        .iter()
        .map(|record| StatusTableRow {
            line: record.line_number(),
            indicator: status_indicator(&record.status),
            status: record.status.to_string(),
            kind: record.kind.label().to_string(),
            content: clip(&record.content, 60),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let mut summary = Vec::new();
    for status in TaskStatus::KNOWN {
        let count = records.iter().filter(|r| r.status == status).count();
        if count > 0 {
            summary.push(format!("{} {status}: {count}", status_indicator(&status)));
        }
    }
    let unknown = records
        .iter()
        .filter(|r| matches!(r.status, TaskStatus::Unknown(_)))
        .count();
    if unknown > 0 {
        summary.push(format!(
            "{} other: {unknown}",
            status_indicator(&TaskStatus::Unknown(String::new()))
        ));
    }
    println!("{}", summary.join("  "));
}

fn status_indicator(status: &TaskStatus) -> String {
    match status {
        TaskStatus::Todo => "■".yellow().bold().to_string(),
        TaskStatus::Processing | TaskStatus::Publishing => "■".blue().bold().to_string(),
        TaskStatus::WaitingApproval => "■".magenta().bold().to_string(),
        TaskStatus::Approved => "■".cyan().bold().to_string(),
        TaskStatus::Done => "■".green().bold().to_string(),
        TaskStatus::Failed => "■".red().bold().to_string(),
        TaskStatus::Unknown(_) => "■".bright_black().bold().to_string(),
    }
}

fn clip(content: &str, limit: usize) -> String {
    if content.chars().count() <= limit {
        return content.to_owned();
    }
    let mut cut: String = content.chars().take(limit).collect();
    cut.push('…');
    cut
}
