//! `taskbridge add <content>...` — quick-create a TODO record in the mirror.

use anyhow::{bail, Context, Result};
use clap::Args;

use taskbridge_notion::NotionStore;
use taskbridge_sync::quick_add;

use super::load_config;

/// Arguments for `taskbridge add`.
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Task content, e.g. "Write about: the new feature".
    #[arg(required = true)]
    pub content: Vec<String>,
}

impl AddArgs {
    pub fn run(self) -> Result<()> {
        let content = self.content.join(" ");
        if content.trim().is_empty() {
            bail!("task content cannot be empty");
        }

        let config = load_config()?;
        let mut store =
            NotionStore::connect(&config).context("failed to connect to remote store")?;

        let id = quick_add(&mut store, content.trim()).context("failed to create task")?;
        println!("✓ Created {id} [TODO] {}", content.trim());
        println!("  It will appear in the ledger on the next pull.");
        Ok(())
    }
}
