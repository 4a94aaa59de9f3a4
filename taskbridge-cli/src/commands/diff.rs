//! `taskbridge diff` — show what merge would write to the ledger.

use anyhow::{Context, Result};
use clap::Args;

use taskbridge_notion::NotionStore;
use taskbridge_sync::diff::merge_diff;

use super::load_config;

/// Arguments for `taskbridge diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config()?;
        let mut store =
            NotionStore::connect(&config).context("failed to connect to remote store")?;

        match merge_diff(&mut store, &config.ledger).context("diff failed")? {
            None => println!("No merge changes for '{}'.", config.ledger.display()),
            Some(unified) => {
                print!("{unified}");
                if !unified.ends_with('\n') {
                    println!();
                }
            }
        }
        Ok(())
    }
}
