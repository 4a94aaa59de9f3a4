//! `taskbridge init [<ledger-path>]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use taskbridge_core::config;

/// Scaffold the taskbridge config.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path to the ledger document.
    #[arg(default_value = "data/tasks.md")]
    pub ledger: PathBuf,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let config = config::init_at(&home, self.ledger).context("failed to write config")?;

        println!("✓ Config at ~/.taskbridge/config.yaml");
        println!("  ledger: {}", config.ledger.display());
        if config.remote.database_id.is_empty() {
            println!("  Next: set remote.database_id in the config and export {}.", config.remote.token_env);
        }
        Ok(())
    }
}
