pub mod add;
pub mod diff;
pub mod init;
pub mod status;
pub mod sync;
pub mod ticket;
pub mod update;
pub mod watch;

use anyhow::{Context, Result};

use taskbridge_core::config::{self, Config};

/// Load `~/.taskbridge/config.yaml`, with a friendly hint when absent.
pub(crate) fn load_config() -> Result<Config> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    config::load_at(&home).context("failed to load config — run `taskbridge init` first")
}
