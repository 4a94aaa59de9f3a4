//! Lock, unlock, fail, and field commands over record files — the surface
//! cooperating agents drive from their own pipelines.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use taskbridge_core::types::AgentName;
use taskbridge_sync::{acquire, mark_failed, release, update_field_atomic, FieldValue, LockOutcome};

/// Arguments for `taskbridge lock`.
#[derive(Args, Debug)]
pub struct LockArgs {
    /// Record file with a header block.
    pub file: PathBuf,

    /// Agent name to stamp as the lock owner.
    #[arg(long, default_value = "cli")]
    pub agent: String,

    /// Minutes before a held lock counts as stale.
    #[arg(long, default_value_t = 10)]
    pub timeout: i64,
}

impl LockArgs {
    pub fn run(self) -> Result<()> {
        let agent = AgentName(self.agent);
        match acquire(&self.file, &agent, self.timeout)
            .with_context(|| format!("lock failed for '{}'", self.file.display()))?
        {
            LockOutcome::Granted => {
                println!("Lock acquired by {agent}");
                Ok(())
            }
            LockOutcome::Denied { holder } => {
                bail!("lock already held by {holder}")
            }
        }
    }
}

/// Arguments for `taskbridge unlock`.
#[derive(Args, Debug)]
pub struct UnlockArgs {
    /// Record file with a header block.
    pub file: PathBuf,
}

impl UnlockArgs {
    pub fn run(self) -> Result<()> {
        release(&self.file)
            .with_context(|| format!("unlock failed for '{}'", self.file.display()))?;
        println!("Lock released");
        Ok(())
    }
}

/// Arguments for `taskbridge fail`.
#[derive(Args, Debug)]
pub struct FailArgs {
    /// Record file with a header block.
    pub file: PathBuf,

    /// Error message to store on the record.
    #[arg(long)]
    pub error: String,
}

impl FailArgs {
    pub fn run(self) -> Result<()> {
        mark_failed(&self.file, &self.error)
            .with_context(|| format!("mark-failed failed for '{}'", self.file.display()))?;
        println!("Marked as failed: {}", self.error);
        Ok(())
    }
}

/// Arguments for `taskbridge field`.
#[derive(Args, Debug)]
pub struct FieldArgs {
    /// Record file with a header block.
    pub file: PathBuf,

    /// Header field name.
    #[arg(long)]
    pub field: String,

    /// New value.
    #[arg(long)]
    pub value: String,
}

impl FieldArgs {
    pub fn run(self) -> Result<()> {
        update_field_atomic(&self.file, &self.field, &FieldValue::from(self.value.clone()))
            .with_context(|| format!("field update failed for '{}'", self.file.display()))?;
        println!("Updated {} = {}", self.field, self.value);
        Ok(())
    }
}
