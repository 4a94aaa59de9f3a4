//! taskbridge — task ledger ↔ remote mirror sync CLI.
//!
//! # Usage
//!
//! ```text
//! taskbridge init [<ledger-path>]
//! taskbridge sync [--pull-only | --push-only] [--dry-run]
//! taskbridge watch [--interval <secs>]
//! taskbridge status [--status S] [--kind K] [--json]
//! taskbridge diff
//! taskbridge add <content>...
//! taskbridge update (--line N | --match TEXT) --status S [--metadata M] [--append-metadata]
//! taskbridge lock <file> [--agent A] [--timeout N]
//! taskbridge unlock <file>
//! taskbridge fail <file> --error MSG
//! taskbridge field <file> --field F --value V
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    add::AddArgs,
    diff::DiffArgs,
    init::InitArgs,
    status::StatusArgs,
    sync::SyncArgs,
    ticket::{FailArgs, FieldArgs, LockArgs, UnlockArgs},
    update::UpdateArgs,
    watch::WatchArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "taskbridge",
    version,
    about = "Keep a task ledger and its remote mirror store consistent",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scaffold ~/.taskbridge/config.yaml for a ledger.
    Init(InitArgs),

    /// Run one PULL → MERGE → PUSH cycle against the mirror.
    Sync(SyncArgs),

    /// Repeat sync cycles on a fixed interval until ctrl-c.
    Watch(WatchArgs),

    /// Show the parsed ledger records.
    Status(StatusArgs),

    /// Show what merge would change, as a unified diff.
    Diff(DiffArgs),

    /// Create a TODO record directly in the mirror.
    Add(AddArgs),

    /// Rewrite one task line's status and metadata atomically.
    Update(UpdateArgs),

    /// Acquire the advisory lock on a record file.
    Lock(LockArgs),

    /// Release the advisory lock on a record file.
    Unlock(UnlockArgs),

    /// Mark a record file failed and clear its lock.
    Fail(FailArgs),

    /// Update a single header field in a record file.
    Field(FieldArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Watch(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Add(args) => args.run(),
        Commands::Update(args) => args.run(),
        Commands::Lock(args) => args.run(),
        Commands::Unlock(args) => args.run(),
        Commands::Fail(args) => args.run(),
        Commands::Field(args) => args.run(),
    }
}
