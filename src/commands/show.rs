//! Show command - displays information.

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::Config;
use crate::source::Snapshot;

/// Show target for the show command.
pub enum ShowTarget<'a> {
    /// Show configuration
    Config,
    /// Show what a snapshot contains
    Snapshot(&'a Path),
}

/// Execute the show command.
pub fn cmd_show(target: ShowTarget<'_>, config: &Config) -> Result<()> {
    match target {
        ShowTarget::Config => config.print(),
        ShowTarget::Snapshot(path) => {
            let snapshot = Snapshot::from_file(path)
                .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
            println!("Snapshot: {}", path.display());
            println!("  Evaluated at: {}", snapshot.now().to_rfc3339());
            println!("  Groups: {}", snapshot.group_count());
            println!("  Accounts: {}", snapshot.account_count());
            println!("  Hosts: {}", snapshot.dns_owner_count());
        }
    }
    Ok(())
}
