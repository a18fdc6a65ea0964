//! nismap - NIS map exporter.
//!
//! Generates passwd, shadow, group, netgroup and host netgroup maps from a
//! JSON snapshot of the identity database.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use nismap::commands::{self, export::ExportRequest, export::Mode};
use nismap::config::Config;

#[derive(Parser)]
#[command(name = "nismap")]
#[command(about = "NIS map exporter")]
#[command(
    after_help = "QUICK START:\n  \
        nismap check --snapshot s.json --user-spread NIS_user@uio --passwd passwd\n  \
        nismap export --snapshot s.json --user-spread NIS_user@uio \
        --group-spread NIS_fg@uio --group group\n  \
        nismap show config"
)]
struct Cli {
    /// Log debug output (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and write NIS maps
    Export(MapArgs),

    /// Generate maps without writing them and print the report
    Check(MapArgs),

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },
}

#[derive(Args)]
struct MapArgs {
    /// Snapshot of the identity database (JSON)
    #[arg(long)]
    snapshot: PathBuf,

    /// Spread selecting exported accounts
    #[arg(long)]
    user_spread: Option<String>,

    /// Spread selecting exported groups
    #[arg(long)]
    group_spread: Option<String>,

    /// Spread selecting host netgroups (default: --group-spread)
    #[arg(long)]
    host_group_spread: Option<String>,

    /// Write the passwd map to this file
    #[arg(short, long)]
    passwd: Option<PathBuf>,

    /// Write password hashes to this shadow file
    #[arg(short, long)]
    shadow: Option<PathBuf>,

    /// Write the posix group map to this file
    #[arg(short, long)]
    group: Option<PathBuf>,

    /// Write the user netgroup map to this file
    #[arg(short, long)]
    netgroup: Option<PathBuf>,

    /// Write the host netgroup map to this file
    #[arg(short, long)]
    mnetgroup: Option<PathBuf>,

    /// DNS zone suffix for short host names (example: .uio.no.)
    #[arg(short = 'Z', long)]
    zone: Option<String>,

    /// Publish hashes of this authentication method
    #[arg(long)]
    auth_method: Option<String>,

    /// Append an E_O_F line to every map
    #[arg(long)]
    eof: bool,

    /// Skip the size sanity check
    #[arg(long)]
    force: bool,
}

impl From<MapArgs> for ExportRequest {
    fn from(args: MapArgs) -> Self {
        Self {
            snapshot: args.snapshot,
            user_spread: args.user_spread,
            group_spread: args.group_spread,
            host_group_spread: args.host_group_spread,
            passwd: args.passwd,
            shadow: args.shadow,
            group: args.group,
            netgroup: args.netgroup,
            mnetgroup: args.mnetgroup,
            zone: args.zone,
            auth_method: args.auth_method,
            eof: args.eof,
            force: args.force,
        }
    }
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show current configuration
    Config,
    /// Show snapshot contents
    Snapshot {
        /// Snapshot file
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let base_dir = std::env::current_dir()?;
    let config = Config::load(&base_dir)?;

    match cli.command {
        Commands::Export(args) => {
            commands::cmd_export(&args.into(), &config, Mode::Write)?;
        }

        Commands::Check(args) => {
            commands::cmd_export(&args.into(), &config, Mode::Check)?;
        }

        Commands::Show { what } => {
            let show_target = match &what {
                ShowTarget::Config => commands::show::ShowTarget::Config,
                ShowTarget::Snapshot { path } => commands::show::ShowTarget::Snapshot(path),
            };
            commands::cmd_show(show_target, &config)?;
        }
    }

    Ok(())
}
