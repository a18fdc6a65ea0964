//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `export` - Generate and write NIS maps (also `check`, a dry run)
//! - `show` - Display information

pub mod export;
pub mod show;

pub use export::cmd_export;
pub use show::cmd_show;
