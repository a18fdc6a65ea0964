//! Typed errors for the export engine.
//!
//! Command handlers wrap these in `anyhow` with context; the engine itself
//! returns them so callers can decide between skipping and aborting.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::EntityId;

/// Errors raised while loading a run snapshot. Always fatal.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed snapshot: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("entity id {0} is used by more than one entity")]
    DuplicateId(EntityId),

    #[error("membership references unknown group {group_id} (member {member_id})")]
    UnknownGroup {
        group_id: EntityId,
        member_id: EntityId,
    },
}

/// A group that cannot be expanded. The group is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpandError {
    #[error("group {0} does not exist")]
    UnknownGroup(EntityId),

    #[error("group {name} ({id}) has no GID")]
    MissingGid { id: EntityId, name: String },
}

/// A logical record that cannot be laid out within the line budget.
///
/// The affected record is skipped; other records are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("value '{value}' in '{key}' needs {len} bytes, only {budget} available")]
    ValueTooLong {
        key: String,
        value: String,
        len: usize,
        budget: usize,
    },

    #[error("key '{key}' leaves no room for values within {max_line_length} bytes")]
    KeyTooLong { key: String, max_line_length: usize },

    #[error("no free continuation name derived from '{base}'")]
    NamesExhausted { base: String },

    #[error("continuation of '{key}' makes no progress within the line budget")]
    NoProgress { key: String },
}

/// Failures of the map writer. Always fatal for the map being written.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("{path}: size changed more than {limit}%: {old} -> {new} bytes ({change:+.1}%)")]
    SizeChange {
        path: PathBuf,
        limit: f64,
        old: u64,
        new: u64,
        change: f64,
    },

    #[error("failed to write {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
