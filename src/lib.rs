//! nismap library exports.
//!
//! The binary is a thin CLI over these modules; integration tests drive
//! them directly.

pub mod commands;
pub mod config;
pub mod error;
pub mod expand;
pub mod export;
pub mod format;
pub mod model;
pub mod names;
pub mod passwd;
pub mod report;
pub mod source;
pub mod timing;
pub mod transliterate;
pub mod validate;
pub mod writer;
