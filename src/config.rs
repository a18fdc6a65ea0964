//! Configuration management for nismap.
//!
//! Reads configuration from env files and environment variables.
//! Environment variables take precedence over env files.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// NIS allows 1024 bytes of key + NUL + value + NUL, but some makedbm
/// implementations choke above 1018.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1000;

/// nismap configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Byte budget of one map line, excluding the newline
    pub max_line_length: usize,
    /// Longest username accepted in passwd and member lists
    pub max_username_len: usize,
    /// Longest group name accepted as a group map key
    pub max_groupname_len: usize,
    /// Longest continuation name minted for posix groups
    pub tmp_groupname_len: usize,
    /// Prefix of continuation names in user netgroups
    pub netgroup_prefix: String,
    /// Allowed size change of passwd/shadow maps, in percent
    pub passwd_max_change: f64,
    /// Allowed size change of group and netgroup maps, in percent
    pub group_max_change: f64,
    /// Posix groups also collect accounts of exported subgroups
    pub filegroup_flatten_all: bool,
    /// Env files that were read, in load order
    pub sources: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_username_len: 8,
            max_groupname_len: 32,
            tmp_groupname_len: 8,
            netgroup_prefix: "x".to_string(),
            passwd_max_change: 10.0,
            group_max_change: 5.0,
            filegroup_flatten_all: false,
            sources: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from env files and environment.
    ///
    /// Reads, later entries overriding earlier ones:
    /// 1. `$XDG_CONFIG_HOME/nismap/env`
    /// 2. `.env` in `base_dir`
    /// 3. The process environment
    pub fn load(base_dir: &Path) -> Result<Self> {
        let mut vars = HashMap::new();
        let mut sources = Vec::new();

        let candidates = dirs::config_dir()
            .map(|d| d.join("nismap/env"))
            .into_iter()
            .chain(std::iter::once(base_dir.join(".env")));
        for path in candidates {
            if !path.exists() {
                continue;
            }
            let entries = dotenvy::from_path_iter(&path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            for entry in entries {
                let (key, value) =
                    entry.with_context(|| format!("Failed to parse {}", path.display()))?;
                vars.insert(key, value);
            }
            sources.push(path);
        }

        // Environment variables override env files
        for (key, value) in std::env::vars() {
            vars.insert(key, value);
        }

        let mut config = Self::from_vars(&vars)?;
        config.sources = sources;
        Ok(config)
    }

    /// Build a configuration from already merged variables.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            max_line_length: parse_var(vars, "NISMAP_MAX_LINE_LENGTH", defaults.max_line_length)?,
            max_username_len: parse_var(
                vars,
                "NISMAP_MAX_USERNAME_LEN",
                defaults.max_username_len,
            )?,
            max_groupname_len: parse_var(
                vars,
                "NISMAP_MAX_GROUPNAME_LEN",
                defaults.max_groupname_len,
            )?,
            tmp_groupname_len: parse_var(
                vars,
                "NISMAP_TMP_GROUPNAME_LEN",
                defaults.tmp_groupname_len,
            )?,
            netgroup_prefix: vars
                .get("NISMAP_NETGROUP_PREFIX")
                .cloned()
                .unwrap_or(defaults.netgroup_prefix),
            passwd_max_change: parse_var(
                vars,
                "NISMAP_PASSWD_MAX_CHANGE",
                defaults.passwd_max_change,
            )?,
            group_max_change: parse_var(
                vars,
                "NISMAP_GROUP_MAX_CHANGE",
                defaults.group_max_change,
            )?,
            filegroup_flatten_all: parse_flag(vars, "NISMAP_FILEGROUP_FLATTEN_ALL")?,
            sources: Vec::new(),
        };

        if config.netgroup_prefix.is_empty()
            || config.netgroup_prefix.contains(char::is_whitespace)
        {
            anyhow::bail!(
                "NISMAP_NETGROUP_PREFIX must be non-empty and contain no whitespace, got '{}'",
                config.netgroup_prefix
            );
        }
        if config.tmp_groupname_len < 2 {
            anyhow::bail!("NISMAP_TMP_GROUPNAME_LEN must be at least 2");
        }
        Ok(config)
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  NISMAP_MAX_LINE_LENGTH: {}", self.max_line_length);
        println!("  NISMAP_MAX_USERNAME_LEN: {}", self.max_username_len);
        println!("  NISMAP_MAX_GROUPNAME_LEN: {}", self.max_groupname_len);
        println!("  NISMAP_TMP_GROUPNAME_LEN: {}", self.tmp_groupname_len);
        println!("  NISMAP_NETGROUP_PREFIX: {}", self.netgroup_prefix);
        println!("  NISMAP_PASSWD_MAX_CHANGE: {}%", self.passwd_max_change);
        println!("  NISMAP_GROUP_MAX_CHANGE: {}%", self.group_max_change);
        println!("  NISMAP_FILEGROUP_FLATTEN_ALL: {}", self.filegroup_flatten_all);
        if self.sources.is_empty() {
            println!("  Env files: none");
        } else {
            for source in &self.sources {
                println!("  Env file: {}", source.display());
            }
        }
    }
}

fn parse_var<T>(vars: &HashMap<String, String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match vars.get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: '{}'", key, raw)),
        None => Ok(default),
    }
}

fn parse_flag(vars: &HashMap<String, String>, key: &str) -> Result<bool> {
    match vars.get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => anyhow::bail!("Invalid value for {}: '{}'", key, v),
        },
    }
}
