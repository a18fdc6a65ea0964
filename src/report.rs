//! End-of-run summary.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::expand::ExpandIssue;
use crate::passwd::Skip;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Expected; nothing logged above debug.
    Silent,
    /// Record or member dropped with a warning.
    Warning,
    /// Record dropped because it could not be formatted.
    Error,
}

/// Why a record or member was left out of a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SkipCategory {
    Quarantined,
    NoAuthData,
    RecentlyCreated,
    BadUsername,
    BadGroupName,
    MissingGid,
    StaleName,
    IllegalField,
    LineTooLong,
    Cycle,
    UnsupportedOperation,
    Unformattable,
}

impl SkipCategory {
    pub fn severity(self) -> Severity {
        match self {
            SkipCategory::Quarantined
            | SkipCategory::NoAuthData
            | SkipCategory::RecentlyCreated => Severity::Silent,
            SkipCategory::Unformattable => Severity::Error,
            _ => Severity::Warning,
        }
    }
}

impl fmt::Display for SkipCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipCategory::Quarantined => "quarantined",
            SkipCategory::NoAuthData => "no auth data",
            SkipCategory::RecentlyCreated => "recently created",
            SkipCategory::BadUsername => "bad username",
            SkipCategory::BadGroupName => "bad group name",
            SkipCategory::MissingGid => "missing gid",
            SkipCategory::StaleName => "stale name cache",
            SkipCategory::IllegalField => "illegal field",
            SkipCategory::LineTooLong => "line too long",
            SkipCategory::Cycle => "membership cycle",
            SkipCategory::UnsupportedOperation => "non-union membership",
            SkipCategory::Unformattable => "unformattable record",
        };
        f.write_str(s)
    }
}

impl From<&Skip> for SkipCategory {
    fn from(skip: &Skip) -> Self {
        match skip {
            Skip::Quarantined => SkipCategory::Quarantined,
            Skip::NoAuthData => SkipCategory::NoAuthData,
            Skip::BadUsername(_) => SkipCategory::BadUsername,
            Skip::IllegalField { .. } => SkipCategory::IllegalField,
            Skip::LineTooLong { .. } => SkipCategory::LineTooLong,
        }
    }
}

impl From<&ExpandIssue> for SkipCategory {
    fn from(issue: &ExpandIssue) -> Self {
        match issue {
            ExpandIssue::RecentlyCreated { .. } => SkipCategory::RecentlyCreated,
            ExpandIssue::StaleName { .. } => SkipCategory::StaleName,
            ExpandIssue::Cycle { .. } => SkipCategory::Cycle,
            ExpandIssue::UnsupportedOperation { .. } => SkipCategory::UnsupportedOperation,
        }
    }
}

/// Outcome of writing one map file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStatus {
    Written { bytes: u64, sha256: String },
    Unchanged { sha256: String },
    NotWritten,
}

#[derive(Debug, Clone)]
pub struct MapSummary {
    pub map: String,
    pub path: Option<PathBuf>,
    pub records: usize,
    pub lines: usize,
    pub status: WriteStatus,
}

/// Skip counts and per-map results of one run.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub maps: Vec<MapSummary>,
    skips: BTreeMap<SkipCategory, usize>,
}

impl ExportReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip(&mut self, category: SkipCategory) {
        *self.skips.entry(category).or_insert(0) += 1;
    }

    pub fn record_issues(&mut self, issues: &[ExpandIssue]) {
        for issue in issues {
            self.skip(issue.into());
        }
    }

    pub fn count(&self, category: SkipCategory) -> usize {
        self.skips.get(&category).copied().unwrap_or(0)
    }

    pub fn count_severity(&self, severity: Severity) -> usize {
        self.skips
            .iter()
            .filter(|(c, _)| c.severity() == severity)
            .map(|(_, n)| n)
            .sum()
    }

    pub fn map(&self, name: &str) -> Option<&MapSummary> {
        self.maps.iter().find(|m| m.map == name)
    }

    /// Print the report to stdout.
    pub fn print(&self) {
        println!("=== NIS Map Export ===\n");

        for map in &self.maps {
            let target = map
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string());
            let status = match &map.status {
                WriteStatus::Written { bytes, sha256 } => {
                    format!("written, {} bytes, sha256 {}", bytes, &sha256[..12.min(sha256.len())])
                }
                WriteStatus::Unchanged { .. } => "unchanged".to_string(),
                WriteStatus::NotWritten => "not written".to_string(),
            };
            println!(
                "  {:<14} {:>6} records {:>6} lines  {} ({})",
                map.map, map.records, map.lines, target, status
            );
        }

        if self.skips.is_empty() {
            println!("\nNo records skipped.");
            return;
        }

        println!("\nSkipped:");
        for (category, n) in &self.skips {
            let marker = match category.severity() {
                Severity::Silent => " ",
                Severity::Warning => "!",
                Severity::Error => "✗",
            };
            println!("  {} {:<22} {}", marker, category.to_string(), n);
        }

        let warned = self.count_severity(Severity::Warning);
        let failed = self.count_severity(Severity::Error);
        println!();
        if warned > 0 {
            println!("{} warnings", warned);
        }
        if failed > 0 {
            println!("{} records could not be formatted", failed);
        }
    }
}
