//! Export command - generates NIS maps from a snapshot.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::export::{Exporter, MapOutput};
use crate::report::{ExportReport, MapSummary, WriteStatus};
use crate::source::Snapshot;
use crate::writer::{MapWriter, PreparedMap};

/// What to export and where to.
#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    pub snapshot: PathBuf,
    pub user_spread: Option<String>,
    pub group_spread: Option<String>,
    /// Group spread of host netgroups, if different from `group_spread`
    pub host_group_spread: Option<String>,
    pub passwd: Option<PathBuf>,
    pub shadow: Option<PathBuf>,
    pub group: Option<PathBuf>,
    pub netgroup: Option<PathBuf>,
    pub mnetgroup: Option<PathBuf>,
    pub zone: Option<String>,
    pub auth_method: Option<String>,
    pub eof: bool,
    pub force: bool,
}

impl ExportRequest {
    /// Check that every requested map has the spreads it needs.
    pub fn validate(&self) -> Result<()> {
        let maps = [
            &self.passwd,
            &self.shadow,
            &self.group,
            &self.netgroup,
            &self.mnetgroup,
        ];
        if maps.iter().all(|m| m.is_none()) {
            anyhow::bail!(
                "Nothing to export. \
                 Give at least one of --passwd, --group, --netgroup, --mnetgroup."
            );
        }
        if self.passwd.is_some() && self.user_spread.is_none() {
            anyhow::bail!("--passwd requires --user-spread");
        }
        if self.shadow.is_some() && self.passwd.is_none() {
            anyhow::bail!("--shadow requires --passwd");
        }
        let both = self.user_spread.is_some() && self.group_spread.is_some();
        if self.group.is_some() && !both {
            anyhow::bail!("--group requires --user-spread and --group-spread");
        }
        if self.netgroup.is_some() && !both {
            anyhow::bail!("--netgroup requires --user-spread and --group-spread");
        }
        if self.mnetgroup.is_some() && self.host_spread().is_none() {
            anyhow::bail!("--mnetgroup requires --group-spread or --host-group-spread");
        }
        Ok(())
    }

    fn host_spread(&self) -> Option<&str> {
        self.host_group_spread
            .as_deref()
            .or(self.group_spread.as_deref())
    }
}

/// Whether maps are written or only generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Write,
    Check,
}

/// Execute the export (or check) command.
///
/// Every requested map is generated and staged before any of them replaces
/// its destination. A failure in one map leaves all of them untouched.
pub fn cmd_export(request: &ExportRequest, config: &Config, mode: Mode) -> Result<ExportReport> {
    request.validate()?;

    let snapshot = Snapshot::from_file(&request.snapshot)
        .with_context(|| format!("Failed to load snapshot {}", request.snapshot.display()))?;
    println!(
        "Loaded snapshot: {} groups, {} accounts, {} hosts",
        snapshot.group_count(),
        snapshot.account_count(),
        snapshot.dns_owner_count()
    );

    let mut exporter = Exporter::new(&snapshot, config);
    let mut pending = Vec::new();

    if let (Some(path), Some(spread)) = (&request.passwd, &request.user_spread) {
        let maps = exporter.passwd(
            spread,
            request.auth_method.as_deref(),
            request.shadow.is_some(),
        );
        pending.push(stage(maps.passwd, path, config.passwd_max_change, request, mode)?);
        if let (Some(path), Some(shadow)) = (&request.shadow, maps.shadow) {
            pending.push(stage(shadow, path, config.passwd_max_change, request, mode)?);
        }
    }

    if let (Some(path), Some(groups), Some(users)) =
        (&request.group, &request.group_spread, &request.user_spread)
    {
        let map = exporter.file_groups(groups, users)?;
        pending.push(stage(map, path, config.group_max_change, request, mode)?);
    }

    if let (Some(path), Some(groups), Some(users)) =
        (&request.netgroup, &request.group_spread, &request.user_spread)
    {
        let map = exporter.user_netgroups(groups, users)?;
        pending.push(stage(map, path, config.group_max_change, request, mode)?);
    }

    if let (Some(path), Some(groups)) = (&request.mnetgroup, request.host_spread()) {
        let map = exporter.host_netgroups(groups, None, request.zone.as_deref())?;
        pending.push(stage(map, path, config.group_max_change, request, mode)?);
    }

    let summaries = pending
        .into_iter()
        .map(StagedMap::commit)
        .collect::<Result<Vec<_>>>()?;

    let mut report = exporter.into_report();
    report.maps = summaries;
    report.print();
    Ok(report)
}

/// A generated map, staged on disk in write mode.
struct StagedMap {
    summary: MapSummary,
    prepared: Option<PreparedMap>,
}

impl StagedMap {
    fn commit(self) -> Result<MapSummary> {
        let mut summary = self.summary;
        if let Some(prepared) = self.prepared {
            summary.status = prepared
                .commit()
                .with_context(|| format!("Failed to write {} map", summary.map))?;
        }
        Ok(summary)
    }
}

fn stage(
    output: MapOutput,
    path: &Path,
    max_change: f64,
    request: &ExportRequest,
    mode: Mode,
) -> Result<StagedMap> {
    let prepared = match mode {
        Mode::Check => None,
        Mode::Write => {
            let limit = (!request.force).then_some(max_change);
            let mut writer = MapWriter::new(path, limit);
            if output.map == "shadow" {
                writer = writer.mode(0o600);
            }
            writer.write_lines(&output.lines);
            let prepared = writer
                .prepare(request.eof)
                .with_context(|| format!("Failed to write {} map", output.map))?;
            Some(prepared)
        }
    };
    let status = prepared
        .as_ref()
        .map_or(WriteStatus::NotWritten, |p| p.status().clone());
    Ok(StagedMap {
        summary: MapSummary {
            map: output.map,
            path: Some(path.to_path_buf()),
            records: output.records,
            lines: output.lines.len(),
            status,
        },
        prepared,
    })
}
