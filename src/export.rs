//! Map generation driver.
//!
//! Turns one snapshot into the lines of each requested map. Records that
//! cannot be exported are skipped and counted in the run's `ExportReport`;
//! only a broken source aborts a map.

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::ExpandError;
use crate::expand::{Expansion, GroupExpander};
use crate::format::{host_netgroup_values, split_record, user_netgroup_values, RecordLayout};
use crate::model::GroupKind;
use crate::names::{TmpNameFactory, TmpNameScheme};
use crate::passwd::{AccountRecordBuilder, PasswdOptions};
use crate::report::{ExportReport, SkipCategory};
use crate::source::{AccountSource, EligibilityPolicy, GroupGraphSource, NameResolver};
use crate::timing::Timer;
use crate::validate::illegal_name;

/// Lines of one generated map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapOutput {
    pub map: String,
    /// Logical records, before overflow splitting.
    pub records: usize,
    pub lines: Vec<String>,
}

impl MapOutput {
    fn new(map: impl Into<String>) -> Self {
        Self {
            map: map.into(),
            ..Self::default()
        }
    }
}

/// The passwd map and, when requested, its shadow companion.
#[derive(Debug, Clone)]
pub struct PasswdMaps {
    pub passwd: MapOutput,
    pub shadow: Option<MapOutput>,
}

pub struct Exporter<'a, S> {
    source: &'a S,
    config: &'a Config,
    report: ExportReport,
}

impl<'a, S> Exporter<'a, S>
where
    S: GroupGraphSource + NameResolver + AccountSource + EligibilityPolicy,
{
    pub fn new(source: &'a S, config: &'a Config) -> Self {
        Self {
            source,
            config,
            report: ExportReport::new(),
        }
    }

    pub fn report(&self) -> &ExportReport {
        &self.report
    }

    pub fn report_mut(&mut self) -> &mut ExportReport {
        &mut self.report
    }

    pub fn into_report(self) -> ExportReport {
        self.report
    }

    /// One passwd row (and shadow row) per eligible account, ordered by id.
    pub fn passwd(
        &mut self,
        user_spread: &str,
        auth_method: Option<&str>,
        shadow: bool,
    ) -> PasswdMaps {
        let timer = Timer::start("passwd");
        let builder = AccountRecordBuilder::new(
            self.source,
            PasswdOptions {
                auth_method: auth_method.map(str::to_string),
                shadow,
                max_username_len: self.config.max_username_len,
                max_line_length: self.config.max_line_length,
            },
        );

        let mut passwd = MapOutput::new("passwd");
        let mut shadow_map = shadow.then(|| MapOutput::new("shadow"));

        for account in self.source.posix_accounts(user_spread) {
            match builder.build(account) {
                Ok(record) => {
                    passwd.records += 1;
                    passwd.lines.push(record.passwd.to_line());
                    if let (Some(map), Some(row)) = (shadow_map.as_mut(), record.shadow) {
                        map.records += 1;
                        map.lines.push(row.to_line());
                    }
                }
                Err(skip) => {
                    if skip.is_silent() {
                        debug!("Skipping {}: {}", account.name, skip);
                    } else {
                        warn!("Skipping {}: {}", account.name, skip);
                    }
                    self.report.skip((&skip).into());
                }
            }
        }

        info!(records = passwd.records, "passwd generated");
        timer.finish();
        PasswdMaps {
            passwd,
            shadow: shadow_map,
        }
    }

    /// Posix group map: `name:*:gid:user,user,...`.
    pub fn file_groups(
        &mut self,
        group_spread: &str,
        user_spread: &str,
    ) -> Result<MapOutput, ExpandError> {
        let scheme = TmpNameScheme::Truncated {
            max_len: self.config.tmp_groupname_len,
        };
        self.group_map(GroupKind::FileGroup, group_spread, Some(user_spread), scheme, None)
    }

    /// User netgroup map: `name subgroup (,user,) ...`.
    pub fn user_netgroups(
        &mut self,
        group_spread: &str,
        user_spread: &str,
    ) -> Result<MapOutput, ExpandError> {
        let scheme = TmpNameScheme::Prefixed {
            prefix: self.config.netgroup_prefix.clone(),
        };
        self.group_map(GroupKind::UserNetGroup, group_spread, Some(user_spread), scheme, None)
    }

    /// Host netgroup map: `name subgroup (host,-,) ...`.
    ///
    /// Hosts whose name ends in `zone` are also listed by their short name.
    pub fn host_netgroups(
        &mut self,
        group_spread: &str,
        member_spread: Option<&str>,
        zone: Option<&str>,
    ) -> Result<MapOutput, ExpandError> {
        self.group_map(
            GroupKind::MachineNetGroup,
            group_spread,
            member_spread,
            TmpNameScheme::Suffixed,
            zone,
        )
    }

    fn group_map(
        &mut self,
        kind: GroupKind,
        group_spread: &str,
        member_spread: Option<&str>,
        scheme: TmpNameScheme,
        zone: Option<&str>,
    ) -> Result<MapOutput, ExpandError> {
        let timer = Timer::start(&kind.to_string());
        let source = self.source;
        let max_line_length = self.config.max_line_length;

        let expander = GroupExpander::new(source, kind, group_spread, member_spread)
            .flatten_exported(self.config.filegroup_flatten_all);
        let mut names = TmpNameFactory::new(scheme, source.group_names());
        let mut out = MapOutput::new(kind.to_string());

        for group in source.groups_with_spread(group_spread) {
            let layout = match (kind, group.gid) {
                (GroupKind::FileGroup, _)
                    if illegal_name(&group.name, self.config.max_groupname_len).is_some() =>
                {
                    warn!("Bad groupname {}", group.name);
                    self.report.skip(SkipCategory::BadGroupName);
                    continue;
                }
                (GroupKind::FileGroup, Some(gid)) => RecordLayout::group(gid),
                (GroupKind::FileGroup, None) => {
                    warn!("Group {} has no GID", group.id);
                    self.report.skip(SkipCategory::MissingGid);
                    continue;
                }
                _ => RecordLayout::netgroup(),
            };

            let expansion = match expander.expand(group.id) {
                Ok(expansion) => expansion,
                Err(ExpandError::MissingGid { id, .. }) => {
                    warn!("Group {} has no GID", id);
                    self.report.skip(SkipCategory::MissingGid);
                    continue;
                }
                Err(e) => return Err(e),
            };
            self.report.record_issues(&expansion.issues);

            let values = self.member_values(kind, &group.name, &expansion, zone);
            match split_record(&group.name, &values, &layout, max_line_length, &mut names) {
                Ok(lines) => {
                    debug!(group = %group.name, lines = lines.len(), "group formatted");
                    out.records += 1;
                    out.lines.extend(lines);
                }
                Err(e) => {
                    error!("Skipping {} {}: {}", kind, group.name, e);
                    self.report.skip(SkipCategory::Unformattable);
                }
            }
        }

        info!(records = out.records, continuations = names.minted(), "{} generated", kind);
        timer.finish();
        Ok(out)
    }

    fn member_values(
        &mut self,
        kind: GroupKind,
        group_name: &str,
        expansion: &Expansion,
        zone: Option<&str>,
    ) -> Vec<String> {
        match kind {
            GroupKind::FileGroup => self.legal_usernames(group_name, expansion),
            GroupKind::UserNetGroup => {
                let users = self.legal_usernames(group_name, expansion);
                user_netgroup_values(&expansion.group_refs, &users)
            }
            GroupKind::MachineNetGroup => {
                let hosts: Vec<&String> = expansion.members.iter().collect();
                host_netgroup_values(&expansion.group_refs, &hosts, zone)
            }
        }
    }

    fn legal_usernames(&mut self, group_name: &str, expansion: &Expansion) -> Vec<String> {
        let max_len = self.config.max_username_len;
        let mut users = Vec::with_capacity(expansion.members.len());
        for name in &expansion.members {
            if illegal_name(name, max_len).is_some() {
                warn!("Bad username {} in {}", name, group_name);
                self.report.skip(SkipCategory::BadUsername);
            } else {
                users.push(name.clone());
            }
        }
        users
    }
}
