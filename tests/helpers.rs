//! Shared test utilities for nismap tests.
#![allow(dead_code)]

use nismap::source::Snapshot;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const USER_SPREAD: &str = "NIS_user@uio";
pub const GROUP_SPREAD: &str = "NIS_fg@uio";
pub const NETGROUP_SPREAD: &str = "NIS_ng@uio";
pub const HOST_SPREAD: &str = "NIS_mng@uio";

/// Test environment with a temporary directory for snapshots and maps.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Base directory
    pub base_dir: PathBuf,
    /// Directory maps are written to
    pub maps: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base_dir = temp_dir.path().to_path_buf();
        let maps = base_dir.join("maps");
        fs::create_dir_all(&maps).expect("Failed to create maps dir");
        Self {
            _temp_dir: temp_dir,
            base_dir,
            maps,
        }
    }

    /// Write `snapshot` as JSON and return its path.
    pub fn write_snapshot(&self, snapshot: &SnapshotBuilder) -> PathBuf {
        let path = self.base_dir.join("snapshot.json");
        fs::write(&path, snapshot.to_json()).expect("Failed to write snapshot");
        path
    }

    pub fn map(&self, name: &str) -> PathBuf {
        self.maps.join(name)
    }
}

/// Builds snapshot JSON one entity at a time.
///
/// The name cache is built at 2024-03-01 12:00 and the run is evaluated
/// an hour later.
pub struct SnapshotBuilder {
    groups: Vec<Value>,
    memberships: Vec<Value>,
    accounts: Vec<Value>,
    dns_owners: Vec<Value>,
    quarantines: Vec<Value>,
    changelog: Vec<Value>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self {
            groups: Vec::new(),
            memberships: Vec::new(),
            accounts: Vec::new(),
            dns_owners: Vec::new(),
            quarantines: Vec::new(),
            changelog: Vec::new(),
        }
    }

    pub fn group(mut self, id: u64, name: &str, gid: Option<u32>, spreads: &[&str]) -> Self {
        self.groups
            .push(json!({"id": id, "name": name, "gid": gid, "spreads": spreads}));
        self
    }

    pub fn account(mut self, id: u64, name: &str, gid: u32) -> Self {
        self.accounts.push(json!({
            "id": id,
            "name": name,
            "posix_uid": 10000 + id,
            "posix_gid": gid,
            "shell": "/bin/bash",
            "home": format!("/home/{}", name),
            "auth": {"MD5-crypt": format!("$1${}$hash", name)},
            "spreads": [USER_SPREAD],
        }));
        self
    }

    /// Account with every field spelled out.
    pub fn account_json(mut self, account: Value) -> Self {
        self.accounts.push(account);
        self
    }

    pub fn host(mut self, id: u64, fqdn: &str) -> Self {
        self.dns_owners
            .push(json!({"id": id, "name": fqdn, "spreads": [HOST_SPREAD]}));
        self
    }

    pub fn member(mut self, group_id: u64, member_id: u64, member_type: &str) -> Self {
        self.memberships.push(json!({
            "group_id": group_id,
            "member_id": member_id,
            "member_type": member_type,
        }));
        self
    }

    pub fn member_with_op(
        mut self,
        group_id: u64,
        member_id: u64,
        member_type: &str,
        op: &str,
    ) -> Self {
        self.memberships.push(json!({
            "group_id": group_id,
            "member_id": member_id,
            "member_type": member_type,
            "operation": op,
        }));
        self
    }

    pub fn quarantine(mut self, entity_id: u64, kind: &str, effect: Value) -> Self {
        self.quarantines.push(json!({
            "entity_id": entity_id,
            "kind": kind,
            "start": "2024-01-01T00:00:00Z",
            "effect": effect,
        }));
        self
    }

    pub fn created(mut self, entity_id: u64, at: &str) -> Self {
        self.changelog.push(json!({"entity_id": entity_id, "at": at}));
        self
    }

    pub fn to_json(&self) -> String {
        json!({
            "names_cached_at": "2024-03-01T12:00:00Z",
            "as_of": "2024-03-01T13:00:00Z",
            "groups": self.groups,
            "memberships": self.memberships,
            "accounts": self.accounts,
            "dns_owners": self.dns_owners,
            "quarantines": self.quarantines,
            "changelog": self.changelog,
        })
        .to_string()
    }

    pub fn build(&self) -> Snapshot {
        Snapshot::from_json(&self.to_json()).expect("Failed to index snapshot")
    }
}

/// Read a map file as lines, without the trailing newline.
pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e))
        .lines()
        .map(String::from)
        .collect()
}

/// Every member of a posix group map line.
pub fn group_members(line: &str) -> Vec<String> {
    let members = line.trim_end().splitn(4, ':').nth(3).unwrap_or("");
    members
        .split(',')
        .filter(|m| !m.is_empty())
        .map(String::from)
        .collect()
}

/// Key of a map line.
pub fn line_key(line: &str) -> &str {
    line.split([':', ' ']).next().unwrap_or("")
}
