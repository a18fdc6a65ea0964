//! Entities exported to NIS maps.
//!
//! These mirror the rows the identity database hands out: groups,
//! membership edges, posix accounts, DNS owners and quarantines. All of
//! them deserialize from the JSON snapshot read at the start of a run.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Numeric entity id as used by the identity database.
pub type EntityId = u64;

/// Flavour of the map a group is exported to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    /// Posix group map (`name:*:gid:members`).
    FileGroup,
    /// Netgroup of user accounts (`(,user,)` triples).
    UserNetGroup,
    /// Netgroup of hosts (`(host,-,)` triples).
    MachineNetGroup,
}

impl GroupKind {
    /// Member type collected as leaves when expanding a group of this kind.
    pub fn leaf_type(self) -> MemberType {
        match self {
            GroupKind::FileGroup | GroupKind::UserNetGroup => MemberType::Account,
            GroupKind::MachineNetGroup => MemberType::DnsOwner,
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GroupKind::FileGroup => "group",
            GroupKind::UserNetGroup => "netgroup",
            GroupKind::MachineNetGroup => "netgroup.host",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberType {
    Account,
    Group,
    DnsOwner,
}

/// Set operation a membership contributes with.
///
/// Only `Union` is honoured by the exporter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberOp {
    #[default]
    Union,
    Intersection,
    Difference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: EntityId,
    pub name: String,
    /// Posix gid, only set for posix groups.
    #[serde(default)]
    pub gid: Option<u32>,
    #[serde(default)]
    pub spreads: Vec<String>,
}

impl Group {
    pub fn has_spread(&self, spread: &str) -> bool {
        self.spreads.iter().any(|s| s == spread)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipEdge {
    pub group_id: EntityId,
    pub member_id: EntityId,
    pub member_type: MemberType,
    #[serde(default)]
    pub operation: MemberOp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: EntityId,
    pub name: String,
    pub posix_uid: u32,
    pub posix_gid: u32,
    #[serde(default)]
    pub gecos: Option<String>,
    /// Full name of the owning person, used when gecos is unset.
    #[serde(default)]
    pub owner_name: Option<String>,
    pub shell: String,
    #[serde(default)]
    pub home: Option<String>,
    /// Password hashes keyed by authentication method.
    #[serde(default)]
    pub auth: BTreeMap<String, String>,
    #[serde(default)]
    pub spreads: Vec<String>,
    #[serde(default)]
    pub expire_date: Option<NaiveDate>,
}

impl Account {
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expire_date.is_some_and(|d| d <= today)
    }
}

/// A DNS owner (host) that can be a member of machine netgroups.
///
/// Names are fully qualified with a trailing dot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsOwner {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub spreads: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuarantineEffect {
    SkipEntirely,
    LockPassword,
    OverrideShell(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quarantine {
    pub entity_id: EntityId,
    pub kind: String,
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    pub effect: QuarantineEffect,
}

impl Quarantine {
    pub fn is_active(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && self.end.map_or(true, |end| at < end)
    }
}

/// Changelog entry recording when an entity was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEvent {
    pub entity_id: EntityId,
    pub at: DateTime<Utc>,
}
