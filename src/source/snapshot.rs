//! JSON run snapshot.
//!
//! A snapshot is the frozen state of the identity database for one export
//! run: groups, memberships, accounts, hosts, quarantines and the creation
//! changelog. It is loaded and indexed once, then only read.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

use super::{AccountSource, EligibilityPolicy, GroupGraphSource, NameResolver};
use crate::error::SnapshotError;
use crate::model::{
    Account, CreateEvent, DnsOwner, EntityId, Group, MemberType, MembershipEdge, Quarantine,
};

/// On-disk layout of a snapshot.
#[derive(Debug, Deserialize)]
struct SnapshotFile {
    /// When the entity name cache was built.
    names_cached_at: DateTime<Utc>,
    /// Instant quarantines and expiry are evaluated at. Defaults to load time.
    #[serde(default)]
    as_of: Option<DateTime<Utc>>,
    #[serde(default)]
    groups: Vec<Group>,
    #[serde(default)]
    memberships: Vec<MembershipEdge>,
    #[serde(default)]
    accounts: Vec<Account>,
    #[serde(default)]
    dns_owners: Vec<DnsOwner>,
    #[serde(default)]
    quarantines: Vec<Quarantine>,
    #[serde(default)]
    changelog: Vec<CreateEvent>,
}

/// Indexed, immutable view of one snapshot file.
#[derive(Debug)]
pub struct Snapshot {
    names_cached_at: DateTime<Utc>,
    now: DateTime<Utc>,
    groups: BTreeMap<EntityId, Group>,
    edges: HashMap<EntityId, Vec<MembershipEdge>>,
    accounts: BTreeMap<EntityId, Account>,
    dns_owners: BTreeMap<EntityId, DnsOwner>,
    quarantines: HashMap<EntityId, Vec<Quarantine>>,
    created: HashMap<EntityId, Vec<DateTime<Utc>>>,
}

impl Snapshot {
    /// Load and index a snapshot file.
    pub fn from_file(path: &Path) -> Result<Self, SnapshotError> {
        let content = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, SnapshotError> {
        let file: SnapshotFile = serde_json::from_str(content)?;
        Self::index(file)
    }

    fn index(file: SnapshotFile) -> Result<Self, SnapshotError> {
        let mut seen = HashSet::new();
        let ids = file
            .groups
            .iter()
            .map(|g| g.id)
            .chain(file.accounts.iter().map(|a| a.id))
            .chain(file.dns_owners.iter().map(|d| d.id));
        for id in ids {
            if !seen.insert(id) {
                return Err(SnapshotError::DuplicateId(id));
            }
        }

        let groups: BTreeMap<_, _> = file.groups.into_iter().map(|g| (g.id, g)).collect();

        let mut edges: HashMap<EntityId, Vec<MembershipEdge>> = HashMap::new();
        for edge in file.memberships {
            let dangling = !groups.contains_key(&edge.group_id)
                || (edge.member_type == MemberType::Group && !groups.contains_key(&edge.member_id));
            if dangling {
                return Err(SnapshotError::UnknownGroup {
                    group_id: if groups.contains_key(&edge.group_id) {
                        edge.member_id
                    } else {
                        edge.group_id
                    },
                    member_id: edge.member_id,
                });
            }
            edges.entry(edge.group_id).or_default().push(edge);
        }

        let mut quarantines: HashMap<EntityId, Vec<Quarantine>> = HashMap::new();
        for q in file.quarantines {
            quarantines.entry(q.entity_id).or_default().push(q);
        }

        let mut created: HashMap<EntityId, Vec<DateTime<Utc>>> = HashMap::new();
        for event in file.changelog {
            created.entry(event.entity_id).or_default().push(event.at);
        }

        Ok(Self {
            names_cached_at: file.names_cached_at,
            now: file.as_of.unwrap_or_else(Utc::now),
            groups,
            edges,
            accounts: file.accounts.into_iter().map(|a| (a.id, a)).collect(),
            dns_owners: file.dns_owners.into_iter().map(|d| (d.id, d)).collect(),
            quarantines,
            created,
        })
    }

    /// Evaluate quarantines and expiry at `now` instead of the snapshot's instant.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn dns_owner_count(&self) -> usize {
        self.dns_owners.len()
    }

    /// Whether a member passes the spread filter.
    ///
    /// Ids the snapshot knows nothing about pass; name resolution decides
    /// their fate.
    fn member_has_spread(&self, member_type: MemberType, id: EntityId, spread: &str) -> bool {
        match member_type {
            MemberType::Account => match self.accounts.get(&id) {
                Some(a) => !a.is_expired(self.today()) && a.spreads.iter().any(|s| s == spread),
                None => true,
            },
            MemberType::DnsOwner => match self.dns_owners.get(&id) {
                Some(d) => d.spreads.iter().any(|s| s == spread),
                None => true,
            },
            MemberType::Group => true,
        }
    }
}

impl GroupGraphSource for Snapshot {
    fn group(&self, id: EntityId) -> Option<&Group> {
        self.groups.get(&id)
    }

    fn groups_with_spread(&self, spread: &str) -> Vec<&Group> {
        self.groups.values().filter(|g| g.has_spread(spread)).collect()
    }

    fn group_names(&self) -> Vec<&str> {
        self.groups.values().map(|g| g.name.as_str()).collect()
    }

    fn direct_members(
        &self,
        group_id: EntityId,
        member_type: MemberType,
        member_spread: Option<&str>,
    ) -> Vec<&MembershipEdge> {
        let Some(edges) = self.edges.get(&group_id) else {
            return Vec::new();
        };
        edges
            .iter()
            .filter(|e| e.member_type == member_type)
            .filter(|e| match member_spread {
                Some(spread) => self.member_has_spread(member_type, e.member_id, spread),
                None => true,
            })
            .collect()
    }
}

impl NameResolver for Snapshot {
    fn name_of(&self, member_type: MemberType, id: EntityId) -> Option<&str> {
        let name = match member_type {
            MemberType::Account => self.accounts.get(&id).map(|a| a.name.as_str()),
            MemberType::DnsOwner => self.dns_owners.get(&id).map(|d| d.name.as_str()),
            MemberType::Group => self.groups.get(&id).map(|g| g.name.as_str()),
        };
        name.filter(|n| !n.is_empty())
    }

    fn is_recently_created(&self, id: EntityId) -> bool {
        self.created
            .get(&id)
            .is_some_and(|events| events.iter().any(|at| *at >= self.names_cached_at))
    }
}

impl AccountSource for Snapshot {
    fn account(&self, id: EntityId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    fn posix_accounts(&self, spread: &str) -> Vec<&Account> {
        let today = self.today();
        self.accounts
            .values()
            .filter(|a| !a.is_expired(today) && a.spreads.iter().any(|s| s == spread))
            .collect()
    }
}

impl EligibilityPolicy for Snapshot {
    fn active_quarantines(&self, id: EntityId) -> Vec<&Quarantine> {
        self.quarantines
            .get(&id)
            .map(|qs| qs.iter().filter(|q| q.is_active(self.now)).collect())
            .unwrap_or_default()
    }
}
