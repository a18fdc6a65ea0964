//! Group expansion.
//!
//! Flattens a group of the membership graph into the names that go into
//! one map record. What counts as a member depends on the map:
//!
//! - posix groups list accounts only, collected through nested groups that
//!   are not themselves exported, minus accounts whose primary group this is;
//! - netgroups list their own leaves and refer to exported subgroups by
//!   name instead of inlining them.
//!
//! The graph is not guaranteed to be acyclic. Traversal is an explicit DFS
//! that tracks the current path; an edge back onto the path is reported as
//! a cycle and not followed.

use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

use crate::error::ExpandError;
use crate::model::{EntityId, GroupKind, MemberOp, MemberType, MembershipEdge};
use crate::source::{AccountSource, GroupGraphSource, NameResolver};

/// Something noteworthy that happened while expanding a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpandIssue {
    /// Member has no name yet, but was created after the name cache.
    RecentlyCreated { member_id: EntityId },
    /// Member has no name and is not new: the name cache is stale.
    StaleName { member_id: EntityId },
    /// `from -> to` closes a cycle in the membership graph.
    Cycle { from: EntityId, to: EntityId },
    /// Membership with an operation other than union.
    UnsupportedOperation { group_id: EntityId, member_id: EntityId, operation: MemberOp },
}

/// Flattened group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    /// Exported groups referred to by name (netgroups only).
    pub group_refs: BTreeSet<String>,
    /// Leaf member names.
    pub members: BTreeSet<String>,
    pub issues: Vec<ExpandIssue>,
}

struct Frame {
    group: EntityId,
    subgroups: Vec<EntityId>,
    next: usize,
}

/// Expands groups of one map flavour against a fixed source.
pub struct GroupExpander<'a, S> {
    source: &'a S,
    kind: GroupKind,
    member_spread: Option<String>,
    exported: HashMap<EntityId, String>,
    flatten_exported: bool,
}

impl<'a, S> GroupExpander<'a, S>
where
    S: GroupGraphSource + NameResolver + AccountSource,
{
    /// `group_spread` selects the exported top-level groups; `member_spread`
    /// filters leaf members.
    pub fn new(
        source: &'a S,
        kind: GroupKind,
        group_spread: &str,
        member_spread: Option<&str>,
    ) -> Self {
        let exported = source
            .groups_with_spread(group_spread)
            .into_iter()
            .map(|g| (g.id, g.name.clone()))
            .collect();
        Self {
            source,
            kind,
            member_spread: member_spread.map(str::to_string),
            exported,
            flatten_exported: false,
        }
    }

    /// Let posix groups also collect accounts of exported subgroups.
    pub fn flatten_exported(mut self, flatten: bool) -> Self {
        self.flatten_exported = flatten;
        self
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    pub fn is_exported(&self, id: EntityId) -> bool {
        self.exported.contains_key(&id)
    }

    /// Flatten `group_id` into group references and leaf names.
    pub fn expand(&self, group_id: EntityId) -> Result<Expansion, ExpandError> {
        let root = self
            .source
            .group(group_id)
            .ok_or(ExpandError::UnknownGroup(group_id))?;

        let primary_gid = match self.kind {
            GroupKind::FileGroup => Some(root.gid.ok_or_else(|| ExpandError::MissingGid {
                id: root.id,
                name: root.name.clone(),
            })?),
            _ => None,
        };

        let mut out = Expansion::default();
        let mut expanded = HashSet::from([root.id]);
        let mut on_path = HashSet::from([root.id]);
        let mut path = vec![self.visit(root.id, primary_gid, &mut out)];

        loop {
            let Some(frame) = path.last_mut() else {
                break;
            };
            let next = frame.subgroups.get(frame.next).copied();
            frame.next += 1;
            let parent = frame.group;

            let Some(child) = next else {
                on_path.remove(&parent);
                path.pop();
                continue;
            };

            if on_path.contains(&child) {
                warn!(from = parent, to = child, "membership cycle, not following edge");
                out.issues.push(ExpandIssue::Cycle { from: parent, to: child });
                continue;
            }
            if !expanded.insert(child) {
                continue;
            }

            if let Some(name) = self.exported.get(&child) {
                match self.kind {
                    GroupKind::UserNetGroup | GroupKind::MachineNetGroup => {
                        out.group_refs.insert(name.clone());
                        continue;
                    }
                    GroupKind::FileGroup if !self.flatten_exported => continue,
                    GroupKind::FileGroup => {}
                }
            }

            let frame = self.visit(child, primary_gid, &mut out);
            on_path.insert(child);
            path.push(frame);
        }

        Ok(out)
    }

    /// Collect the direct leaves of `group_id` and list its subgroups.
    fn visit(&self, group_id: EntityId, primary_gid: Option<u32>, out: &mut Expansion) -> Frame {
        let leaf_type = self.kind.leaf_type();
        let leaves = self
            .source
            .direct_members(group_id, leaf_type, self.member_spread.as_deref());

        for edge in leaves {
            if !self.is_union(edge, out) {
                continue;
            }
            if let Some(gid) = primary_gid {
                let primary = self.source.account(edge.member_id).map(|a| a.posix_gid);
                if primary == Some(gid) {
                    continue;
                }
            }
            match self.source.name_of(leaf_type, edge.member_id) {
                Some(name) => {
                    out.members.insert(name.to_string());
                }
                None if self.source.is_recently_created(edge.member_id) => {
                    debug!(
                        member = edge.member_id,
                        group = group_id,
                        "member created after name cache"
                    );
                    out.issues.push(ExpandIssue::RecentlyCreated { member_id: edge.member_id });
                }
                None => {
                    warn!(
                        "Was {} very recently created? (member of group {})",
                        edge.member_id, group_id
                    );
                    out.issues.push(ExpandIssue::StaleName { member_id: edge.member_id });
                }
            }
        }

        let subgroups = self
            .source
            .direct_members(group_id, MemberType::Group, None)
            .into_iter()
            .filter(|edge| self.is_union(edge, out))
            .map(|edge| edge.member_id)
            .collect();

        Frame {
            group: group_id,
            subgroups,
            next: 0,
        }
    }

    fn is_union(&self, edge: &MembershipEdge, out: &mut Expansion) -> bool {
        if edge.operation == MemberOp::Union {
            return true;
        }
        warn!(
            group = edge.group_id,
            member = edge.member_id,
            "ignoring {:?} membership",
            edge.operation
        );
        out.issues.push(ExpandIssue::UnsupportedOperation {
            group_id: edge.group_id,
            member_id: edge.member_id,
            operation: edge.operation,
        });
        false
    }
}
