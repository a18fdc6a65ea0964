//! Collaborators the exporter reads from.
//!
//! The engine never talks to a database. Everything it needs is behind the
//! traits below, and `Snapshot` implements all of them from a JSON dump
//! taken once per run. Implementations must be read-only for the duration
//! of a run: refreshing a cache mid-run breaks the exactly-once emission
//! of members.

mod snapshot;

pub use snapshot::Snapshot;

use crate::model::{
    Account, EntityId, Group, MembershipEdge, MemberType, Quarantine, QuarantineEffect,
};

/// Direct membership edges of the group graph.
pub trait GroupGraphSource {
    fn group(&self, id: EntityId) -> Option<&Group>;

    /// Groups carrying `spread`, ordered by id.
    fn groups_with_spread(&self, spread: &str) -> Vec<&Group>;

    /// Every group name known to the source, exported or not.
    fn group_names(&self) -> Vec<&str>;

    /// Direct members of `group_id` of the given type.
    ///
    /// With `member_spread` set, members known not to carry that spread are
    /// filtered out. Group members are never filtered by spread.
    fn direct_members(
        &self,
        group_id: EntityId,
        member_type: MemberType,
        member_spread: Option<&str>,
    ) -> Vec<&MembershipEdge>;
}

/// Maps entity ids to the names written into maps.
pub trait NameResolver {
    fn name_of(&self, member_type: MemberType, id: EntityId) -> Option<&str>;

    /// True if the entity was created after the name cache was built.
    fn is_recently_created(&self, id: EntityId) -> bool;
}

/// Posix accounts eligible for the passwd map.
pub trait AccountSource {
    fn account(&self, id: EntityId) -> Option<&Account>;

    /// Non-expired accounts carrying `spread`, ordered by id.
    fn posix_accounts(&self, spread: &str) -> Vec<&Account>;
}

/// Quarantine lookup for an entity.
pub trait EligibilityPolicy {
    /// Quarantines active at the run's evaluation instant.
    fn active_quarantines(&self, id: EntityId) -> Vec<&Quarantine>;

    /// Combined effect of every active quarantine on `id`.
    fn verdict(&self, id: EntityId) -> QuarantineVerdict {
        QuarantineVerdict::from_quarantines(self.active_quarantines(id))
    }
}

/// What active quarantines do to an account's passwd row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuarantineVerdict {
    pub skip: bool,
    pub locked: bool,
    pub shell: Option<String>,
}

impl QuarantineVerdict {
    /// Skip and lock win if any quarantine asks for them. The shell comes
    /// from the earliest-starting quarantine that overrides it.
    pub fn from_quarantines<'a>(quarantines: impl IntoIterator<Item = &'a Quarantine>) -> Self {
        let mut sorted: Vec<&Quarantine> = quarantines.into_iter().collect();
        sorted.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.kind.cmp(&b.kind)));

        let mut verdict = Self::default();
        for q in sorted {
            match &q.effect {
                QuarantineEffect::SkipEntirely => verdict.skip = true,
                QuarantineEffect::LockPassword => verdict.locked = true,
                QuarantineEffect::OverrideShell(shell) => {
                    if verdict.shell.is_none() {
                        verdict.shell = Some(shell.clone());
                    }
                }
            }
        }
        verdict
    }

    pub fn is_clear(&self) -> bool {
        *self == Self::default()
    }
}
