//! Single-participant membership edits applied by the store.

use crate::entities::StaticId;

/// One change to a room's member or admin set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipChange {
    Add(StaticId),
    Remove(StaticId),
    Promote(StaticId),
    Demote(StaticId),
}

impl MembershipChange {
    pub fn target(&self) -> &StaticId {
        match self {
            MembershipChange::Add(id)
            | MembershipChange::Remove(id)
            | MembershipChange::Promote(id)
            | MembershipChange::Demote(id) => id,
        }
    }
}
