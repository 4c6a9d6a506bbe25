use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Members seen in the group on the last successful poll.
///
/// Starts unseeded: the first observation only records who is already there.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRoster {
    seeded: bool,
    members: BTreeSet<String>,
}

impl MemberRoster {
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, member_id: &str) -> bool {
        self.members.contains(member_id)
    }

    /// Members in `current` that the roster has not seen, without changing it.
    pub fn newcomers(&self, current: &BTreeSet<String>) -> Vec<String> {
        if !self.seeded {
            return Vec::new();
        }
        current.difference(&self.members).cloned().collect()
    }

    /// Replaces the roster with `current` and returns who joined since the last call.
    /// Members who left are dropped, so a rejoin is welcomed again.
    pub fn observe(&mut self, current: BTreeSet<String>) -> Vec<String> {
        let joined = self.newcomers(&current);
        self.members = current;
        self.seeded = true;
        joined
    }
}
