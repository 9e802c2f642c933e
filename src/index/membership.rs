//! Set of currently valid canonical identities.

use crate::identity::canonicalize;
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct MembershipSet {
    members: HashSet<String>,
}

impl MembershipSet {
    /// Load from a line-oriented list. Blank lines are ignored.
    pub fn load<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let members = lines
            .into_iter()
            .map(|line| canonicalize(line.as_ref()))
            .filter(|line| !line.is_empty())
            .collect();

        Self { members }
    }

    pub fn contains(&self, label: &str) -> bool {
        self.members.contains(&canonicalize(label))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
