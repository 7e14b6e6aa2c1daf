//! Required group sets.

use std::collections::BTreeSet;

static NO_GROUPS: RequiredGroups = RequiredGroups(BTreeSet::new());

/// Group names an identity must belong to, fixed at startup.
///
/// An empty set places no restriction. Whether membership in one group or
/// in all of them is needed is decided by each backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredGroups(BTreeSet<String>);

impl RequiredGroups {
    /// The empty set.
    pub fn none() -> &'static RequiredGroups {
        &NO_GROUPS
    }

    /// Parses a comma separated list, ignoring blanks.
    pub fn parse(list: &str) -> Self {
        list.split(',').collect()
    }

    /// Returns true if no group is required.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of required groups.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates the group names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns true if no group is required or `groups` contains at least
    /// one of the required ones.
    pub fn matches_any<I, S>(&self, groups: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.is_empty() || groups.into_iter().any(|g| self.0.contains(g.as_ref()))
    }
}

impl<S: AsRef<str>> FromIterator<S> for RequiredGroups {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|g| g.as_ref().trim().to_string())
                .filter(|g| !g.is_empty())
                .collect(),
        )
    }
}
