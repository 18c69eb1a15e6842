//! Persisted sibling order and the two-partition ranking policy.
//!
//! A container owns one [`OrderMap`] (document ID → rank). Ranks are only
//! meaningful among siblings under the same parent; the reorganizer rewrites
//! the ranks of one sibling group at a time and leaves every other key alone.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Rank assumed for documents that have never been written to the map.
pub const DEFAULT_RANK: i64 = 0;

/// Per-container mapping from document ID to sibling rank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderMap(BTreeMap<String, i64>);

impl OrderMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored rank, or [`DEFAULT_RANK`] when the ID has none.
    #[must_use]
    pub fn rank(&self, id: &str) -> i64 {
        self.0.get(id).copied().unwrap_or(DEFAULT_RANK)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<i64> {
        self.0.get(id).copied()
    }

    pub fn set(&mut self, id: impl Into<String>, rank: i64) {
        self.0.insert(id.into(), rank);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &i64)> {
        self.0.iter()
    }
}

impl<S: Into<String>> FromIterator<(S, i64)> for OrderMap {
    fn from_iter<I: IntoIterator<Item = (S, i64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Where the caller's affected list came from.
///
/// Both policies append affected documents in exactly the order supplied;
/// the policy is carried through to the operation log and the outcome so
/// the host can tell a bound-list sort from a reference-scan sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AffectedOrder {
    /// The natural order of a reference scan or outline traversal.
    Insertion,
    /// An externally bound list whose row order is significant.
    PreserveCandidateOrder,
}

/// The computed placement of one sibling group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderPlan {
    /// Existing children not touched by the call, in prior-rank order.
    pub unaffected: Vec<String>,
    /// Children being repositioned, in caller order.
    pub affected: Vec<String>,
}

impl OrderPlan {
    /// Splits `children` into the two partitions.
    ///
    /// `children` is the current direct-child set in store iteration order.
    /// Affected IDs that are not among the children are dropped; duplicates
    /// keep their first occurrence. Unaffected children are stably sorted by
    /// their prior rank, so equal ranks keep the store's order.
    #[must_use]
    pub fn compute(children: &[String], affected: &[String], prior: &OrderMap) -> Self {
        let child_set: HashSet<&str> = children.iter().map(String::as_str).collect();

        let mut seen = HashSet::new();
        let affected: Vec<String> = affected
            .iter()
            .filter(|id| child_set.contains(id.as_str()))
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        let mut unaffected: Vec<String> = children
            .iter()
            .filter(|id| !seen.contains(id.as_str()))
            .cloned()
            .collect();
        unaffected.sort_by_key(|id| prior.rank(id));

        Self {
            unaffected,
            affected,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.affected.is_empty()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.unaffected.len() + self.affected.len()
    }

    /// Writes ranks `1..=total` into `map`: unaffected first, affected after.
    pub fn apply(&self, map: &mut OrderMap) {
        for (rank, id) in (1_i64..).zip(self.unaffected.iter().chain(self.affected.iter())) {
            map.set(id.clone(), rank);
        }
    }
}
