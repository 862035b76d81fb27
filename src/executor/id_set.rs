//! Identifier-set algebra
//!
//! Pure set operations used to combine per-schema result-identifier sets
//! according to join type. No side effects.

use std::collections::BTreeSet;

use crate::query::JoinType;

/// Intersect/union operations over identifier sets.
pub struct IdSetAlgebra;

impl IdSetAlgebra {
    /// Identifiers present in both sets.
    pub fn intersect(a: &BTreeSet<String>, b: &BTreeSet<String>) -> BTreeSet<String> {
        a.intersection(b).cloned().collect()
    }

    /// Identifiers present in either set.
    pub fn union(a: &BTreeSet<String>, b: &BTreeSet<String>) -> BTreeSet<String> {
        a.union(b).cloned().collect()
    }

    /// Applies one join's policy to the running identifier set.
    ///
    /// Joins chain sequentially rather than composing true multi-way
    /// relational semantics: a RIGHT join replaces the running set entirely,
    /// discarding every constraint accumulated so far, and a FULL join
    /// unions into it. Callers mixing RIGHT/FULL with other join types in
    /// one query should expect exactly this sequential behavior.
    pub fn combine(
        running: &BTreeSet<String>,
        join_ids: &BTreeSet<String>,
        join_type: JoinType,
    ) -> BTreeSet<String> {
        match join_type {
            JoinType::Inner => Self::intersect(running, join_ids),
            JoinType::Left => running.clone(),
            JoinType::Right => join_ids.clone(),
            JoinType::Full => Self::union(running, join_ids),
        }
    }
}
