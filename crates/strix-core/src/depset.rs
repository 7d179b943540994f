//! Dependency sets for dependency-directed backtracking
//!
//! Every fact added to the completion graph carries the set of branching
//! levels whose non-deterministic choices justify it. A clash unions the
//! dependency sets of the contradicting facts; the backtracker jumps
//! straight to the deepest level in that union.

use serde::{Deserialize, Serialize};

/// Ordered set of branching levels
///
/// Kept as a sorted vector: dependency sets are tiny in practice and are
/// unioned far more often than they are searched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepSet {
    levels: Vec<usize>,
}

impl DepSet {
    /// The empty dependency set (fact holds unconditionally)
    pub fn empty() -> DepSet {
        DepSet { levels: Vec::new() }
    }

    /// Dependency set containing a single branching level
    pub fn single(level: usize) -> DepSet {
        DepSet { levels: vec![level] }
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Deepest branching level, or `None` for the empty set
    pub fn max(&self) -> Option<usize> {
        self.levels.last().copied()
    }

    pub fn contains(&self, level: usize) -> bool {
        self.levels.binary_search(&level).is_ok()
    }

    /// Add a single level in place
    pub fn add_level(&mut self, level: usize) {
        if let Err(pos) = self.levels.binary_search(&level) {
            self.levels.insert(pos, level);
        }
    }

    /// Union with another dependency set, in place
    pub fn union_with(&mut self, other: &DepSet) {
        for &level in &other.levels {
            self.add_level(level);
        }
    }

    /// Union of two dependency sets
    pub fn union(&self, other: &DepSet) -> DepSet {
        let mut out = self.clone();
        out.union_with(other);
        out
    }

    /// Remove a level, used when a branch point is resolved
    pub fn delete(&mut self, level: usize) {
        if let Ok(pos) = self.levels.binary_search(&level) {
            self.levels.remove(pos);
        }
    }

    /// Check whether every level of `self` occurs in `other`
    pub fn is_subset_of(&self, other: &DepSet) -> bool {
        self.levels.iter().all(|l| other.contains(*l))
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.levels.iter().copied()
    }
}

impl std::fmt::Display for DepSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, l) in self.levels.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", l)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_is_sorted_and_deduped() {
        let mut a = DepSet::single(3);
        a.add_level(1);
        let b = DepSet::single(2).union(&DepSet::single(3));
        a.union_with(&b);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_max_is_last() {
        let d = DepSet::single(5).union(&DepSet::single(2));
        assert_eq!(d.max(), Some(5));
        assert_eq!(DepSet::empty().max(), None);
    }

    #[test]
    fn test_delete_level() {
        let mut d = DepSet::single(1).union(&DepSet::single(4));
        d.delete(4);
        assert!(!d.contains(4));
        assert!(d.contains(1));
    }

    #[test]
    fn test_subset() {
        let small = DepSet::single(2);
        let big = DepSet::single(2).union(&DepSet::single(7));
        assert!(small.is_subset_of(&big));
        assert!(!big.is_subset_of(&small));
        assert!(DepSet::empty().is_subset_of(&small));
    }
}
