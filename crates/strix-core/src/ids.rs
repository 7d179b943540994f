//! Stable index types shared between subsystems
//!
//! Every arena-owning subsystem hands out plain indices; cross-references
//! between subsystems always go through these newtypes so a concept id can
//! never be confused with a role id.

use serde::{Deserialize, Serialize};

/// Index of a named concept in the KB concept collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConceptId(pub usize);

/// Index of a named individual in the KB individual collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndividualId(pub usize);

/// Index of a role in the role box arena
///
/// Roles are allocated in inverse pairs: a named role sits at an even index
/// and its inverse at the following odd index, so taking the inverse is a
/// bit flip and never a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(pub usize);

impl RoleId {
    /// The inverse role of this one
    pub fn inverse(self) -> RoleId {
        RoleId(self.0 ^ 1)
    }

    /// Check whether this is the even member of its inverse pair
    pub fn is_base(self) -> bool {
        self.0 % 2 == 0
    }
}

/// Index of a vertex in the taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaxVertexId(pub usize);

/// A classifiable entry of any kind, as seen by the taxonomy
///
/// The taxonomy walks concepts, individuals and roles through the same
/// algorithms; this enum is the variant-dispatch seam between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryId {
    Concept(ConceptId),
    Individual(IndividualId),
    Role(RoleId),
}

impl From<ConceptId> for EntryId {
    fn from(id: ConceptId) -> Self {
        EntryId::Concept(id)
    }
}

impl From<IndividualId> for EntryId {
    fn from(id: IndividualId) -> Self {
        EntryId::Individual(id)
    }
}

impl From<RoleId> for EntryId {
    fn from(id: RoleId) -> Self {
        EntryId::Role(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_inverse_is_involution() {
        let r = RoleId(4);
        assert_eq!(r.inverse(), RoleId(5));
        assert_eq!(r.inverse().inverse(), r);
    }

    #[test]
    fn test_role_base_parity() {
        assert!(RoleId(0).is_base());
        assert!(!RoleId(1).is_base());
        assert!(RoleId(1).inverse().is_base());
    }
}
