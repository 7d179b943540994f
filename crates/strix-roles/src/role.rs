//! Per-role record
//!
//! A role owns everything derivable about itself after role-box
//! finalization: hierarchy closure vectors and bitmaps, feature flags, the
//! functional DAG vertex, its domain, declared compositions and the compiled
//! automaton. The inverse is not stored here: roles live in inverse pairs in
//! the arena and [`RoleId::inverse`] is an index flip.

use crate::automaton::RoleAutomaton;
use strix_core::{Bp, Expr, NamedEntry, NamedItem, RoleId};

/// All information about a single DL role
#[derive(Debug, Clone)]
pub struct Role {
    entry: NamedEntry,
    /// told super-roles, prior to closure
    pub parents: Vec<RoleId>,
    pub transitive: bool,
    pub reflexive: bool,
    /// declared functional; the topmost-functional set is computed at finalize
    pub functional: bool,
    /// DAG vertex expressing the functionality, set when the DAG is built
    pub functional_bp: Bp,
    pub data: bool,
    /// no transitive descendant and no composition below
    pub simple: bool,
    /// accumulated domain expression; the range of a role is the domain of
    /// its inverse
    pub domain: Option<Expr>,
    /// interned domain, set when the DAG is built
    pub bp_domain: Bp,
    /// sort key of the domain, for sorted reasoning
    pub dom_sort: Option<u32>,
    /// proper super-roles after closure
    pub ancestors: Vec<RoleId>,
    /// proper sub-roles after closure
    pub descendants: Vec<RoleId>,
    /// ancestry bitmap over the whole arena: `anc_map[s] == true` iff self ⊑ s
    pub anc_map: Vec<bool>,
    /// functional ancestors without functional ancestors of their own
    pub top_func: Vec<RoleId>,
    /// roles disjoint with this one, closed under sub-roles
    pub disjoint: Vec<RoleId>,
    /// disjointness bitmap over the whole arena
    pub dj_map: Vec<bool>,
    /// declared compositions `R₁∘…∘Rₙ ⊑ self`
    pub compositions: Vec<Vec<RoleId>>,
    pub automaton: RoleAutomaton,
    /// synonym representative established by told-cycle elimination
    pub synonym: Option<RoleId>,
}

impl NamedItem for Role {
    fn build(entry: NamedEntry) -> Self {
        let id = RoleId(entry.id() as usize);
        Role {
            entry,
            parents: Vec::new(),
            transitive: false,
            reflexive: false,
            functional: false,
            functional_bp: Bp::INVALID,
            data: false,
            simple: true,
            domain: None,
            bp_domain: Bp::TOP,
            dom_sort: None,
            ancestors: Vec::new(),
            descendants: Vec::new(),
            anc_map: Vec::new(),
            top_func: Vec::new(),
            disjoint: Vec::new(),
            dj_map: Vec::new(),
            compositions: Vec::new(),
            automaton: RoleAutomaton::trivial(id),
            synonym: None,
        }
    }

    fn named(&self) -> &NamedEntry {
        &self.entry
    }

    fn named_mut(&mut self) -> &mut NamedEntry {
        &mut self.entry
    }
}

impl Role {
    pub fn name(&self) -> &str {
        self.entry.name()
    }

    pub fn is_synonym(&self) -> bool {
        self.synonym.is_some()
    }

    /// Extend the domain with another conjunct
    pub fn add_domain(&mut self, expr: Expr) {
        self.domain = Some(match self.domain.take() {
            None => expr,
            Some(existing) => {
                if existing == expr {
                    existing
                } else {
                    Expr::snf_and(vec![existing, expr])
                }
            }
        });
    }

    /// Sub-role test against the closed hierarchy, reflexively
    pub fn is_sub_role_of(&self, own_id: RoleId, other: RoleId) -> bool {
        own_id == other || self.anc_map.get(other.0).copied().unwrap_or(false)
    }

    pub fn is_disjoint_with(&self, other: RoleId) -> bool {
        self.dj_map.get(other.0).copied().unwrap_or(false)
    }
}
