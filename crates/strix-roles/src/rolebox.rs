//! The role box: registry, hierarchy and finalization
//!
//! Roles are declared incrementally while axioms load; `finalize` then runs
//! the closure pipeline: told-cycle elimination, ancestor/descendant closure
//! with bitmaps, simplicity, topmost-functional sets, disjointness closure
//! and automaton construction. After finalization the box is read-only.

use crate::automaton::{ChainKind, RoleAutomaton};
use crate::role::Role;
use crate::RoleBoxError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use strix_core::{Expr, NamedEntry, NamedItem, RoleId};
use tracing::debug;

/// Told state of one arena slot, as dumped into a KB save
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSnapshot {
    pub name: String,
    pub data: bool,
    pub transitive: bool,
    pub reflexive: bool,
    pub functional: bool,
    pub parents: Vec<usize>,
    pub domain: Option<Expr>,
    pub compositions: Vec<Vec<usize>>,
    pub synonym: Option<usize>,
}

/// Registry and closure engine for all roles of a KB
#[derive(Debug, Default)]
pub struct RoleBox {
    roles: Vec<Role>,
    index: HashMap<String, RoleId>,
    declared_disjoint: Vec<(RoleId, RoleId)>,
    finalized: bool,
}

impl RoleBox {
    pub fn new() -> RoleBox {
        RoleBox::default()
    }

    /// Number of arena slots (two per named role)
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Declare an object role, creating its inverse alongside it
    pub fn add_role(&mut self, name: &str) -> RoleId {
        self.add_role_impl(name, false)
    }

    /// Declare a data role
    pub fn add_data_role(&mut self, name: &str) -> RoleId {
        self.add_role_impl(name, true)
    }

    fn add_role_impl(&mut self, name: &str, data: bool) -> RoleId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = RoleId(self.roles.len());
        let inv = id.inverse();
        self.roles.push(Role::build(NamedEntry::new(name, id.0 as i32)));
        self.roles.push(Role::build(NamedEntry::new(format!("{}-", name), inv.0 as i32)));
        self.roles[id.0].data = data;
        self.roles[inv.0].data = data;
        self.index.insert(name.to_string(), id);
        id
    }

    pub fn find(&self, name: &str) -> Option<RoleId> {
        self.index.get(name).copied().map(|r| self.resolve(r))
    }

    pub fn role(&self, id: RoleId) -> &Role {
        &self.roles[id.0]
    }

    fn role_mut(&mut self, id: RoleId) -> &mut Role {
        &mut self.roles[id.0]
    }

    /// Follow synonym links to the primary role
    pub fn resolve(&self, mut id: RoleId) -> RoleId {
        while let Some(next) = self.roles[id.0].synonym {
            id = next;
        }
        id
    }

    /// Primary roles only (synonyms skipped)
    pub fn primary_ids(&self) -> impl Iterator<Item = RoleId> + '_ {
        (0..self.roles.len())
            .map(RoleId)
            .filter(move |r| !self.roles[r.0].is_synonym())
    }

    // declaration interface

    /// Declare `S ≡ R⁻`
    pub fn set_inverse(&mut self, r: RoleId, s: RoleId) -> Result<(), RoleBoxError> {
        let r = self.resolve(r);
        let s = self.resolve(s);
        if self.roles[r.0].data != self.roles[s.0].data {
            return Err(RoleBoxError::ConflictingInverse(self.roles[s.0].name().to_string()));
        }
        let target = self.resolve(r.inverse());
        if target == s {
            return Ok(());
        }
        self.make_synonym(s, target);
        self.make_synonym(self.resolve(s.inverse()), self.resolve(r));
        Ok(())
    }

    fn make_synonym(&mut self, drop: RoleId, keep: RoleId) {
        if drop == keep {
            return;
        }
        self.roles[drop.0].synonym = Some(keep);
    }

    pub fn set_transitive(&mut self, r: RoleId) -> Result<(), RoleBoxError> {
        let r = self.resolve(r);
        if self.roles[r.0].data {
            return Err(RoleBoxError::TransitiveDataRole(self.roles[r.0].name().to_string()));
        }
        self.role_mut(r).transitive = true;
        let inv = self.resolve(r.inverse());
        self.role_mut(inv).transitive = true;
        Ok(())
    }

    pub fn set_reflexive(&mut self, r: RoleId) {
        let r = self.resolve(r);
        self.role_mut(r).reflexive = true;
        let inv = self.resolve(r.inverse());
        self.role_mut(inv).reflexive = true;
    }

    pub fn set_functional(&mut self, r: RoleId) {
        let r = self.resolve(r);
        self.role_mut(r).functional = true;
    }

    /// Declare `R ⊑ S`, mirrored onto the inverses
    pub fn add_sub_role(&mut self, r: RoleId, s: RoleId) {
        let r = self.resolve(r);
        let s = self.resolve(s);
        if r == s {
            return;
        }
        if !self.roles[r.0].parents.contains(&s) {
            self.role_mut(r).parents.push(s);
        }
        let (ri, si) = (self.resolve(r.inverse()), self.resolve(s.inverse()));
        if !self.roles[ri.0].parents.contains(&si) {
            self.role_mut(ri).parents.push(si);
        }
    }

    pub fn add_disjoint(&mut self, r: RoleId, s: RoleId) {
        let r = self.resolve(r);
        let s = self.resolve(s);
        self.declared_disjoint.push((r, s));
        // (a,b) ∈ R ∩ S iff (b,a) ∈ R⁻ ∩ S⁻
        self.declared_disjoint
            .push((self.resolve(r.inverse()), self.resolve(s.inverse())));
    }

    /// Declare `R₁∘…∘Rₙ ⊑ target`
    pub fn add_composition(&mut self, chain: &[RoleId], target: RoleId) -> Result<(), RoleBoxError> {
        let target = self.resolve(target);
        let chain: Vec<RoleId> = chain.iter().map(|r| self.resolve(*r)).collect();
        for r in &chain {
            if self.roles[r.0].data {
                return Err(RoleBoxError::DataRoleInComposition(self.roles[r.0].name().to_string()));
            }
        }
        // R∘R ⊑ R is transitivity in disguise
        if chain.len() == 2 && chain[0] == target && chain[1] == target {
            return self.set_transitive(target);
        }
        // the defined role may only occur at the ends of its own chain
        if chain.len() > 1 && chain[1..chain.len() - 1].contains(&target) {
            return Err(RoleBoxError::InvalidComposition(self.roles[target.0].name().to_string()));
        }
        if chain.first() == Some(&target) && chain.last() == Some(&target) {
            return Err(RoleBoxError::InvalidComposition(self.roles[target.0].name().to_string()));
        }
        // mirror onto the inverse: (R₁∘…∘Rₙ)⁻ = Rₙ⁻∘…∘R₁⁻ ⊑ target⁻
        let inv_target = self.resolve(target.inverse());
        let inv_chain: Vec<RoleId> =
            chain.iter().rev().map(|r| self.resolve(r.inverse())).collect();
        self.role_mut(target).compositions.push(chain);
        self.role_mut(inv_target).compositions.push(inv_chain);
        Ok(())
    }

    pub fn set_domain(&mut self, r: RoleId, expr: Expr) {
        let r = self.resolve(r);
        self.role_mut(r).add_domain(expr);
    }

    /// The range of a role is the domain of its inverse
    pub fn set_range(&mut self, r: RoleId, expr: Expr) {
        self.set_domain(self.resolve(r).inverse(), expr);
    }

    // queries against the closed box

    pub fn is_sub_role(&self, r: RoleId, s: RoleId) -> bool {
        let r = self.resolve(r);
        let s = self.resolve(s);
        self.roles[r.0].is_sub_role_of(r, s)
    }

    pub fn are_disjoint(&self, r: RoleId, s: RoleId) -> bool {
        let r = self.resolve(r);
        let s = self.resolve(s);
        self.roles[r.0].is_disjoint_with(s)
    }

    /// A role is functional when it has any topmost-functional ancestor
    pub fn is_functional(&self, r: RoleId) -> bool {
        !self.roles[self.resolve(r).0].top_func.is_empty()
    }

    // DAG wiring, done by the kernel once expressions are interned

    /// Attach the interned functionality vertex of a topmost-functional role
    pub fn set_functional_vertex(&mut self, r: RoleId, bp: strix_core::Bp) {
        let r = self.resolve(r);
        self.role_mut(r).functional_bp = bp;
    }

    /// Attach the interned domain of a role
    pub fn set_bp_domain(&mut self, r: RoleId, bp: strix_core::Bp) {
        let r = self.resolve(r);
        self.role_mut(r).bp_domain = bp;
    }

    /// Attach the sort key of a role's domain
    pub fn set_dom_sort(&mut self, r: RoleId, key: u32) {
        let r = self.resolve(r);
        self.role_mut(r).dom_sort = Some(key);
    }

    // told-state snapshots for the KB dump

    /// Capture the told state of every arena slot plus the declared
    /// disjointness pairs; derived structures are left out and recomputed by
    /// `finalize` after a restore
    pub fn snapshot(&self) -> (Vec<RoleSnapshot>, Vec<(usize, usize)>) {
        let slots = self
            .roles
            .iter()
            .map(|r| RoleSnapshot {
                name: r.name().to_string(),
                data: r.data,
                transitive: r.transitive,
                reflexive: r.reflexive,
                functional: r.functional,
                parents: r.parents.iter().map(|p| p.0).collect(),
                domain: r.domain.clone(),
                compositions: r
                    .compositions
                    .iter()
                    .map(|c| c.iter().map(|p| p.0).collect())
                    .collect(),
                synonym: r.synonym.map(|s| s.0),
            })
            .collect();
        let declared = self.declared_disjoint.iter().map(|(a, b)| (a.0, b.0)).collect();
        (slots, declared)
    }

    /// Rebuild a role box from a snapshot
    pub fn from_snapshot(slots: Vec<RoleSnapshot>, declared: Vec<(usize, usize)>) -> RoleBox {
        let mut rb = RoleBox::new();
        for (i, s) in slots.iter().enumerate() {
            let mut role = Role::build(NamedEntry::new(s.name.clone(), i as i32));
            role.data = s.data;
            role.transitive = s.transitive;
            role.reflexive = s.reflexive;
            role.functional = s.functional;
            role.parents = s.parents.iter().map(|p| RoleId(*p)).collect();
            role.domain = s.domain.clone();
            role.compositions = s
                .compositions
                .iter()
                .map(|c| c.iter().map(|p| RoleId(*p)).collect())
                .collect();
            role.synonym = s.synonym.map(RoleId);
            if i % 2 == 0 {
                rb.index.insert(s.name.clone(), RoleId(i));
            }
            rb.roles.push(role);
        }
        rb.declared_disjoint =
            declared.into_iter().map(|(a, b)| (RoleId(a), RoleId(b))).collect();
        rb
    }

    // finalization pipeline

    /// Close the role box; re-running after further declarations recomputes
    /// every derived structure
    pub fn finalize(&mut self) -> Result<(), RoleBoxError> {
        self.eliminate_told_cycles();
        self.compute_closure();
        self.compute_simplicity();
        self.compute_top_functional();
        self.compute_disjointness()?;
        self.build_automata();
        self.check_consistency()?;
        self.finalized = true;
        debug!(roles = self.roles.len() / 2, "role box finalized");
        Ok(())
    }

    /// Step 1: `R ⊑ S ⊑ R` makes R and S synonyms; features of the dropped
    /// role are pushed to its representative
    fn eliminate_told_cycles(&mut self) {
        let n = self.roles.len();
        // told reachability through parents, resolved as we go
        let reach = |this: &Self, from: RoleId| -> HashSet<RoleId> {
            let mut seen = HashSet::new();
            let mut stack = vec![this.resolve(from)];
            while let Some(r) = stack.pop() {
                for p in &this.roles[r.0].parents {
                    let p = this.resolve(*p);
                    if seen.insert(p) {
                        stack.push(p);
                    }
                }
            }
            seen
        };
        for i in 0..n {
            let r = RoleId(i);
            if self.roles[r.0].is_synonym() {
                continue;
            }
            let up = reach(self, r);
            for &s in &up {
                if s == r || self.roles[s.0].is_synonym() {
                    continue;
                }
                if reach(self, s).contains(&r) {
                    // mutual told subsumption: merge s into r
                    self.push_features(s, r);
                    self.make_synonym(s, r);
                }
            }
        }
        // resolve parent lists through the new synonyms
        for i in 0..n {
            let parents: Vec<RoleId> = self.roles[i]
                .parents
                .iter()
                .map(|p| self.resolve(*p))
                .filter(|p| *p != self.resolve(RoleId(i)))
                .collect();
            let mut dedup = Vec::new();
            for p in parents {
                if !dedup.contains(&p) {
                    dedup.push(p);
                }
            }
            self.roles[i].parents = dedup;
        }
    }

    /// Move every feature of `from` onto `to` before `from` becomes a synonym
    fn push_features(&mut self, from: RoleId, to: RoleId) {
        let parents = self.roles[from.0].parents.clone();
        let compositions = self.roles[from.0].compositions.clone();
        let domain = self.roles[from.0].domain.clone();
        let transitive = self.roles[from.0].transitive;
        let reflexive = self.roles[from.0].reflexive;
        let functional = self.roles[from.0].functional;
        let target = self.role_mut(to);
        for p in parents {
            if !target.parents.contains(&p) {
                target.parents.push(p);
            }
        }
        target.compositions.extend(compositions);
        if let Some(d) = domain {
            target.add_domain(d);
        }
        target.transitive |= transitive;
        target.reflexive |= reflexive;
        target.functional |= functional;
    }

    /// Step 2: ancestor/descendant vectors and the ancestry bitmap
    fn compute_closure(&mut self) {
        let n = self.roles.len();
        for i in 0..n {
            let r = RoleId(i);
            if self.roles[i].is_synonym() {
                continue;
            }
            let mut seen: Vec<RoleId> = Vec::new();
            let mut stack: Vec<RoleId> = self.roles[i].parents.clone();
            while let Some(p) = stack.pop() {
                let p = self.resolve(p);
                if p != r && !seen.contains(&p) {
                    seen.push(p);
                    stack.extend(self.roles[p.0].parents.iter().copied());
                }
            }
            let mut map = vec![false; n];
            for a in &seen {
                map[a.0] = true;
            }
            self.roles[i].ancestors = seen;
            self.roles[i].anc_map = map;
        }
        for i in 0..n {
            self.roles[i].descendants.clear();
        }
        for i in 0..n {
            if self.roles[i].is_synonym() {
                continue;
            }
            for a in self.roles[i].ancestors.clone() {
                self.roles[a.0].descendants.push(RoleId(i));
            }
        }
    }

    /// Step 3: a role is simple iff nothing at or below it chains
    fn compute_simplicity(&mut self) {
        let n = self.roles.len();
        for i in 0..n {
            if self.roles[i].is_synonym() {
                continue;
            }
            let below = std::iter::once(RoleId(i)).chain(self.roles[i].descendants.iter().copied());
            let mut simple = true;
            for d in below {
                if self.roles[d.0].transitive || !self.roles[d.0].compositions.is_empty() {
                    simple = false;
                    break;
                }
            }
            self.roles[i].simple = simple;
        }
    }

    /// Step 4: topmost-functional sets
    fn compute_top_functional(&mut self) {
        let n = self.roles.len();
        let is_top: Vec<bool> = (0..n)
            .map(|i| {
                self.roles[i].functional
                    && !self.roles[i]
                        .ancestors
                        .iter()
                        .any(|a| self.roles[a.0].functional)
            })
            .collect();
        for i in 0..n {
            if self.roles[i].is_synonym() {
                continue;
            }
            let mut tf: Vec<RoleId> = Vec::new();
            if is_top[i] {
                tf.push(RoleId(i));
            }
            for a in self.roles[i].ancestors.clone() {
                if is_top[a.0] && !tf.contains(&a) {
                    tf.push(a);
                }
            }
            self.roles[i].top_func = tf;
        }
    }

    /// Step 5: symmetric sub-role closure of declared disjointness
    fn compute_disjointness(&mut self) -> Result<(), RoleBoxError> {
        let n = self.roles.len();
        for i in 0..n {
            self.roles[i].dj_map = vec![false; n];
            self.roles[i].disjoint.clear();
        }
        for (r, s) in self.declared_disjoint.clone() {
            let r = self.resolve(r);
            let s = self.resolve(s);
            let left: Vec<RoleId> =
                std::iter::once(r).chain(self.roles[r.0].descendants.iter().copied()).collect();
            let right: Vec<RoleId> =
                std::iter::once(s).chain(self.roles[s.0].descendants.iter().copied()).collect();
            for l in &left {
                if right.contains(l) {
                    return Err(RoleBoxError::DisjointWithCommonDescendant(
                        self.roles[r.0].name().to_string(),
                        self.roles[s.0].name().to_string(),
                    ));
                }
            }
            for &l in &left {
                for &q in &right {
                    self.roles[l.0].dj_map[q.0] = true;
                    self.roles[q.0].dj_map[l.0] = true;
                    if !self.roles[l.0].disjoint.contains(&q) {
                        self.roles[l.0].disjoint.push(q);
                    }
                    if !self.roles[q.0].disjoint.contains(&l) {
                        self.roles[q.0].disjoint.push(l);
                    }
                }
            }
        }
        Ok(())
    }

    /// Step 6: compile compositions and transitivity into automata
    ///
    /// Sub-roles with non-trivial automata are embedded; plain sub-roles are
    /// covered by hierarchy matching on transition labels, which keeps the
    /// automata small.
    fn build_automata(&mut self) {
        let mut order: Vec<RoleId> = self.primary_ids().collect();
        order.sort_by_key(|r| self.roles[r.0].descendants.len());
        for r in order {
            let mut a = RoleAutomaton::trivial(r);
            if self.roles[r.0].transitive {
                a.add_chain(&[r], ChainKind::AfterSelf);
            }
            for chain in self.roles[r.0].compositions.clone() {
                if chain.is_empty() {
                    continue;
                }
                if chain.first() == Some(&r) {
                    a.add_chain(&chain[1..], ChainKind::AfterSelf);
                } else if chain.last() == Some(&r) {
                    a.add_chain(&chain[..chain.len() - 1], ChainKind::BeforeSelf);
                } else {
                    a.add_chain(&chain, ChainKind::Full);
                }
            }
            for d in self.roles[r.0].descendants.clone() {
                if !self.roles[d.0].automaton.is_trivial() {
                    let sub = self.roles[d.0].automaton.clone();
                    a.embed(&sub);
                }
            }
            self.roles[r.0].automaton = a;
        }
    }

    /// Final sanity pass over the closed box
    fn check_consistency(&mut self) -> Result<(), RoleBoxError> {
        for i in 0..self.roles.len() {
            if self.roles[i].is_synonym() {
                continue;
            }
            if self.roles[i].data && self.roles[i].transitive {
                return Err(RoleBoxError::TransitiveDataRole(self.roles[i].name().to_string()));
            }
            if !self.roles[i].top_func.is_empty() && !self.roles[i].simple {
                // functional roles must be simple in SROIQ
                if self.roles[i].functional {
                    return Err(RoleBoxError::FunctionalNonSimple(
                        self.roles[i].name().to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed() -> RoleBox {
        RoleBox::new()
    }

    #[test]
    fn test_inverse_pairing() {
        let mut rb = boxed();
        let r = rb.add_role("hasPart");
        assert!(r.is_base());
        assert_eq!(r.inverse().inverse(), r);
        assert_eq!(rb.role(r.inverse()).name(), "hasPart-");
    }

    #[test]
    fn test_transitivity_mirrors_to_inverse() {
        let mut rb = boxed();
        let r = rb.add_role("ancestorOf");
        rb.set_transitive(r).unwrap();
        assert!(rb.role(rb.resolve(r.inverse())).transitive);
    }

    #[test]
    fn test_data_role_cannot_be_transitive() {
        let mut rb = boxed();
        let d = rb.add_data_role("age");
        assert!(matches!(rb.set_transitive(d), Err(RoleBoxError::TransitiveDataRole(_))));
    }

    #[test]
    fn test_hierarchy_closure() {
        let mut rb = boxed();
        let r = rb.add_role("r");
        let s = rb.add_role("s");
        let t = rb.add_role("t");
        rb.add_sub_role(r, s);
        rb.add_sub_role(s, t);
        rb.finalize().unwrap();
        assert!(rb.is_sub_role(r, t));
        assert!(rb.is_sub_role(r, r));
        assert!(!rb.is_sub_role(t, r));
        // mirrored on inverses
        assert!(rb.is_sub_role(r.inverse(), t.inverse()));
    }

    #[test]
    fn test_told_cycle_collapses_to_synonym() {
        let mut rb = boxed();
        let r = rb.add_role("r");
        let s = rb.add_role("s");
        rb.add_sub_role(r, s);
        rb.add_sub_role(s, r);
        rb.set_transitive(s).unwrap();
        rb.finalize().unwrap();
        assert_eq!(rb.resolve(r), rb.resolve(s));
        // the feature of the dropped role survived on the representative
        assert!(rb.role(rb.resolve(r)).transitive);
    }

    #[test]
    fn test_disjointness_closes_over_sub_roles() {
        let mut rb = boxed();
        let r = rb.add_role("r");
        let s = rb.add_role("s");
        let r1 = rb.add_role("r1");
        let s1 = rb.add_role("s1");
        rb.add_sub_role(r1, r);
        rb.add_sub_role(s1, s);
        rb.add_disjoint(r, s);
        rb.finalize().unwrap();
        assert!(rb.are_disjoint(r1, s1));
        assert!(rb.are_disjoint(s1, r1));
        assert!(rb.are_disjoint(r.inverse(), s.inverse()));
        assert!(!rb.are_disjoint(r1, s1.inverse().inverse().inverse()));
    }

    #[test]
    fn test_disjoint_with_common_descendant_rejected() {
        let mut rb = boxed();
        let r = rb.add_role("r");
        let s = rb.add_role("s");
        let c = rb.add_role("c");
        rb.add_sub_role(c, r);
        rb.add_sub_role(c, s);
        rb.add_disjoint(r, s);
        assert!(matches!(
            rb.finalize(),
            Err(RoleBoxError::DisjointWithCommonDescendant(_, _))
        ));
    }

    #[test]
    fn test_simplicity() {
        let mut rb = boxed();
        let r = rb.add_role("r");
        let t = rb.add_role("t");
        rb.add_sub_role(t, r);
        rb.set_transitive(t).unwrap();
        rb.finalize().unwrap();
        assert!(!rb.role(r).simple);
        assert!(!rb.role(t).simple);
    }

    #[test]
    fn test_top_functional() {
        let mut rb = boxed();
        let f = rb.add_role("f");
        let g = rb.add_role("g");
        rb.add_sub_role(g, f);
        rb.set_functional(f);
        rb.set_functional(g);
        rb.finalize().unwrap();
        // g is functional through f, but f is the topmost one
        assert!(rb.is_functional(g));
        assert_eq!(rb.role(g).top_func, vec![f]);
        assert_eq!(rb.role(f).top_func, vec![f]);
    }

    #[test]
    fn test_composition_becomes_automaton_chain() {
        let mut rb = boxed();
        let r = rb.add_role("r");
        let s = rb.add_role("s");
        let t = rb.add_role("t");
        rb.add_composition(&[r, s], t).unwrap();
        rb.finalize().unwrap();
        let a = &rb.role(t).automaton;
        assert!(!a.is_trivial());
        assert_eq!(a.n_states(), 3);
    }

    #[test]
    fn test_self_composition_is_transitivity() {
        let mut rb = boxed();
        let r = rb.add_role("r");
        rb.add_composition(&[r, r], r).unwrap();
        assert!(rb.role(r).transitive);
    }

    #[test]
    fn test_composition_with_defined_role_in_middle_rejected() {
        let mut rb = boxed();
        let r = rb.add_role("r");
        let s = rb.add_role("s");
        assert!(rb.add_composition(&[r, s, r], s).is_err());
    }

    #[test]
    fn test_set_inverse_links_names() {
        let mut rb = boxed();
        let r = rb.add_role("hasChild");
        let s = rb.add_role("hasParent");
        rb.set_inverse(r, s).unwrap();
        assert_eq!(rb.resolve(s), rb.resolve(r.inverse()));
        assert_eq!(rb.resolve(s.inverse()), rb.resolve(r));
    }
}
