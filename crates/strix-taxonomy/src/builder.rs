//! Classification driver
//!
//! Entries are classified one at a time. The wait stack makes sure every
//! told subsumer is classified first; a told-subsumer cycle means the whole
//! cycle is one concept and collapses into synonyms of its head. Completely
//! defined entries take the told shortcut; everything else is located by the
//! two-phase border search.

use crate::taxonomy::Taxonomy;
use std::collections::HashMap;
use strix_core::{EntryId, TaxVertexId};
use tracing::{debug, warn};

/// What the builder needs to know about the KB
pub trait Classifier {
    /// Decide `sub ⊑ sup` (a full tableau test in the kernel)
    fn subsumes(&mut self, sup: EntryId, sub: EntryId) -> bool;
    /// Syntactic super-entries
    fn told_subsumers(&mut self, e: EntryId) -> Vec<EntryId>;
    /// Entries whose told subsumers locate them exactly
    fn completely_defined(&mut self, e: EntryId) -> bool;
    /// Record a synonym established during classification
    fn set_synonym(&mut self, e: EntryId, of: EntryId);
}

/// Builds a taxonomy by classifying entries on demand
pub struct TaxonomyBuilder<'a, C: Classifier> {
    taxonomy: &'a mut Taxonomy,
    checker: &'a mut C,
    wait_stack: Vec<EntryId>,
}

impl<'a, C: Classifier> TaxonomyBuilder<'a, C> {
    pub fn new(taxonomy: &'a mut Taxonomy, checker: &'a mut C) -> TaxonomyBuilder<'a, C> {
        TaxonomyBuilder { taxonomy, checker, wait_stack: Vec::new() }
    }

    /// Classify one entry, pulling unclassified told subsumers in first
    pub fn classify_entry(&mut self, e: EntryId) {
        if self.taxonomy.vertex_of(e).is_some() {
            return;
        }
        debug_assert!(self.wait_stack.is_empty());
        self.wait_stack.push(e);
        while !self.wait_stack.is_empty() {
            if self.check_told_subsumers() {
                self.classify_top();
            } else {
                self.classify_cycle();
            }
        }
    }

    /// Ensure the stack top's told subsumers are classified
    ///
    /// Returns false when a cycle was found; the stack then ends with a
    /// duplicate of the cycle head.
    fn check_told_subsumers(&mut self) -> bool {
        let top = *self.wait_stack.last().expect("non-empty wait stack");
        for t in self.checker.told_subsumers(top) {
            if self.taxonomy.vertex_of(t).is_some() {
                continue;
            }
            if self.wait_stack.contains(&t) {
                // cycle: mark it by pushing the head again
                self.wait_stack.push(t);
                return false;
            }
            self.wait_stack.push(t);
            return self.check_told_subsumers();
        }
        true
    }

    fn classify_top(&mut self) {
        let e = self.wait_stack.pop().expect("non-empty wait stack");
        if self.taxonomy.vertex_of(e).is_none() {
            self.do_classification(e);
        }
    }

    /// A told-subsumer cycle: classify the head, everything else in the
    /// cycle becomes its synonym
    fn classify_cycle(&mut self) {
        let head = self.wait_stack.pop().expect("cycle head on stack");
        warn!(?head, "told-subsumer cycle, collapsing to synonyms");
        if self.taxonomy.vertex_of(head).is_none() {
            self.do_classification(head);
        }
        let v = self.taxonomy.vertex_of(head).expect("head just classified");
        while let Some(top) = self.wait_stack.pop() {
            if top == head {
                break;
            }
            self.taxonomy.add_synonym(v, top);
            self.checker.set_synonym(top, head);
        }
    }

    /// Locate one entry whose told subsumers are all classified
    fn do_classification(&mut self, e: EntryId) {
        debug!(?e, "classifying");
        let (parents, children) = if self.checker.completely_defined(e) {
            (self.non_redundant_told(e), vec![self.taxonomy.bottom()])
        } else {
            let parents = self.search_parents(e);
            let children = self.search_children(e);
            (parents, children)
        };
        // synonym check: identical neighbourhood means an equivalent vertex
        if parents.len() == 1 && children.len() == 1 && parents[0] == children[0] {
            let v = parents[0];
            self.taxonomy.add_synonym(v, e);
            self.checker.set_synonym(e, self.taxonomy.vertex(v).primer);
            return;
        }
        self.taxonomy.insert(e, parents, children);
    }

    /// Completely-defined shortcut: parents are the told subsumers that are
    /// not implied by another told subsumer
    fn non_redundant_told(&mut self, e: EntryId) -> Vec<TaxVertexId> {
        let told: Vec<TaxVertexId> = self
            .checker
            .told_subsumers(e)
            .into_iter()
            .filter_map(|t| self.taxonomy.vertex_of(t))
            .collect();
        let mut parents = Vec::new();
        for &candidate in &told {
            // redundant when one of its descendants is also told
            let redundant = self
                .taxonomy
                .descendants_of(candidate)
                .into_iter()
                .any(|d| d != candidate && told.contains(&d));
            if !redundant && !parents.contains(&candidate) {
                parents.push(candidate);
            }
        }
        if parents.is_empty() {
            parents.push(self.taxonomy.top());
        }
        parents
    }

    /// Top-down phase: parents are the valued border under ⊤
    fn search_parents(&mut self, e: EntryId) -> Vec<TaxVertexId> {
        let mut valued: HashMap<TaxVertexId, bool> = HashMap::new();
        valued.insert(self.taxonomy.top(), true);
        valued.insert(self.taxonomy.bottom(), false);
        let mut border = Vec::new();
        let mut stack = vec![self.taxonomy.top()];
        let mut visited = vec![self.taxonomy.top()];
        while let Some(v) = stack.pop() {
            if !self.is_valued_down(v, e, &mut valued) {
                continue;
            }
            let children = self.taxonomy.vertex(v).children.clone();
            let mut has_valued_child = false;
            for c in children {
                if self.is_valued_down(c, e, &mut valued) {
                    has_valued_child = true;
                    if !visited.contains(&c) {
                        visited.push(c);
                        stack.push(c);
                    }
                }
            }
            if !has_valued_child && !border.contains(&v) {
                border.push(v);
            }
        }
        if border.is_empty() {
            border.push(self.taxonomy.top());
        }
        border
    }

    fn is_valued_down(
        &mut self,
        v: TaxVertexId,
        e: EntryId,
        valued: &mut HashMap<TaxVertexId, bool>,
    ) -> bool {
        if let Some(&b) = valued.get(&v) {
            return b;
        }
        let primer = self.taxonomy.vertex(v).primer;
        let b = self.checker.subsumes(primer, e);
        valued.insert(v, b);
        b
    }

    /// Bottom-up phase: children are the valued border above ⊥
    ///
    /// Parents found top-down stay testable here: an equivalent entry
    /// values its own parent in both directions, which is exactly the
    /// synonym condition checked afterwards.
    fn search_children(&mut self, e: EntryId) -> Vec<TaxVertexId> {
        let mut valued: HashMap<TaxVertexId, bool> = HashMap::new();
        valued.insert(self.taxonomy.bottom(), true);
        let mut border = Vec::new();
        let mut stack = vec![self.taxonomy.bottom()];
        let mut visited = vec![self.taxonomy.bottom()];
        while let Some(v) = stack.pop() {
            if !self.is_valued_up(v, e, &mut valued) {
                continue;
            }
            let vertex_parents = self.taxonomy.vertex(v).parents.clone();
            let mut has_valued_parent = false;
            for p in vertex_parents {
                if self.is_valued_up(p, e, &mut valued) {
                    has_valued_parent = true;
                    if !visited.contains(&p) {
                        visited.push(p);
                        stack.push(p);
                    }
                }
            }
            if !has_valued_parent && !border.contains(&v) {
                border.push(v);
            }
        }
        if border.is_empty() {
            border.push(self.taxonomy.bottom());
        }
        border
    }

    fn is_valued_up(
        &mut self,
        v: TaxVertexId,
        e: EntryId,
        valued: &mut HashMap<TaxVertexId, bool>,
    ) -> bool {
        if let Some(&b) = valued.get(&v) {
            return b;
        }
        let primer = self.taxonomy.vertex(v).primer;
        let b = self.checker.subsumes(e, primer);
        valued.insert(v, b);
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use strix_core::ConceptId;

    fn e(n: usize) -> EntryId {
        EntryId::Concept(ConceptId(n))
    }

    /// Test classifier over an explicit subsumption table
    struct Table {
        /// (sub, sup) pairs, reflexive/transitive closure included
        subs: HashSet<(usize, usize)>,
        told: HashMap<usize, Vec<usize>>,
        cd: HashSet<usize>,
        synonyms: Vec<(usize, usize)>,
        tests_run: usize,
    }

    impl Table {
        fn id(entry: EntryId) -> usize {
            match entry {
                EntryId::Concept(ConceptId(n)) => n,
                _ => panic!("concept table"),
            }
        }
    }

    impl Classifier for Table {
        fn subsumes(&mut self, sup: EntryId, sub: EntryId) -> bool {
            self.tests_run += 1;
            let (sup, sub) = (Self::id(sup), Self::id(sub));
            // 1000 is ⊤, 1001 is ⊥
            sup == 1000 || sub == 1001 || sub == sup || self.subs.contains(&(sub, sup))
        }

        fn told_subsumers(&mut self, entry: EntryId) -> Vec<EntryId> {
            self.told.get(&Self::id(entry)).map(|v| v.iter().map(|n| e(*n)).collect()).unwrap_or_default()
        }

        fn completely_defined(&mut self, entry: EntryId) -> bool {
            self.cd.contains(&Self::id(entry))
        }

        fn set_synonym(&mut self, entry: EntryId, of: EntryId) {
            self.synonyms.push((Self::id(entry), Self::id(of)));
        }
    }

    fn table(subs: &[(usize, usize)], told: &[(usize, &[usize])]) -> Table {
        // close the subsumption table transitively
        let mut set: HashSet<(usize, usize)> = subs.iter().copied().collect();
        loop {
            let mut added = false;
            let pairs: Vec<_> = set.iter().copied().collect();
            for &(a, b) in &pairs {
                for &(c, d) in &pairs {
                    if b == c && set.insert((a, d)) {
                        added = true;
                    }
                }
            }
            if !added {
                break;
            }
        }
        Table {
            subs: set,
            told: told.iter().map(|(k, v)| (*k, v.to_vec())).collect(),
            cd: HashSet::new(),
            synonyms: Vec::new(),
            tests_run: 0,
        }
    }

    #[test]
    fn test_simple_chain() {
        // A ⊑ B ⊑ C
        let mut t = table(&[(0, 1), (1, 2)], &[(0, &[1]), (1, &[2])]);
        let mut tax = Taxonomy::new(e(1000), e(1001));
        let mut b = TaxonomyBuilder::new(&mut tax, &mut t);
        b.classify_entry(e(0));
        let va = tax.vertex_of(e(0)).unwrap();
        let vb = tax.vertex_of(e(1)).unwrap();
        let vc = tax.vertex_of(e(2)).unwrap();
        assert_eq!(tax.vertex(va).parents, vec![vb]);
        assert_eq!(tax.vertex(vb).parents, vec![vc]);
        assert_eq!(tax.vertex(vc).parents, vec![tax.top()]);
        // transitive reduction: C is not a direct parent of A
        assert!(!tax.vertex(va).parents.contains(&vc));
    }

    #[test]
    fn test_told_cycle_collapses_to_synonyms() {
        // A ⊑ B, B ⊑ A as told subsumers
        let mut t = table(&[(0, 1), (1, 0)], &[(0, &[1]), (1, &[0])]);
        let mut tax = Taxonomy::new(e(1000), e(1001));
        let mut b = TaxonomyBuilder::new(&mut tax, &mut t);
        b.classify_entry(e(0));
        let va = tax.vertex_of(e(0)).unwrap();
        let vb = tax.vertex_of(e(1)).unwrap();
        assert_eq!(va, vb);
        assert_eq!(t.synonyms.len(), 1);
    }

    #[test]
    fn test_diamond_parents() {
        // D ⊑ B, D ⊑ C, B ⊑ A, C ⊑ A
        let mut t = table(
            &[(3, 1), (3, 2), (1, 0), (2, 0)],
            &[(3, &[1, 2]), (1, &[0]), (2, &[0])],
        );
        let mut tax = Taxonomy::new(e(1000), e(1001));
        let mut b = TaxonomyBuilder::new(&mut tax, &mut t);
        b.classify_entry(e(3));
        let vd = tax.vertex_of(e(3)).unwrap();
        let vb = tax.vertex_of(e(1)).unwrap();
        let vc = tax.vertex_of(e(2)).unwrap();
        let mut parents = tax.vertex(vd).parents.clone();
        parents.sort();
        let mut expected = vec![vb, vc];
        expected.sort();
        assert_eq!(parents, expected);
    }

    #[test]
    fn test_equivalent_entry_becomes_synonym() {
        // B classified first; A ≡ B discovered by the border search
        let mut t = table(&[(0, 1), (1, 0)], &[(1, &[])]);
        let mut tax = Taxonomy::new(e(1000), e(1001));
        let mut b = TaxonomyBuilder::new(&mut tax, &mut t);
        b.classify_entry(e(1));
        b.classify_entry(e(0));
        assert_eq!(tax.vertex_of(e(0)), tax.vertex_of(e(1)));
        assert!(t.synonyms.contains(&(0, 1)));
    }

    #[test]
    fn test_completely_defined_shortcut_skips_tableau_tests() {
        let mut t = table(&[(0, 1), (0, 2), (1, 2)], &[(0, &[1, 2]), (1, &[2])]);
        t.cd.insert(0);
        let mut tax = Taxonomy::new(e(1000), e(1001));
        let mut b = TaxonomyBuilder::new(&mut tax, &mut t);
        b.classify_entry(e(1));
        let before = t.tests_run;
        let mut b = TaxonomyBuilder::new(&mut tax, &mut t);
        b.classify_entry(e(0));
        // the CD path never calls the subsumption tester
        assert_eq!(t.tests_run, before);
        // told subsumer 2 is redundant: 1 is also told and 1 ⊑ 2
        let v0 = tax.vertex_of(e(0)).unwrap();
        assert_eq!(tax.vertex(v0).parents, vec![tax.vertex_of(e(1)).unwrap()]);
    }
}
