//! The interned term DAG
//!
//! Every concept expression the reasoner touches is interned into a single
//! append-only DAG. Structural equality implies pointer equality, negation
//! is a sign flip on the bipolar pointer, and vertex 0 / vertex 1 are the
//! reserved invalid and ⊤ entries. The DAG only grows within a KB lifetime;
//! nothing is ever removed.

use crate::bipolar::Bp;
use crate::datavalue::{DataInterval, DataValue, Datatype};
use crate::expr::Expr;
use crate::ids::{ConceptId, IndividualId, RoleId};
use crate::sorts::SortPool;
use std::collections::HashMap;

/// An interned DAG vertex
///
/// `Not` never appears here: negation lives in the pointer sign. `Forall`
/// carries the role-automaton state it represents; state 0 is the automaton's
/// initial state and is what `Expr::Forall` interns to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DagEntry {
    /// Reserved vertex 0, never dereferenced
    Invalid,
    /// Reserved vertex 1
    Top,
    CName(ConceptId),
    IName(IndividualId),
    And(Vec<Bp>),
    Forall { role: RoleId, state: u32, concept: Bp },
    AtLeast { n: u32, role: RoleId, concept: Bp },
    Proj { role: RoleId, concept: Bp, proj_role: RoleId },
    DataType(Datatype),
    DataValue(DataValue),
    DataExpr { datatype: Datatype, facets: DataInterval },
}

#[derive(Debug, Clone)]
struct DagVertex {
    entry: DagEntry,
    /// merge-find sort key, see [`SortPool`]
    sort: u32,
    /// marks the `Forall(R,⊤)` vertex expressing functionality of R
    functional: bool,
}

/// Append-only interner for concept expressions
#[derive(Debug)]
pub struct TermDag {
    vertices: Vec<DagVertex>,
    table: HashMap<DagEntry, usize>,
    sorts: SortPool,
}

impl Default for TermDag {
    fn default() -> Self {
        Self::new()
    }
}

impl TermDag {
    pub fn new() -> TermDag {
        let mut dag = TermDag {
            vertices: Vec::new(),
            table: HashMap::new(),
            sorts: SortPool::new(),
        };
        // vertex 0 and 1 are pinned so that TOP == +1 and BOTTOM == -1
        dag.push(DagEntry::Invalid);
        dag.push(DagEntry::Top);
        dag
    }

    fn push(&mut self, entry: DagEntry) -> usize {
        let index = self.vertices.len();
        let sort = self.sorts.new_key();
        self.table.insert(entry.clone(), index);
        self.vertices.push(DagVertex { entry, sort, functional: false });
        index
    }

    /// Intern a single vertex, returning its positive pointer
    fn intern_entry(&mut self, entry: DagEntry) -> Bp {
        if let Some(&index) = self.table.get(&entry) {
            return Bp::pos(index);
        }
        let index = self.push(entry);
        // conjuncts live in the same sort as their conjunction
        if let DagEntry::And(children) = &self.vertices[index].entry {
            let child_sorts: Vec<u32> =
                children.iter().map(|c| self.vertices[c.index()].sort).collect();
            let own = self.vertices[index].sort;
            for s in child_sorts {
                self.sorts.merge(own, s);
            }
        }
        Bp::pos(index)
    }

    /// Intern an SNF expression
    ///
    /// Idempotent: structurally equal expressions intern to the same pointer.
    pub fn intern(&mut self, e: &Expr) -> Bp {
        match e {
            Expr::Top => Bp::TOP,
            Expr::Bottom => Bp::BOTTOM,
            Expr::Not(inner) => self.intern(inner).negate(),
            Expr::Concept(id) => self.intern_entry(DagEntry::CName(*id)),
            Expr::Individual(id) => self.intern_entry(DagEntry::IName(*id)),
            Expr::And(parts) => {
                let children: Vec<Bp> = parts.iter().map(|p| self.intern(p)).collect();
                self.intern_and(children)
            }
            Expr::Forall(role, c) => {
                let concept = self.intern(c);
                self.make_forall(*role, 0, concept)
            }
            Expr::AtLeast(n, role, c) => {
                let concept = self.intern(c);
                self.make_at_least(*n, *role, concept)
            }
            Expr::Proj(role, c, proj_role) => {
                let concept = self.intern(c);
                self.intern_entry(DagEntry::Proj {
                    role: *role,
                    concept,
                    proj_role: *proj_role,
                })
            }
            Expr::DataType(dt) => self.intern_entry(DagEntry::DataType(*dt)),
            Expr::DataValue(v) => self.intern_entry(DagEntry::DataValue(v.clone())),
            Expr::DataExpr(dt, facets) => self.intern_entry(DagEntry::DataExpr {
                datatype: *dt,
                facets: facets.clone(),
            }),
        }
    }

    /// Intern a conjunction of already-interned pointers
    ///
    /// Flattens nested positive conjunctions, drops ⊤ and duplicates,
    /// collapses complementary pairs to ⊥.
    pub fn intern_and(&mut self, children: Vec<Bp>) -> Bp {
        let mut flat: Vec<Bp> = Vec::new();
        let mut stack: Vec<Bp> = children.into_iter().rev().collect();
        while let Some(bp) = stack.pop() {
            if bp == Bp::TOP {
                continue;
            }
            if bp == Bp::BOTTOM {
                return Bp::BOTTOM;
            }
            if bp.is_positive() {
                if let DagEntry::And(inner) = self.entry(bp) {
                    let inner = inner.clone();
                    for c in inner.into_iter().rev() {
                        stack.push(c);
                    }
                    continue;
                }
            }
            if flat.contains(&bp.negate()) {
                return Bp::BOTTOM;
            }
            if !flat.contains(&bp) {
                flat.push(bp);
            }
        }
        match flat.len() {
            0 => Bp::TOP,
            1 => flat[0],
            _ => self.intern_entry(DagEntry::And(flat)),
        }
    }

    /// Intern `∀R.C` for a given automaton state
    pub fn make_forall(&mut self, role: RoleId, state: u32, concept: Bp) -> Bp {
        if concept == Bp::TOP {
            return Bp::TOP;
        }
        self.intern_entry(DagEntry::Forall { role, state, concept })
    }

    /// Intern `≥n R.C`
    pub fn make_at_least(&mut self, n: u32, role: RoleId, concept: Bp) -> Bp {
        if n == 0 {
            return Bp::TOP;
        }
        if concept == Bp::BOTTOM {
            return Bp::BOTTOM;
        }
        self.intern_entry(DagEntry::AtLeast { n, role, concept })
    }

    /// Vertex expressing functionality of `role`
    ///
    /// Interned as a flagged `∀R.⊤` vertex; plain expressions never produce
    /// that shape because `snf_forall` collapses it to ⊤, so the flag cannot
    /// leak into ordinary concepts.
    pub fn functional_vertex(&mut self, role: RoleId) -> Bp {
        let entry = DagEntry::Forall { role, state: 0, concept: Bp::TOP };
        let bp = self.intern_entry(entry);
        self.vertices[bp.index()].functional = true;
        bp
    }

    /// Check the functionality flag of a vertex
    pub fn is_functional_vertex(&self, bp: Bp) -> bool {
        self.vertices[bp.index()].functional
    }

    /// View the vertex a pointer refers to
    pub fn entry(&self, bp: Bp) -> &DagEntry {
        &self.vertices[bp.index()].entry
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        // the two reserved vertices are always present
        false
    }

    // sort handling

    /// Allocate a sort key not attached to any vertex (role domains/ranges)
    pub fn new_sort_key(&mut self) -> u32 {
        self.sorts.new_key()
    }

    pub fn merge_sorts(&mut self, a: u32, b: u32) {
        self.sorts.merge(a, b);
    }

    pub fn merge_vertex_sorts(&mut self, a: Bp, b: Bp) {
        let sa = self.vertices[a.index()].sort;
        let sb = self.vertices[b.index()].sort;
        self.sorts.merge(sa, sb);
    }

    pub fn merge_vertex_sort_with(&mut self, bp: Bp, key: u32) {
        let s = self.vertices[bp.index()].sort;
        self.sorts.merge(s, key);
    }

    /// Check whether two expressions can interact at all
    pub fn same_sort(&self, a: Bp, b: Bp) -> bool {
        self.sorts.same(
            self.vertices[a.index()].sort,
            self.vertices[b.index()].sort,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concept(n: usize) -> Expr {
        Expr::Concept(ConceptId(n))
    }

    #[test]
    fn test_interning_is_idempotent() {
        let mut dag = TermDag::new();
        let e = Expr::snf_and(vec![concept(0), Expr::snf_forall(RoleId(0), concept(1))]);
        let p1 = dag.intern(&e);
        let p2 = dag.intern(&e);
        assert_eq!(p1, p2);
    }

    #[test]
    fn test_negation_through_pointer() {
        let mut dag = TermDag::new();
        let c = concept(0);
        let p = dag.intern(&c);
        let np = dag.intern(&Expr::snf_not(c));
        assert_eq!(np, p.negate());
        assert_eq!(np.negate(), p);
    }

    #[test]
    fn test_and_flattening_and_duplicates() {
        let mut dag = TermDag::new();
        let nested = Expr::And(vec![
            concept(0),
            Expr::And(vec![concept(1), concept(0)]),
        ]);
        let flat = Expr::And(vec![concept(0), concept(1)]);
        assert_eq!(dag.intern(&nested), dag.intern(&flat));
    }

    #[test]
    fn test_and_complement_collapses_to_bottom() {
        let mut dag = TermDag::new();
        let a = dag.intern(&concept(0));
        assert_eq!(dag.intern_and(vec![a, a.negate()]), Bp::BOTTOM);
    }

    #[test]
    fn test_top_constants() {
        let mut dag = TermDag::new();
        assert_eq!(dag.intern(&Expr::Top), Bp::TOP);
        assert_eq!(dag.intern(&Expr::Bottom), Bp::BOTTOM);
        assert_eq!(dag.intern(&Expr::snf_not(Expr::Top)), Bp::BOTTOM);
    }

    #[test]
    fn test_functional_vertex_does_not_collide() {
        let mut dag = TermDag::new();
        // ∀R.⊤ as a user expression is ⊤ and never reaches the DAG
        assert_eq!(dag.intern(&Expr::snf_forall(RoleId(0), Expr::Top)), Bp::TOP);
        let f = dag.functional_vertex(RoleId(0));
        assert_ne!(f, Bp::TOP);
        assert!(dag.is_functional_vertex(f));
    }

    #[test]
    fn test_conjunction_merges_sorts() {
        let mut dag = TermDag::new();
        let a = dag.intern(&concept(0));
        let b = dag.intern(&concept(1));
        let c = dag.intern(&concept(2));
        assert!(!dag.same_sort(a, b));
        dag.intern(&Expr::snf_and(vec![concept(0), concept(1)]));
        assert!(dag.same_sort(a, b));
        assert!(!dag.same_sort(a, c));
    }
}
