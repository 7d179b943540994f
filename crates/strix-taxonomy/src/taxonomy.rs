//! The taxonomy graph
//!
//! Vertices are arena-allocated; parent/child links are kept in both
//! directions and stay transitively reduced under insertion. Every vertex
//! has a primer (its primary entry) and may accumulate synonyms.

use std::collections::HashMap;
use strix_core::{EntryId, TaxVertexId};

/// One vertex of the subsumption DAG
#[derive(Debug, Clone)]
pub struct TaxonomyVertex {
    pub primer: EntryId,
    pub synonyms: Vec<EntryId>,
    pub parents: Vec<TaxVertexId>,
    pub children: Vec<TaxVertexId>,
}

/// Transitively reduced subsumption DAG between ⊤ and ⊥
#[derive(Debug)]
pub struct Taxonomy {
    vertices: Vec<TaxonomyVertex>,
    /// entry → vertex, covering primers and synonyms
    map: HashMap<EntryId, TaxVertexId>,
    top: TaxVertexId,
    bottom: TaxVertexId,
}

impl Taxonomy {
    /// A fresh taxonomy holding only ⊤ and ⊥
    pub fn new(top_entry: EntryId, bottom_entry: EntryId) -> Taxonomy {
        let top = TaxVertexId(0);
        let bottom = TaxVertexId(1);
        let mut map = HashMap::new();
        map.insert(top_entry, top);
        map.insert(bottom_entry, bottom);
        Taxonomy {
            vertices: vec![
                TaxonomyVertex {
                    primer: top_entry,
                    synonyms: Vec::new(),
                    parents: Vec::new(),
                    children: vec![bottom],
                },
                TaxonomyVertex {
                    primer: bottom_entry,
                    synonyms: Vec::new(),
                    parents: vec![top],
                    children: Vec::new(),
                },
            ],
            map,
            top,
            bottom,
        }
    }

    pub fn top(&self) -> TaxVertexId {
        self.top
    }

    pub fn bottom(&self) -> TaxVertexId {
        self.bottom
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn vertex(&self, id: TaxVertexId) -> &TaxonomyVertex {
        &self.vertices[id.0]
    }

    /// Vertex an entry was classified into, if any
    pub fn vertex_of(&self, e: EntryId) -> Option<TaxVertexId> {
        self.map.get(&e).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaxVertexId, &TaxonomyVertex)> {
        self.vertices.iter().enumerate().map(|(i, v)| (TaxVertexId(i), v))
    }

    /// Attach an entry as a synonym of an existing vertex
    pub fn add_synonym(&mut self, v: TaxVertexId, e: EntryId) {
        if self.vertices[v.0].primer != e && !self.vertices[v.0].synonyms.contains(&e) {
            self.vertices[v.0].synonyms.push(e);
        }
        self.map.insert(e, v);
    }

    /// Insert a new vertex between `parents` and `children`, keeping the
    /// graph transitively reduced
    pub fn insert(
        &mut self,
        primer: EntryId,
        parents: Vec<TaxVertexId>,
        children: Vec<TaxVertexId>,
    ) -> TaxVertexId {
        let id = TaxVertexId(self.vertices.len());
        // direct parent→child links crossed by the new vertex are redundant
        for &p in &parents {
            for &c in &children {
                self.vertices[p.0].children.retain(|x| *x != c);
                self.vertices[c.0].parents.retain(|x| *x != p);
            }
        }
        for &p in &parents {
            self.vertices[p.0].children.push(id);
        }
        for &c in &children {
            self.vertices[c.0].parents.push(id);
        }
        self.vertices.push(TaxonomyVertex {
            primer,
            synonyms: Vec::new(),
            parents,
            children,
        });
        self.map.insert(primer, id);
        id
    }

    /// All vertices at or below `from`
    pub fn descendants_of(&self, from: TaxVertexId) -> Vec<TaxVertexId> {
        let mut seen = vec![from];
        let mut stack = vec![from];
        while let Some(v) = stack.pop() {
            for &c in &self.vertices[v.0].children {
                if !seen.contains(&c) {
                    seen.push(c);
                    stack.push(c);
                }
            }
        }
        seen
    }

    /// All vertices at or above `from`
    pub fn ancestors_of(&self, from: TaxVertexId) -> Vec<TaxVertexId> {
        let mut seen = vec![from];
        let mut stack = vec![from];
        while let Some(v) = stack.pop() {
            for &p in &self.vertices[v.0].parents {
                if !seen.contains(&p) {
                    seen.push(p);
                    stack.push(p);
                }
            }
        }
        seen
    }

    /// Feed every entry of a vertex (primer and synonyms) to an actor
    pub fn apply_actor(&self, v: TaxVertexId, actor: &mut TaxonomyActor) {
        let vertex = &self.vertices[v.0];
        actor.try_entry(vertex.primer);
        for &s in &vertex.synonyms {
            actor.try_entry(s);
        }
    }
}

/// Which entry kind a traversal collects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorKind {
    Concepts,
    Individuals,
    ObjectRoles,
    DataRoles,
}

/// Collects entries of one kind during taxonomy walks
#[derive(Debug)]
pub struct TaxonomyActor {
    kind: ActorKind,
    pub found: Vec<EntryId>,
}

impl TaxonomyActor {
    pub fn new(kind: ActorKind) -> TaxonomyActor {
        TaxonomyActor { kind, found: Vec::new() }
    }

    pub fn try_entry(&mut self, e: EntryId) {
        let keep = matches!(
            (self.kind, e),
            (ActorKind::Concepts, EntryId::Concept(_))
                | (ActorKind::Individuals, EntryId::Individual(_))
                | (ActorKind::ObjectRoles, EntryId::Role(_))
                | (ActorKind::DataRoles, EntryId::Role(_))
        );
        if keep && !self.found.contains(&e) {
            self.found.push(e);
        }
    }
}
