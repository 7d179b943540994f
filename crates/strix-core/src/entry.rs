//! Named entries and their collections
//!
//! A named entry is anything classifiable: a concept, an individual or a
//! role. The record keeps the syntactic (told) subsumers gathered while
//! loading axioms, the synonym link established when reasoning proves two
//! names equivalent, and the back link into the taxonomy once the entry is
//! classified.

use crate::bipolar::Bp;
use crate::ids::{EntryId, TaxVertexId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Shared state of every classifiable entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedEntry {
    name: String,
    /// signed id; system entries (⊤, ⊥) are negative
    id: i32,
    /// super-entries read off the axioms, before any reasoning
    pub told: Vec<EntryId>,
    /// `Some` once this entry was proven equal to another; resolution is
    /// transitive
    pub synonym: Option<EntryId>,
    /// vertex in the taxonomy once classified
    pub tax_vertex: Option<TaxVertexId>,
    pub classified: bool,
    pub completely_defined: bool,
    /// primitive = only necessary conditions known
    pub primitive: bool,
    /// DAG pointer of the entry itself, once interned
    pub bp: Bp,
}

impl NamedEntry {
    pub fn new(name: impl Into<String>, id: i32) -> NamedEntry {
        NamedEntry {
            name: name.into(),
            id,
            told: Vec::new(),
            synonym: None,
            tax_vertex: None,
            classified: false,
            completely_defined: false,
            primitive: true,
            bp: Bp::INVALID,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    /// System entries are built in, never user-declared
    pub fn is_system(&self) -> bool {
        self.id < 0
    }

    pub fn is_synonym(&self) -> bool {
        self.synonym.is_some()
    }

    pub fn add_told(&mut self, parent: EntryId) {
        if !self.told.contains(&parent) {
            self.told.push(parent);
        }
    }
}

/// Anything owning a [`NamedEntry`]
pub trait NamedItem {
    fn build(entry: NamedEntry) -> Self;
    fn named(&self) -> &NamedEntry;
    fn named_mut(&mut self) -> &mut NamedEntry;
}

/// Name-indexed arena of named items
///
/// Ids are dense indices; the name map makes `get_or_create` idempotent.
/// Entries are never removed before the whole KB is released.
#[derive(Debug, Clone)]
pub struct NamedCollection<T> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T: NamedItem> NamedCollection<T> {
    pub fn new() -> NamedCollection<T> {
        NamedCollection { items: Vec::new(), index: HashMap::new() }
    }

    /// Look up or register a name; the id is stable for the KB lifetime
    pub fn get_or_create(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        let i = self.items.len();
        self.index.insert(name.to_string(), i);
        self.items.push(T::build(NamedEntry::new(name, i as i32)));
        i
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn get(&self, i: usize) -> &T {
        &self.items[i]
    }

    pub fn get_mut(&mut self, i: usize) -> &mut T {
        &mut self.items[i]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }

    /// Follow synonym links to the primary entry
    pub fn resolve_synonym(&self, mut i: usize, project: impl Fn(EntryId) -> Option<usize>) -> usize {
        loop {
            match self.items[i].named().synonym.and_then(&project) {
                Some(next) if next != i => i = next,
                _ => return i,
            }
        }
    }
}

impl<T: NamedItem> Default for NamedCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}
