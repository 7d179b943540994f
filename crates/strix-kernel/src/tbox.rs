//! Named concepts and individuals
//!
//! Concepts carry their absorbed definition; individuals carry their
//! asserted types. Everything else about them lives in the shared
//! [`NamedEntry`] record.

use strix_core::{ConceptId, EntryId, Expr, NamedEntry, NamedItem};

/// A named concept with its absorbed definition
///
/// A primitive concept's definition collects necessary conditions
/// (`C ⊑ def`); a non-primitive one is defined exactly (`C ≡ def`).
#[derive(Debug, Clone)]
pub struct Concept {
    entry: NamedEntry,
    pub definition: Option<Expr>,
}

impl NamedItem for Concept {
    fn build(entry: NamedEntry) -> Self {
        Concept { entry, definition: None }
    }

    fn named(&self) -> &NamedEntry {
        &self.entry
    }

    fn named_mut(&mut self) -> &mut NamedEntry {
        &mut self.entry
    }
}

impl Concept {
    pub fn name(&self) -> &str {
        self.entry.name()
    }

    pub fn is_primitive(&self) -> bool {
        self.entry.primitive
    }

    /// Add a necessary condition; turns into a conjunction over time
    pub fn add_desc(&mut self, expr: Expr) {
        self.definition = Some(match self.definition.take() {
            None => expr,
            Some(d) => Expr::snf_and(vec![d, expr]),
        });
    }

    /// Named conjuncts of the definition, used as told subsumers
    pub fn told_from_definition(&self) -> Vec<ConceptId> {
        fn collect(expr: &Expr, out: &mut Vec<ConceptId>) {
            match expr {
                Expr::Concept(id) => {
                    if !out.contains(id) {
                        out.push(*id);
                    }
                }
                Expr::And(parts) => {
                    for p in parts {
                        collect(p, out);
                    }
                }
                _ => {}
            }
        }
        let mut out = Vec::new();
        if let Some(d) = &self.definition {
            collect(d, &mut out);
        }
        out
    }

    /// A definition made of named conjuncts only
    pub fn has_named_definition(&self) -> bool {
        fn named_only(expr: &Expr) -> bool {
            match expr {
                Expr::Concept(_) | Expr::Top => true,
                Expr::And(parts) => parts.iter().all(named_only),
                _ => false,
            }
        }
        self.definition.as_ref().map(|d| named_only(d)).unwrap_or(true)
    }
}

/// A named individual with its asserted types
#[derive(Debug, Clone)]
pub struct Individual {
    entry: NamedEntry,
    pub types: Vec<Expr>,
}

impl NamedItem for Individual {
    fn build(entry: NamedEntry) -> Self {
        Individual { entry, types: Vec::new() }
    }

    fn named(&self) -> &NamedEntry {
        &self.entry
    }

    fn named_mut(&mut self) -> &mut NamedEntry {
        &mut self.entry
    }
}

impl Individual {
    pub fn name(&self) -> &str {
        self.entry.name()
    }

    /// Named asserted types, used as told subsumers during realization
    pub fn told_types(&self) -> Vec<EntryId> {
        let mut out = Vec::new();
        for t in &self.types {
            if let Expr::Concept(id) = t {
                let e = EntryId::Concept(*id);
                if !out.contains(&e) {
                    out.push(e);
                }
            }
        }
        out
    }
}
