//! Taxonomy builder for the Strix DL reasoner
//!
//! The taxonomy is the transitively reduced subsumption DAG over primary
//! named entries, with ⊤ and ⊥ always present. Classification inserts one
//! entry at a time: told subsumers are classified first (cycles collapse to
//! synonyms), completely defined entries take the told shortcut, everything
//! else runs the two-phase top-down/bottom-up border search.

pub mod builder;
pub mod taxonomy;

pub use builder::{Classifier, TaxonomyBuilder};
pub use taxonomy::{ActorKind, Taxonomy, TaxonomyActor, TaxonomyVertex};
