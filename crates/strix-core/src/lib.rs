//! Core data model for the Strix DL reasoner
//!
//! This crate provides the building blocks shared by every reasoning
//! subsystem:
//! - bipolar pointers (signed DAG handles)
//! - dependency sets for dependency-directed backtracking
//! - SNF concept expressions and their normalizing constructors
//! - the interned term DAG
//! - named-entry records and collections

pub mod bipolar;
pub mod dag;
pub mod datavalue;
pub mod depset;
pub mod entry;
pub mod expr;
pub mod ids;
pub mod sorts;

pub use bipolar::Bp;
pub use dag::{DagEntry, TermDag};
pub use datavalue::{DataInterval, DataValue, Datatype};
pub use depset::DepSet;
pub use entry::{NamedCollection, NamedEntry, NamedItem};
pub use expr::Expr;
pub use ids::{ConceptId, EntryId, IndividualId, RoleId, TaxVertexId};
