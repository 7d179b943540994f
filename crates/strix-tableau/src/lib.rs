//! Completion graph and tableau engine for the Strix DL reasoner
//!
//! The completion graph is the partial model the tableau builds: arena
//! nodes carrying concept labels with dependency sets, paired directed arcs
//! carrying roles, an inequality relation, blocking, and O(1) save/restore
//! by arena truncation plus a rare-event log.
//!
//! The engine drives rule expansion over the graph, branches on
//! disjunctions and merge choices, and backtracks dependency-directed: a
//! clash names the branch levels that caused it and the engine jumps
//! straight to the deepest one.

pub mod engine;
pub mod graph;

pub use engine::{BranchKind, Outcome, TableauEngine, Unfolding};
pub use graph::{ArcId, CompletionGraph, ConceptWDep, NodeId, NodeKind};
