//! Role box for the Strix DL reasoner
//!
//! This crate owns everything the reasoner knows about roles:
//! - the role arena with built-in inverse pairing
//! - told hierarchy and its ancestor/descendant closure
//! - transitivity, reflexivity, functionality, simplicity
//! - role disjointness with symmetric sub-role closure
//! - complex role inclusions compiled into role automata

pub mod automaton;
pub mod role;
pub mod rolebox;

pub use automaton::{RoleAutomaton, Transition};
pub use role::Role;
pub use rolebox::{RoleBox, RoleSnapshot};

use thiserror::Error;

/// Errors detected while building or finalizing the role box
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoleBoxError {
    #[error("role '{0}' is functional but not simple")]
    FunctionalNonSimple(String),

    #[error("disjoint roles '{0}' and '{1}' share a descendant")]
    DisjointWithCommonDescendant(String, String),

    #[error("data role '{0}' cannot be transitive")]
    TransitiveDataRole(String),

    #[error("data role '{0}' cannot appear in a role composition")]
    DataRoleInComposition(String),

    #[error("invalid role composition for '{0}': the defined role may only appear first or last")]
    InvalidComposition(String),

    #[error("conflicting inverse declaration for role '{0}'")]
    ConflictingInverse(String),
}
