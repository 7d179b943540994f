//! Datatype sub-reasoner for the Strix DL reasoner
//!
//! During tableau expansion every concrete-domain label of a node is routed
//! here. Per datatype the reasoner keeps an appearance record: positive and
//! negative type presence, a list of dependency-carrying intervals, and
//! negated singleton values. A clash is reported as a dependency set that
//! unions the contributors, never as an error.

pub mod appearance;
pub mod reasoner;

pub use appearance::{DataTypeAppearance, DepInterval};
pub use reasoner::{DataEntry, DataTypeReasoner};

use thiserror::Error;

/// Static misuse of the concrete domain, reported at axiom level
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataTypeError {
    #[error("value {0} does not belong to datatype {1}")]
    ValueOutsideDatatype(String, String),

    #[error("facet bounds of a {0} restriction use a different datatype")]
    MixedFacetDatatype(String),
}
