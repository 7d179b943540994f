//! KB facade for the Strix DL reasoner
//!
//! This crate ties the subsystems together behind the reasoning kernel:
//! axiom loading with absorption, the status machine, consistency and
//! subsumption queries, classification and realization, and the textual
//! state-dump format.

pub mod kernel;
pub mod saveload;
pub mod tbox;

pub use kernel::{KbStatus, KernelOptions, ReasoningKernel};
pub use tbox::{Concept, Individual};

use strix_data::DataTypeError;
use strix_roles::RoleBoxError;
use thiserror::Error;

/// Typed failures surfaced at the KB API boundary
///
/// Clashes inside the tableau are never errors; only logic-level
/// impossibilities and misuse reach this type.
#[derive(Error, Debug)]
pub enum KernelError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("undefined name '{0}'")]
    UndefinedName(String),

    #[error("role box inconsistency: {0}")]
    RoleBox(#[from] RoleBoxError),

    #[error("datatype misuse: {0}")]
    Datatype(#[from] DataTypeError),

    #[error("knowledge base is inconsistent")]
    Inconsistent,

    #[error("knowledge base could not be classified")]
    NotClassified,

    #[error("save/load error: {0}")]
    SaveLoad(String),

    #[error("query cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}
