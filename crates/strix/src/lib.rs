//! # Strix - Tableau-Based Description Logic Reasoner
//!
//! Strix answers satisfiability, subsumption, classification, realization
//! and instance-retrieval queries over SROIQ(D)-style knowledge bases:
//! boolean concept constructors, qualified number restrictions, nominals,
//! inverse/transitive/reflexive roles, role hierarchies and compositions,
//! functional roles, and datatypes with facets.
//!
//! ## Quick Start
//!
//! ```rust
//! use strix::prelude::*;
//!
//! let mut kernel = ReasoningKernel::new();
//! let cat = kernel.concept("Cat");
//! let animal = kernel.concept("Animal");
//! kernel.tell_implies(Expr::Concept(cat), Expr::Concept(animal));
//!
//! assert!(kernel.is_subsumed_by(&Expr::Concept(cat), &Expr::Concept(animal)).unwrap());
//! ```
//!
//! ## Architecture
//!
//! Strix consists of several specialized crates:
//!
//! - **`strix-core`**: bipolar pointers, dependency sets, SNF expressions and the term DAG
//! - **`strix-roles`**: role hierarchy, disjointness bitmaps and composition automata
//! - **`strix-data`**: the datatype constraint solver
//! - **`strix-tableau`**: completion graph and the expansion-rule engine
//! - **`strix-taxonomy`**: two-phase classification
//! - **`strix-kernel`**: the KB facade and state dumps
//! - **`strix-cli`**: command-line tools

pub use strix_core as core;
pub use strix_data as data;
pub use strix_kernel as kernel;
pub use strix_roles as roles;
pub use strix_tableau as tableau;
pub use strix_taxonomy as taxonomy;

// Convenience re-exports for common types
pub use strix_core::{Bp, DataValue, Datatype, DepSet, Expr};
pub use strix_kernel::{KbStatus, KernelError, KernelOptions, ReasoningKernel};

// Commonly used external dependencies
pub use anyhow;
pub use serde;
pub use serde_json;

/// Prelude module for convenient imports
///
/// ```rust
/// use strix::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{Bp, DataValue, Datatype, DepSet, Expr};
    pub use crate::{KbStatus, KernelError, KernelOptions, ReasoningKernel};
    pub use serde::{Deserialize, Serialize};
}

/// Current version of Strix
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
