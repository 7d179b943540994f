//! Bipolar pointers: signed handles into the term DAG
//!
//! A bipolar pointer identifies a DAG vertex together with a polarity. The
//! positive pointer `+p` denotes the vertex itself, the negative pointer
//! `-p` its negation, so negating a pointer is a sign flip and never touches
//! the DAG. Vertex 0 is the reserved invalid entry and vertex 1 is ⊤, which
//! gives the two constants `TOP = +1` and `BOTTOM = -1` with
//! `-TOP == BOTTOM`.

use serde::{Deserialize, Serialize};

/// Signed handle identifying a DAG vertex with polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Bp(i32);

impl Bp {
    /// Sentinel that is never dereferenced
    pub const INVALID: Bp = Bp(0);
    /// The top concept ⊤
    pub const TOP: Bp = Bp(1);
    /// The bottom concept ⊥ (the negation of ⊤)
    pub const BOTTOM: Bp = Bp(-1);

    /// Positive pointer to the vertex at `index`
    pub fn pos(index: usize) -> Bp {
        Bp(index as i32)
    }

    /// Flip the polarity
    pub fn negate(self) -> Bp {
        Bp(-self.0)
    }

    /// Index of the vertex this pointer refers to
    pub fn index(self) -> usize {
        self.0.unsigned_abs() as usize
    }

    /// Check the polarity
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Check against the invalid sentinel
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl std::ops::Neg for Bp {
    type Output = Bp;

    fn neg(self) -> Bp {
        self.negate()
    }
}

impl std::fmt::Display for Bp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:+}", self.0)
    }
}
