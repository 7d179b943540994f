//! Concept expressions in Simplified Normal Form
//!
//! Externally-facing constructors accept the full constructor set; the
//! normalizing `snf_*` builders rewrite everything into the four stored
//! connectives. Disjunction, existential restrictions and at-most
//! restrictions are derived forms:
//!
//! - `C ⊔ D  = ¬(¬C ⊓ ¬D)`
//! - `∃R.C   = ¬∀R.¬C`
//! - `≤n R.C = ¬(≥n+1 R.C)`, with `≤0 R.C = ∀R.¬C`

use crate::datavalue::{DataInterval, DataValue, Datatype};
use crate::ids::{ConceptId, IndividualId, RoleId};
use serde::{Deserialize, Serialize};

/// A concept expression; only `Not`, `And`, `Forall` and `AtLeast` appear as
/// non-atomic connectives
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    Top,
    Bottom,
    /// Named concept
    Concept(ConceptId),
    /// Nominal `{a}`
    Individual(IndividualId),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Forall(RoleId, Box<Expr>),
    AtLeast(u32, RoleId, Box<Expr>),
    /// Role projection: along `role`, successors satisfying the concept are
    /// also reachable via `proj_role`
    Proj(RoleId, Box<Expr>, RoleId),
    /// Membership in a concrete datatype
    DataType(Datatype),
    /// A concrete literal
    DataValue(DataValue),
    /// A facet restriction over a datatype
    DataExpr(Datatype, DataInterval),
}

impl Expr {
    /// `¬C`, collapsing double negation
    pub fn snf_not(c: Expr) -> Expr {
        match c {
            Expr::Top => Expr::Bottom,
            Expr::Bottom => Expr::Top,
            Expr::Not(inner) => *inner,
            other => Expr::Not(Box::new(other)),
        }
    }

    /// `C ⊓ D ⊓ …`, flattening nested conjunctions and dropping ⊤
    pub fn snf_and(parts: Vec<Expr>) -> Expr {
        let mut flat: Vec<Expr> = Vec::new();
        for part in parts {
            match part {
                Expr::Top => {}
                Expr::Bottom => return Expr::Bottom,
                Expr::And(inner) => {
                    for c in inner {
                        if !flat.contains(&c) {
                            flat.push(c);
                        }
                    }
                }
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }
        // a conjunct together with its negation is unsatisfiable
        for c in &flat {
            let neg = Expr::snf_not(c.clone());
            if flat.contains(&neg) {
                return Expr::Bottom;
            }
        }
        match flat.len() {
            0 => Expr::Top,
            1 => flat.pop().unwrap(),
            _ => Expr::And(flat),
        }
    }

    /// `C ⊔ D ⊔ …` as a derived form
    pub fn snf_or(parts: Vec<Expr>) -> Expr {
        let negated = parts.into_iter().map(Expr::snf_not).collect();
        Expr::snf_not(Expr::snf_and(negated))
    }

    /// `∀R.C`
    pub fn snf_forall(role: RoleId, c: Expr) -> Expr {
        match c {
            Expr::Top => Expr::Top,
            other => Expr::Forall(role, Box::new(other)),
        }
    }

    /// `∃R.C` as a derived form
    pub fn snf_exists(role: RoleId, c: Expr) -> Expr {
        Expr::snf_not(Expr::snf_forall(role, Expr::snf_not(c)))
    }

    /// `≥n R.C`
    pub fn snf_ge(n: u32, role: RoleId, c: Expr) -> Expr {
        if n == 0 {
            return Expr::Top;
        }
        match c {
            Expr::Bottom => Expr::Bottom,
            other => Expr::AtLeast(n, role, Box::new(other)),
        }
    }

    /// `≤n R.C` as a derived form
    pub fn snf_le(n: u32, role: RoleId, c: Expr) -> Expr {
        if n == 0 {
            Expr::snf_forall(role, Expr::snf_not(c))
        } else {
            Expr::snf_not(Expr::snf_ge(n + 1, role, c))
        }
    }

    /// Projection of `role` through `c` onto `proj_role`
    pub fn snf_proj(role: RoleId, c: Expr, proj_role: RoleId) -> Expr {
        match c {
            Expr::Bottom => Expr::Top,
            other => Expr::Proj(role, Box::new(other), proj_role),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r() -> RoleId {
        RoleId(0)
    }

    fn a() -> Expr {
        Expr::Concept(ConceptId(0))
    }

    fn b() -> Expr {
        Expr::Concept(ConceptId(1))
    }

    #[test]
    fn test_double_negation_collapses() {
        assert_eq!(Expr::snf_not(Expr::snf_not(a())), a());
        assert_eq!(Expr::snf_not(Expr::Top), Expr::Bottom);
    }

    #[test]
    fn test_and_flattens_and_dedups() {
        let nested = Expr::snf_and(vec![a(), Expr::snf_and(vec![b(), a()])]);
        assert_eq!(nested, Expr::And(vec![a(), b()]));
        assert_eq!(Expr::snf_and(vec![a(), Expr::Top]), a());
        assert_eq!(Expr::snf_and(vec![]), Expr::Top);
    }

    #[test]
    fn test_and_detects_complement_pair() {
        let c = Expr::snf_and(vec![a(), Expr::snf_not(a())]);
        assert_eq!(c, Expr::Bottom);
    }

    #[test]
    fn test_exists_is_negated_forall() {
        let e = Expr::snf_exists(r(), a());
        match e {
            Expr::Not(inner) => match *inner {
                Expr::Forall(role, c) => {
                    assert_eq!(role, r());
                    assert_eq!(*c, Expr::snf_not(a()));
                }
                other => panic!("expected forall, got {:?}", other),
            },
            other => panic!("expected negation, got {:?}", other),
        }
    }

    #[test]
    fn test_cardinality_boundaries() {
        assert_eq!(Expr::snf_ge(0, r(), a()), Expr::Top);
        assert_eq!(Expr::snf_le(0, r(), a()), Expr::snf_forall(r(), Expr::snf_not(a())));
        // ≤n is the negation of ≥n+1
        assert_eq!(
            Expr::snf_le(2, r(), a()),
            Expr::snf_not(Expr::snf_ge(3, r(), a()))
        );
    }

    #[test]
    fn test_trivial_forall_vanishes() {
        assert_eq!(Expr::snf_forall(r(), Expr::Top), Expr::Top);
    }
}
