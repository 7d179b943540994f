//! The datatype reasoner facade
//!
//! The tableau engine decodes concrete-domain DAG vertices into
//! [`DataEntry`] values and feeds them here together with their polarity and
//! dependency set. `check_clash` evaluates the four clash conditions and
//! returns the union of the contributing dependency sets.

use crate::appearance::DataTypeAppearance;
use strix_core::{DataInterval, DataValue, Datatype, DepSet};
use tracing::trace;

/// A decoded concrete-domain label
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataEntry {
    Value(DataValue),
    Type(Datatype),
    Expr(Datatype, DataInterval),
}

impl DataEntry {
    pub fn datatype(&self) -> Datatype {
        match self {
            DataEntry::Value(v) => v.datatype(),
            DataEntry::Type(dt) => *dt,
            DataEntry::Expr(dt, _) => *dt,
        }
    }
}

const ALL_DATATYPES: [Datatype; 3] = [Datatype::String, Datatype::Integer, Datatype::Boolean];

/// Per-node datatype constraint solver
///
/// One reasoner instance is shared across the whole tableau run; `clear` is
/// called at branch restoration so the engine can re-feed the surviving
/// labels in a batch.
#[derive(Debug)]
pub struct DataTypeReasoner {
    appearances: Vec<DataTypeAppearance>,
}

impl Default for DataTypeReasoner {
    fn default() -> Self {
        Self::new()
    }
}

impl DataTypeReasoner {
    pub fn new() -> DataTypeReasoner {
        DataTypeReasoner {
            appearances: ALL_DATATYPES.iter().map(|_| DataTypeAppearance::new()).collect(),
        }
    }

    fn slot(dt: Datatype) -> usize {
        ALL_DATATYPES.iter().position(|d| *d == dt).unwrap_or(0)
    }

    fn appearance_mut(&mut self, dt: Datatype) -> &mut DataTypeAppearance {
        &mut self.appearances[Self::slot(dt)]
    }

    /// Reset all appearance state; called at branch restoration
    pub fn clear(&mut self) {
        for a in &mut self.appearances {
            a.clear();
        }
    }

    /// Route one concrete-domain label into the appearance of its datatype
    pub fn add_data_entry(&mut self, positive: bool, entry: &DataEntry, dep: &DepSet) {
        trace!(?positive, ?entry, "datatype entry");
        let dt = entry.datatype();
        let appearance = self.appearance_mut(dt);
        match (positive, entry) {
            (true, DataEntry::Value(v)) => {
                appearance.set_ptype(dep);
                appearance.restrict_to_value(v, dep);
            }
            (false, DataEntry::Value(v)) => {
                appearance.add_neg_value(v.clone(), dep);
            }
            (true, DataEntry::Type(_)) => {
                appearance.set_ptype(dep);
            }
            (false, DataEntry::Type(_)) => {
                appearance.set_ntype(dep);
            }
            (true, DataEntry::Expr(_, facets)) => {
                appearance.set_ptype(dep);
                appearance.add_interval(facets, dep);
            }
            (false, DataEntry::Expr(_, facets)) => {
                if facets.is_unbounded() {
                    // the negation of the whole value space is type absence
                    appearance.set_ntype(dep);
                } else {
                    appearance.add_negated_interval(facets, dep);
                }
            }
        }
    }

    /// Evaluate the clash conditions; `Some` carries the clash set
    pub fn check_clash(&self) -> Option<DepSet> {
        // 1. same datatype present both positively and negatively
        for a in &self.appearances {
            if let (Some(p), Some(n)) = (&a.ptype, &a.ntype) {
                return Some(p.union(n));
            }
        }
        // 2. two incomparable datatypes both present positively
        let positives: Vec<&DepSet> =
            self.appearances.iter().filter_map(|a| a.ptype.as_ref()).collect();
        if positives.len() > 1 {
            let mut dep = DepSet::empty();
            for p in positives {
                dep.union_with(p);
            }
            return Some(dep);
        }
        for (i, a) in self.appearances.iter().enumerate() {
            let ptype = match &a.ptype {
                Some(p) => p,
                None => continue,
            };
            // 3. every interval of the present datatype is empty
            if let Some(mut dep) = a.min_max_clash() {
                dep.union_with(ptype);
                return Some(dep);
            }
            // 4. the negated values cover every remaining interval
            if let Some(mut dep) = a.covered_clash(ALL_DATATYPES[i]) {
                dep.union_with(ptype);
                return Some(dep);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(level: usize) -> DepSet {
        DepSet::single(level)
    }

    #[test]
    fn test_ptype_ntype_clash() {
        let mut r = DataTypeReasoner::new();
        r.add_data_entry(true, &DataEntry::Type(Datatype::Integer), &dep(1));
        r.add_data_entry(false, &DataEntry::Type(Datatype::Integer), &dep(2));
        let clash = r.check_clash().expect("clash");
        assert!(clash.contains(1) && clash.contains(2));
    }

    #[test]
    fn test_two_positive_types_clash() {
        let mut r = DataTypeReasoner::new();
        r.add_data_entry(true, &DataEntry::Value(DataValue::Int(1)), &dep(1));
        r.add_data_entry(true, &DataEntry::Value(DataValue::Str("x".into())), &dep(3));
        let clash = r.check_clash().expect("clash");
        assert!(clash.contains(1) && clash.contains(3));
    }

    #[test]
    fn test_value_against_interval() {
        let mut r = DataTypeReasoner::new();
        // age = 10 together with age ∈ [18, ∞)
        r.add_data_entry(true, &DataEntry::Value(DataValue::Int(10)), &dep(1));
        r.add_data_entry(
            true,
            &DataEntry::Expr(
                Datatype::Integer,
                DataInterval::at_least(DataValue::Int(18), false),
            ),
            &dep(2),
        );
        let clash = r.check_clash().expect("clash");
        assert!(clash.contains(1) && clash.contains(2));
    }

    #[test]
    fn test_consistent_value_in_interval() {
        let mut r = DataTypeReasoner::new();
        r.add_data_entry(true, &DataEntry::Value(DataValue::Int(30)), &dep(1));
        r.add_data_entry(
            true,
            &DataEntry::Expr(
                Datatype::Integer,
                DataInterval::at_least(DataValue::Int(18), false),
            ),
            &dep(2),
        );
        assert!(r.check_clash().is_none());
    }

    #[test]
    fn test_negated_value_forces_clash_on_singleton() {
        let mut r = DataTypeReasoner::new();
        r.add_data_entry(true, &DataEntry::Value(DataValue::Int(5)), &dep(1));
        r.add_data_entry(false, &DataEntry::Value(DataValue::Int(5)), &dep(2));
        let clash = r.check_clash().expect("clash");
        assert!(clash.contains(1) && clash.contains(2));
    }

    #[test]
    fn test_boolean_exhaustion() {
        let mut r = DataTypeReasoner::new();
        r.add_data_entry(true, &DataEntry::Type(Datatype::Boolean), &dep(1));
        r.add_data_entry(false, &DataEntry::Value(DataValue::Bool(false)), &dep(2));
        r.add_data_entry(false, &DataEntry::Value(DataValue::Bool(true)), &dep(3));
        let clash = r.check_clash().expect("boolean domain exhausted");
        assert!(clash.contains(2) && clash.contains(3));
    }

    #[test]
    fn test_clear_then_reuse() {
        let mut r = DataTypeReasoner::new();
        r.add_data_entry(true, &DataEntry::Value(DataValue::Int(1)), &dep(1));
        r.add_data_entry(false, &DataEntry::Value(DataValue::Int(1)), &dep(2));
        assert!(r.check_clash().is_some());
        r.clear();
        assert!(r.check_clash().is_none());
    }
}
