//! Per-datatype appearance state
//!
//! One appearance accumulates everything a single node asserted about one
//! datatype during the current branch: type presence, interval constraints
//! and negated singletons. Intervals carry the dependency sets that justify
//! each border so a clash can name the branch levels responsible.

use strix_core::{DataInterval, DataValue, Datatype, DepSet};

/// A facet interval whose borders remember their justification
#[derive(Debug, Clone, Default)]
pub struct DepInterval {
    pub interval: DataInterval,
    pub min_dep: DepSet,
    pub max_dep: DepSet,
}

impl DepInterval {
    /// Tighten one border; records `dep` when the border moved
    pub fn update(&mut self, min: bool, exclusive: bool, value: &DataValue, dep: &DepSet) -> bool {
        let changed = if min {
            self.interval.update_min(value, exclusive)
        } else {
            self.interval.update_max(value, exclusive)
        };
        if changed {
            if min {
                self.min_dep = dep.clone();
            } else {
                self.max_dep = dep.clone();
            }
        }
        changed
    }

    /// Dependency set of both borders
    pub fn border_deps(&self) -> DepSet {
        self.min_dep.union(&self.max_dep)
    }
}

/// Appearance of one datatype on one node
#[derive(Debug, Clone, Default)]
pub struct DataTypeAppearance {
    /// positive presence of the datatype, with justification
    pub ptype: Option<DepSet>,
    /// negative presence of the datatype
    pub ntype: Option<DepSet>,
    /// disjunction-free interval constraints; starts as one unbounded interval
    pub constraints: Vec<DepInterval>,
    /// negated singleton values
    pub neg_values: Vec<(DataValue, DepSet)>,
}

impl DataTypeAppearance {
    pub fn new() -> DataTypeAppearance {
        let mut a = DataTypeAppearance::default();
        a.clear();
        a
    }

    /// Reset to the branch-initial state
    pub fn clear(&mut self) {
        self.ptype = None;
        self.ntype = None;
        self.constraints = vec![DepInterval::default()];
        self.neg_values.clear();
    }

    pub fn has_ptype(&self) -> bool {
        self.ptype.is_some()
    }

    pub fn has_ntype(&self) -> bool {
        self.ntype.is_some()
    }

    /// First positive appearance wins; later ones are implied by it
    pub fn set_ptype(&mut self, dep: &DepSet) {
        if self.ptype.is_none() {
            self.ptype = Some(dep.clone());
        }
    }

    pub fn set_ntype(&mut self, dep: &DepSet) {
        if self.ntype.is_none() {
            self.ntype = Some(dep.clone());
        }
    }

    pub fn add_neg_value(&mut self, value: DataValue, dep: &DepSet) {
        self.neg_values.push((value, dep.clone()));
    }

    /// Narrow every interval to the single value `v`
    pub fn restrict_to_value(&mut self, v: &DataValue, dep: &DepSet) {
        for c in &mut self.constraints {
            c.update(true, false, v, dep);
            c.update(false, false, v, dep);
        }
    }

    /// Intersect all intervals with a positive facet restriction
    pub fn add_interval(&mut self, facets: &DataInterval, dep: &DepSet) {
        for c in &mut self.constraints {
            if let Some(min) = &facets.min {
                c.update(true, min.exclusive, &min.value, dep);
            }
            if let Some(max) = &facets.max {
                c.update(false, max.exclusive, &max.value, dep);
            }
        }
    }

    /// Exclude a facet restriction: each interval splits around it
    pub fn add_negated_interval(&mut self, facets: &DataInterval, dep: &DepSet) {
        // a negated singleton is a plain excluded value
        if let (Some(min), Some(max)) = (&facets.min, &facets.max) {
            if !min.exclusive && !max.exclusive && min.value == max.value {
                self.add_neg_value(min.value.clone(), dep);
                return;
            }
        }
        let mut next: Vec<DepInterval> = Vec::new();
        for c in &self.constraints {
            // values below the excluded range
            if let Some(min) = &facets.min {
                let mut low = c.clone();
                low.update(false, !min.exclusive, &min.value, dep);
                next.push(low);
            }
            // values above the excluded range
            if let Some(max) = &facets.max {
                let mut high = c.clone();
                high.update(true, !max.exclusive, &max.value, dep);
                next.push(high);
            }
        }
        if !next.is_empty() {
            self.constraints = next;
        }
    }

    /// Clash set when every interval is unsatisfiable, `None` otherwise
    pub fn min_max_clash(&self) -> Option<DepSet> {
        let mut dep = DepSet::empty();
        for c in &self.constraints {
            if !c.interval.is_empty() {
                return None;
            }
            dep.union_with(&c.border_deps());
        }
        Some(dep)
    }

    /// Clash set when the negated values cover every interval of an
    /// enumerable datatype
    pub fn covered_clash(&self, datatype: Datatype) -> Option<DepSet> {
        if !datatype.is_enumerable() || self.neg_values.is_empty() {
            return None;
        }
        let mut dep = DepSet::empty();
        for c in &self.constraints {
            let mut interval = c.interval.clone();
            if datatype == Datatype::Boolean {
                // the boolean value space is bounded even without facets
                if interval.min.is_none() {
                    interval.update_min(&DataValue::Bool(false), false);
                }
                if interval.max.is_none() {
                    interval.update_max(&DataValue::Bool(true), false);
                }
            }
            let values = interval.enumerate(64)?;
            if values.is_empty() {
                dep.union_with(&c.border_deps());
                continue;
            }
            for v in values {
                let hit = self.neg_values.iter().find(|(nv, _)| *nv == v)?;
                dep.union_with(&hit.1);
            }
            dep.union_with(&c.border_deps());
        }
        Some(dep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(level: usize) -> DepSet {
        DepSet::single(level)
    }

    #[test]
    fn test_restrict_to_value_then_conflicting_interval() {
        let mut a = DataTypeAppearance::new();
        a.restrict_to_value(&DataValue::Int(10), &dep(1));
        a.add_interval(&DataInterval::at_least(DataValue::Int(18), false), &dep(2));
        let clash = a.min_max_clash().expect("interval should be empty");
        assert!(clash.contains(1));
        assert!(clash.contains(2));
    }

    #[test]
    fn test_negated_singleton_covers_point_interval() {
        let mut a = DataTypeAppearance::new();
        a.restrict_to_value(&DataValue::Int(3), &dep(1));
        a.add_neg_value(DataValue::Int(3), &dep(2));
        let clash = a.covered_clash(Datatype::Integer).expect("covered");
        assert!(clash.contains(1));
        assert!(clash.contains(2));
    }

    #[test]
    fn test_negated_values_cover_small_range() {
        let mut a = DataTypeAppearance::new();
        a.add_interval(
            &DataInterval {
                min: Some(strix_core::datavalue::Bound { value: DataValue::Int(1), exclusive: false }),
                max: Some(strix_core::datavalue::Bound { value: DataValue::Int(2), exclusive: false }),
            },
            &dep(1),
        );
        a.add_neg_value(DataValue::Int(1), &dep(2));
        assert!(a.covered_clash(Datatype::Integer).is_none());
        a.add_neg_value(DataValue::Int(2), &dep(3));
        let clash = a.covered_clash(Datatype::Integer).expect("covered");
        assert!(clash.contains(2) && clash.contains(3));
    }

    #[test]
    fn test_negated_interval_splits() {
        let mut a = DataTypeAppearance::new();
        // exclude [5,10]; 4 and 11 stay possible, 7 does not
        let excluded = DataInterval {
            min: Some(strix_core::datavalue::Bound { value: DataValue::Int(5), exclusive: false }),
            max: Some(strix_core::datavalue::Bound { value: DataValue::Int(10), exclusive: false }),
        };
        a.add_negated_interval(&excluded, &dep(1));
        assert!(a.constraints.iter().any(|c| c.interval.contains(&DataValue::Int(4))));
        assert!(a.constraints.iter().any(|c| c.interval.contains(&DataValue::Int(11))));
        assert!(!a.constraints.iter().all(|c| c.interval.contains(&DataValue::Int(7))));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut a = DataTypeAppearance::new();
        a.set_ptype(&dep(1));
        a.restrict_to_value(&DataValue::Int(1), &dep(1));
        a.add_neg_value(DataValue::Int(1), &dep(2));
        a.clear();
        assert!(!a.has_ptype());
        assert_eq!(a.constraints.len(), 1);
        assert!(a.neg_values.is_empty());
        assert!(a.min_max_clash().is_none());
    }
}
