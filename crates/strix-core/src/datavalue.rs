//! Concrete-domain values and facet intervals
//!
//! The datatype sub-reasoner works over a small closed set of datatypes.
//! Values are totally ordered within their own datatype and incomparable
//! across datatypes; facet expressions restrict a datatype to an interval.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Supported concrete datatypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Datatype {
    String,
    Integer,
    Boolean,
}

impl Datatype {
    /// Datatypes with finitely many values between any two bounds
    pub fn is_enumerable(self) -> bool {
        matches!(self, Datatype::Integer | Datatype::Boolean)
    }

    pub fn name(self) -> &'static str {
        match self {
            Datatype::String => "string",
            Datatype::Integer => "integer",
            Datatype::Boolean => "boolean",
        }
    }
}

impl std::fmt::Display for Datatype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed literal value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl DataValue {
    pub fn datatype(&self) -> Datatype {
        match self {
            DataValue::Str(_) => Datatype::String,
            DataValue::Int(_) => Datatype::Integer,
            DataValue::Bool(_) => Datatype::Boolean,
        }
    }

    /// Order within a single datatype; values of different datatypes are
    /// incomparable
    pub fn compare(&self, other: &DataValue) -> Option<Ordering> {
        match (self, other) {
            (DataValue::Str(a), DataValue::Str(b)) => Some(a.cmp(b)),
            (DataValue::Int(a), DataValue::Int(b)) => Some(a.cmp(b)),
            (DataValue::Bool(a), DataValue::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Successor of a value in an enumerable datatype
    pub fn successor(&self) -> Option<DataValue> {
        match self {
            DataValue::Int(v) => v.checked_add(1).map(DataValue::Int),
            DataValue::Bool(false) => Some(DataValue::Bool(true)),
            _ => None,
        }
    }
}

impl std::fmt::Display for DataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataValue::Str(s) => write!(f, "{:?}", s),
            DataValue::Int(v) => write!(f, "{}", v),
            DataValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// One endpoint of a facet interval
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bound {
    pub value: DataValue,
    pub exclusive: bool,
}

/// A facet restriction: an interval over a single datatype
///
/// `None` endpoints are unbounded. Both endpoints, when present, carry the
/// interval's datatype.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataInterval {
    pub min: Option<Bound>,
    pub max: Option<Bound>,
}

impl DataInterval {
    pub fn unbounded() -> DataInterval {
        DataInterval { min: None, max: None }
    }

    /// Interval containing exactly one value
    pub fn singleton(value: DataValue) -> DataInterval {
        DataInterval {
            min: Some(Bound { value: value.clone(), exclusive: false }),
            max: Some(Bound { value, exclusive: false }),
        }
    }

    pub fn at_least(value: DataValue, exclusive: bool) -> DataInterval {
        DataInterval { min: Some(Bound { value, exclusive }), max: None }
    }

    pub fn at_most(value: DataValue, exclusive: bool) -> DataInterval {
        DataInterval { min: None, max: Some(Bound { value, exclusive }) }
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Tighten the min endpoint; true if the interval changed
    pub fn update_min(&mut self, value: &DataValue, exclusive: bool) -> bool {
        let tighter = match &self.min {
            None => true,
            Some(b) => match b.value.compare(value) {
                Some(Ordering::Less) => true,
                Some(Ordering::Equal) => exclusive && !b.exclusive,
                _ => false,
            },
        };
        if tighter {
            self.min = Some(Bound { value: value.clone(), exclusive });
        }
        tighter
    }

    /// Tighten the max endpoint; true if the interval changed
    pub fn update_max(&mut self, value: &DataValue, exclusive: bool) -> bool {
        let tighter = match &self.max {
            None => true,
            Some(b) => match b.value.compare(value) {
                Some(Ordering::Greater) => true,
                Some(Ordering::Equal) => exclusive && !b.exclusive,
                _ => false,
            },
        };
        if tighter {
            self.max = Some(Bound { value: value.clone(), exclusive });
        }
        tighter
    }

    /// Check whether the interval admits no value at all
    pub fn is_empty(&self) -> bool {
        let (min, max) = match (&self.min, &self.max) {
            (Some(min), Some(max)) => (min, max),
            _ => return false,
        };
        match min.value.compare(&max.value) {
            Some(Ordering::Greater) => true,
            Some(Ordering::Equal) => min.exclusive || max.exclusive,
            Some(Ordering::Less) => {
                // an open integer interval like (3,4) holds nothing
                if min.exclusive && max.exclusive {
                    if let (DataValue::Int(a), DataValue::Int(b)) = (&min.value, &max.value) {
                        return a + 1 == *b;
                    }
                }
                false
            }
            None => false,
        }
    }

    pub fn contains(&self, value: &DataValue) -> bool {
        if let Some(min) = &self.min {
            match min.value.compare(value) {
                Some(Ordering::Less) => {}
                Some(Ordering::Equal) if !min.exclusive => {}
                _ => return false,
            }
        }
        if let Some(max) = &self.max {
            match value.compare(&max.value) {
                Some(Ordering::Less) => {}
                Some(Ordering::Equal) if !max.exclusive => {}
                _ => return false,
            }
        }
        true
    }

    /// Enumerate the values of a closed enumerable interval, up to `limit`
    ///
    /// Returns `None` for non-enumerable datatypes, unbounded intervals or
    /// intervals wider than `limit`.
    pub fn enumerate(&self, limit: usize) -> Option<Vec<DataValue>> {
        let min = self.min.as_ref()?;
        let max = self.max.as_ref()?;
        if !min.value.datatype().is_enumerable() {
            return None;
        }
        let mut current = if min.exclusive { min.value.successor()? } else { min.value.clone() };
        let mut out = Vec::new();
        loop {
            match current.compare(&max.value) {
                Some(Ordering::Less) => {}
                Some(Ordering::Equal) if !max.exclusive => {
                    out.push(current);
                    return Some(out);
                }
                _ => return Some(out),
            }
            out.push(current.clone());
            if out.len() > limit {
                return None;
            }
            current = current.successor()?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_type_values_incomparable() {
        assert_eq!(DataValue::Int(1).compare(&DataValue::Str("1".into())), None);
    }

    #[test]
    fn test_update_min_tightens_only() {
        let mut i = DataInterval::at_least(DataValue::Int(5), false);
        assert!(!i.update_min(&DataValue::Int(3), false));
        assert!(i.update_min(&DataValue::Int(8), false));
        assert!(i.contains(&DataValue::Int(8)));
        assert!(!i.contains(&DataValue::Int(7)));
    }

    #[test]
    fn test_empty_intervals() {
        let mut i = DataInterval::at_least(DataValue::Int(10), false);
        i.update_max(&DataValue::Int(5), false);
        assert!(i.is_empty());

        let mut open = DataInterval::at_least(DataValue::Int(3), true);
        open.update_max(&DataValue::Int(4), true);
        assert!(open.is_empty());

        let point = DataInterval::singleton(DataValue::Int(3));
        assert!(!point.is_empty());
    }

    #[test]
    fn test_enumerate_closed_integer_interval() {
        let mut i = DataInterval::at_least(DataValue::Int(1), false);
        i.update_max(&DataValue::Int(3), false);
        let vals = i.enumerate(16).unwrap();
        assert_eq!(vals, vec![DataValue::Int(1), DataValue::Int(2), DataValue::Int(3)]);
    }

    #[test]
    fn test_enumerate_rejects_strings() {
        let i = DataInterval::singleton(DataValue::Str("a".into()));
        assert!(i.enumerate(16).is_none());
    }
}
