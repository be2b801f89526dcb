//! Host-side input values handed to the data serializer.
//!
//! `DataValue` is a tagged variant over integer, real, and boolean scalars and
//! nested arrays of those. Arrays are not required to be rectangular at
//! construction time; `shape()` performs the rectangularity check before any
//! encoding happens.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataValue {
    Int(i64),
    Real(f64),
    Bool(bool),
    Array(Vec<DataValue>),
}

/// Element kind of a rectangular value, after promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Int,
    Real,
    /// Zero-length arrays carry no element kind.
    Empty,
}

impl DataValue {
    pub fn is_scalar(&self) -> bool {
        !matches!(self, DataValue::Array(_))
    }

    /// Dimension sizes of this value, outermost first. Scalars have an empty
    /// shape. Fails with a description of the first ragged axis found.
    pub fn shape(&self) -> Result<Vec<usize>, String> {
        self.shape_at(0)
    }

    fn shape_at(&self, axis: usize) -> Result<Vec<usize>, String> {
        let items = match self {
            DataValue::Array(items) => items,
            _ => return Ok(Vec::new()),
        };
        let Some(first) = items.first() else {
            return Ok(vec![0]);
        };
        let inner = first.shape_at(axis + 1)?;
        for (i, item) in items.iter().enumerate().skip(1) {
            let other = item.shape_at(axis + 1)?;
            if other != inner {
                return Err(format!(
                    "ragged array at axis {}: element 0 has shape {:?} but element {} has shape {:?}",
                    axis, inner, i, other
                ));
            }
        }
        let mut shape = Vec::with_capacity(inner.len() + 1);
        shape.push(items.len());
        shape.extend(inner);
        Ok(shape)
    }

    /// Element kind across all leaves. Booleans count as integers; any real
    /// leaf makes the whole value real.
    pub fn element_kind(&self) -> ElementKind {
        match self {
            DataValue::Int(_) | DataValue::Bool(_) => ElementKind::Int,
            DataValue::Real(_) => ElementKind::Real,
            DataValue::Array(items) => {
                let mut kind = ElementKind::Empty;
                for item in items {
                    match (kind, item.element_kind()) {
                        (_, ElementKind::Real) => return ElementKind::Real,
                        (ElementKind::Empty, ElementKind::Int) => kind = ElementKind::Int,
                        _ => {}
                    }
                }
                kind
            }
        }
    }

    /// Leaves in row-major order.
    pub fn leaves(&self) -> Vec<&DataValue> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a DataValue>) {
        match self {
            DataValue::Array(items) => {
                for item in items {
                    item.collect_leaves(out);
                }
            }
            leaf => out.push(leaf),
        }
    }
}

impl From<i64> for DataValue {
    fn from(v: i64) -> Self {
        DataValue::Int(v)
    }
}

impl From<i32> for DataValue {
    fn from(v: i32) -> Self {
        DataValue::Int(v as i64)
    }
}

impl From<f64> for DataValue {
    fn from(v: f64) -> Self {
        DataValue::Real(v)
    }
}

impl From<bool> for DataValue {
    fn from(v: bool) -> Self {
        DataValue::Bool(v)
    }
}

impl<T: Into<DataValue>> From<Vec<T>> for DataValue {
    fn from(v: Vec<T>) -> Self {
        DataValue::Array(v.into_iter().map(Into::into).collect())
    }
}

/// Ordered name → value mapping. Insertion order is preserved so the written
/// file is stable; duplicate names are representable here and rejected by the
/// serializer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataMap {
    entries: Vec<(String, DataValue)>,
}

impl DataMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Does not check for duplicates.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<DataValue>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<DataValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// First entry with the given name.
    pub fn get(&self, name: &str) -> Option<&DataValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_shape_is_empty() {
        assert_eq!(DataValue::Int(3).shape().unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn matrix_shape() {
        let m = DataValue::from(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        assert_eq!(m.shape().unwrap(), vec![2, 3]);
        assert_eq!(m.element_kind(), ElementKind::Real);
    }

    #[test]
    fn ragged_rows_are_reported() {
        let m = DataValue::from(vec![vec![1, 2, 3], vec![4, 5]]);
        let err = m.shape().unwrap_err();
        assert!(err.contains("ragged"), "{err}");
    }

    #[test]
    fn scalar_mixed_with_array_is_ragged() {
        let m = DataValue::Array(vec![DataValue::Int(1), DataValue::from(vec![2, 3])]);
        assert!(m.shape().is_err());
    }

    #[test]
    fn empty_array_shape() {
        let e = DataValue::Array(vec![]);
        assert_eq!(e.shape().unwrap(), vec![0]);
        assert_eq!(e.element_kind(), ElementKind::Empty);
    }

    #[test]
    fn bools_count_as_ints() {
        let v = DataValue::from(vec![true, false]);
        assert_eq!(v.element_kind(), ElementKind::Int);
        let mixed = DataValue::Array(vec![DataValue::Int(1), DataValue::Real(0.5)]);
        assert_eq!(mixed.element_kind(), ElementKind::Real);
    }
}
