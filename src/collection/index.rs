//! Index and Branch: positional collections filled in parallel

use super::{common_type, fill_all};
use crate::aggregator::Aggregator;
use crate::error::{Error, Result};
use crate::math;
use crate::traits::{admits, require_same, Container};
use crate::wire::{self, Fields, Payload};
use core::fmt;
use serde_json::Value as Json;

/// Fills every one of a list of same-type containers.
#[derive(Clone, Debug)]
pub struct Index<V> {
    entries: f64,
    values: Vec<V>,
}

impl<V: Container> Index<V> {
    /// Create an empty index; fails if `values` is empty or mixes container
    /// types.
    pub fn new(values: Vec<V>) -> Result<Self> {
        Self::ed(0.0, values)
    }

    /// Create an index holding accumulated state directly.
    pub fn ed(entries: f64, values: Vec<V>) -> Result<Self> {
        common_type("Index", values.iter())?;
        Ok(Self {
            entries: Error::check_entries(entries)?,
            values,
        })
    }

    pub fn get(&self, i: usize) -> Option<&V> {
        self.values.get(i)
    }

    pub fn values(&self) -> &[V] {
        &self.values
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }
}

impl<V: Container> Container for Index<V> {
    type Datum = V::Datum;

    fn name(&self) -> &'static str {
        "Index"
    }

    fn entries(&self) -> f64 {
        self.entries
    }

    fn zero(&self) -> Self {
        Self {
            entries: 0.0,
            values: self.values.iter().map(Container::zero).collect(),
        }
    }

    fn check_fill(&self, datum: &V::Datum) -> Result<()> {
        self.values.iter().try_for_each(|v| v.check_fill(datum))
    }

    fn fill(&mut self, datum: &V::Datum, weight: f64) -> Result<()> {
        if admits(weight) {
            fill_all(self.values.iter_mut(), datum, weight)?;
            self.entries += weight;
        }
        Ok(())
    }

    fn merge(&self, other: &Self) -> Result<Self> {
        require_same("Index", "size", &self.size(), &other.size())?;
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a.merge(b))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            entries: self.entries + other.entries,
            values,
        })
    }

    fn children(&self) -> Vec<&dyn Container<Datum = V::Datum>> {
        self.values
            .iter()
            .map(|v| v as &dyn Container<Datum = V::Datum>)
            .collect()
    }

    fn to_fragment(&self, _suppress_name: bool) -> Json {
        Payload::new()
            .float("entries", self.entries)
            .field("sub:type", Json::from(self.values[0].name()))
            .field(
                "data",
                Json::Array(self.values.iter().map(|v| v.to_fragment(false)).collect()),
            )
            .build()
    }

    fn from_fragment(type_name: &str, json: &Json, _name: Option<&str>) -> Result<Self> {
        wire::expect_type("Index", type_name)?;
        let fields = Fields::new("Index", json)?;
        fields.check_keys(&["entries", "sub:type", "data"], &[])?;
        let entries = fields.entries()?;
        let sub_type = fields.type_name("sub:type")?;
        let values = fields
            .array("data")?
            .iter()
            .map(|v| V::from_fragment(sub_type, v, None))
            .collect::<Result<Vec<_>>>()?;
        Self::ed(entries, values).map_err(|e| fields.error("data", e.to_string()))
    }
}

impl<V: PartialEq> PartialEq for Index<V> {
    fn eq(&self, other: &Self) -> bool {
        math::numeq(self.entries, other.entries) && self.values == other.values
    }
}

/// Fills every one of a list of containers of any types.
///
/// # Example
///
/// ```
/// use histoflow::aggregator::Aggregator;
/// use histoflow::collection::Branch;
/// use histoflow::leaf::{Count, Maximize};
/// use histoflow::quantity::Quantity;
/// use histoflow::traits::Container;
///
/// let mut branch = Branch::new(vec![
///     Aggregator::from(Count::new()),
///     Aggregator::from(Maximize::new(Quantity::<f64>::identity())),
/// ])
/// .unwrap();
/// branch.add(&3.0).unwrap();
/// branch.add(&8.0).unwrap();
/// assert_eq!(branch.get(0).unwrap().entries(), 2.0);
/// assert_eq!(branch.get(1).unwrap().name(), "Maximize");
/// ```
pub struct Branch<D> {
    entries: f64,
    values: Vec<Aggregator<D>>,
}

impl<D> Clone for Branch<D> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries,
            values: self.values.clone(),
        }
    }
}

impl<D> fmt::Debug for Branch<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Branch")
            .field("entries", &self.entries)
            .field("values", &self.values)
            .finish()
    }
}

impl<D> Branch<D> {
    /// Create an empty branch; fails if `values` is empty.
    pub fn new(values: Vec<Aggregator<D>>) -> Result<Self> {
        Self::ed(0.0, values)
    }

    /// Create a branch holding accumulated state directly.
    pub fn ed(entries: f64, values: Vec<Aggregator<D>>) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::construction("Branch needs at least one child"));
        }
        Ok(Self {
            entries: Error::check_entries(entries)?,
            values,
        })
    }

    pub fn get(&self, i: usize) -> Option<&Aggregator<D>> {
        self.values.get(i)
    }

    pub fn values(&self) -> &[Aggregator<D>] {
        &self.values
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }
}

impl<D> Container for Branch<D> {
    type Datum = D;

    fn name(&self) -> &'static str {
        "Branch"
    }

    fn entries(&self) -> f64 {
        self.entries
    }

    fn zero(&self) -> Self {
        Self {
            entries: 0.0,
            values: self.values.iter().map(Container::zero).collect(),
        }
    }

    fn check_fill(&self, datum: &D) -> Result<()> {
        self.values.iter().try_for_each(|v| v.check_fill(datum))
    }

    fn fill(&mut self, datum: &D, weight: f64) -> Result<()> {
        if admits(weight) {
            fill_all(self.values.iter_mut(), datum, weight)?;
            self.entries += weight;
        }
        Ok(())
    }

    fn merge(&self, other: &Self) -> Result<Self> {
        require_same("Branch", "size", &self.size(), &other.size())?;
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a.merge(b))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            entries: self.entries + other.entries,
            values,
        })
    }

    fn children(&self) -> Vec<&dyn Container<Datum = D>> {
        self.values
            .iter()
            .map(|v| v as &dyn Container<Datum = D>)
            .collect()
    }

    fn to_fragment(&self, _suppress_name: bool) -> Json {
        Payload::new()
            .float("entries", self.entries)
            .field(
                "data",
                Json::Array(self.values.iter().map(Container::to_wire).collect()),
            )
            .build()
    }

    fn from_fragment(type_name: &str, json: &Json, _name: Option<&str>) -> Result<Self> {
        wire::expect_type("Branch", type_name)?;
        let fields = Fields::new("Branch", json)?;
        fields.check_keys(&["entries", "data"], &[])?;
        let entries = fields.entries()?;
        let values = fields
            .array("data")?
            .iter()
            .map(Aggregator::from_wire)
            .collect::<Result<Vec<_>>>()?;
        Self::ed(entries, values).map_err(|e| fields.error("data", e.to_string()))
    }
}

impl<D> PartialEq for Branch<D> {
    fn eq(&self, other: &Self) -> bool {
        math::numeq(self.entries, other.entries) && self.values == other.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::{Count, Deviate, Minimize};
    use crate::quantity::Quantity;
    use serde_json::json;

    #[test]
    fn test_index_fill_and_merge() {
        let mut index = Index::new(vec![
            Deviate::new(Quantity::new(|x: &f64| *x)),
            Deviate::new(Quantity::new(|x: &f64| -x)),
        ])
        .unwrap();
        let mut other = index.zero();
        index.add(&1.0).unwrap();
        other.add(&3.0).unwrap();
        let merged = index.merge(&other).unwrap();
        assert_eq!(merged.get(0).unwrap().mean(), 2.0);
        assert_eq!(merged.get(1).unwrap().mean(), -2.0);
        assert_eq!(merged.entries(), 2.0);
    }

    #[test]
    fn test_index_requires_children() {
        assert!(matches!(Index::<Count<f64>>::new(vec![]), Err(Error::Construction(_))));
    }

    #[test]
    fn test_index_wire() {
        let mut index = Index::new(vec![Count::<f64>::new(), Count::new()]).unwrap();
        index.add(&0.0).unwrap();
        let json = index.to_wire();
        assert_eq!(
            json,
            json!({"type": "Index", "data": {"entries": 1.0, "sub:type": "Count", "data": [1.0, 1.0]}})
        );
        assert_eq!(Index::<Count<f64>>::from_wire(&json).unwrap(), index);
    }

    #[test]
    fn test_branch_heterogeneous() {
        let mut branch = Branch::new(vec![
            Aggregator::from(Count::<f64>::new()),
            Aggregator::from(Minimize::new(Quantity::identity())),
        ])
        .unwrap();
        branch.add(&2.0).unwrap();
        branch.add(&-4.0).unwrap();
        let json = branch.to_wire();
        assert_eq!(json["data"]["data"][0], json!({"type": "Count", "data": 2.0}));
        assert_eq!(json["data"]["data"][1]["type"], json!("Minimize"));
        let back = Branch::<f64>::from_wire(&json).unwrap();
        assert_eq!(back, branch);
    }

    #[test]
    fn test_branch_merge_mismatch() {
        let a = Branch::new(vec![Aggregator::from(Count::<f64>::new())]).unwrap();
        let b = Branch::new(vec![Aggregator::from(Minimize::new(Quantity::<f64>::identity()))]).unwrap();
        assert!(matches!(a.merge(&b), Err(Error::ShapeMismatch(_))));
        let c = Branch::new(vec![a.get(0).unwrap().clone(), a.get(0).unwrap().clone()]).unwrap();
        assert!(matches!(a.merge(&c), Err(Error::ShapeMismatch(_))));
    }
}
