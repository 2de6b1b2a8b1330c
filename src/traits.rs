//! Core container trait
//!
//! Every aggregator implements [`Container`]: it starts empty, accepts
//! weighted data through `fill`, combines with a same-shape aggregator through
//! `merge`, and encodes itself to the self-describing wire format.

use crate::error::{Error, Result};
use crate::wire;
use core::fmt::Debug;
use serde_json::Value as Json;

/// Shared contract of all aggregators.
///
/// `fill` mutates in place; `merge` and `zero` are pure and return a new
/// container, so a container that is no longer filled can be treated as an
/// immutable snapshot.
///
/// The trait is object safe: children of heterogeneous collections are
/// visited as `&dyn Container<Datum = D>`.
pub trait Container: Debug {
    /// The type of data this container is filled with
    type Datum;

    /// Registered type name, used as the wire `"type"` tag
    fn name(&self) -> &'static str;

    /// Total weight of data admitted by this container.
    fn entries(&self) -> f64;

    /// A fresh container with the same shape and no accumulated state.
    fn zero(&self) -> Self
    where
        Self: Sized;

    /// Accumulate one datum with the given weight.
    ///
    /// Weights `<= 0` (and NaN) are no-ops. On error the container is left
    /// unchanged.
    fn fill(&mut self, datum: &Self::Datum, weight: f64) -> Result<()>;

    /// Check that filling `datum` would succeed, without changing anything.
    ///
    /// Containers that fill several children validate all of them first, so
    /// a failure part way through never leaves some children filled.
    fn check_fill(&self, datum: &Self::Datum) -> Result<()>;

    /// Accumulate one datum with unit weight.
    fn add(&mut self, datum: &Self::Datum) -> Result<()> {
        self.fill(datum, 1.0)
    }

    /// Combine with a same-shape container into a new one.
    ///
    /// Returns [`Error::ShapeMismatch`] if the shapes differ.
    fn merge(&self, other: &Self) -> Result<Self>
    where
        Self: Sized;

    /// Direct sub-aggregators, for walking the tree.
    fn children(&self) -> Vec<&dyn Container<Datum = Self::Datum>>;

    /// Display name of the quantity this container extracts, if any
    fn quantity_name(&self) -> Option<&str> {
        None
    }

    /// Encode the payload (without the `"type"` tag).
    ///
    /// `suppress_name` omits the quantity name because the parent records it
    /// once in a `"<field>:name"` sidecar.
    fn to_fragment(&self, suppress_name: bool) -> Json;

    /// Decode a payload written by [`Container::to_fragment`].
    ///
    /// `type_name` is the tag recorded next to the payload and
    /// `name_from_parent` is the quantity name hoisted into the parent.
    fn from_fragment(type_name: &str, json: &Json, name_from_parent: Option<&str>) -> Result<Self>
    where
        Self: Sized;

    /// Encode as `{"type": ..., "data": ...}`.
    fn to_wire(&self) -> Json {
        wire::tagged(self.name(), self.to_fragment(false))
    }

    /// Decode from `{"type": ..., "data": ...}`.
    fn from_wire(json: &Json) -> Result<Self>
    where
        Self: Sized,
    {
        let (type_name, data) = wire::untag(json)?;
        Self::from_fragment(type_name, data, None)
    }

    /// Check if nothing has been admitted yet
    fn is_empty(&self) -> bool {
        self.entries() == 0.0
    }
}

/// Number of containers in a tree, the root included.
pub fn tree_size<D>(root: &dyn Container<Datum = D>) -> usize {
    1 + root
        .children()
        .into_iter()
        .map(|child| tree_size(child))
        .sum::<usize>()
}

/// Visit every container of a tree depth-first, parents before children.
pub fn walk<'a, D, F>(root: &'a dyn Container<Datum = D>, visit: &mut F)
where
    F: FnMut(&'a dyn Container<Datum = D>),
{
    visit(root);
    for child in root.children() {
        walk(child, visit);
    }
}

/// Merge any number of same-shape containers.
///
/// Pairs are combined level by level (a balanced reduction tree), which gives
/// the same result as a left fold up to floating-point summation order.
/// Returns `Ok(None)` for an empty input.
pub fn merge_all<C, I>(containers: I) -> Result<Option<C>>
where
    C: Container,
    I: IntoIterator<Item = C>,
{
    let mut level: Vec<C> = containers.into_iter().collect();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len() / 2 + 1);
        let mut iter = level.into_iter();
        while let Some(left) = iter.next() {
            match iter.next() {
                Some(right) => next.push(left.merge(&right)?),
                None => next.push(left),
            }
        }
        level = next;
    }
    Ok(level.pop())
}

/// Reject a merge when a shape parameter differs.
pub(crate) fn require_same<T: PartialEq + Debug>(
    container: &str,
    what: &str,
    left: &T,
    right: &T,
) -> Result<()> {
    if left == right {
        Ok(())
    } else {
        tracing::debug!(container, parameter = what, left = ?left, right = ?right, "merge rejected");
        Err(Error::shape(format!(
            "cannot merge {} because {} differs ({:?} vs {:?})",
            container, what, left, right
        )))
    }
}

/// Whether a fill with this weight does anything.
#[inline]
pub(crate) fn admits(weight: f64) -> bool {
    weight > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::Count;

    #[test]
    fn test_merge_all() {
        let counts: Vec<Count<f64>> = (1..=5)
            .map(|n| Count::ed(n as f64).unwrap())
            .collect();
        let total = merge_all(counts).unwrap().unwrap();
        assert_eq!(total.entries(), 15.0);

        let none = merge_all(Vec::<Count<f64>>::new()).unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_require_same() {
        assert!(require_same("Bin", "low", &0.0, &0.0).is_ok());
        let err = require_same("Bin", "low", &0.0, &1.0).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch(_)));
    }

    #[test]
    fn test_admits() {
        assert!(admits(1.0));
        assert!(!admits(0.0));
        assert!(!admits(-1.0));
        assert!(!admits(f64::NAN));
    }
}
