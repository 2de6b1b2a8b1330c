//! Count: total (optionally transformed) weight

use crate::error::{Error, Result};
use crate::math;
use crate::quantity::Transform;
use crate::traits::{admits, require_same, Container};
use crate::wire;
use core::fmt;
use core::marker::PhantomData;
use serde_json::Value as Json;

/// Counts entries by summing the observed weights.
///
/// An optional [`Transform`] is applied to each weight before summing, e.g.
/// [`Transform::Square`] accumulates the sum of squared weights.
///
/// The wire form is the bare number, so a count built with [`Count::ed`] or
/// decoded from wire data has an unknown transform. It merges with a count of
/// any transform but cannot be filled.
///
/// # Example
///
/// ```
/// use histoflow::leaf::Count;
/// use histoflow::traits::Container;
///
/// let mut count = Count::new();
/// for x in [1.0, 2.0, 3.0] {
///     count.add(&x).unwrap();
/// }
/// assert_eq!(count.entries(), 3.0);
/// assert_eq!(
///     histoflow::wire::to_wire_string(&count).unwrap(),
///     r#"{"type":"Count","data":3.0}"#
/// );
/// ```
pub struct Count<D> {
    entries: f64,
    // None when built from accumulated state
    transform: Option<Transform>,
    _datum: PhantomData<fn(&D)>,
}

impl<D> Default for Count<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> Count<D> {
    /// Create an empty count
    pub fn new() -> Self {
        Self::with_transform(Transform::Identity)
    }

    /// Create an empty count that transforms each weight
    pub fn with_transform(transform: Transform) -> Self {
        Self {
            entries: 0.0,
            transform: Some(transform),
            _datum: PhantomData,
        }
    }

    /// Create a count holding `entries` directly; its transform is unknown.
    pub fn ed(entries: f64) -> Result<Self> {
        Ok(Self {
            entries: Error::check_entries(entries)?,
            transform: None,
            _datum: PhantomData,
        })
    }

    /// Entries already validated by the caller.
    pub(crate) fn with_entries(entries: f64) -> Self {
        let mut out = Self::new();
        out.entries = entries;
        out
    }

    /// The weight transform, `None` if unknown.
    pub fn transform(&self) -> Option<Transform> {
        self.transform
    }

    fn known_transform(&self) -> Result<Transform> {
        self.transform.ok_or_else(|| {
            Error::invalid_state("Count has no known transform (built from accumulated state)")
        })
    }
}

impl<D> Container for Count<D> {
    type Datum = D;

    fn name(&self) -> &'static str {
        "Count"
    }

    fn entries(&self) -> f64 {
        self.entries
    }

    fn zero(&self) -> Self {
        Self {
            entries: 0.0,
            transform: self.transform,
            _datum: PhantomData,
        }
    }

    fn check_fill(&self, _datum: &D) -> Result<()> {
        self.known_transform().map(|_| ())
    }

    fn fill(&mut self, _datum: &D, weight: f64) -> Result<()> {
        if admits(weight) {
            self.entries += self.known_transform()?.apply(weight);
        }
        Ok(())
    }

    fn merge(&self, other: &Self) -> Result<Self> {
        if let (Some(mine), Some(theirs)) = (self.transform, other.transform) {
            require_same("Count", "transform", &mine, &theirs)?;
        }
        Ok(Self {
            entries: self.entries + other.entries,
            transform: self.transform.or(other.transform),
            _datum: PhantomData,
        })
    }

    fn children(&self) -> Vec<&dyn Container<Datum = D>> {
        Vec::new()
    }

    fn to_fragment(&self, _suppress_name: bool) -> Json {
        math::float_to_json(self.entries)
    }

    fn from_fragment(type_name: &str, json: &Json, _name: Option<&str>) -> Result<Self> {
        wire::expect_type("Count", type_name)?;
        match math::json_to_float(json) {
            Some(entries) if entries >= 0.0 => Self::ed(entries),
            _ => Err(Error::format("Count", "expected a non-negative number")),
        }
    }
}

impl<D> Clone for Count<D> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries,
            transform: self.transform,
            _datum: PhantomData,
        }
    }
}

impl<D> fmt::Debug for Count<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Count {}>", self.entries)
    }
}

impl<D> PartialEq for Count<D> {
    fn eq(&self, other: &Self) -> bool {
        let same_transform = match (self.transform, other.transform) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        same_transform && math::numeq(self.entries, other.entries)
    }
}
