//! Sum: weighted sum of a quantity

use crate::error::{Error, Result};
use crate::math;
use crate::quantity::Quantity;
use crate::traits::{admits, Container};
use crate::wire::{self, Fields, Payload};
use core::fmt;
use serde_json::Value as Json;

/// Accumulates `sum(quantity(datum) * weight)` alongside `entries`.
pub struct Sum<D> {
    quantity: Quantity<D>,
    entries: f64,
    sum: f64,
}

impl<D> Sum<D> {
    /// Create an empty sum of `quantity`
    pub fn new(quantity: Quantity<D>) -> Self {
        Self {
            quantity,
            entries: 0.0,
            sum: 0.0,
        }
    }

    /// Create a sum holding accumulated state directly.
    pub fn ed(entries: f64, sum: f64) -> Result<Self> {
        let mut out = Self::new(Quantity::placeholder(None));
        out.entries = Error::check_entries(entries)?;
        out.sum = sum;
        Ok(out)
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn quantity(&self) -> &Quantity<D> {
        &self.quantity
    }
}

impl<D> Container for Sum<D> {
    type Datum = D;

    fn name(&self) -> &'static str {
        "Sum"
    }

    fn entries(&self) -> f64 {
        self.entries
    }

    fn zero(&self) -> Self {
        Self::new(self.quantity.clone())
    }

    fn check_fill(&self, datum: &D) -> Result<()> {
        self.quantity.number(datum).map(|_| ())
    }

    fn fill(&mut self, datum: &D, weight: f64) -> Result<()> {
        if admits(weight) {
            let q = self.quantity.number(datum)?;
            self.entries += weight;
            self.sum += q * weight;
        }
        Ok(())
    }

    fn merge(&self, other: &Self) -> Result<Self> {
        Ok(Self {
            quantity: self.quantity.or(&other.quantity),
            entries: self.entries + other.entries,
            sum: self.sum + other.sum,
        })
    }

    fn children(&self) -> Vec<&dyn Container<Datum = D>> {
        Vec::new()
    }

    fn quantity_name(&self) -> Option<&str> {
        self.quantity.name()
    }

    fn to_fragment(&self, suppress_name: bool) -> Json {
        Payload::new()
            .float("entries", self.entries)
            .float("sum", self.sum)
            .name("name", self.quantity.name().filter(|_| !suppress_name))
            .build()
    }

    fn from_fragment(type_name: &str, json: &Json, name: Option<&str>) -> Result<Self> {
        wire::expect_type("Sum", type_name)?;
        let fields = Fields::new("Sum", json)?;
        fields.check_keys(&["entries", "sum"], &["name"])?;
        let name = fields.opt_str("name")?.or(name);
        let mut out = Self::ed(fields.entries()?, fields.float("sum")?)?;
        out.quantity = Quantity::placeholder(name.map(str::to_owned));
        Ok(out)
    }
}

impl<D> Clone for Sum<D> {
    fn clone(&self) -> Self {
        Self {
            quantity: self.quantity.clone(),
            entries: self.entries,
            sum: self.sum,
        }
    }
}

impl<D> fmt::Debug for Sum<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Sum sum={}>", self.sum)
    }
}

impl<D> PartialEq for Sum<D> {
    fn eq(&self, other: &Self) -> bool {
        self.quantity == other.quantity
            && math::numeq(self.entries, other.entries)
            && math::numeq(self.sum, other.sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_basic() {
        let mut sum = Sum::new(Quantity::<f64>::identity());
        sum.fill(&2.0, 1.0).unwrap();
        sum.fill(&3.0, 2.0).unwrap();
        sum.fill(&100.0, 0.0).unwrap();
        assert_eq!(sum.entries(), 3.0);
        assert_eq!(sum.sum(), 8.0);
    }

    #[test]
    fn test_fill_type_error_leaves_state() {
        let mut sum = Sum::new(Quantity::new(|s: &String| s.clone()));
        assert!(matches!(
            sum.fill(&"a".to_string(), 1.0),
            Err(Error::FillType { .. })
        ));
        assert_eq!(sum.entries(), 0.0);
        assert_eq!(sum.sum(), 0.0);
    }

    #[test]
    fn test_merge() {
        let mut a = Sum::new(Quantity::<f64>::identity());
        let mut b = a.zero();
        a.add(&1.5).unwrap();
        b.add(&2.5).unwrap();
        b.add(&-1.0).unwrap();
        let c = a.merge(&b).unwrap();
        assert_eq!(c.entries(), 3.0);
        assert_eq!(c.sum(), 3.0);
    }

    #[test]
    fn test_wire() {
        let mut sum = Sum::new(Quantity::named("x", |x: &f64| *x));
        sum.add(&0.25).unwrap();
        let json = sum.to_wire();
        assert_eq!(
            json,
            json!({"type": "Sum", "data": {"entries": 1.0, "sum": 0.25, "name": "x"}})
        );
        let back = Sum::<f64>::from_wire(&json).unwrap();
        assert_eq!(back, sum);
        assert_eq!(back.quantity().name(), Some("x"));
    }

    #[test]
    fn test_decoded_cannot_fill() {
        let mut sum = Sum::<f64>::ed(1.0, 2.0).unwrap();
        assert!(matches!(sum.add(&1.0), Err(Error::InvalidState(_))));
        assert_eq!(sum.entries(), 1.0);
    }

    #[test]
    fn test_missing_field() {
        let json = json!({"type": "Sum", "data": {"entries": 1.0}});
        match Sum::<f64>::from_wire(&json) {
            Err(Error::Format { field, .. }) => assert_eq!(field, "Sum.sum"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
