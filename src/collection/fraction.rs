//! Fraction: a numerator and denominator pair for efficiencies

use crate::error::{Error, Result};
use crate::math;
use crate::quantity::Quantity;
use crate::traits::{admits, Container};
use crate::wire::{self, Fields, Payload};
use core::fmt;
use serde_json::Value as Json;

/// Accumulates every datum into `denominator` and the selected ones into
/// `numerator`.
///
/// The selection quantity returns a boolean or a number; a number acts as a
/// multiplier on the weight, so the numerator is filled with
/// `weight * selection` when that product is positive. The ratio itself is
/// never stored.
///
/// # Example
///
/// ```
/// use histoflow::collection::Fraction;
/// use histoflow::leaf::Count;
/// use histoflow::quantity::Quantity;
/// use histoflow::traits::Container;
///
/// let mut frac = Fraction::new(Quantity::new(|x: &f64| *x > 0.5), Count::new());
/// for x in [0.1, 0.6, 0.9, 0.3] {
///     frac.add(&x).unwrap();
/// }
/// assert_eq!(frac.ratio(), 0.5);
/// ```
pub struct Fraction<V: Container> {
    quantity: Quantity<V::Datum>,
    entries: f64,
    numerator: V,
    denominator: V,
}

impl<V: Container> Fraction<V> {
    pub fn new(quantity: Quantity<V::Datum>, value: V) -> Self {
        Self {
            quantity,
            entries: 0.0,
            numerator: value.zero(),
            denominator: value.zero(),
        }
    }

    /// Create a fraction holding accumulated state directly.
    pub fn ed(entries: f64, numerator: V, denominator: V) -> Result<Self> {
        if numerator.name() != denominator.name() {
            return Err(Error::construction(format!(
                "Fraction numerator is a {} but denominator is a {}",
                numerator.name(),
                denominator.name()
            )));
        }
        Ok(Self {
            quantity: Quantity::placeholder(None),
            entries: Error::check_entries(entries)?,
            numerator,
            denominator,
        })
    }

    pub fn quantity(&self) -> &Quantity<V::Datum> {
        &self.quantity
    }

    pub fn numerator(&self) -> &V {
        &self.numerator
    }

    pub fn denominator(&self) -> &V {
        &self.denominator
    }

    /// Ratio of numerator to denominator entries (NaN when both are empty).
    pub fn ratio(&self) -> f64 {
        self.numerator.entries() / self.denominator.entries()
    }

    fn selected_weight(&self, datum: &V::Datum, weight: f64) -> Result<f64> {
        Ok(weight * self.quantity.number(datum)?)
    }
}

impl<V: Container> Container for Fraction<V> {
    type Datum = V::Datum;

    fn name(&self) -> &'static str {
        "Fraction"
    }

    fn entries(&self) -> f64 {
        self.entries
    }

    fn zero(&self) -> Self {
        Self {
            quantity: self.quantity.clone(),
            entries: 0.0,
            numerator: self.numerator.zero(),
            denominator: self.denominator.zero(),
        }
    }

    fn check_fill(&self, datum: &V::Datum) -> Result<()> {
        self.selected_weight(datum, 1.0)?;
        self.denominator.check_fill(datum)?;
        self.numerator.check_fill(datum)
    }

    fn fill(&mut self, datum: &V::Datum, weight: f64) -> Result<()> {
        if admits(weight) {
            let selected = self.selected_weight(datum, weight)?;
            if admits(selected) {
                self.numerator.check_fill(datum)?;
            }
            self.denominator.fill(datum, weight)?;
            if admits(selected) {
                self.numerator.fill(datum, selected)?;
            }
            self.entries += weight;
        }
        Ok(())
    }

    fn merge(&self, other: &Self) -> Result<Self> {
        Ok(Self {
            quantity: self.quantity.or(&other.quantity),
            entries: self.entries + other.entries,
            numerator: self.numerator.merge(&other.numerator)?,
            denominator: self.denominator.merge(&other.denominator)?,
        })
    }

    fn children(&self) -> Vec<&dyn Container<Datum = V::Datum>> {
        vec![&self.numerator, &self.denominator]
    }

    fn quantity_name(&self) -> Option<&str> {
        self.quantity.name()
    }

    fn to_fragment(&self, suppress_name: bool) -> Json {
        Payload::new()
            .float("entries", self.entries)
            .field("sub:type", Json::from(self.denominator.name()))
            .field("numerator", self.numerator.to_fragment(true))
            .field("denominator", self.denominator.to_fragment(true))
            .name("name", self.quantity.name().filter(|_| !suppress_name))
            .name("sub:name", self.denominator.quantity_name())
            .build()
    }

    fn from_fragment(type_name: &str, json: &Json, name: Option<&str>) -> Result<Self> {
        wire::expect_type("Fraction", type_name)?;
        let fields = Fields::new("Fraction", json)?;
        fields.check_keys(
            &["entries", "sub:type", "numerator", "denominator"],
            &["name", "sub:name"],
        )?;
        let entries = fields.entries()?;
        let name = fields.opt_str("name")?.or(name);
        let sub_type = fields.type_name("sub:type")?;
        let sub_name = fields.opt_str("sub:name")?;
        let numerator = V::from_fragment(sub_type, fields.get("numerator")?, sub_name)?;
        let denominator = V::from_fragment(sub_type, fields.get("denominator")?, sub_name)?;
        let mut out = Self::ed(entries, numerator, denominator)?;
        out.quantity = Quantity::placeholder(name.map(str::to_owned));
        Ok(out)
    }
}

impl<V: Container + Clone> Clone for Fraction<V> {
    fn clone(&self) -> Self {
        Self {
            quantity: self.quantity.clone(),
            entries: self.entries,
            numerator: self.numerator.clone(),
            denominator: self.denominator.clone(),
        }
    }
}

impl<V: Container> fmt::Debug for Fraction<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Fraction numerator={:?} denominator={:?}>",
            self.numerator, self.denominator
        )
    }
}

impl<V: Container + PartialEq> PartialEq for Fraction<V> {
    fn eq(&self, other: &Self) -> bool {
        self.quantity == other.quantity
            && math::numeq(self.entries, other.entries)
            && self.numerator == other.numerator
            && self.denominator == other.denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::Bin;
    use crate::leaf::Count;

    #[test]
    fn test_boolean_selection() {
        let mut frac = Fraction::new(Quantity::new(|x: &f64| *x > 0.0), Count::new());
        for x in [-1.0, 1.0, 2.0, f64::NAN] {
            frac.add(&x).unwrap();
        }
        assert_eq!(frac.denominator().entries(), 4.0);
        assert_eq!(frac.numerator().entries(), 2.0);
        assert_eq!(frac.entries(), 4.0);
    }

    #[test]
    fn test_numeric_selection_scales_weight() {
        let mut frac = Fraction::new(Quantity::<f64>::identity(), Count::new());
        frac.fill(&0.25, 2.0).unwrap();
        frac.fill(&-3.0, 1.0).unwrap();
        assert_eq!(frac.numerator().entries(), 0.5);
        assert_eq!(frac.denominator().entries(), 3.0);
    }

    #[test]
    fn test_text_selection_rejected() {
        let mut frac = Fraction::new(Quantity::new(|_: &f64| "yes"), Count::new());
        assert!(matches!(frac.add(&1.0), Err(Error::FillType { .. })));
        assert!(frac.denominator().is_empty());
    }

    #[test]
    fn test_binned_efficiency_roundtrip() {
        let mut frac = Fraction::new(
            Quantity::named("passed", |x: &f64| *x < 2.0),
            Bin::new(4, 0.0, 4.0, Quantity::named("x", |x: &f64| *x), Count::new(), Count::new()).unwrap(),
        );
        for x in [0.5, 1.5, 2.5, 3.5, 1.2] {
            frac.add(&x).unwrap();
        }
        let merged = frac.merge(&frac.zero()).unwrap();
        assert_eq!(merged, frac);
        let json = frac.to_wire();
        assert_eq!(json["data"]["name"], "passed");
        assert_eq!(json["data"]["sub:name"], "x");
        assert!(json["data"]["numerator"].get("name").is_none());
        let back = Fraction::<Bin<Count<f64>>>::from_wire(&json).unwrap();
        assert_eq!(back, frac);
        assert_eq!(back.numerator().values()[1].entries(), 2.0);
    }
}
