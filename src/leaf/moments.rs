//! Running mean and variance (Average, Deviate)
//!
//! Uses the weighted form of Welford's numerically stable online update, and
//! Chan et al.'s parallel formula when two partial aggregates are merged.

use crate::error::{Error, Result};
use crate::math;
use crate::quantity::Quantity;
use crate::traits::{admits, Container};
use crate::wire::{self, Fields, Payload};
use core::fmt;
use serde_json::Value as Json;

/// Combined mean of two weighted partial means.
fn merge_mean(n1: f64, mean1: f64, n2: f64, mean2: f64) -> f64 {
    if n2 == 0.0 {
        return mean1;
    }
    if n1 == 0.0 {
        return mean2;
    }
    let delta = mean2 - mean1;
    mean1 + delta * (n2 / (n1 + n2))
}

/// Weighted mean of a quantity.
///
/// # Example
///
/// ```
/// use histoflow::leaf::Average;
/// use histoflow::quantity::Quantity;
/// use histoflow::traits::Container;
///
/// let mut avg = Average::new(Quantity::<f64>::identity());
/// for v in [1.0, 2.0, 3.0, 4.0] {
///     avg.add(&v).unwrap();
/// }
/// assert!((avg.mean() - 2.5).abs() < 1e-12);
/// ```
pub struct Average<D> {
    quantity: Quantity<D>,
    entries: f64,
    mean: f64,
}

impl<D> Average<D> {
    /// Create an empty average of `quantity`
    pub fn new(quantity: Quantity<D>) -> Self {
        Self {
            quantity,
            entries: 0.0,
            mean: 0.0,
        }
    }

    /// Create an average holding accumulated state directly.
    pub fn ed(entries: f64, mean: f64) -> Result<Self> {
        let mut out = Self::new(Quantity::placeholder(None));
        out.entries = Error::check_entries(entries)?;
        out.mean = mean;
        Ok(out)
    }

    /// Get the mean (0.0 when empty)
    pub fn mean(&self) -> f64 {
        self.mean
    }
}

impl<D> Container for Average<D> {
    type Datum = D;

    fn name(&self) -> &'static str {
        "Average"
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
            let delta = q - self.mean;
            self.mean += delta * weight / self.entries;
        }
        Ok(())
    }

    fn merge(&self, other: &Self) -> Result<Self> {
        Ok(Self {
            quantity: self.quantity.or(&other.quantity),
            entries: self.entries + other.entries,
            mean: merge_mean(self.entries, self.mean, other.entries, other.mean),
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
            .float("mean", self.mean)
            .name("name", self.quantity.name().filter(|_| !suppress_name))
            .build()
    }

    fn from_fragment(type_name: &str, json: &Json, name: Option<&str>) -> Result<Self> {
        wire::expect_type("Average", type_name)?;
        let fields = Fields::new("Average", json)?;
        fields.check_keys(&["entries", "mean"], &["name"])?;
        let name = fields.opt_str("name")?.or(name);
        let mut out = Self::ed(fields.entries()?, fields.float("mean")?)?;
        out.quantity = Quantity::placeholder(name.map(str::to_owned));
        Ok(out)
    }
}

impl<D> Clone for Average<D> {
    fn clone(&self) -> Self {
        Self {
            quantity: self.quantity.clone(),
            entries: self.entries,
            mean: self.mean,
        }
    }
}

impl<D> fmt::Debug for Average<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Average mean={}>", self.mean)
    }
}

impl<D> PartialEq for Average<D> {
    fn eq(&self, other: &Self) -> bool {
        self.quantity == other.quantity
            && math::numeq(self.entries, other.entries)
            && math::numeq(self.mean, other.mean)
    }
}

/// Weighted mean and variance of a quantity.
///
/// Tracks the sum of squared differences from the mean (M2 in Welford's
/// algorithm); the wire format carries the population variance `M2 / entries`.
pub struct Deviate<D> {
    quantity: Quantity<D>,
    entries: f64,
    mean: f64,
    m2: f64,
}

impl<D> Deviate<D> {
    /// Create an empty mean/variance accumulator of `quantity`
    pub fn new(quantity: Quantity<D>) -> Self {
        Self {
            quantity,
            entries: 0.0,
            mean: 0.0,
            m2: 0.0,
        }
    }

    /// Create a deviate holding accumulated state directly.
    pub fn ed(entries: f64, mean: f64, variance: f64) -> Result<Self> {
        let mut out = Self::new(Quantity::placeholder(None));
        out.entries = Error::check_entries(entries)?;
        out.mean = mean;
        out.m2 = variance * entries;
        Ok(out)
    }

    /// Get the mean (0.0 when empty)
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Get the population variance (0.0 when empty)
    pub fn variance(&self) -> f64 {
        if self.entries > 0.0 {
            self.m2 / self.entries
        } else {
            0.0
        }
    }

    /// Get the population standard deviation
    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }
}

impl<D> Container for Deviate<D> {
    type Datum = D;

    fn name(&self) -> &'static str {
        "Deviate"
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
            let delta = q - self.mean;
            self.mean += delta * weight / self.entries;
            let delta2 = q - self.mean;
            self.m2 += weight * delta * delta2;
        }
        Ok(())
    }

    fn merge(&self, other: &Self) -> Result<Self> {
        let quantity = self.quantity.or(&other.quantity);
        if other.entries == 0.0 {
            return Ok(Self {
                quantity,
                ..self.clone()
            });
        }
        if self.entries == 0.0 {
            return Ok(Self {
                quantity,
                ..other.clone()
            });
        }

        let entries = self.entries + other.entries;
        let delta = other.mean - self.mean;
        let m2 = self.m2 + other.m2 + delta * delta * (self.entries * other.entries / entries);

        Ok(Self {
            quantity,
            entries,
            mean: merge_mean(self.entries, self.mean, other.entries, other.mean),
            m2,
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
            .float("mean", self.mean)
            .float("variance", self.variance())
            .name("name", self.quantity.name().filter(|_| !suppress_name))
            .build()
    }

    fn from_fragment(type_name: &str, json: &Json, name: Option<&str>) -> Result<Self> {
        wire::expect_type("Deviate", type_name)?;
        let fields = Fields::new("Deviate", json)?;
        fields.check_keys(&["entries", "mean", "variance"], &["name"])?;
        let name = fields.opt_str("name")?.or(name);
        let mut out = Self::ed(
            fields.entries()?,
            fields.float("mean")?,
            fields.float("variance")?,
        )?;
        out.quantity = Quantity::placeholder(name.map(str::to_owned));
        Ok(out)
    }
}

impl<D> Clone for Deviate<D> {
    fn clone(&self) -> Self {
        Self {
            quantity: self.quantity.clone(),
            entries: self.entries,
            mean: self.mean,
            m2: self.m2,
        }
    }
}

impl<D> fmt::Debug for Deviate<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Deviate mean={} variance={}>", self.mean, self.variance())
    }
}

impl<D> PartialEq for Deviate<D> {
    fn eq(&self, other: &Self) -> bool {
        self.quantity == other.quantity
            && math::numeq(self.entries, other.entries)
            && math::numeq(self.mean, other.mean)
            && math::numeq(self.variance(), other.variance())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deviate() -> Deviate<f64> {
        Deviate::new(Quantity::identity())
    }

    #[test]
    fn test_basic() {
        let mut stats = deviate();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stats.add(&v).unwrap();
        }

        assert_eq!(stats.entries(), 8.0);
        assert!((stats.mean() - 5.0).abs() < 0.001);
        assert!((stats.variance() - 4.0).abs() < 0.001);
        assert!((stats.stddev() - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_weighted_matches_repeated() {
        let mut weighted = deviate();
        weighted.fill(&1.0, 3.0).unwrap();
        weighted.fill(&5.0, 1.0).unwrap();

        let mut repeated = deviate();
        for v in [1.0, 1.0, 1.0, 5.0] {
            repeated.add(&v).unwrap();
        }

        assert_eq!(weighted, repeated);
        assert!((weighted.mean() - 2.0).abs() < 1e-12);
        assert!((weighted.variance() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty() {
        let stats = deviate();
        assert!(stats.is_empty());
        assert_eq!(stats.mean(), 0.0);
        assert_eq!(stats.variance(), 0.0);
    }

    #[test]
    fn test_merge() {
        let mut stats1 = deviate();
        let mut stats2 = deviate();

        // Split data: [1,2,3] and [4,5,6]
        for v in [1.0, 2.0, 3.0] {
            stats1.add(&v).unwrap();
        }
        for v in [4.0, 5.0, 6.0] {
            stats2.add(&v).unwrap();
        }

        let merged = stats1.merge(&stats2).unwrap();

        assert_eq!(merged.entries(), 6.0);
        assert!((merged.mean() - 3.5).abs() < 0.001);
        // population variance of 1..=6
        assert!((merged.variance() - 35.0 / 12.0).abs() < 1e-12);
        assert_eq!(stats1.entries(), 3.0);
    }

    #[test]
    fn test_merge_empty() {
        let mut stats1 = deviate();
        stats1.add(&1.0).unwrap();
        stats1.add(&2.0).unwrap();

        let merged = stats1.merge(&deviate()).unwrap();
        assert_eq!(merged, stats1);
        let merged = deviate().merge(&stats1).unwrap();
        assert_eq!(merged, stats1);
    }

    #[test]
    fn test_numerical_stability() {
        let mut stats = deviate();

        let base = 1e12;
        for i in 0..1000 {
            stats.add(&(base + i as f64)).unwrap();
        }

        let expected_mean = base + 499.5;
        assert!(
            (stats.mean() - expected_mean).abs() < 1.0,
            "Mean: {} expected: {}",
            stats.mean(),
            expected_mean
        );
        // variance of 0..1000 is (1000^2 - 1) / 12
        assert!((stats.variance() - 83333.25).abs() < 1.0);
    }

    #[test]
    fn test_average_merge() {
        let mut a = Average::new(Quantity::<f64>::identity());
        let mut b = a.zero();
        a.fill(&1.0, 1.0).unwrap();
        b.fill(&4.0, 2.0).unwrap();
        let c = a.merge(&b).unwrap();
        assert_eq!(c.entries(), 3.0);
        assert!((c.mean() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_wire_roundtrip() {
        let mut stats = deviate();
        for v in [0.1, 0.7, 2.3] {
            stats.add(&v).unwrap();
        }
        let back = Deviate::<f64>::from_wire(&stats.to_wire()).unwrap();
        assert_eq!(back, stats);

        let mut avg = Average::new(Quantity::named("x", |x: &f64| *x));
        avg.add(&3.0).unwrap();
        let back = Average::<f64>::from_wire(&avg.to_wire()).unwrap();
        assert_eq!(back, avg);
    }
}
