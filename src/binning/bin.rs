//! Bin: fixed regular binning with under/over/nan flow containers

use crate::error::{Error, Result};
use crate::leaf::Count;
use crate::math;
use crate::quantity::Quantity;
use crate::traits::{admits, require_same, Container};
use crate::wire::{self, Fields, Payload};
use core::fmt;
use serde_json::Value as Json;

/// Splits a quantity into `num` equal bins between `low` and `high` and fills
/// exactly one sub-container per datum.
///
/// Data below `low` go to `underflow`, data at or above `high` to
/// `overflow`, and NaN to `nanflow`. `V` is the per-bin container and `F`
/// the type of the three flow containers.
///
/// # Example
///
/// ```
/// use histoflow::binning::Bin;
/// use histoflow::leaf::Count;
/// use histoflow::quantity::Quantity;
/// use histoflow::traits::Container;
///
/// let mut hist = Bin::new(4, 0.0, 4.0, Quantity::<f64>::identity(), Count::new(), Count::new()).unwrap();
/// for x in [-1.0, 0.5, 0.5, 3.9, 4.5] {
///     hist.add(&x).unwrap();
/// }
/// assert_eq!(hist.underflow().entries(), 1.0);
/// assert_eq!(hist.values()[0].entries(), 2.0);
/// assert_eq!(hist.values()[3].entries(), 1.0);
/// assert_eq!(hist.overflow().entries(), 1.0);
/// ```
pub struct Bin<V: Container, F = V> {
    quantity: Quantity<V::Datum>,
    low: f64,
    high: f64,
    entries: f64,
    values: Vec<V>,
    underflow: F,
    overflow: F,
    nanflow: F,
}

fn check_range(num: usize, low: f64, high: f64) -> Result<()> {
    if num < 1 {
        return Err(Error::construction(format!(
            "num ({}) must be at least one",
            num
        )));
    }
    if !(low.is_finite() && high.is_finite() && low < high) {
        return Err(Error::construction(format!(
            "low ({}) must be less than high ({}) and both finite",
            low, high
        )));
    }
    Ok(())
}

impl<V, F> Bin<V, F>
where
    V: Container,
    F: Container<Datum = V::Datum>,
{
    /// Create an empty binning; every bin is a zero of `value` and the three
    /// flows are zeros of `flow`.
    pub fn new(
        num: usize,
        low: f64,
        high: f64,
        quantity: Quantity<V::Datum>,
        value: V,
        flow: F,
    ) -> Result<Self> {
        let underflow = flow.zero();
        let overflow = flow.zero();
        let nanflow = flow.zero();
        Self::with_flows(num, low, high, quantity, value, underflow, overflow, nanflow)
    }

    /// Create an empty binning with distinct flow templates.
    #[allow(clippy::too_many_arguments)]
    pub fn with_flows(
        num: usize,
        low: f64,
        high: f64,
        quantity: Quantity<V::Datum>,
        value: V,
        underflow: F,
        overflow: F,
        nanflow: F,
    ) -> Result<Self> {
        check_range(num, low, high)?;
        Ok(Self {
            quantity,
            low,
            high,
            entries: 0.0,
            values: (0..num).map(|_| value.zero()).collect(),
            underflow: underflow.zero(),
            overflow: overflow.zero(),
            nanflow: nanflow.zero(),
        })
    }

    /// Create a binning holding accumulated state directly.
    pub fn ed(
        low: f64,
        high: f64,
        entries: f64,
        values: Vec<V>,
        underflow: F,
        overflow: F,
        nanflow: F,
    ) -> Result<Self> {
        check_range(values.len(), low, high)?;
        if let Some(first) = values.first() {
            if values.iter().any(|v| v.name() != first.name()) {
                return Err(Error::construction("all Bin values must have the same type"));
            }
        }
        Ok(Self {
            quantity: Quantity::placeholder(None),
            low,
            high,
            entries: Error::check_entries(entries)?,
            values,
            underflow,
            overflow,
            nanflow,
        })
    }

    /// Number of bins
    pub fn num(&self) -> usize {
        self.values.len()
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn values(&self) -> &[V] {
        &self.values
    }

    pub fn underflow(&self) -> &F {
        &self.underflow
    }

    pub fn overflow(&self) -> &F {
        &self.overflow
    }

    pub fn nanflow(&self) -> &F {
        &self.nanflow
    }

    pub fn quantity(&self) -> &Quantity<V::Datum> {
        &self.quantity
    }

    pub fn is_under(&self, x: f64) -> bool {
        !x.is_nan() && x < self.low
    }

    pub fn is_over(&self, x: f64) -> bool {
        !x.is_nan() && x >= self.high
    }

    pub fn is_nan(&self, x: f64) -> bool {
        x.is_nan()
    }

    /// Index of the bin holding `x`, `None` if it is out of range or NaN.
    pub fn bin_index(&self, x: f64) -> Option<usize> {
        if self.is_under(x) || self.is_over(x) || self.is_nan(x) {
            return None;
        }
        let num = self.num();
        let index = (num as f64 * (x - self.low) / (self.high - self.low)).floor() as usize;
        // rounding can push values just below `high` onto `num`
        Some(index.min(num - 1))
    }

    /// Low and high edge of bin `index`.
    pub fn range(&self, index: usize) -> (f64, f64) {
        let num = self.num() as f64;
        let width = self.high - self.low;
        (
            width * index as f64 / num + self.low,
            width * (index + 1) as f64 / num + self.low,
        )
    }

    /// All `num + 1` bin edges.
    pub fn edges(&self) -> Vec<f64> {
        math::linspace(self.low, self.high, self.num())
    }

    /// Collapse every bin to its number of entries, keeping the flows.
    pub fn histogram(&self) -> Bin<Count<V::Datum>, F>
    where
        F: Clone,
    {
        Bin {
            quantity: self.quantity.clone(),
            low: self.low,
            high: self.high,
            entries: self.entries,
            values: self
                .values
                .iter()
                .map(|v| Count::with_entries(v.entries()))
                .collect(),
            underflow: self.underflow.clone(),
            overflow: self.overflow.clone(),
            nanflow: self.nanflow.clone(),
        }
    }
}

impl<V, F> Container for Bin<V, F>
where
    V: Container,
    F: Container<Datum = V::Datum>,
{
    type Datum = V::Datum;

    fn name(&self) -> &'static str {
        "Bin"
    }

    fn entries(&self) -> f64 {
        self.entries
    }

    fn zero(&self) -> Self {
        Self {
            quantity: self.quantity.clone(),
            low: self.low,
            high: self.high,
            entries: 0.0,
            values: self.values.iter().map(Container::zero).collect(),
            underflow: self.underflow.zero(),
            overflow: self.overflow.zero(),
            nanflow: self.nanflow.zero(),
        }
    }

    fn check_fill(&self, datum: &V::Datum) -> Result<()> {
        let q = self.quantity.number(datum)?;
        if self.is_nan(q) {
            self.nanflow.check_fill(datum)
        } else if self.is_under(q) {
            self.underflow.check_fill(datum)
        } else if self.is_over(q) {
            self.overflow.check_fill(datum)
        } else {
            match self.bin_index(q) {
                Some(index) => self.values[index].check_fill(datum),
                None => Ok(()),
            }
        }
    }

    fn fill(&mut self, datum: &V::Datum, weight: f64) -> Result<()> {
        if admits(weight) {
            let q = self.quantity.number(datum)?;
            if self.is_nan(q) {
                self.nanflow.fill(datum, weight)?;
            } else if self.is_under(q) {
                self.underflow.fill(datum, weight)?;
            } else if self.is_over(q) {
                self.overflow.fill(datum, weight)?;
            } else if let Some(index) = self.bin_index(q) {
                self.values[index].fill(datum, weight)?;
            }
            // no possibility of failure from here on
            self.entries += weight;
        }
        Ok(())
    }

    fn merge(&self, other: &Self) -> Result<Self> {
        require_same("Bin", "low", &self.low, &other.low)?;
        require_same("Bin", "high", &self.high, &other.high)?;
        require_same("Bin", "number of bins", &self.num(), &other.num())?;
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a.merge(b))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            quantity: self.quantity.or(&other.quantity),
            low: self.low,
            high: self.high,
            entries: self.entries + other.entries,
            values,
            underflow: self.underflow.merge(&other.underflow)?,
            overflow: self.overflow.merge(&other.overflow)?,
            nanflow: self.nanflow.merge(&other.nanflow)?,
        })
    }

    fn children(&self) -> Vec<&dyn Container<Datum = V::Datum>> {
        let mut out: Vec<&dyn Container<Datum = V::Datum>> =
            vec![&self.underflow, &self.overflow, &self.nanflow];
        out.extend(self.values.iter().map(|v| v as &dyn Container<Datum = V::Datum>));
        out
    }

    fn quantity_name(&self) -> Option<&str> {
        self.quantity.name()
    }

    fn to_fragment(&self, suppress_name: bool) -> Json {
        let first = &self.values[0];
        Payload::new()
            .float("low", self.low)
            .float("high", self.high)
            .float("entries", self.entries)
            .field("values:type", Json::from(first.name()))
            .field(
                "values",
                Json::Array(self.values.iter().map(|v| v.to_fragment(true)).collect()),
            )
            .field("underflow:type", Json::from(self.underflow.name()))
            .field("underflow", self.underflow.to_fragment(false))
            .field("overflow:type", Json::from(self.overflow.name()))
            .field("overflow", self.overflow.to_fragment(false))
            .field("nanflow:type", Json::from(self.nanflow.name()))
            .field("nanflow", self.nanflow.to_fragment(false))
            .name("name", self.quantity.name().filter(|_| !suppress_name))
            .name("values:name", first.quantity_name())
            .build()
    }

    fn from_fragment(type_name: &str, json: &Json, name: Option<&str>) -> Result<Self> {
        wire::expect_type("Bin", type_name)?;
        let fields = Fields::new("Bin", json)?;
        fields.check_keys(
            &[
                "low",
                "high",
                "entries",
                "values:type",
                "values",
                "underflow:type",
                "underflow",
                "overflow:type",
                "overflow",
                "nanflow:type",
                "nanflow",
            ],
            &["name", "values:name"],
        )?;
        let low = fields.float("low")?;
        let high = fields.float("high")?;
        let entries = fields.entries()?;
        let name = fields.opt_str("name")?.or(name);
        let values_type = fields.type_name("values:type")?;
        let values_name = fields.opt_str("values:name")?;
        let values = fields
            .array("values")?
            .iter()
            .map(|v| V::from_fragment(values_type, v, values_name))
            .collect::<Result<Vec<_>>>()?;
        let underflow = F::from_fragment(
            fields.type_name("underflow:type")?,
            fields.get("underflow")?,
            None,
        )?;
        let overflow = F::from_fragment(
            fields.type_name("overflow:type")?,
            fields.get("overflow")?,
            None,
        )?;
        let nanflow = F::from_fragment(
            fields.type_name("nanflow:type")?,
            fields.get("nanflow")?,
            None,
        )?;
        let mut out = Self::ed(low, high, entries, values, underflow, overflow, nanflow)
            .map_err(|e| fields.error("values", e.to_string()))?;
        out.quantity = Quantity::placeholder(name.map(str::to_owned));
        Ok(out)
    }
}

impl<V: Container + Clone, F: Clone> Clone for Bin<V, F> {
    fn clone(&self) -> Self {
        Self {
            quantity: self.quantity.clone(),
            low: self.low,
            high: self.high,
            entries: self.entries,
            values: self.values.clone(),
            underflow: self.underflow.clone(),
            overflow: self.overflow.clone(),
            nanflow: self.nanflow.clone(),
        }
    }
}

impl<V: Container, F: fmt::Debug> fmt::Debug for Bin<V, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Bin num={} low={} high={} values={:?} underflow={:?} overflow={:?} nanflow={:?}>",
            self.values.len(),
            self.low,
            self.high,
            self.values,
            self.underflow,
            self.overflow,
            self.nanflow
        )
    }
}

impl<V, F> PartialEq for Bin<V, F>
where
    V: Container + PartialEq,
    F: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        math::numeq(self.low, other.low)
            && math::numeq(self.high, other.high)
            && self.quantity == other.quantity
            && math::numeq(self.entries, other.entries)
            && self.values == other.values
            && self.underflow == other.underflow
            && self.overflow == other.overflow
            && self.nanflow == other.nanflow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::Sum;
    use serde_json::json;

    type Histogram = Bin<Count<f64>>;

    fn histogram() -> Histogram {
        Bin::new(4, 0.0, 4.0, Quantity::identity(), Count::new(), Count::new()).unwrap()
    }

    #[test]
    fn test_fill_routes() {
        let mut hist = histogram();
        for x in [-1.0, 0.5, 0.5, 3.9, 4.5, f64::NAN] {
            hist.add(&x).unwrap();
        }
        assert_eq!(hist.underflow().entries(), 1.0);
        assert_eq!(hist.values()[0].entries(), 2.0);
        assert_eq!(hist.values()[1].entries(), 0.0);
        assert_eq!(hist.values()[3].entries(), 1.0);
        assert_eq!(hist.overflow().entries(), 1.0);
        assert_eq!(hist.nanflow().entries(), 1.0);
        assert_eq!(hist.entries(), 6.0);
    }

    #[test]
    fn test_edges_and_ranges() {
        let hist = histogram();
        assert_eq!(hist.edges(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(hist.range(2), (2.0, 3.0));
        assert_eq!(hist.bin_index(4.0), None);
        assert_eq!(hist.bin_index(3.999999999), Some(3));
        assert_eq!(hist.bin_index(0.0), Some(0));
    }

    #[test]
    fn test_invalid_shape() {
        let err = Bin::new(0, 0.0, 1.0, Quantity::<f64>::identity(), Count::new(), Count::new());
        assert!(matches!(err, Err(Error::Construction(_))));
        let err = Bin::new(3, 1.0, 1.0, Quantity::<f64>::identity(), Count::new(), Count::new());
        assert!(matches!(err, Err(Error::Construction(_))));
    }

    #[test]
    fn test_merge() {
        let mut a = histogram();
        let mut b = a.zero();
        a.add(&0.5).unwrap();
        b.add(&0.7).unwrap();
        b.add(&10.0).unwrap();
        let c = a.merge(&b).unwrap();
        assert_eq!(c.values()[0].entries(), 2.0);
        assert_eq!(c.overflow().entries(), 1.0);
        assert_eq!(c.entries(), 3.0);

        let other = Bin::new(5, 0.0, 4.0, Quantity::<f64>::identity(), Count::new(), Count::new()).unwrap();
        assert!(matches!(a.merge(&other), Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn test_fill_error_leaves_state() {
        let mut hist = Bin::new(
            2,
            0.0,
            2.0,
            Quantity::<f64>::identity(),
            Sum::new(Quantity::new(|_: &f64| "not a number")),
            Count::new(),
        )
        .unwrap();
        assert!(matches!(hist.add(&0.5), Err(Error::FillType { .. })));
        assert_eq!(hist.entries(), 0.0);
        assert!(hist.values().iter().all(|v| v.entries() == 0.0));
        // out of range goes to a Count flow and succeeds
        hist.add(&5.0).unwrap();
        assert_eq!(hist.entries(), 1.0);
    }

    #[test]
    fn test_wire() {
        let mut hist = Bin::new(
            2,
            0.0,
            1.0,
            Quantity::named("x", |x: &f64| *x),
            Sum::new(Quantity::named("y", |x: &f64| 2.0 * x)),
            Count::new(),
        )
        .unwrap();
        hist.add(&0.25).unwrap();
        let json = hist.to_wire();
        assert_eq!(json["data"]["values:type"], json!("Sum"));
        assert_eq!(json["data"]["values:name"], json!("y"));
        assert_eq!(json["data"]["name"], json!("x"));
        assert_eq!(json["data"]["values"][0], json!({"entries": 1.0, "sum": 0.5}));
        assert_eq!(json["data"]["underflow"], json!(0.0));

        let back = Bin::<Sum<f64>, Count<f64>>::from_wire(&json).unwrap();
        assert_eq!(back, hist);
        assert_eq!(back.values()[0].quantity().name(), Some("y"));
    }

    #[test]
    fn test_wire_wrong_child_type() {
        let json = histogram().to_wire();
        assert!(Bin::<Sum<f64>, Count<f64>>::from_wire(&json).is_err());
    }

    #[test]
    fn test_histogram() {
        let mut hist = Bin::new(
            2,
            0.0,
            2.0,
            Quantity::<f64>::identity(),
            Sum::new(Quantity::identity()),
            Count::new(),
        )
        .unwrap();
        hist.fill(&1.5, 2.0).unwrap();
        let counts = hist.histogram();
        assert_eq!(counts.values()[1].entries(), 2.0);
        assert_eq!(counts.entries(), 2.0);
    }
}
