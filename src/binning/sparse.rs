//! SparselyBin: unbounded binning that only materializes occupied bins

use crate::error::{Error, Result};
use crate::math;
use crate::quantity::Quantity;
use crate::traits::{admits, require_same, Container};
use crate::wire::{self, Fields, Payload};
use core::fmt;
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Bins a quantity into width-`bin_width` intervals anchored at `origin`
/// without fixing a range up front.
///
/// Bin `i` covers `[origin + i * bin_width, origin + (i + 1) * bin_width)`.
/// A bin exists in [`SparselyBin::bins`] only once it has been filled, so
/// memory grows with the number of distinct occupied bins. NaN goes to
/// `nanflow`; infinite values land in the saturated bins `i64::MIN` and
/// `i64::MAX`.
///
/// # Example
///
/// ```
/// use histoflow::binning::SparselyBin;
/// use histoflow::leaf::Count;
/// use histoflow::quantity::Quantity;
/// use histoflow::traits::Container;
///
/// let mut a = SparselyBin::new(1.0, Quantity::<f64>::identity(), Count::new(), Count::new()).unwrap();
/// let mut b = a.zero();
/// a.add(&2.5).unwrap();
/// b.add(&2.7).unwrap();
/// b.add(&9.1).unwrap();
///
/// let merged = a.merge(&b).unwrap();
/// assert_eq!(merged.num_filled(), 2);
/// assert_eq!(merged.at(2).map(|c| c.entries()), Some(2.0));
/// assert_eq!((merged.min_bin(), merged.max_bin()), (Some(2), Some(9)));
/// ```
pub struct SparselyBin<V: Container, N = V> {
    quantity: Quantity<V::Datum>,
    bin_width: f64,
    origin: f64,
    entries: f64,
    bins: BTreeMap<i64, V>,
    nanflow: N,
    // zero of the per-bin container, `None` only for decoded containers
    // that never saw a bin
    template: Option<Arc<V>>,
    content_type: &'static str,
}

fn check_binning(bin_width: f64, origin: f64) -> Result<()> {
    if !(bin_width.is_finite() && bin_width > 0.0) {
        return Err(Error::construction(format!(
            "binWidth ({}) must be positive and finite",
            bin_width
        )));
    }
    if !origin.is_finite() {
        return Err(Error::construction(format!(
            "origin ({}) must be finite",
            origin
        )));
    }
    Ok(())
}

impl<V, N> SparselyBin<V, N>
where
    V: Container,
    N: Container<Datum = V::Datum>,
{
    /// Create an empty binning anchored at zero.
    pub fn new(bin_width: f64, quantity: Quantity<V::Datum>, value: V, nanflow: N) -> Result<Self> {
        Self::with_origin(bin_width, 0.0, quantity, value, nanflow)
    }

    /// Create an empty binning anchored at `origin`.
    pub fn with_origin(
        bin_width: f64,
        origin: f64,
        quantity: Quantity<V::Datum>,
        value: V,
        nanflow: N,
    ) -> Result<Self> {
        check_binning(bin_width, origin)?;
        let template = value.zero();
        Ok(Self {
            quantity,
            bin_width,
            origin,
            entries: 0.0,
            bins: BTreeMap::new(),
            nanflow: nanflow.zero(),
            content_type: template.name(),
            template: Some(Arc::new(template)),
        })
    }

    /// Create a binning holding accumulated state directly.
    ///
    /// `content_type` names the per-bin container type so that an empty
    /// binning still records it.
    pub fn ed(
        bin_width: f64,
        origin: f64,
        entries: f64,
        content_type: &'static str,
        bins: BTreeMap<i64, V>,
        nanflow: N,
    ) -> Result<Self> {
        check_binning(bin_width, origin)?;
        if let Some((index, bin)) = bins.iter().find(|(_, b)| b.name() != content_type) {
            return Err(Error::construction(format!(
                "bin {} is a {}, expected {}",
                index,
                bin.name(),
                content_type
            )));
        }
        Ok(Self {
            quantity: Quantity::placeholder(None),
            bin_width,
            origin,
            entries: Error::check_entries(entries)?,
            template: bins.values().next().map(|b| Arc::new(b.zero())),
            bins,
            nanflow,
            content_type,
        })
    }

    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    pub fn origin(&self) -> f64 {
        self.origin
    }

    pub fn quantity(&self) -> &Quantity<V::Datum> {
        &self.quantity
    }

    /// Occupied bins in index order
    pub fn bins(&self) -> &BTreeMap<i64, V> {
        &self.bins
    }

    pub fn nanflow(&self) -> &N {
        &self.nanflow
    }

    /// Type name of the per-bin container
    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// Index of the bin that holds `x`, `None` for NaN.
    pub fn bin_index(&self, x: f64) -> Option<i64> {
        if x.is_nan() {
            None
        } else {
            // saturating cast for infinite or huge values
            Some(((x - self.origin) / self.bin_width).floor() as i64)
        }
    }

    /// Number of occupied bins
    pub fn num_filled(&self) -> usize {
        self.bins.len()
    }

    /// Lowest occupied bin index
    pub fn min_bin(&self) -> Option<i64> {
        self.bins.keys().next().copied()
    }

    /// Highest occupied bin index
    pub fn max_bin(&self) -> Option<i64> {
        self.bins.keys().next_back().copied()
    }

    /// Low edge of the lowest occupied bin.
    pub fn low(&self) -> Option<f64> {
        self.min_bin().map(|i| self.bin_range(i).0)
    }

    /// High edge of the highest occupied bin.
    pub fn high(&self) -> Option<f64> {
        self.max_bin().map(|i| self.bin_range(i).1)
    }

    /// Low and high edge of bin `index`.
    pub fn bin_range(&self, index: i64) -> (f64, f64) {
        (
            index as f64 * self.bin_width + self.origin,
            (index as f64 + 1.0) * self.bin_width + self.origin,
        )
    }

    /// The container in bin `index`, if occupied.
    pub fn at(&self, index: i64) -> Option<&V> {
        self.bins.get(&index)
    }
}

impl<V, N> Container for SparselyBin<V, N>
where
    V: Container + Clone,
    N: Container<Datum = V::Datum>,
{
    type Datum = V::Datum;

    fn name(&self) -> &'static str {
        "SparselyBin"
    }

    fn entries(&self) -> f64 {
        self.entries
    }

    fn zero(&self) -> Self {
        Self {
            quantity: self.quantity.clone(),
            bin_width: self.bin_width,
            origin: self.origin,
            entries: 0.0,
            bins: BTreeMap::new(),
            nanflow: self.nanflow.zero(),
            template: self.template.clone(),
            content_type: self.content_type,
        }
    }

    fn check_fill(&self, datum: &V::Datum) -> Result<()> {
        let q = self.quantity.number(datum)?;
        match self.bin_index(q) {
            None => self.nanflow.check_fill(datum),
            Some(index) => match (self.bins.get(&index), self.template.as_deref()) {
                (Some(bin), _) | (None, Some(bin)) => bin.check_fill(datum),
                (None, None) => Err(Error::invalid_state(
                    "SparselyBin has no bin template to fill",
                )),
            },
        }
    }

    fn fill(&mut self, datum: &V::Datum, weight: f64) -> Result<()> {
        if admits(weight) {
            let q = self.quantity.number(datum)?;
            match self.bin_index(q) {
                None => self.nanflow.fill(datum, weight)?,
                Some(index) => {
                    if let Some(bin) = self.bins.get_mut(&index) {
                        bin.fill(datum, weight)?;
                    } else {
                        let template = self.template.as_ref().ok_or_else(|| {
                            Error::invalid_state("SparselyBin has no bin template to fill")
                        })?;
                        let mut bin = template.zero();
                        bin.fill(datum, weight)?;
                        tracing::trace!(index, "materialized sparse bin");
                        self.bins.insert(index, bin);
                    }
                }
            }
            self.entries += weight;
        }
        Ok(())
    }

    fn merge(&self, other: &Self) -> Result<Self> {
        require_same("SparselyBin", "binWidth", &self.bin_width, &other.bin_width)?;
        require_same("SparselyBin", "origin", &self.origin, &other.origin)?;
        require_same(
            "SparselyBin",
            "bin type",
            &self.content_type,
            &other.content_type,
        )?;
        let mut bins = self.bins.clone();
        for (index, theirs) in &other.bins {
            let merged = match bins.get(index) {
                Some(mine) => mine.merge(theirs)?,
                None => theirs.clone(),
            };
            bins.insert(*index, merged);
        }
        Ok(Self {
            quantity: self.quantity.or(&other.quantity),
            bin_width: self.bin_width,
            origin: self.origin,
            entries: self.entries + other.entries,
            bins,
            nanflow: self.nanflow.merge(&other.nanflow)?,
            template: self.template.clone().or_else(|| other.template.clone()),
            content_type: self.content_type,
        })
    }

    fn children(&self) -> Vec<&dyn Container<Datum = V::Datum>> {
        let mut out: Vec<&dyn Container<Datum = V::Datum>> = vec![&self.nanflow];
        out.extend(self.bins.values().map(|v| v as &dyn Container<Datum = V::Datum>));
        out
    }

    fn quantity_name(&self) -> Option<&str> {
        self.quantity.name()
    }

    fn to_fragment(&self, suppress_name: bool) -> Json {
        let bins: Map<String, Json> = self
            .bins
            .iter()
            .map(|(index, bin)| (index.to_string(), bin.to_fragment(true)))
            .collect();
        let bins_name = self
            .bins
            .values()
            .next()
            .and_then(|b| b.quantity_name())
            .or_else(|| self.template.as_deref().and_then(|t| t.quantity_name()));
        Payload::new()
            .float("binWidth", self.bin_width)
            .float("entries", self.entries)
            .field("bins:type", Json::from(self.content_type))
            .field("bins", Json::Object(bins))
            .field("nanflow:type", Json::from(self.nanflow.name()))
            .field("nanflow", self.nanflow.to_fragment(false))
            .float("origin", self.origin)
            .name("name", self.quantity.name().filter(|_| !suppress_name))
            .name("bins:name", bins_name)
            .build()
    }

    fn from_fragment(type_name: &str, json: &Json, name: Option<&str>) -> Result<Self> {
        wire::expect_type("SparselyBin", type_name)?;
        let fields = Fields::new("SparselyBin", json)?;
        fields.check_keys(
            &[
                "binWidth",
                "entries",
                "bins:type",
                "bins",
                "nanflow:type",
                "nanflow",
                "origin",
            ],
            &["name", "bins:name"],
        )?;
        let bin_width = fields.float("binWidth")?;
        let origin = fields.float("origin")?;
        let entries = fields.entries()?;
        let name = fields.opt_str("name")?.or(name);
        let bins_type = fields.type_name("bins:type")?;
        let bins_name = fields.opt_str("bins:name")?;
        let mut bins = BTreeMap::new();
        for (key, value) in fields.object("bins")? {
            let index: i64 = key
                .parse()
                .map_err(|_| fields.error("bins", format!("bin key {:?} is not an integer", key)))?;
            bins.insert(index, V::from_fragment(bins_type, value, bins_name)?);
        }
        let nanflow = N::from_fragment(
            fields.type_name("nanflow:type")?,
            fields.get("nanflow")?,
            None,
        )?;
        let mut out = Self::ed(bin_width, origin, entries, bins_type, bins, nanflow)
            .map_err(|e| fields.error("binWidth", e.to_string()))?;
        out.quantity = Quantity::placeholder(name.map(str::to_owned));
        Ok(out)
    }
}

impl<V: Container + Clone, N: Clone> Clone for SparselyBin<V, N> {
    fn clone(&self) -> Self {
        Self {
            quantity: self.quantity.clone(),
            bin_width: self.bin_width,
            origin: self.origin,
            entries: self.entries,
            bins: self.bins.clone(),
            nanflow: self.nanflow.clone(),
            template: self.template.clone(),
            content_type: self.content_type,
        }
    }
}

impl<V: Container, N: fmt::Debug> fmt::Debug for SparselyBin<V, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<SparselyBin binWidth={} origin={} bins={:?} nanflow={:?}>",
            self.bin_width, self.origin, self.bins, self.nanflow
        )
    }
}

impl<V, N> PartialEq for SparselyBin<V, N>
where
    V: Container + PartialEq,
    N: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        math::numeq(self.bin_width, other.bin_width)
            && math::numeq(self.origin, other.origin)
            && self.quantity == other.quantity
            && math::numeq(self.entries, other.entries)
            && self.content_type == other.content_type
            && self.bins == other.bins
            && self.nanflow == other.nanflow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::{Count, Sum};
    use serde_json::json;

    type Sparse = SparselyBin<Count<f64>, Count<f64>>;

    fn sparse() -> Sparse {
        SparselyBin::new(1.0, Quantity::identity(), Count::new(), Count::new()).unwrap()
    }

    #[test]
    fn test_sparse_growth_any_order() {
        for order in [[2.5, 5.5, 9.5], [9.5, 2.5, 5.5], [5.5, 9.5, 2.5]] {
            let mut hist = sparse();
            for x in order {
                hist.add(&x).unwrap();
            }
            assert_eq!(hist.num_filled(), 3);
            assert_eq!(hist.min_bin(), Some(2));
            assert_eq!(hist.max_bin(), Some(9));
            assert_eq!(hist.low(), Some(2.0));
            assert_eq!(hist.high(), Some(10.0));
        }
    }

    #[test]
    fn test_empty_has_no_range() {
        let hist = sparse();
        assert_eq!(hist.min_bin(), None);
        assert_eq!(hist.max_bin(), None);
        assert_eq!(hist.low(), None);
    }

    #[test]
    fn test_origin_and_negative_bins() {
        let mut hist = Sparse::with_origin(0.5, 1.0, Quantity::identity(), Count::new(), Count::new()).unwrap();
        hist.add(&0.9).unwrap();
        hist.add(&1.0).unwrap();
        hist.add(&f64::NAN).unwrap();
        assert_eq!(hist.min_bin(), Some(-1));
        assert_eq!(hist.max_bin(), Some(0));
        assert_eq!(hist.bin_range(-1), (0.5, 1.0));
        assert_eq!(hist.nanflow().entries(), 1.0);
        assert_eq!(hist.entries(), 3.0);
    }

    #[test]
    fn test_merge() {
        let mut a = sparse();
        let mut b = a.zero();
        a.add(&2.5).unwrap();
        b.add(&2.7).unwrap();
        b.add(&9.1).unwrap();
        let c = a.merge(&b).unwrap();
        assert_eq!(c.at(2).unwrap().entries(), 2.0);
        assert_eq!(c.at(9).unwrap().entries(), 1.0);
        assert_eq!(c.min_bin(), Some(2));
        assert_eq!(c.max_bin(), Some(9));
        assert_eq!(c.entries(), 3.0);

        let other = Sparse::new(2.0, Quantity::identity(), Count::new(), Count::new()).unwrap();
        assert!(matches!(a.merge(&other), Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn test_invalid_width() {
        assert!(Sparse::new(0.0, Quantity::identity(), Count::new(), Count::new()).is_err());
        assert!(Sparse::new(f64::NAN, Quantity::identity(), Count::new(), Count::new()).is_err());
    }

    #[test]
    fn test_failed_fill_creates_no_bin() {
        let mut hist = SparselyBin::new(
            1.0,
            Quantity::<f64>::identity(),
            Sum::new(Quantity::new(|_: &f64| "text")),
            Count::new(),
        )
        .unwrap();
        assert!(hist.add(&1.5).is_err());
        assert_eq!(hist.num_filled(), 0);
        assert_eq!(hist.entries(), 0.0);
    }

    #[test]
    fn test_wire() {
        let mut hist = SparselyBin::new(
            1.0,
            Quantity::named("x", |x: &f64| *x),
            Sum::new(Quantity::named("y", |x: &f64| *x)),
            Count::new(),
        )
        .unwrap();
        hist.add(&-1.5).unwrap();
        hist.add(&3.0).unwrap();
        let json = hist.to_wire();
        assert_eq!(json["data"]["bins:type"], json!("Sum"));
        assert_eq!(json["data"]["bins:name"], json!("y"));
        assert_eq!(json["data"]["bins"]["-2"], json!({"entries": 1.0, "sum": -1.5}));
        let back = SparselyBin::<Sum<f64>, Count<f64>>::from_wire(&json).unwrap();
        assert_eq!(back, hist);
    }

    #[test]
    fn test_empty_wire_keeps_bin_type() {
        let hist = SparselyBin::new(
            1.0,
            Quantity::<f64>::identity(),
            Sum::new(Quantity::identity()),
            Count::new(),
        )
        .unwrap();
        let json = hist.to_wire();
        assert_eq!(json["data"]["bins"], json!({}));
        let back = SparselyBin::<Sum<f64>, Count<f64>>::from_wire(&json).unwrap();
        assert_eq!(back.content_type(), "Sum");
        assert_eq!(back, hist);
    }

    #[test]
    fn test_bad_bin_key() {
        let json = json!({
            "type": "SparselyBin",
            "data": {
                "binWidth": 1.0, "entries": 1.0, "bins:type": "Count",
                "bins": {"two": 1.0}, "nanflow:type": "Count", "nanflow": 0.0, "origin": 0.0
            }
        });
        assert!(matches!(Sparse::from_wire(&json), Err(Error::Format { .. })));
    }
}
