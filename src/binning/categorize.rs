//! Categorize: one sub-container per distinct string category

use crate::error::{Error, Result};
use crate::math;
use crate::quantity::Quantity;
use crate::traits::{admits, require_same, Container};
use crate::wire::{self, Fields, Payload};
use core::fmt;
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Splits data by a string-valued quantity, creating a bin the first time
/// each category is seen.
///
/// Categories are kept sorted so encoding is reproducible.
pub struct Categorize<V: Container> {
    quantity: Quantity<V::Datum>,
    entries: f64,
    bins: BTreeMap<String, V>,
    template: Option<Arc<V>>,
    content_type: &'static str,
}

impl<V: Container> Categorize<V> {
    pub fn new(quantity: Quantity<V::Datum>, value: V) -> Self {
        let template = value.zero();
        Self {
            quantity,
            entries: 0.0,
            bins: BTreeMap::new(),
            content_type: template.name(),
            template: Some(Arc::new(template)),
        }
    }

    /// Create a categorization holding accumulated state directly.
    pub fn ed(entries: f64, content_type: &'static str, bins: BTreeMap<String, V>) -> Result<Self> {
        if let Some((key, bin)) = bins.iter().find(|(_, b)| b.name() != content_type) {
            return Err(Error::construction(format!(
                "category {:?} is a {}, expected {}",
                key,
                bin.name(),
                content_type
            )));
        }
        Ok(Self {
            quantity: Quantity::placeholder(None),
            entries: Error::check_entries(entries)?,
            template: bins.values().next().map(|b| Arc::new(b.zero())),
            bins,
            content_type,
        })
    }

    pub fn quantity(&self) -> &Quantity<V::Datum> {
        &self.quantity
    }

    pub fn bins(&self) -> &BTreeMap<String, V> {
        &self.bins
    }

    pub fn get(&self, category: &str) -> Option<&V> {
        self.bins.get(category)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.bins.keys().map(String::as_str)
    }

    pub fn size(&self) -> usize {
        self.bins.len()
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }
}

impl<V: Container + Clone> Container for Categorize<V> {
    type Datum = V::Datum;

    fn name(&self) -> &'static str {
        "Categorize"
    }

    fn entries(&self) -> f64 {
        self.entries
    }

    fn zero(&self) -> Self {
        Self {
            quantity: self.quantity.clone(),
            entries: 0.0,
            bins: BTreeMap::new(),
            template: self.template.clone(),
            content_type: self.content_type,
        }
    }

    fn check_fill(&self, datum: &V::Datum) -> Result<()> {
        let category = self.quantity.text(datum)?;
        match (self.bins.get(&category), self.template.as_deref()) {
            (Some(bin), _) | (None, Some(bin)) => bin.check_fill(datum),
            (None, None) => Err(Error::invalid_state(
                "Categorize has no bin template to fill",
            )),
        }
    }

    fn fill(&mut self, datum: &V::Datum, weight: f64) -> Result<()> {
        if admits(weight) {
            let category = self.quantity.text(datum)?;
            if let Some(bin) = self.bins.get_mut(&category) {
                bin.fill(datum, weight)?;
            } else {
                let template = self.template.as_ref().ok_or_else(|| {
                    Error::invalid_state("Categorize has no bin template to fill")
                })?;
                let mut bin = template.zero();
                bin.fill(datum, weight)?;
                tracing::trace!(category = %category, "materialized category");
                self.bins.insert(category, bin);
            }
            self.entries += weight;
        }
        Ok(())
    }

    fn merge(&self, other: &Self) -> Result<Self> {
        require_same(
            "Categorize",
            "bin type",
            &self.content_type,
            &other.content_type,
        )?;
        let mut bins = self.bins.clone();
        for (key, theirs) in &other.bins {
            let merged = match bins.get(key) {
                Some(mine) => mine.merge(theirs)?,
                None => theirs.clone(),
            };
            bins.insert(key.clone(), merged);
        }
        Ok(Self {
            quantity: self.quantity.or(&other.quantity),
            entries: self.entries + other.entries,
            bins,
            template: self.template.clone().or_else(|| other.template.clone()),
            content_type: self.content_type,
        })
    }

    fn children(&self) -> Vec<&dyn Container<Datum = V::Datum>> {
        self.bins
            .values()
            .map(|v| v as &dyn Container<Datum = V::Datum>)
            .collect()
    }

    fn quantity_name(&self) -> Option<&str> {
        self.quantity.name()
    }

    fn to_fragment(&self, suppress_name: bool) -> Json {
        let bins: Map<String, Json> = self
            .bins
            .iter()
            .map(|(key, bin)| (key.clone(), bin.to_fragment(true)))
            .collect();
        let bins_name = self
            .bins
            .values()
            .next()
            .and_then(|b| b.quantity_name())
            .or_else(|| self.template.as_deref().and_then(|t| t.quantity_name()));
        Payload::new()
            .float("entries", self.entries)
            .field("bins:type", Json::from(self.content_type))
            .field("bins", Json::Object(bins))
            .name("name", self.quantity.name().filter(|_| !suppress_name))
            .name("bins:name", bins_name)
            .build()
    }

    fn from_fragment(type_name: &str, json: &Json, name: Option<&str>) -> Result<Self> {
        wire::expect_type("Categorize", type_name)?;
        let fields = Fields::new("Categorize", json)?;
        fields.check_keys(&["entries", "bins:type", "bins"], &["name", "bins:name"])?;
        let entries = fields.entries()?;
        let name = fields.opt_str("name")?.or(name);
        let bins_type = fields.type_name("bins:type")?;
        let bins_name = fields.opt_str("bins:name")?;
        let bins = fields
            .object("bins")?
            .iter()
            .map(|(key, value)| Ok((key.clone(), V::from_fragment(bins_type, value, bins_name)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        let mut out = Self::ed(entries, bins_type, bins)?;
        out.quantity = Quantity::placeholder(name.map(str::to_owned));
        Ok(out)
    }
}

impl<V: Container + Clone> Clone for Categorize<V> {
    fn clone(&self) -> Self {
        Self {
            quantity: self.quantity.clone(),
            entries: self.entries,
            bins: self.bins.clone(),
            template: self.template.clone(),
            content_type: self.content_type,
        }
    }
}

impl<V: Container> fmt::Debug for Categorize<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Categorize bins={:?}>", self.bins)
    }
}

impl<V: Container + PartialEq> PartialEq for Categorize<V> {
    fn eq(&self, other: &Self) -> bool {
        self.quantity == other.quantity
            && math::numeq(self.entries, other.entries)
            && self.content_type == other.content_type
            && self.bins == other.bins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::{Average, Count};
    use serde_json::json;

    #[derive(Debug)]
    struct Car {
        make: &'static str,
        price: f64,
    }

    fn by_make() -> Categorize<Average<Car>> {
        Categorize::new(
            Quantity::named("make", |c: &Car| c.make),
            Average::new(Quantity::named("price", |c: &Car| c.price)),
        )
    }

    #[test]
    fn test_fill_creates_categories() {
        let mut cats = by_make();
        cats.add(&Car { make: "saab", price: 10.0 }).unwrap();
        cats.add(&Car { make: "volvo", price: 20.0 }).unwrap();
        cats.add(&Car { make: "saab", price: 30.0 }).unwrap();
        assert_eq!(cats.size(), 2);
        assert_eq!(cats.keys().collect::<Vec<_>>(), vec!["saab", "volvo"]);
        assert_eq!(cats.get("saab").unwrap().mean(), 20.0);
        assert_eq!(cats.entries(), 3.0);
    }

    #[test]
    fn test_numeric_quantity_rejected() {
        let mut cats: Categorize<Count<f64>> = Categorize::new(Quantity::identity(), Count::new());
        assert!(matches!(cats.add(&1.0), Err(Error::FillType { .. })));
        assert!(cats.is_empty());
    }

    #[test]
    fn test_merge_union() {
        let mut a = by_make();
        let mut b = a.zero();
        a.add(&Car { make: "saab", price: 10.0 }).unwrap();
        b.add(&Car { make: "saab", price: 30.0 }).unwrap();
        b.add(&Car { make: "fiat", price: 5.0 }).unwrap();
        let c = a.merge(&b).unwrap();
        assert_eq!(c.size(), 2);
        assert_eq!(c.get("saab").unwrap().entries(), 2.0);
        assert_eq!(c.get("fiat").unwrap().mean(), 5.0);
    }

    #[test]
    fn test_wire() {
        let mut cats = by_make();
        cats.add(&Car { make: "saab", price: 10.0 }).unwrap();
        let json = cats.to_wire();
        assert_eq!(
            json,
            json!({
                "type": "Categorize",
                "data": {
                    "entries": 1.0,
                    "bins:type": "Average",
                    "bins": {"saab": {"entries": 1.0, "mean": 10.0}},
                    "name": "make",
                    "bins:name": "price"
                }
            })
        );
        let back = Categorize::<Average<Car>>::from_wire(&json).unwrap();
        assert_eq!(back, cats);
    }
}
