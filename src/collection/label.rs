//! Label and UntypedLabel: string-keyed collections filled in parallel

use super::{common_type, fill_all};
use crate::aggregator::Aggregator;
use crate::error::{Error, Result};
use crate::math;
use crate::traits::{admits, require_same, Container};
use crate::wire::{self, Fields, Payload};
use core::fmt;
use serde_json::{Map, Value as Json};
use std::collections::{BTreeMap, BTreeSet};

fn collect_pairs<K, V, I>(container: &str, pairs: I) -> Result<BTreeMap<String, V>>
where
    K: Into<String>,
    I: IntoIterator<Item = (K, V)>,
{
    let mut out = BTreeMap::new();
    for (key, value) in pairs {
        let key = key.into();
        if out.contains_key(&key) {
            return Err(Error::construction(format!(
                "{} key {:?} given twice",
                container, key
            )));
        }
        out.insert(key, value);
    }
    if out.is_empty() {
        return Err(Error::construction(format!(
            "{} needs at least one pair",
            container
        )));
    }
    Ok(out)
}

/// Fills every one of a set of same-type containers, each under a name.
///
/// # Example
///
/// ```
/// use histoflow::binning::Bin;
/// use histoflow::collection::Label;
/// use histoflow::leaf::Count;
/// use histoflow::quantity::Quantity;
/// use histoflow::traits::Container;
///
/// let fine = Bin::new(100, 0.0, 1.0, Quantity::<f64>::identity(), Count::new(), Count::new()).unwrap();
/// let coarse = Bin::new(10, 0.0, 1.0, Quantity::<f64>::identity(), Count::new(), Count::new()).unwrap();
/// let mut label = Label::new([("fine", fine), ("coarse", coarse)]).unwrap();
/// label.add(&0.42).unwrap();
/// assert_eq!(label.get("coarse").unwrap().values()[4].entries(), 1.0);
/// ```
#[derive(Clone, Debug)]
pub struct Label<V> {
    entries: f64,
    pairs: BTreeMap<String, V>,
}

impl<V: Container> Label<V> {
    /// Create an empty label set; fails if `pairs` is empty, repeats a key
    /// or mixes container types.
    pub fn new<K, I>(pairs: I) -> Result<Self>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::ed(0.0, pairs)
    }

    /// Create a label set holding accumulated state directly.
    pub fn ed<K, I>(entries: f64, pairs: I) -> Result<Self>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let pairs = collect_pairs("Label", pairs)?;
        common_type("Label", pairs.values())?;
        Ok(Self {
            entries: Error::check_entries(entries)?,
            pairs,
        })
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.pairs.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.pairs.values()
    }

    pub fn pairs(&self) -> &BTreeMap<String, V> {
        &self.pairs
    }

    pub fn size(&self) -> usize {
        self.pairs.len()
    }

    pub fn key_set(&self) -> BTreeSet<&str> {
        self.keys().collect()
    }

    fn content_type(&self) -> &'static str {
        self.pairs.values().next().map_or("Count", |v| v.name())
    }
}

impl<V: Container> Container for Label<V> {
    type Datum = V::Datum;

    fn name(&self) -> &'static str {
        "Label"
    }

    fn entries(&self) -> f64 {
        self.entries
    }

    fn zero(&self) -> Self {
        Self {
            entries: 0.0,
            pairs: self
                .pairs
                .iter()
                .map(|(k, v)| (k.clone(), v.zero()))
                .collect(),
        }
    }

    fn check_fill(&self, datum: &V::Datum) -> Result<()> {
        self.pairs.values().try_for_each(|v| v.check_fill(datum))
    }

    fn fill(&mut self, datum: &V::Datum, weight: f64) -> Result<()> {
        if admits(weight) {
            fill_all(self.pairs.values_mut(), datum, weight)?;
            self.entries += weight;
        }
        Ok(())
    }

    fn merge(&self, other: &Self) -> Result<Self> {
        require_same("Label", "keys", &self.key_set(), &other.key_set())?;
        let pairs = self
            .pairs
            .iter()
            .zip(other.pairs.values())
            .map(|((k, a), b)| Ok((k.clone(), a.merge(b)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self {
            entries: self.entries + other.entries,
            pairs,
        })
    }

    fn children(&self) -> Vec<&dyn Container<Datum = V::Datum>> {
        self.pairs
            .values()
            .map(|v| v as &dyn Container<Datum = V::Datum>)
            .collect()
    }

    fn to_fragment(&self, _suppress_name: bool) -> Json {
        let data: Map<String, Json> = self
            .pairs
            .iter()
            .map(|(k, v)| (k.clone(), v.to_fragment(false)))
            .collect();
        Payload::new()
            .float("entries", self.entries)
            .field("sub:type", Json::from(self.content_type()))
            .field("data", Json::Object(data))
            .build()
    }

    fn from_fragment(type_name: &str, json: &Json, _name: Option<&str>) -> Result<Self> {
        wire::expect_type("Label", type_name)?;
        let fields = Fields::new("Label", json)?;
        fields.check_keys(&["entries", "sub:type", "data"], &[])?;
        let entries = fields.entries()?;
        let sub_type = fields.type_name("sub:type")?;
        let pairs = fields
            .object("data")?
            .iter()
            .map(|(k, v)| Ok((k.clone(), V::from_fragment(sub_type, v, None)?)))
            .collect::<Result<Vec<_>>>()?;
        Self::ed(entries, pairs).map_err(|e| fields.error("data", e.to_string()))
    }
}

impl<V: PartialEq> PartialEq for Label<V> {
    fn eq(&self, other: &Self) -> bool {
        math::numeq(self.entries, other.entries) && self.pairs == other.pairs
    }
}

/// Like [`Label`], but each named child may be any type of container.
pub struct UntypedLabel<D> {
    entries: f64,
    pairs: BTreeMap<String, Aggregator<D>>,
}

impl<D> Clone for UntypedLabel<D> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries,
            pairs: self.pairs.clone(),
        }
    }
}

impl<D> fmt::Debug for UntypedLabel<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UntypedLabel")
            .field("entries", &self.entries)
            .field("pairs", &self.pairs)
            .finish()
    }
}

impl<D> UntypedLabel<D> {
    /// Create an empty label set; fails if `pairs` is empty or repeats a key.
    pub fn new<K, I>(pairs: I) -> Result<Self>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Aggregator<D>)>,
    {
        Self::ed(0.0, pairs)
    }

    /// Create a label set holding accumulated state directly.
    pub fn ed<K, I>(entries: f64, pairs: I) -> Result<Self>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Aggregator<D>)>,
    {
        Ok(Self {
            entries: Error::check_entries(entries)?,
            pairs: collect_pairs("UntypedLabel", pairs)?,
        })
    }

    pub fn get(&self, key: &str) -> Option<&Aggregator<D>> {
        self.pairs.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Aggregator<D>> {
        self.pairs.values()
    }

    pub fn size(&self) -> usize {
        self.pairs.len()
    }

    pub fn key_set(&self) -> BTreeSet<&str> {
        self.keys().collect()
    }
}

impl<D> Container for UntypedLabel<D> {
    type Datum = D;

    fn name(&self) -> &'static str {
        "UntypedLabel"
    }

    fn entries(&self) -> f64 {
        self.entries
    }

    fn zero(&self) -> Self {
        Self {
            entries: 0.0,
            pairs: self
                .pairs
                .iter()
                .map(|(k, v)| (k.clone(), v.zero()))
                .collect(),
        }
    }

    fn check_fill(&self, datum: &D) -> Result<()> {
        self.pairs.values().try_for_each(|v| v.check_fill(datum))
    }

    fn fill(&mut self, datum: &D, weight: f64) -> Result<()> {
        if admits(weight) {
            fill_all(self.pairs.values_mut(), datum, weight)?;
            self.entries += weight;
        }
        Ok(())
    }

    fn merge(&self, other: &Self) -> Result<Self> {
        require_same("UntypedLabel", "keys", &self.key_set(), &other.key_set())?;
        let pairs = self
            .pairs
            .iter()
            .zip(other.pairs.values())
            .map(|((k, a), b)| Ok((k.clone(), a.merge(b)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self {
            entries: self.entries + other.entries,
            pairs,
        })
    }

    fn children(&self) -> Vec<&dyn Container<Datum = D>> {
        self.pairs
            .values()
            .map(|v| v as &dyn Container<Datum = D>)
            .collect()
    }

    fn to_fragment(&self, _suppress_name: bool) -> Json {
        let data: Map<String, Json> = self
            .pairs
            .iter()
            .map(|(k, v)| (k.clone(), v.to_wire()))
            .collect();
        Payload::new()
            .float("entries", self.entries)
            .field("data", Json::Object(data))
            .build()
    }

    fn from_fragment(type_name: &str, json: &Json, _name: Option<&str>) -> Result<Self> {
        wire::expect_type("UntypedLabel", type_name)?;
        let fields = Fields::new("UntypedLabel", json)?;
        fields.check_keys(&["entries", "data"], &[])?;
        let entries = fields.entries()?;
        let pairs = fields
            .object("data")?
            .iter()
            .map(|(k, v)| Ok((k.clone(), Aggregator::from_wire(v)?)))
            .collect::<Result<Vec<_>>>()?;
        Self::ed(entries, pairs).map_err(|e| fields.error("data", e.to_string()))
    }
}

impl<D> PartialEq for UntypedLabel<D> {
    fn eq(&self, other: &Self) -> bool {
        math::numeq(self.entries, other.entries) && self.pairs == other.pairs
    }
}
