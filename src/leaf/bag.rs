//! Bag: multiset of distinct observed values and their total weights

use crate::error::{Error, Result};
use crate::math;
use crate::quantity::{Quantity, Value};
use crate::traits::{admits, require_same, Container};
use crate::wire::{self, Fields, Payload};
use core::cmp::Ordering;
use core::fmt;
use serde_json::Value as Json;
use std::collections::BTreeMap;

/// Kind of value a bag collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BagRange {
    /// Numbers (wire tag `"N"`)
    Number,
    /// Strings (wire tag `"S"`)
    Text,
    /// Fixed-length vectors of numbers (wire tag `"N<dim>"`)
    Vector(usize),
}

impl BagRange {
    fn tag(&self) -> String {
        match self {
            BagRange::Number => "N".into(),
            BagRange::Text => "S".into(),
            BagRange::Vector(dim) => format!("N{}", dim),
        }
    }

    fn parse(tag: &str) -> Option<Self> {
        match tag {
            "N" => Some(BagRange::Number),
            "S" => Some(BagRange::Text),
            _ => tag
                .strip_prefix('N')
                .and_then(|dim| dim.parse().ok())
                .map(BagRange::Vector),
        }
    }

    fn admit(&self, value: Value) -> Result<BagValue> {
        match (self, value) {
            (BagRange::Number, v @ (Value::Number(_) | Value::Boolean(_))) => {
                Ok(BagValue::Number(canonical(v.to_number()?)))
            }
            (BagRange::Text, Value::Text(s)) => Ok(BagValue::Text(s)),
            (BagRange::Vector(dim), Value::Vector(v)) if v.len() == *dim => {
                Ok(BagValue::Vector(v.into_iter().map(canonical).collect()))
            }
            (BagRange::Vector(_), Value::Vector(_)) => Err(Error::FillType {
                expected: "vector of the bag's dimension",
                found: "vector of another dimension",
            }),
            (range, other) => Err(Error::FillType {
                expected: match range {
                    BagRange::Number => "number",
                    BagRange::Text => "text",
                    BagRange::Vector(_) => "vector",
                },
                found: other.kind(),
            }),
        }
    }
}

/// One key per number: `-0.0` folds into `0.0` and every NaN into `f64::NAN`.
#[inline]
fn canonical(x: f64) -> f64 {
    if x.is_nan() {
        f64::NAN
    } else if x == 0.0 {
        0.0
    } else {
        x
    }
}

/// A distinct value held by a [`Bag`].
///
/// Numbers are ordered with `f64::total_cmp`, so NaN is a valid key and the
/// iteration order is deterministic.
#[derive(Debug, Clone)]
pub enum BagValue {
    Number(f64),
    Text(String),
    Vector(Vec<f64>),
}

impl BagValue {
    fn rank(&self) -> u8 {
        match self {
            BagValue::Number(_) => 0,
            BagValue::Text(_) => 1,
            BagValue::Vector(_) => 2,
        }
    }

    fn to_json(&self) -> Json {
        match self {
            BagValue::Number(x) => math::float_to_json(*x),
            BagValue::Text(s) => Json::from(s.as_str()),
            BagValue::Vector(v) => Json::Array(v.iter().map(|x| math::float_to_json(*x)).collect()),
        }
    }

    fn from_json(range: BagRange, json: &Json) -> Option<Self> {
        match range {
            BagRange::Number => math::json_to_float(json).map(|x| BagValue::Number(canonical(x))),
            BagRange::Text => json.as_str().map(|s| BagValue::Text(s.to_owned())),
            BagRange::Vector(dim) => {
                let items = json.as_array()?;
                if items.len() != dim {
                    return None;
                }
                items
                    .iter()
                    .map(|x| math::json_to_float(x).map(canonical))
                    .collect::<Option<Vec<_>>>()
                    .map(BagValue::Vector)
            }
        }
    }
}

impl Ord for BagValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (BagValue::Number(a), BagValue::Number(b)) => canonical(*a).total_cmp(&canonical(*b)),
            (BagValue::Text(a), BagValue::Text(b)) => a.cmp(b),
            (BagValue::Vector(a), BagValue::Vector(b)) => {
                for (x, y) in a.iter().zip(b) {
                    match canonical(*x).total_cmp(&canonical(*y)) {
                        Ordering::Equal => continue,
                        ord => return ord,
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for BagValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for BagValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BagValue {}

/// Accumulates the weight of every distinct value of a quantity.
///
/// With a `limit`, the bag saturates once it would hold more than `limit`
/// distinct values: the values are dropped and only `entries` keeps counting.
pub struct Bag<D> {
    quantity: Quantity<D>,
    range: BagRange,
    limit: Option<usize>,
    entries: f64,
    // None once saturated
    values: Option<BTreeMap<BagValue, f64>>,
}

impl<D> Bag<D> {
    /// Create an unbounded bag
    pub fn new(quantity: Quantity<D>, range: BagRange) -> Self {
        Self {
            quantity,
            range,
            limit: None,
            entries: 0.0,
            values: Some(BTreeMap::new()),
        }
    }

    /// Create a bag holding at most `limit` distinct values
    pub fn with_limit(quantity: Quantity<D>, range: BagRange, limit: usize) -> Self {
        let mut out = Self::new(quantity, range);
        out.limit = Some(limit);
        out
    }

    /// Create a bag holding accumulated state directly (`None` = saturated).
    pub fn ed(
        entries: f64,
        range: BagRange,
        limit: Option<usize>,
        values: Option<BTreeMap<BagValue, f64>>,
    ) -> Result<Self> {
        if let (Some(limit), Some(values)) = (limit, &values) {
            if values.len() > limit {
                return Err(Error::invalid_state(format!(
                    "bag holds {} values, more than its limit {}",
                    values.len(),
                    limit
                )));
            }
        }
        Ok(Self {
            quantity: Quantity::placeholder(None),
            range,
            limit,
            entries: Error::check_entries(entries)?,
            values,
        })
    }

    pub fn range(&self) -> BagRange {
        self.range
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Distinct values and their weights, `None` when saturated
    pub fn values(&self) -> Option<&BTreeMap<BagValue, f64>> {
        self.values.as_ref()
    }

    pub fn is_saturated(&self) -> bool {
        self.values.is_none()
    }

    fn check_limit(&mut self) {
        let over = match (self.limit, &self.values) {
            (Some(limit), Some(values)) => values.len() > limit,
            _ => false,
        };
        if over {
            tracing::debug!(limit = ?self.limit, entries = self.entries, "bag saturated");
            self.values = None;
        }
    }
}

impl<D> Container for Bag<D> {
    type Datum = D;

    fn name(&self) -> &'static str {
        "Bag"
    }

    fn entries(&self) -> f64 {
        self.entries
    }

    fn zero(&self) -> Self {
        Self {
            quantity: self.quantity.clone(),
            range: self.range,
            limit: self.limit,
            entries: 0.0,
            values: Some(BTreeMap::new()),
        }
    }

    fn check_fill(&self, datum: &D) -> Result<()> {
        self.range.admit(self.quantity.eval(datum)?).map(|_| ())
    }

    fn fill(&mut self, datum: &D, weight: f64) -> Result<()> {
        if admits(weight) {
            let value = self.range.admit(self.quantity.eval(datum)?)?;
            self.entries += weight;
            if let Some(values) = &mut self.values {
                *values.entry(value).or_insert(0.0) += weight;
            }
            self.check_limit();
        }
        Ok(())
    }

    fn merge(&self, other: &Self) -> Result<Self> {
        require_same("Bag", "range", &self.range, &other.range)?;
        require_same("Bag", "limit", &self.limit, &other.limit)?;
        let values = match (&self.values, &other.values) {
            (Some(left), Some(right)) => {
                let mut out = left.clone();
                for (value, weight) in right {
                    *out.entry(value.clone()).or_insert(0.0) += weight;
                }
                Some(out)
            }
            _ => None,
        };
        let mut out = Self {
            quantity: self.quantity.or(&other.quantity),
            range: self.range,
            limit: self.limit,
            entries: self.entries + other.entries,
            values,
        };
        out.check_limit();
        Ok(out)
    }

    fn children(&self) -> Vec<&dyn Container<Datum = D>> {
        Vec::new()
    }

    fn quantity_name(&self) -> Option<&str> {
        self.quantity.name()
    }

    fn to_fragment(&self, suppress_name: bool) -> Json {
        let values = match &self.values {
            Some(values) => Json::Array(
                values
                    .iter()
                    .map(|(v, w)| {
                        Payload::new()
                            .float("w", *w)
                            .field("v", v.to_json())
                            .build()
                    })
                    .collect(),
            ),
            None => Json::Null,
        };
        let mut payload = Payload::new()
            .float("entries", self.entries)
            .field("values", values)
            .field("range", Json::from(self.range.tag()));
        if let Some(limit) = self.limit {
            payload = payload.field("limit", Json::from(limit));
        }
        payload
            .name("name", self.quantity.name().filter(|_| !suppress_name))
            .build()
    }

    fn from_fragment(type_name: &str, json: &Json, name: Option<&str>) -> Result<Self> {
        wire::expect_type("Bag", type_name)?;
        let fields = Fields::new("Bag", json)?;
        fields.check_keys(&["entries", "values", "range"], &["limit", "name"])?;
        let entries = fields.entries()?;
        let range = BagRange::parse(fields.str("range")?)
            .ok_or_else(|| fields.error("range", "expected \"N\", \"S\" or \"N<dim>\""))?;
        let limit = match fields.opt("limit") {
            Some(json) => Some(
                json.as_u64()
                    .ok_or_else(|| fields.error("limit", "expected a non-negative integer"))?
                    as usize,
            ),
            None => None,
        };
        let values = match fields.get("values")? {
            Json::Null => None,
            Json::Array(items) => {
                let mut values = BTreeMap::new();
                for item in items {
                    let pair = fields.nested("values", item)?;
                    pair.check_keys(&["w", "v"], &[])?;
                    let weight = pair.float("w")?;
                    let value = BagValue::from_json(range, pair.get("v")?)
                        .ok_or_else(|| fields.error("values", "value does not match range"))?;
                    *values.entry(value).or_insert(0.0) += weight;
                }
                Some(values)
            }
            _ => return Err(fields.error("values", "expected an array or null")),
        };
        let mut out = Self::ed(entries, range, limit, values)?;
        out.quantity = Quantity::placeholder(fields.opt_str("name")?.or(name).map(str::to_owned));
        Ok(out)
    }
}

impl<D> Clone for Bag<D> {
    fn clone(&self) -> Self {
        Self {
            quantity: self.quantity.clone(),
            range: self.range,
            limit: self.limit,
            entries: self.entries,
            values: self.values.clone(),
        }
    }
}

impl<D> fmt::Debug for Bag<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.values {
            Some(values) => write!(f, "<Bag size={} range={}>", values.len(), self.range.tag()),
            None => write!(f, "<Bag saturated range={}>", self.range.tag()),
        }
    }
}

impl<D> PartialEq for Bag<D> {
    fn eq(&self, other: &Self) -> bool {
        let values_eq = match (&self.values, &other.values) {
            (Some(a), Some(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((va, wa), (vb, wb))| va == vb && math::numeq(*wa, *wb))
            }
            (None, None) => true,
            _ => false,
        };
        self.quantity == other.quantity
            && self.range == other.range
            && self.limit == other.limit
            && math::numeq(self.entries, other.entries)
            && values_eq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn numbers() -> Bag<f64> {
        Bag::new(Quantity::identity(), BagRange::Number)
    }

    #[test]
    fn test_basic() {
        let mut bag = numbers();
        for v in [1.0, 2.0, 1.0, f64::NAN] {
            bag.add(&v).unwrap();
        }
        let values = bag.values().unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[&BagValue::Number(1.0)], 2.0);
        assert_eq!(values[&BagValue::Number(f64::NAN)], 1.0);
        assert_eq!(bag.entries(), 4.0);
    }

    #[test]
    fn test_signed_zero_is_one_value() {
        let mut bag = numbers();
        bag.add(&0.0).unwrap();
        bag.add(&-0.0).unwrap();
        let values = bag.values().unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[&BagValue::Number(0.0)], 2.0);
        assert_eq!(values[&BagValue::Number(-0.0)], 2.0);
        assert_eq!(bag.to_wire()["data"]["values"][0]["v"], json!(0.0));
    }

    #[test]
    fn test_nan_payloads_are_one_value() {
        let mut bag = numbers();
        bag.add(&-f64::NAN).unwrap();
        bag.add(&f64::NAN).unwrap();
        assert_eq!(bag.values().unwrap().len(), 1);
        let back = Bag::<f64>::from_wire(&bag.to_wire()).unwrap();
        assert_eq!(back, bag);

        let mut vectors = Bag::new(Quantity::new(|x: &f64| vec![*x, 1.0]), BagRange::Vector(2));
        for x in [0.0, -0.0, f64::NAN, -f64::NAN] {
            vectors.add(&x).unwrap();
        }
        assert_eq!(vectors.values().unwrap().len(), 2);
        assert_eq!(Bag::<f64>::from_wire(&vectors.to_wire()).unwrap(), vectors);
    }

    #[test]
    fn test_text() {
        let mut bag = Bag::new(Quantity::new(|s: &String| s.clone()), BagRange::Text);
        bag.add(&"a".to_string()).unwrap();
        bag.fill(&"b".to_string(), 2.0).unwrap();
        assert_eq!(bag.values().unwrap()[&BagValue::Text("b".into())], 2.0);
    }

    #[test]
    fn test_wrong_kind() {
        let mut bag = Bag::new(Quantity::<f64>::identity(), BagRange::Text);
        assert!(matches!(bag.add(&1.0), Err(Error::FillType { .. })));
        assert_eq!(bag.entries(), 0.0);

        let mut vectors = Bag::new(Quantity::new(|x: &f64| vec![*x, *x]), BagRange::Vector(3));
        assert!(vectors.add(&1.0).is_err());
    }

    #[test]
    fn test_merge() {
        let mut a = numbers();
        let mut b = numbers();
        a.add(&1.0).unwrap();
        b.add(&1.0).unwrap();
        b.add(&3.0).unwrap();
        let c = a.merge(&b).unwrap();
        assert_eq!(c.values().unwrap()[&BagValue::Number(1.0)], 2.0);
        assert_eq!(c.values().unwrap()[&BagValue::Number(3.0)], 1.0);
        assert_eq!(c.entries(), 3.0);

        let text = Bag::<f64>::ed(0.0, BagRange::Text, None, Some(BTreeMap::new())).unwrap();
        assert!(a.merge(&text).is_err());
    }

    #[test]
    fn test_limit_saturates() {
        let mut bag = Bag::with_limit(Quantity::<f64>::identity(), BagRange::Number, 2);
        bag.add(&1.0).unwrap();
        bag.add(&2.0).unwrap();
        bag.add(&1.0).unwrap();
        assert!(!bag.is_saturated());
        bag.add(&3.0).unwrap();
        assert!(bag.is_saturated());
        assert_eq!(bag.entries(), 4.0);

        let back = Bag::<f64>::from_wire(&bag.to_wire()).unwrap();
        assert!(back.is_saturated());
        assert_eq!(back.limit(), Some(2));
    }

    #[test]
    fn test_wire() {
        let mut bag = Bag::new(Quantity::new(|x: &f64| vec![*x, 2.0 * x]), BagRange::Vector(2));
        bag.add(&1.0).unwrap();
        bag.add(&f64::INFINITY).unwrap();
        let json = bag.to_wire();
        assert_eq!(json["data"]["range"], json!("N2"));
        assert_eq!(json["data"]["values"][0], json!({"w": 1.0, "v": [1.0, 2.0]}));
        assert_eq!(json["data"]["values"][1], json!({"w": 1.0, "v": ["inf", "inf"]}));
        assert_eq!(Bag::<f64>::from_wire(&json).unwrap(), bag);
    }
}
