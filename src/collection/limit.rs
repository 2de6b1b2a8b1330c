//! Limit: keep a detailed sub-container only while the total weight is small

use crate::error::{Error, Result};
use crate::math;
use crate::traits::{admits, require_same, Container};
use crate::wire::{self, Fields, Payload};
use serde_json::Value as Json;
use std::sync::Arc;

fn check_limit(limit: f64) -> Result<()> {
    if limit.is_nan() {
        return Err(Error::construction("Limit limit cannot be NaN"));
    }
    Ok(())
}

/// Fills `value` until the total weight would exceed `limit`, then drops it
/// and only keeps counting entries.
///
/// Useful to keep raw points (for example a [`Bag`](crate::leaf::Bag)) in
/// sparsely populated regions of a larger binning.
///
/// # Example
///
/// ```
/// use histoflow::collection::Limit;
/// use histoflow::leaf::Count;
/// use histoflow::traits::Container;
///
/// let mut limit = Limit::new(2.0, Count::<f64>::new()).unwrap();
/// limit.add(&1.0).unwrap();
/// limit.add(&1.0).unwrap();
/// assert!(!limit.is_saturated());
/// limit.add(&1.0).unwrap();
/// assert!(limit.is_saturated());
/// assert_eq!(limit.entries(), 3.0);
/// ```
#[derive(Clone, Debug)]
pub struct Limit<V> {
    entries: f64,
    limit: f64,
    content_type: &'static str,
    value: Option<V>,
    // restores `value` on `zero`, `None` only for decoded saturated limits
    template: Option<Arc<V>>,
}

impl<V: Container> Limit<V> {
    /// Create an empty limit; fails if `limit` is NaN.
    pub fn new(limit: f64, value: V) -> Result<Self> {
        check_limit(limit)?;
        let template = value.zero();
        Ok(Self {
            entries: 0.0,
            limit,
            content_type: value.name(),
            value: Some(value.zero()),
            template: Some(Arc::new(template)),
        })
    }

    /// Create a limit holding accumulated state directly; `value` is `None`
    /// for a saturated one.
    pub fn ed(entries: f64, limit: f64, content_type: &'static str, value: Option<V>) -> Result<Self> {
        if let Some(v) = &value {
            if v.name() != content_type {
                return Err(Error::construction(format!(
                    "Limit value is a {}, expected {}",
                    v.name(),
                    content_type
                )));
            }
        }
        check_limit(limit)?;
        Ok(Self {
            entries: Error::check_entries(entries)?,
            limit,
            content_type,
            template: value.as_ref().map(|v| Arc::new(v.zero())),
            value,
        })
    }

    pub fn limit(&self) -> f64 {
        self.limit
    }

    /// Type name of the wrapped container
    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// The wrapped container, `None` once saturated.
    pub fn get(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn is_saturated(&self) -> bool {
        self.value.is_none()
    }
}

impl<V: Container> Container for Limit<V> {
    type Datum = V::Datum;

    fn name(&self) -> &'static str {
        "Limit"
    }

    fn entries(&self) -> f64 {
        self.entries
    }

    fn zero(&self) -> Self {
        Self {
            entries: 0.0,
            limit: self.limit,
            content_type: self.content_type,
            value: self.template.as_deref().map(Container::zero),
            template: self.template.clone(),
        }
    }

    fn check_fill(&self, datum: &V::Datum) -> Result<()> {
        match &self.value {
            Some(v) => v.check_fill(datum),
            None => Ok(()),
        }
    }

    fn fill(&mut self, datum: &V::Datum, weight: f64) -> Result<()> {
        if admits(weight) {
            if self.entries + weight > self.limit {
                if self.value.take().is_some() {
                    tracing::debug!(limit = self.limit, "limit saturated, dropping value");
                }
            } else if let Some(v) = &mut self.value {
                v.fill(datum, weight)?;
            }
            self.entries += weight;
        }
        Ok(())
    }

    fn merge(&self, other: &Self) -> Result<Self> {
        require_same("Limit", "limit", &self.limit, &other.limit)?;
        require_same("Limit", "value type", &self.content_type, &other.content_type)?;
        let entries = self.entries + other.entries;
        let value = match (&self.value, &other.value) {
            (Some(a), Some(b)) if entries <= self.limit => Some(a.merge(b)?),
            _ => None,
        };
        Ok(Self {
            entries,
            limit: self.limit,
            content_type: self.content_type,
            value,
            template: self.template.clone().or_else(|| other.template.clone()),
        })
    }

    fn children(&self) -> Vec<&dyn Container<Datum = V::Datum>> {
        match &self.value {
            Some(v) => vec![v as &dyn Container<Datum = V::Datum>],
            None => Vec::new(),
        }
    }

    fn to_fragment(&self, _suppress_name: bool) -> Json {
        Payload::new()
            .float("entries", self.entries)
            .float("limit", self.limit)
            .field("type", Json::from(self.content_type))
            .field(
                "data",
                self.value
                    .as_ref()
                    .map_or(Json::Null, |v| v.to_fragment(false)),
            )
            .build()
    }

    fn from_fragment(type_name: &str, json: &Json, _name: Option<&str>) -> Result<Self> {
        wire::expect_type("Limit", type_name)?;
        let fields = Fields::new("Limit", json)?;
        fields.check_keys(&["entries", "limit", "type", "data"], &[])?;
        let entries = fields.entries()?;
        let limit = fields.float("limit")?;
        let content_type = fields.type_name("type")?;
        let value = match fields.get("data")? {
            Json::Null => None,
            data => Some(V::from_fragment(content_type, data, None)?),
        };
        Self::ed(entries, limit, content_type, value)
    }
}

impl<V: PartialEq> PartialEq for Limit<V> {
    fn eq(&self, other: &Self) -> bool {
        math::numeq(self.entries, other.entries)
            && math::numeq(self.limit, other.limit)
            && self.content_type == other.content_type
            && self.value == other.value
    }
}
