//! Stack and Partition: sub-containers keyed by ascending cut thresholds

use crate::error::{Error, Result};
use crate::math;
use crate::quantity::Quantity;
use crate::traits::{admits, require_same, Container};
use crate::wire::{self, Fields, Payload};
use core::cmp::Ordering;
use core::fmt;
use serde_json::Value as Json;

/// Prepend `-inf` to the sorted thresholds.
fn cut_points(thresholds: &[f64]) -> Result<Vec<f64>> {
    if let Some(bad) = thresholds.iter().find(|t| !t.is_finite()) {
        return Err(Error::construction(format!(
            "thresholds must be finite, found {}",
            bad
        )));
    }
    let mut cuts = thresholds.to_vec();
    cuts.sort_by(f64::total_cmp);
    cuts.dedup();
    cuts.insert(0, f64::NEG_INFINITY);
    Ok(cuts)
}

/// Fail unless cuts start at `-inf` and strictly increase.
fn check_cuts(container: &str, cuts: &[f64]) -> Result<()> {
    match cuts.first() {
        Some(first) if *first == f64::NEG_INFINITY => {}
        _ => {
            return Err(Error::construction(format!(
                "{} cuts must start at -inf",
                container
            )))
        }
    }
    if cuts
        .windows(2)
        .any(|w| w[0].partial_cmp(&w[1]) != Some(Ordering::Less))
    {
        return Err(Error::construction(format!(
            "{} cuts must strictly increase",
            container
        )));
    }
    Ok(())
}

/// Children of a Stack for value `q`: every cut at or below it.
fn stack_targets(cuts: &[f64], q: f64) -> std::ops::Range<usize> {
    0..cuts.iter().take_while(|c| **c <= q).count()
}

/// Child of a Partition for value `q`: the last cut at or below it.
fn partition_targets(cuts: &[f64], q: f64) -> std::ops::Range<usize> {
    let n = cuts.iter().take_while(|c| **c <= q).count();
    n.saturating_sub(1)..n
}

macro_rules! cut_container {
    ($(#[$doc:meta])* $ty:ident, $tag:literal, $targets:path) => {
        $(#[$doc])*
        pub struct $ty<V: Container, N = V> {
            quantity: Quantity<V::Datum>,
            entries: f64,
            cuts: Vec<(f64, V)>,
            nanflow: N,
        }

        impl<V, N> $ty<V, N>
        where
            V: Container,
            N: Container<Datum = V::Datum>,
        {
            /// Create an empty container with one child below the lowest
            /// threshold and one per threshold.
            pub fn new(thresholds: &[f64], quantity: Quantity<V::Datum>, value: V, nanflow: N) -> Result<Self> {
                let cuts = cut_points(thresholds)?
                    .into_iter()
                    .map(|c| (c, value.zero()))
                    .collect();
                Ok(Self {
                    quantity,
                    entries: 0.0,
                    cuts,
                    nanflow: nanflow.zero(),
                })
            }

            /// Create a container holding accumulated state directly.
            pub fn ed(entries: f64, cuts: Vec<(f64, V)>, nanflow: N) -> Result<Self> {
                let thresholds: Vec<f64> = cuts.iter().map(|(c, _)| *c).collect();
                check_cuts($tag, &thresholds)?;
                super::common_type($tag, cuts.iter().map(|(_, v)| v))?;
                Ok(Self {
                    quantity: Quantity::placeholder(None),
                    entries: Error::check_entries(entries)?,
                    cuts,
                    nanflow,
                })
            }

            pub fn quantity(&self) -> &Quantity<V::Datum> {
                &self.quantity
            }

            /// `(threshold, container)` pairs, starting at `-inf`
            pub fn cuts(&self) -> &[(f64, V)] {
                &self.cuts
            }

            pub fn thresholds(&self) -> Vec<f64> {
                self.cuts.iter().map(|(c, _)| *c).collect()
            }

            pub fn values(&self) -> impl Iterator<Item = &V> {
                self.cuts.iter().map(|(_, v)| v)
            }

            pub fn nanflow(&self) -> &N {
                &self.nanflow
            }

            pub fn size(&self) -> usize {
                self.cuts.len()
            }

            fn targets(&self, q: f64) -> std::ops::Range<usize> {
                let thresholds = self.thresholds();
                $targets(&thresholds, q)
            }
        }

        impl<V, N> Container for $ty<V, N>
        where
            V: Container,
            N: Container<Datum = V::Datum>,
        {
            type Datum = V::Datum;

            fn name(&self) -> &'static str {
                $tag
            }

            fn entries(&self) -> f64 {
                self.entries
            }

            fn zero(&self) -> Self {
                Self {
                    quantity: self.quantity.clone(),
                    entries: 0.0,
                    cuts: self.cuts.iter().map(|(c, v)| (*c, v.zero())).collect(),
                    nanflow: self.nanflow.zero(),
                }
            }

            fn check_fill(&self, datum: &V::Datum) -> Result<()> {
                let q = self.quantity.number(datum)?;
                if q.is_nan() {
                    return self.nanflow.check_fill(datum);
                }
                self.cuts[self.targets(q)]
                    .iter()
                    .try_for_each(|(_, v)| v.check_fill(datum))
            }

            fn fill(&mut self, datum: &V::Datum, weight: f64) -> Result<()> {
                if admits(weight) {
                    let q = self.quantity.number(datum)?;
                    if q.is_nan() {
                        self.nanflow.fill(datum, weight)?;
                    } else {
                        let targets = self.targets(q);
                        super::fill_all(
                            self.cuts[targets].iter_mut().map(|(_, v)| v),
                            datum,
                            weight,
                        )?;
                    }
                    self.entries += weight;
                }
                Ok(())
            }

            fn merge(&self, other: &Self) -> Result<Self> {
                require_same($tag, "thresholds", &self.thresholds(), &other.thresholds())?;
                let cuts = self
                    .cuts
                    .iter()
                    .zip(&other.cuts)
                    .map(|((c, a), (_, b))| Ok((*c, a.merge(b)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self {
                    quantity: self.quantity.or(&other.quantity),
                    entries: self.entries + other.entries,
                    cuts,
                    nanflow: self.nanflow.merge(&other.nanflow)?,
                })
            }

            fn children(&self) -> Vec<&dyn Container<Datum = V::Datum>> {
                let mut out: Vec<&dyn Container<Datum = V::Datum>> = vec![&self.nanflow];
                out.extend(self.values().map(|v| v as &dyn Container<Datum = V::Datum>));
                out
            }

            fn quantity_name(&self) -> Option<&str> {
                self.quantity.name()
            }

            fn to_fragment(&self, suppress_name: bool) -> Json {
                let first = &self.cuts[0].1;
                let data = self
                    .cuts
                    .iter()
                    .map(|(c, v)| {
                        Payload::new()
                            .float("atleast", *c)
                            .field("data", v.to_fragment(true))
                            .build()
                    })
                    .collect();
                Payload::new()
                    .float("entries", self.entries)
                    .field("sub:type", Json::from(first.name()))
                    .field("data", Json::Array(data))
                    .field("nanflow:type", Json::from(self.nanflow.name()))
                    .field("nanflow", self.nanflow.to_fragment(false))
                    .name("name", self.quantity.name().filter(|_| !suppress_name))
                    .name("sub:name", first.quantity_name())
                    .build()
            }

            fn from_fragment(type_name: &str, json: &Json, name: Option<&str>) -> Result<Self> {
                wire::expect_type($tag, type_name)?;
                let fields = Fields::new($tag, json)?;
                fields.check_keys(
                    &["entries", "sub:type", "data", "nanflow:type", "nanflow"],
                    &["name", "sub:name"],
                )?;
                let entries = fields.entries()?;
                let name = fields.opt_str("name")?.or(name);
                let sub_type = fields.type_name("sub:type")?;
                let sub_name = fields.opt_str("sub:name")?;
                let cuts = fields
                    .array("data")?
                    .iter()
                    .map(|item| {
                        let cut = fields.nested("data", item)?;
                        cut.check_keys(&["atleast", "data"], &[])?;
                        let value = V::from_fragment(sub_type, cut.get("data")?, sub_name)?;
                        Ok((cut.float("atleast")?, value))
                    })
                    .collect::<Result<Vec<_>>>()?;
                let nanflow = N::from_fragment(
                    fields.type_name("nanflow:type")?,
                    fields.get("nanflow")?,
                    None,
                )?;
                let mut out = Self::ed(entries, cuts, nanflow)
                    .map_err(|e| fields.error("data", e.to_string()))?;
                out.quantity = Quantity::placeholder(name.map(str::to_owned));
                Ok(out)
            }
        }

        impl<V: Container + Clone, N: Clone> Clone for $ty<V, N> {
            fn clone(&self) -> Self {
                Self {
                    quantity: self.quantity.clone(),
                    entries: self.entries,
                    cuts: self.cuts.clone(),
                    nanflow: self.nanflow.clone(),
                }
            }
        }

        impl<V: Container, N: fmt::Debug> fmt::Debug for $ty<V, N> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "<{} cuts={:?} nanflow={:?}>", $tag, self.cuts, self.nanflow)
            }
        }

        impl<V, N> PartialEq for $ty<V, N>
        where
            V: Container + PartialEq,
            N: PartialEq,
        {
            fn eq(&self, other: &Self) -> bool {
                self.quantity == other.quantity
                    && math::numeq(self.entries, other.entries)
                    && self.cuts.len() == other.cuts.len()
                    && self
                        .cuts
                        .iter()
                        .zip(&other.cuts)
                        .all(|((c1, v1), (c2, v2))| math::numeq(*c1, *c2) && v1 == v2)
                    && self.nanflow == other.nanflow
            }
        }
    };
}

cut_container!(
    /// Cumulative sums over thresholds: a datum fills every sub-container
    /// whose threshold is at or below its value.
    ///
    /// The first sub-container sits at `-inf` and sees every non-NaN datum.
    ///
    /// # Example
    ///
    /// ```
    /// use histoflow::collection::Stack;
    /// use histoflow::leaf::Count;
    /// use histoflow::quantity::Quantity;
    /// use histoflow::traits::Container;
    ///
    /// let mut stack = Stack::new(&[1.0, 2.0], Quantity::<f64>::identity(), Count::new(), Count::new()).unwrap();
    /// for x in [0.5, 1.5, 2.5] {
    ///     stack.add(&x).unwrap();
    /// }
    /// let counts: Vec<f64> = stack.values().map(|c| c.entries()).collect();
    /// assert_eq!(counts, vec![3.0, 2.0, 1.0]);
    /// ```
    Stack,
    "Stack",
    stack_targets
);

cut_container!(
    /// Exclusive buckets between consecutive thresholds: a datum fills only
    /// the sub-container with the highest threshold at or below its value.
    ///
    /// # Example
    ///
    /// ```
    /// use histoflow::collection::Partition;
    /// use histoflow::leaf::Count;
    /// use histoflow::quantity::Quantity;
    /// use histoflow::traits::Container;
    ///
    /// let mut part = Partition::new(&[1.0, 2.0], Quantity::<f64>::identity(), Count::new(), Count::new()).unwrap();
    /// for x in [0.5, 1.5, 2.5, 2.0] {
    ///     part.add(&x).unwrap();
    /// }
    /// let counts: Vec<f64> = part.values().map(|c| c.entries()).collect();
    /// assert_eq!(counts, vec![1.0, 1.0, 2.0]);
    /// ```
    Partition,
    "Partition",
    partition_targets
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::{Count, Sum};
    use serde_json::json;

    #[test]
    fn test_cut_points() {
        assert_eq!(
            cut_points(&[2.0, 1.0, 2.0]).unwrap(),
            vec![f64::NEG_INFINITY, 1.0, 2.0]
        );
        assert!(cut_points(&[f64::NAN]).is_err());
        assert!(check_cuts("Stack", &[0.0, 1.0]).is_err());
        assert!(check_cuts("Stack", &[f64::NEG_INFINITY, 1.0, 1.0]).is_err());
    }

    #[test]
    fn test_stack_nan_and_infinities() {
        let mut stack: Stack<Count<f64>> =
            Stack::new(&[0.0], Quantity::identity(), Count::new(), Count::new()).unwrap();
        stack.add(&f64::NAN).unwrap();
        stack.add(&f64::NEG_INFINITY).unwrap();
        stack.add(&f64::INFINITY).unwrap();
        let counts: Vec<f64> = stack.values().map(|c| c.entries()).collect();
        assert_eq!(counts, vec![2.0, 1.0]);
        assert_eq!(stack.nanflow().entries(), 1.0);
        assert_eq!(stack.entries(), 3.0);
    }

    #[test]
    fn test_partition_merge() {
        let mut a: Partition<Count<f64>> =
            Partition::new(&[10.0], Quantity::identity(), Count::new(), Count::new()).unwrap();
        let mut b = a.zero();
        a.add(&5.0).unwrap();
        b.add(&15.0).unwrap();
        let c = a.merge(&b).unwrap();
        let counts: Vec<f64> = c.values().map(|v| v.entries()).collect();
        assert_eq!(counts, vec![1.0, 1.0]);

        let other = Partition::new(&[20.0], Quantity::identity(), Count::new(), Count::new()).unwrap();
        assert!(matches!(a.merge(&other), Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn test_stack_wire() {
        let mut stack = Stack::new(
            &[1.0],
            Quantity::named("x", |x: &f64| *x),
            Sum::new(Quantity::named("y", |x: &f64| *x * 10.0)),
            Count::new(),
        )
        .unwrap();
        stack.add(&1.5).unwrap();
        let json = stack.to_wire();
        assert_eq!(json["data"]["data"][0]["atleast"], json!("-inf"));
        assert_eq!(json["data"]["data"][1]["data"], json!({"entries": 1.0, "sum": 15.0}));
        assert_eq!(json["data"]["sub:name"], json!("y"));
        let back = Stack::<Sum<f64>, Count<f64>>::from_wire(&json).unwrap();
        assert_eq!(back, stack);
        assert!(Partition::<Sum<f64>, Count<f64>>::from_wire(&json).is_err());
    }
}
