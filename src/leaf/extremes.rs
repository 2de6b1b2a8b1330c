//! Minimize and Maximize: running extremes of a quantity

use crate::error::{Error, Result};
use crate::math;
use crate::quantity::Quantity;
use crate::traits::{admits, Container};
use crate::wire::{self, Fields, Payload};
use core::fmt;
use serde_json::Value as Json;

macro_rules! extreme {
    ($(#[$doc:meta])* $ty:ident, $tag:literal, $field:literal, $accessor:ident, $pick:path) => {
        $(#[$doc])*
        pub struct $ty<D> {
            quantity: Quantity<D>,
            entries: f64,
            // NaN until the first number is seen
            value: f64,
        }

        impl<D> $ty<D> {
            pub fn new(quantity: Quantity<D>) -> Self {
                Self {
                    quantity,
                    entries: 0.0,
                    value: f64::NAN,
                }
            }

            /// Create one holding accumulated state directly (NaN means no value).
            pub fn ed(entries: f64, value: f64) -> Result<Self> {
                let mut out = Self::new(Quantity::placeholder(None));
                out.entries = Error::check_entries(entries)?;
                out.value = value;
                Ok(out)
            }

            /// The extreme seen so far, `None` before any number.
            pub fn $accessor(&self) -> Option<f64> {
                if self.value.is_nan() {
                    None
                } else {
                    Some(self.value)
                }
            }
        }

        impl<D> Container for $ty<D> {
            type Datum = D;

            fn name(&self) -> &'static str {
                $tag
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
                    self.value = $pick(self.value, q);
                }
                Ok(())
            }

            fn merge(&self, other: &Self) -> Result<Self> {
                Ok(Self {
                    quantity: self.quantity.or(&other.quantity),
                    entries: self.entries + other.entries,
                    value: $pick(self.value, other.value),
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
                    .float($field, self.value)
                    .name("name", self.quantity.name().filter(|_| !suppress_name))
                    .build()
            }

            fn from_fragment(type_name: &str, json: &Json, name: Option<&str>) -> Result<Self> {
                wire::expect_type($tag, type_name)?;
                let fields = Fields::new($tag, json)?;
                fields.check_keys(&["entries", $field], &["name"])?;
                let name = fields.opt_str("name")?.or(name);
                let mut out = Self::ed(fields.entries()?, fields.float($field)?)?;
                out.quantity = Quantity::placeholder(name.map(str::to_owned));
                Ok(out)
            }
        }

        impl<D> Clone for $ty<D> {
            fn clone(&self) -> Self {
                Self {
                    quantity: self.quantity.clone(),
                    entries: self.entries,
                    value: self.value,
                }
            }
        }

        impl<D> fmt::Debug for $ty<D> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!("<", $tag, " ", $field, "={}>"), self.value)
            }
        }

        impl<D> PartialEq for $ty<D> {
            fn eq(&self, other: &Self) -> bool {
                self.quantity == other.quantity
                    && math::numeq(self.entries, other.entries)
                    && math::numeq(self.value, other.value)
            }
        }
    };
}

extreme!(
    /// Minimum of a quantity. NaN values are counted in `entries` but never
    /// become the minimum.
    Minimize,
    "Minimize",
    "min",
    min,
    math::min_nan
);

extreme!(
    /// Maximum of a quantity. NaN values are counted in `entries` but never
    /// become the maximum.
    Maximize,
    "Maximize",
    "max",
    max,
    math::max_nan
);
