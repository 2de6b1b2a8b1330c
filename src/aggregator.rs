//! Aggregator: the closed set of container types as one value type
//!
//! Heterogeneous collections ([`UntypedLabel`], [`Branch`]) and generic
//! decoding need a single type that can be any container. [`Aggregator`]
//! is that type; nested containers inside it hold `Aggregator` children, so
//! a whole tree can be decoded from wire data without knowing its shape up
//! front.
//!
//! # Example
//!
//! ```
//! use histoflow::aggregator::Aggregator;
//! use histoflow::traits::Container;
//!
//! let text = r#"{"type": "Bin", "data": {
//!     "low": 0.0, "high": 2.0, "entries": 3.0,
//!     "values:type": "Count", "values": [1.0, 2.0],
//!     "underflow:type": "Count", "underflow": 0.0,
//!     "overflow:type": "Count", "overflow": 0.0,
//!     "nanflow:type": "Count", "nanflow": 0.0}}"#;
//! let hist: Aggregator<f64> = histoflow::wire::from_wire_str(text).unwrap();
//! assert_eq!(hist.name(), "Bin");
//! assert_eq!(hist.children().len(), 5);
//! ```

use crate::binning::{Bin, Categorize, SparselyBin};
use crate::collection::{Branch, Fraction, Index, Label, Limit, Partition, Stack, UntypedLabel};
use crate::error::{Error, Result};
use crate::leaf::{Average, Bag, Count, Deviate, Maximize, Minimize, Sum};
use crate::traits::{require_same, Container};
use core::fmt;
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use serde_json::Value as Json;

/// Any container filled with data of type `D`.
pub enum Aggregator<D> {
    Count(Count<D>),
    Sum(Sum<D>),
    Average(Average<D>),
    Deviate(Deviate<D>),
    Minimize(Minimize<D>),
    Maximize(Maximize<D>),
    Bag(Bag<D>),
    Bin(Box<Bin<Aggregator<D>, Aggregator<D>>>),
    SparselyBin(Box<SparselyBin<Aggregator<D>, Aggregator<D>>>),
    Categorize(Box<Categorize<Aggregator<D>>>),
    Label(Box<Label<Aggregator<D>>>),
    UntypedLabel(UntypedLabel<D>),
    Index(Box<Index<Aggregator<D>>>),
    Branch(Branch<D>),
    Fraction(Box<Fraction<Aggregator<D>>>),
    Stack(Box<Stack<Aggregator<D>, Aggregator<D>>>),
    Partition(Box<Partition<Aggregator<D>, Aggregator<D>>>),
    Limit(Box<Limit<Aggregator<D>>>),
}

/// Run `$body` with `$c` bound to the inner container.
macro_rules! dispatch {
    ($value:expr, |$c:ident| $body:expr) => {
        match $value {
            Aggregator::Count($c) => $body,
            Aggregator::Sum($c) => $body,
            Aggregator::Average($c) => $body,
            Aggregator::Deviate($c) => $body,
            Aggregator::Minimize($c) => $body,
            Aggregator::Maximize($c) => $body,
            Aggregator::Bag($c) => $body,
            Aggregator::Bin($c) => $body,
            Aggregator::SparselyBin($c) => $body,
            Aggregator::Categorize($c) => $body,
            Aggregator::Label($c) => $body,
            Aggregator::UntypedLabel($c) => $body,
            Aggregator::Index($c) => $body,
            Aggregator::Branch($c) => $body,
            Aggregator::Fraction($c) => $body,
            Aggregator::Stack($c) => $body,
            Aggregator::Partition($c) => $body,
            Aggregator::Limit($c) => $body,
        }
    };
}

/// Run `$body` when both values are the same variant, `$otherwise` if not.
macro_rules! dispatch_pair {
    ($left:expr, $right:expr, |$a:ident, $b:ident| $body:expr, $otherwise:expr) => {
        match ($left, $right) {
            (Aggregator::Count($a), Aggregator::Count($b)) => $body,
            (Aggregator::Sum($a), Aggregator::Sum($b)) => $body,
            (Aggregator::Average($a), Aggregator::Average($b)) => $body,
            (Aggregator::Deviate($a), Aggregator::Deviate($b)) => $body,
            (Aggregator::Minimize($a), Aggregator::Minimize($b)) => $body,
            (Aggregator::Maximize($a), Aggregator::Maximize($b)) => $body,
            (Aggregator::Bag($a), Aggregator::Bag($b)) => $body,
            (Aggregator::Bin($a), Aggregator::Bin($b)) => $body,
            (Aggregator::SparselyBin($a), Aggregator::SparselyBin($b)) => $body,
            (Aggregator::Categorize($a), Aggregator::Categorize($b)) => $body,
            (Aggregator::Label($a), Aggregator::Label($b)) => $body,
            (Aggregator::UntypedLabel($a), Aggregator::UntypedLabel($b)) => $body,
            (Aggregator::Index($a), Aggregator::Index($b)) => $body,
            (Aggregator::Branch($a), Aggregator::Branch($b)) => $body,
            (Aggregator::Fraction($a), Aggregator::Fraction($b)) => $body,
            (Aggregator::Stack($a), Aggregator::Stack($b)) => $body,
            (Aggregator::Partition($a), Aggregator::Partition($b)) => $body,
            (Aggregator::Limit($a), Aggregator::Limit($b)) => $body,
            _ => $otherwise,
        }
    };
}

macro_rules! from_inline {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl<D> From<$ty> for Aggregator<D> {
                fn from(c: $ty) -> Self {
                    Aggregator::$variant(c)
                }
            }
        )*
    };
}

macro_rules! from_boxed {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl<D> From<$ty> for Aggregator<D> {
                fn from(c: $ty) -> Self {
                    Aggregator::$variant(Box::new(c))
                }
            }
        )*
    };
}

from_inline! {
    Count => Count<D>,
    Sum => Sum<D>,
    Average => Average<D>,
    Deviate => Deviate<D>,
    Minimize => Minimize<D>,
    Maximize => Maximize<D>,
    Bag => Bag<D>,
    UntypedLabel => UntypedLabel<D>,
    Branch => Branch<D>,
}

from_boxed! {
    Bin => Bin<Aggregator<D>, Aggregator<D>>,
    SparselyBin => SparselyBin<Aggregator<D>, Aggregator<D>>,
    Categorize => Categorize<Aggregator<D>>,
    Label => Label<Aggregator<D>>,
    Index => Index<Aggregator<D>>,
    Fraction => Fraction<Aggregator<D>>,
    Stack => Stack<Aggregator<D>, Aggregator<D>>,
    Partition => Partition<Aggregator<D>, Aggregator<D>>,
    Limit => Limit<Aggregator<D>>,
}

impl<D> Container for Aggregator<D> {
    type Datum = D;

    fn name(&self) -> &'static str {
        dispatch!(self, |c| c.name())
    }

    fn entries(&self) -> f64 {
        dispatch!(self, |c| c.entries())
    }

    fn zero(&self) -> Self {
        dispatch!(self, |c| Aggregator::from(c.zero()))
    }

    fn check_fill(&self, datum: &D) -> Result<()> {
        dispatch!(self, |c| c.check_fill(datum))
    }

    fn fill(&mut self, datum: &D, weight: f64) -> Result<()> {
        dispatch!(self, |c| c.fill(datum, weight))
    }

    fn merge(&self, other: &Self) -> Result<Self> {
        require_same("Aggregator", "container type", &self.name(), &other.name())?;
        dispatch_pair!(
            self,
            other,
            |a, b| a.merge(b).map(Aggregator::from),
            Err(Error::shape(format!(
                "cannot merge {} with {}",
                self.name(),
                other.name()
            )))
        )
    }

    fn children(&self) -> Vec<&dyn Container<Datum = D>> {
        dispatch!(self, |c| c.children())
    }

    fn quantity_name(&self) -> Option<&str> {
        dispatch!(self, |c| c.quantity_name())
    }

    fn to_fragment(&self, suppress_name: bool) -> Json {
        dispatch!(self, |c| c.to_fragment(suppress_name))
    }

    fn from_fragment(type_name: &str, json: &Json, name: Option<&str>) -> Result<Self> {
        type A<T> = Aggregator<T>;
        match type_name {
            "Count" => Count::from_fragment(type_name, json, name).map(A::from),
            "Sum" => Sum::from_fragment(type_name, json, name).map(A::from),
            "Average" => Average::from_fragment(type_name, json, name).map(A::from),
            "Deviate" => Deviate::from_fragment(type_name, json, name).map(A::from),
            "Minimize" => Minimize::from_fragment(type_name, json, name).map(A::from),
            "Maximize" => Maximize::from_fragment(type_name, json, name).map(A::from),
            "Bag" => Bag::from_fragment(type_name, json, name).map(A::from),
            "Bin" => Bin::<A<D>, A<D>>::from_fragment(type_name, json, name).map(A::from),
            "SparselyBin" => {
                SparselyBin::<A<D>, A<D>>::from_fragment(type_name, json, name).map(A::from)
            }
            "Categorize" => Categorize::<A<D>>::from_fragment(type_name, json, name).map(A::from),
            "Label" => Label::<A<D>>::from_fragment(type_name, json, name).map(A::from),
            "UntypedLabel" => UntypedLabel::from_fragment(type_name, json, name).map(A::from),
            "Index" => Index::<A<D>>::from_fragment(type_name, json, name).map(A::from),
            "Branch" => Branch::from_fragment(type_name, json, name).map(A::from),
            "Fraction" => Fraction::<A<D>>::from_fragment(type_name, json, name).map(A::from),
            "Stack" => Stack::<A<D>, A<D>>::from_fragment(type_name, json, name).map(A::from),
            "Partition" => {
                Partition::<A<D>, A<D>>::from_fragment(type_name, json, name).map(A::from)
            }
            "Limit" => Limit::<A<D>>::from_fragment(type_name, json, name).map(A::from),
            unknown => {
                let err = Error::format("type", format!("unknown container type {:?}", unknown));
                tracing::debug!(error = %err, "wire decode failed");
                Err(err)
            }
        }
    }
}

impl<D> Clone for Aggregator<D> {
    fn clone(&self) -> Self {
        match self {
            Aggregator::Count(c) => Aggregator::Count(c.clone()),
            Aggregator::Sum(c) => Aggregator::Sum(c.clone()),
            Aggregator::Average(c) => Aggregator::Average(c.clone()),
            Aggregator::Deviate(c) => Aggregator::Deviate(c.clone()),
            Aggregator::Minimize(c) => Aggregator::Minimize(c.clone()),
            Aggregator::Maximize(c) => Aggregator::Maximize(c.clone()),
            Aggregator::Bag(c) => Aggregator::Bag(c.clone()),
            Aggregator::Bin(c) => Aggregator::Bin(c.clone()),
            Aggregator::SparselyBin(c) => Aggregator::SparselyBin(c.clone()),
            Aggregator::Categorize(c) => Aggregator::Categorize(c.clone()),
            Aggregator::Label(c) => Aggregator::Label(c.clone()),
            Aggregator::UntypedLabel(c) => Aggregator::UntypedLabel(c.clone()),
            Aggregator::Index(c) => Aggregator::Index(c.clone()),
            Aggregator::Branch(c) => Aggregator::Branch(c.clone()),
            Aggregator::Fraction(c) => Aggregator::Fraction(c.clone()),
            Aggregator::Stack(c) => Aggregator::Stack(c.clone()),
            Aggregator::Partition(c) => Aggregator::Partition(c.clone()),
            Aggregator::Limit(c) => Aggregator::Limit(c.clone()),
        }
    }
}

impl<D> fmt::Debug for Aggregator<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        dispatch!(self, |c| fmt::Debug::fmt(c, f))
    }
}

impl<D> PartialEq for Aggregator<D> {
    fn eq(&self, other: &Self) -> bool {
        dispatch_pair!(self, other, |a, b| a == b, false)
    }
}

impl<D> Serialize for Aggregator<D> {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl<'de, D> Deserialize<'de> for Aggregator<D> {
    fn deserialize<De: Deserializer<'de>>(deserializer: De) -> core::result::Result<Self, De::Error> {
        let json = Json::deserialize(deserializer)?;
        Aggregator::from_wire(&json).map_err(de::Error::custom)
    }
}
