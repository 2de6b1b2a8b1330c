//! Quantity functions: how a container extracts the value it aggregates
//! from a datum.

use crate::error::{Error, Result};
use core::fmt;
use std::sync::Arc;

/// Result of evaluating a quantity on one datum.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    /// Booleans are accepted wherever a number is (true = 1.0)
    Boolean(bool),
    Text(String),
    Vector(Vec<f64>),
}

impl Value {
    /// Short name of the variant, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
            Value::Text(_) => "text",
            Value::Vector(_) => "vector",
        }
    }

    /// Interpret as a number.
    pub fn to_number(&self) -> Result<f64> {
        match self {
            Value::Number(x) => Ok(*x),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            other => Err(Error::FillType {
                expected: "number",
                found: other.kind(),
            }),
        }
    }

    /// Interpret as a category string.
    pub fn into_text(self) -> Result<String> {
        match self {
            Value::Text(s) => Ok(s),
            other => Err(Error::FillType {
                expected: "text",
                found: other.kind(),
            }),
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Number(x)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Number(x as f64)
    }
}

impl From<i32> for Value {
    fn from(x: i32) -> Self {
        Value::Number(x as f64)
    }
}

impl From<i64> for Value {
    fn from(x: i64) -> Self {
        Value::Number(x as f64)
    }
}

impl From<u32> for Value {
    fn from(x: u32) -> Self {
        Value::Number(x as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Vector(v)
    }
}

type QuantityFn<D> = Arc<dyn Fn(&D) -> Value + Send + Sync>;

/// A named extraction function from datum to [`Value`].
///
/// Functions cannot be compared, so two quantities are equal when their
/// display names are equal. A quantity decoded from wire data only has a
/// name; evaluating it fails with [`Error::InvalidState`].
pub struct Quantity<D> {
    name: Option<String>,
    func: Option<QuantityFn<D>>,
}

impl<D> Quantity<D> {
    /// Wrap an unnamed function.
    pub fn new<F, R>(f: F) -> Self
    where
        F: Fn(&D) -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        Self {
            name: None,
            func: Some(Arc::new(move |d: &D| f(d).into())),
        }
    }

    /// Wrap a function under a display name.
    pub fn named<F, R>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&D) -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        let mut q = Self::new(f);
        q.name = Some(name.into());
        q
    }

    /// A name-only quantity, as reconstructed from wire data.
    pub fn placeholder(name: Option<String>) -> Self {
        Self { name, func: None }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether this quantity can be evaluated
    pub fn is_callable(&self) -> bool {
        self.func.is_some()
    }

    /// Evaluate on a datum.
    pub fn eval(&self, datum: &D) -> Result<Value> {
        match &self.func {
            Some(f) => Ok(f(datum)),
            None => Err(Error::invalid_state(format!(
                "quantity {} has no function (container was decoded from wire data)",
                self.name.as_deref().unwrap_or("<unnamed>")
            ))),
        }
    }

    /// Evaluate and require a number.
    pub fn number(&self, datum: &D) -> Result<f64> {
        self.eval(datum)?.to_number()
    }

    /// Evaluate and require a string.
    pub fn text(&self, datum: &D) -> Result<String> {
        self.eval(datum)?.into_text()
    }

    /// Keep the function, take the name from `other` when this one has none.
    pub(crate) fn or(&self, other: &Self) -> Self {
        Self {
            name: self.name.clone().or_else(|| other.name.clone()),
            func: self.func.clone().or_else(|| other.func.clone()),
        }
    }
}

impl<D: Clone + Into<Value> + 'static> Quantity<D> {
    /// The datum itself is the quantity.
    pub fn identity() -> Self {
        Self::new(|d: &D| d.clone())
    }
}

impl<D> Clone for Quantity<D> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            func: self.func.clone(),
        }
    }
}

impl<D> fmt::Debug for Quantity<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Quantity")
            .field("name", &self.name)
            .field("callable", &self.func.is_some())
            .finish()
    }
}

impl<D> PartialEq for Quantity<D> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Weight transform applied by `Count` before summing.
///
/// A closed set, so two counts can be checked for the same transform before
/// merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Transform {
    #[default]
    Identity,
    /// Sum of squared weights
    Square,
    Abs,
}

impl Transform {
    #[inline]
    pub fn apply(self, weight: f64) -> f64 {
        match self {
            Transform::Identity => weight,
            Transform::Square => weight * weight,
            Transform::Abs => weight.abs(),
        }
    }
}
