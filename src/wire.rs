//! JSON wire format
//!
//! A container encodes as `{"type": <tag>, "data": <payload>}`. Composite
//! payloads record the common type of their children once, in a sibling
//! `"<field>:type"` field, and the children's quantity name in
//! `"<field>:name"`. Non-finite floats are written as the strings `"nan"`,
//! `"inf"` and `"-inf"`.

use crate::error::{Error, Result};
use crate::math;
use crate::traits::Container;
use serde_json::{Map, Value as Json};

/// Every registered container type name.
pub const TYPE_NAMES: &[&str] = &[
    "Count",
    "Sum",
    "Average",
    "Deviate",
    "Minimize",
    "Maximize",
    "Bag",
    "Bin",
    "SparselyBin",
    "Categorize",
    "Label",
    "UntypedLabel",
    "Index",
    "Branch",
    "Fraction",
    "Stack",
    "Partition",
    "Limit",
];

/// Intern a decoded type name.
pub fn static_type_name(name: &str) -> Option<&'static str> {
    TYPE_NAMES.iter().copied().find(|n| *n == name)
}

/// Wrap a payload with its type tag.
pub fn tagged(type_name: &str, data: Json) -> Json {
    let mut map = Map::new();
    map.insert("type".into(), Json::from(type_name));
    map.insert("data".into(), data);
    Json::Object(map)
}

/// Split `{"type": ..., "data": ...}` into its parts.
pub fn untag(json: &Json) -> Result<(&str, &Json)> {
    let fields = Fields::new("container", json)?;
    fields.check_keys(&["type", "data"], &[])?;
    Ok((fields.str("type")?, fields.get("data")?))
}

/// Encode a container to JSON text.
pub fn to_wire_string<C: Container>(container: &C) -> Result<String> {
    Ok(serde_json::to_string(&container.to_wire())?)
}

/// Decode a container from JSON text.
pub fn from_wire_str<C: Container>(text: &str) -> Result<C> {
    let json: Json = serde_json::from_str(text)?;
    C::from_wire(&json)
}

/// Fail unless a decoded type tag names the concrete type being decoded.
pub(crate) fn expect_type(expected: &'static str, found: &str) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::format(
            expected,
            format!("cannot decode {} as {}", found, expected),
        ))
    }
}

/// Builder for payload objects.
pub(crate) struct Payload {
    map: Map<String, Json>,
}

impl Payload {
    pub fn new() -> Self {
        Self { map: Map::new() }
    }

    pub fn field(mut self, key: &str, value: Json) -> Self {
        self.map.insert(key.to_owned(), value);
        self
    }

    pub fn float(self, key: &str, x: f64) -> Self {
        self.field(key, math::float_to_json(x))
    }

    /// Add `key` only when there is a name to record.
    pub fn name(self, key: &str, name: Option<&str>) -> Self {
        match name {
            Some(n) => self.field(key, Json::from(n)),
            None => self,
        }
    }

    pub fn build(self) -> Json {
        Json::Object(self.map)
    }
}

/// Typed, validating access to the fields of one payload object.
///
/// Errors name the field as `<Container>.<field>`.
pub(crate) struct Fields<'a> {
    container: &'static str,
    map: &'a Map<String, Json>,
}

impl<'a> Fields<'a> {
    pub fn new(container: &'static str, json: &'a Json) -> Result<Self> {
        match json {
            Json::Object(map) => Ok(Self { container, map }),
            other => Err(fail(
                container,
                container,
                format!("expected an object, found {}", kind(other)),
            )),
        }
    }

    fn path(&self, key: &str) -> String {
        format!("{}.{}", self.container, key)
    }

    /// Require every key in `required`, allow those in `optional`, reject others.
    pub fn check_keys(&self, required: &[&str], optional: &[&str]) -> Result<()> {
        for key in required {
            if !self.map.contains_key(*key) {
                return Err(fail(self.container, &self.path(key), "missing"));
            }
        }
        for key in self.map.keys() {
            if !required.contains(&key.as_str()) && !optional.contains(&key.as_str()) {
                return Err(fail(self.container, &self.path(key), "unexpected field"));
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<&'a Json> {
        self.map
            .get(key)
            .ok_or_else(|| fail(self.container, &self.path(key), "missing"))
    }

    /// A field that may be absent.
    pub fn opt(&self, key: &str) -> Option<&'a Json> {
        self.map.get(key)
    }

    pub fn float(&self, key: &str) -> Result<f64> {
        let v = self.get(key)?;
        math::json_to_float(v).ok_or_else(|| {
            fail(
                self.container,
                &self.path(key),
                format!("expected a number, found {}", kind(v)),
            )
        })
    }

    /// `entries`, which must also be non-negative.
    pub fn entries(&self) -> Result<f64> {
        let entries = self.float("entries")?;
        if entries < 0.0 || entries.is_nan() {
            return Err(fail(
                self.container,
                &self.path("entries"),
                format!("cannot be negative ({})", entries),
            ));
        }
        Ok(entries)
    }

    pub fn str(&self, key: &str) -> Result<&'a str> {
        let v = self.get(key)?;
        v.as_str().ok_or_else(|| {
            fail(
                self.container,
                &self.path(key),
                format!("expected a string, found {}", kind(v)),
            )
        })
    }

    /// A string field that may be absent or null.
    pub fn opt_str(&self, key: &str) -> Result<Option<&'a str>> {
        match self.map.get(key) {
            None | Some(Json::Null) => Ok(None),
            Some(Json::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(fail(
                self.container,
                &self.path(key),
                format!("expected a string or null, found {}", kind(other)),
            )),
        }
    }

    /// A `"<field>:type"` sidecar naming a registered container type.
    pub fn type_name(&self, key: &str) -> Result<&'static str> {
        let name = self.str(key)?;
        static_type_name(name).ok_or_else(|| {
            fail(
                self.container,
                &self.path(key),
                format!("unknown container type {:?}", name),
            )
        })
    }

    pub fn array(&self, key: &str) -> Result<&'a Vec<Json>> {
        let v = self.get(key)?;
        v.as_array().ok_or_else(|| {
            fail(
                self.container,
                &self.path(key),
                format!("expected an array, found {}", kind(v)),
            )
        })
    }

    pub fn object(&self, key: &str) -> Result<&'a Map<String, Json>> {
        let v = self.get(key)?;
        v.as_object().ok_or_else(|| {
            fail(
                self.container,
                &self.path(key),
                format!("expected an object, found {}", kind(v)),
            )
        })
    }

    /// Wrap a nested object with the same container context.
    pub fn nested(&self, key: &str, json: &'a Json) -> Result<Fields<'a>> {
        match json {
            Json::Object(map) => Ok(Fields {
                container: self.container,
                map,
            }),
            other => Err(fail(
                self.container,
                &self.path(key),
                format!("expected an object, found {}", kind(other)),
            )),
        }
    }

    /// Error attributed to a field of this payload.
    pub fn error(&self, key: &str, msg: impl Into<String>) -> Error {
        fail(self.container, &self.path(key), msg)
    }
}

fn fail(container: &str, field: &str, msg: impl Into<String>) -> Error {
    let err = Error::format(field, msg);
    tracing::debug!(container, error = %err, "wire decode failed");
    err
}

fn kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
