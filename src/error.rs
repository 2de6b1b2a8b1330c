//! Error types shared by every container

use thiserror::Error;

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building, filling, merging or decoding containers.
///
/// Every error is reported synchronously by the call that detected it; a
/// failed `fill` leaves the container exactly as it was.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Two containers with different shapes were merged.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A constructor was given an invalid configuration.
    #[error("invalid configuration: {0}")]
    Construction(String),

    /// A quantity function returned a value of the wrong kind.
    #[error("quantity returned {found}, expected {expected}")]
    FillType {
        expected: &'static str,
        found: &'static str,
    },

    /// Wire data is missing a field or a field has the wrong type.
    #[error("wire format error in {field}: {message}")]
    Format { field: String, message: String },

    /// Accumulated state supplied directly is not valid, or the container
    /// cannot perform the requested operation in its current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The wire text is not JSON at all.
    #[error("json error: {0}")]
    Json(String),
}

impl Error {
    /// Creates a shape mismatch error.
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    /// Creates a construction error.
    pub fn construction(msg: impl Into<String>) -> Self {
        Self::Construction(msg.into())
    }

    /// Creates a wire format error naming the offending field.
    pub fn format(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Format {
            field: field.into(),
            message: msg.into(),
        }
    }

    /// Creates an invalid state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Rejects negative or NaN `entries` handed to a direct constructor.
    pub(crate) fn check_entries(entries: f64) -> Result<f64> {
        if entries.is_nan() || entries < 0.0 {
            Err(Self::invalid_state(format!(
                "entries ({}) cannot be negative",
                entries
            )))
        } else {
            Ok(entries)
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::format("Bin.low", "expected a number");
        assert_eq!(
            err.to_string(),
            "wire format error in Bin.low: expected a number"
        );

        let err = Error::FillType {
            expected: "number",
            found: "text",
        };
        assert_eq!(err.to_string(), "quantity returned text, expected number");
    }

    #[test]
    fn test_check_entries() {
        assert_eq!(Error::check_entries(0.0), Ok(0.0));
        assert_eq!(Error::check_entries(2.5), Ok(2.5));
        assert!(matches!(
            Error::check_entries(-1.0),
            Err(Error::InvalidState(_))
        ));
        assert!(Error::check_entries(f64::NAN).is_err());
    }
}
