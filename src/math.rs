//! Numeric helpers: tolerant float equality, NaN-aware extremes and the
//! JSON number convention used by the wire format.

use serde_json::Value as Json;

/// Tolerance used when comparing accumulated floating-point statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Allowed difference relative to the larger magnitude
    pub relative: f64,
    /// Allowed absolute difference
    pub absolute: f64,
}

impl Tolerance {
    /// Exact comparison (NaN still equals NaN).
    pub const EXACT: Tolerance = Tolerance {
        relative: 0.0,
        absolute: 0.0,
    };

    pub fn new(relative: f64, absolute: f64) -> Self {
        Self { relative, absolute }
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            relative: 1e-9,
            absolute: 1e-12,
        }
    }
}

/// Compare two floats with the default tolerance.
#[inline]
pub fn numeq(a: f64, b: f64) -> bool {
    numeq_with(a, b, Tolerance::default())
}

/// Compare two floats; NaN equals NaN and infinities equal themselves.
pub fn numeq_with(a: f64, b: f64, tol: Tolerance) -> bool {
    if a.is_nan() || b.is_nan() {
        return a.is_nan() && b.is_nan();
    }
    if a == b {
        return true;
    }
    if a.is_infinite() || b.is_infinite() {
        return false;
    }
    let diff = (a - b).abs();
    diff <= tol.absolute || diff <= tol.relative * a.abs().max(b.abs())
}

/// Element-wise [`numeq`] over two slices.
pub fn numeq_slice(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| numeq(*x, *y))
}

/// Minimum where NaN means "no value yet".
#[inline]
pub fn min_nan(a: f64, b: f64) -> f64 {
    if a.is_nan() {
        b
    } else if b.is_nan() || a <= b {
        a
    } else {
        b
    }
}

/// Maximum where NaN means "no value yet".
#[inline]
pub fn max_nan(a: f64, b: f64) -> f64 {
    if a.is_nan() {
        b
    } else if b.is_nan() || a >= b {
        a
    } else {
        b
    }
}

/// Encode a float; non-finite values become string sentinels.
pub fn float_to_json(x: f64) -> Json {
    if x.is_nan() {
        Json::from("nan")
    } else if x == f64::INFINITY {
        Json::from("inf")
    } else if x == f64::NEG_INFINITY {
        Json::from("-inf")
    } else {
        // finite, so from_f64 cannot fail
        serde_json::Number::from_f64(x)
            .map(Json::Number)
            .unwrap_or(Json::Null)
    }
}

/// Decode a float written by [`float_to_json`]. Integers are accepted.
pub fn json_to_float(v: &Json) -> Option<f64> {
    match v {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => match s.as_str() {
            "nan" => Some(f64::NAN),
            "inf" => Some(f64::INFINITY),
            "-inf" => Some(f64::NEG_INFINITY),
            _ => None,
        },
        _ => None,
    }
}

/// `n + 1` evenly spaced edges from `low` to `high`, both ends exact.
pub fn linspace(low: f64, high: f64, n: usize) -> Vec<f64> {
    (0..=n)
        .map(|i| {
            if i == n {
                high
            } else {
                low + (high - low) * i as f64 / n as f64
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeq() {
        assert!(numeq(1.0, 1.0));
        assert!(numeq(f64::NAN, f64::NAN));
        assert!(numeq(f64::INFINITY, f64::INFINITY));
        assert!(!numeq(f64::INFINITY, f64::NEG_INFINITY));
        assert!(!numeq(1.0, f64::NAN));
        assert!(numeq(0.1 + 0.2, 0.3));
        assert!(!numeq(1.0, 1.001));
        assert!(!numeq_with(0.1 + 0.2, 0.3, Tolerance::EXACT));
    }

    #[test]
    fn test_nan_extremes() {
        assert_eq!(min_nan(f64::NAN, 3.0), 3.0);
        assert_eq!(min_nan(3.0, f64::NAN), 3.0);
        assert_eq!(min_nan(2.0, 3.0), 2.0);
        assert_eq!(max_nan(f64::NAN, 3.0), 3.0);
        assert_eq!(max_nan(2.0, 3.0), 3.0);
        assert!(min_nan(f64::NAN, f64::NAN).is_nan());
    }

    #[test]
    fn test_float_json() {
        assert_eq!(float_to_json(f64::NAN), Json::from("nan"));
        assert_eq!(float_to_json(f64::INFINITY), Json::from("inf"));
        assert_eq!(float_to_json(f64::NEG_INFINITY), Json::from("-inf"));
        assert_eq!(json_to_float(&Json::from(3)), Some(3.0));
        assert_eq!(json_to_float(&Json::from("-inf")), Some(f64::NEG_INFINITY));
        assert!(json_to_float(&Json::from("nan")).unwrap().is_nan());
        assert_eq!(json_to_float(&Json::from("seven")), None);
        assert_eq!(json_to_float(&Json::Null), None);
    }

    #[test]
    fn test_float_json_exact() {
        for x in [0.1, 1.0 / 3.0, 1e-300, 6.02214076e23, -2.5e-7, f64::MAX] {
            let text = serde_json::to_string(&float_to_json(x)).unwrap();
            let back: Json = serde_json::from_str(&text).unwrap();
            assert_eq!(json_to_float(&back).unwrap().to_bits(), x.to_bits());
        }
    }

    #[test]
    fn test_linspace() {
        let edges = linspace(0.0, 1.0, 4);
        assert_eq!(edges, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }
}
