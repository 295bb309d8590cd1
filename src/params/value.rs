// src/params/value.rs

//! Tagged parameter values and the string coercion used by parameter dumps.

use std::fmt;

/// A single parameter value.
///
/// Dumps are text, so reading one back goes through [`ParamValue::coerce`]:
/// the empty string becomes `Null`, anything that parses as a number becomes
/// a `Float`, and everything else stays a `Str`. Integers therefore come back
/// as floats; [`fmt::Display`] renders both identically for whole numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    /// Coerce a dumped string back into a value.
    pub fn coerce(raw: &str) -> ParamValue {
        if raw.is_empty() {
            return ParamValue::Null;
        }
        match raw.trim().parse::<f64>() {
            Ok(x) => ParamValue::Float(x),
            Err(_) => ParamValue::Str(raw.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Float(x) => Some(*x),
            ParamValue::Null | ParamValue::Str(_) => None,
        }
    }

    /// Value equality where `Int(1)` and `Float(1.0)` are the same value.
    ///
    /// Used when deciding whether a key is constant across a cohort.
    pub fn same_as(&self, other: &ParamValue) -> bool {
        match (self, other) {
            (ParamValue::Null, ParamValue::Null) => true,
            (ParamValue::Str(a), ParamValue::Str(b)) => a == b,
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => Ok(()),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(x) => f.write_str(&format_g(*x)),
            ParamValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v.into())
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Int(v.into())
    }
}

impl From<u64> for ParamValue {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or(ParamValue::Float(v as f64), ParamValue::Int)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ParamValue::Null)
    }
}

const G_PRECISION: i32 = 6;

/// Render a float the way C's `%g` does: six significant digits, trailing
/// zeros stripped, exponent notation outside `[1e-4, 1e6)`.
pub fn format_g(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if x == 0.0 {
        return if x.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // Exponent of the value *after* rounding to the target precision.
    let sci = format!("{:.*e}", (G_PRECISION - 1) as usize, x);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exp < -4 || exp >= G_PRECISION {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exp.abs())
    } else {
        let decimals = (G_PRECISION - 1 - exp).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, x)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_g_matches_c_printf() {
        assert_eq!(format_g(0.1), "0.1");
        assert_eq!(format_g(1.0), "1");
        assert_eq!(format_g(2.5), "2.5");
        assert_eq!(format_g(100000.0), "100000");
        assert_eq!(format_g(1000000.0), "1e+06");
        assert_eq!(format_g(0.0001), "0.0001");
        assert_eq!(format_g(0.00001), "1e-05");
        assert_eq!(format_g(1.0 / 3.0), "0.333333");
        assert_eq!(format_g(123456789.0), "1.23457e+08");
        assert_eq!(format_g(-42.0), "-42");
    }

    #[test]
    fn coerce_turns_numeric_strings_into_floats() {
        assert_eq!(ParamValue::coerce(""), ParamValue::Null);
        assert_eq!(ParamValue::coerce("3"), ParamValue::Float(3.0));
        assert_eq!(ParamValue::coerce("1e-05"), ParamValue::Float(0.00001));
        assert_eq!(
            ParamValue::coerce("adagrad"),
            ParamValue::Str("adagrad".to_string())
        );
    }

    #[test]
    fn ints_and_floats_compare_numerically() {
        assert!(ParamValue::Int(2).same_as(&ParamValue::Float(2.0)));
        assert!(!ParamValue::Int(2).same_as(&ParamValue::Str("2".into())));
        assert!(ParamValue::Null.same_as(&ParamValue::Null));
    }

    #[test]
    fn display_of_int_and_whole_float_agree() {
        assert_eq!(ParamValue::Int(7).to_string(), "7");
        assert_eq!(ParamValue::Float(7.0).to_string(), "7");
        assert_eq!(ParamValue::Null.to_string(), "");
    }
}
