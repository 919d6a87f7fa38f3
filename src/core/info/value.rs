use crate::{
    core::header::ValueType,
    utils::util::{is_missing_float, MISSING_FLOAT, MISSING_INTEGER},
};
use std::fmt;

/// Typed INFO value. Array elements written as `.` hold the missing sentinels.
#[derive(Debug, Clone, PartialEq)]
pub enum InfoValue {
    Int(i32),
    IntArray(Vec<i32>),
    Float(f64),
    FloatArray(Vec<f64>),
    Bool(bool),
    String(String),
    StringArray(Vec<String>),
    Missing,
}

impl InfoValue {
    pub fn len(&self) -> usize {
        match self {
            InfoValue::IntArray(v) => v.len(),
            InfoValue::FloatArray(v) => v.len(),
            InfoValue::StringArray(v) => v.len(),
            InfoValue::Missing => 0,
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Integer view; integer-looking strings are accepted.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            InfoValue::Int(v) if *v != MISSING_INTEGER => Some(*v),
            InfoValue::IntArray(v) => v.first().copied().filter(|v| *v != MISSING_INTEGER),
            InfoValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            InfoValue::Float(v) if !is_missing_float(*v) => Some(*v),
            InfoValue::FloatArray(v) => v.first().copied().filter(|v| !is_missing_float(*v)),
            InfoValue::Int(_) | InfoValue::IntArray(_) => self.as_i32().map(f64::from),
            InfoValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Types undeclared raw text by shape: integers, then floats, then text.
    pub fn infer(raw: &str) -> InfoValue {
        if raw == "." {
            return InfoValue::Missing;
        }
        let is_array = raw.contains(',');
        let value = [ValueType::Integer, ValueType::Float]
            .into_iter()
            .find_map(|value_type| {
                if is_array {
                    parse_array(raw, value_type)
                } else {
                    parse_scalar(raw, value_type)
                }
            });
        value.unwrap_or_else(|| {
            if is_array {
                InfoValue::StringArray(raw.split(',').map(str::to_string).collect())
            } else {
                InfoValue::String(raw.to_string())
            }
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            InfoValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for InfoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfoValue::Int(v) => write!(f, "{}", format_int(*v)),
            InfoValue::Float(v) => write!(f, "{}", format_float_element(*v)),
            InfoValue::Bool(_) => Ok(()),
            InfoValue::String(s) => write!(f, "{s}"),
            InfoValue::Missing => write!(f, "."),
            InfoValue::IntArray(v) => write_joined(f, v.iter().map(|x| format_int(*x))),
            InfoValue::FloatArray(v) => {
                write_joined(f, v.iter().map(|x| format_float_element(*x)))
            }
            InfoValue::StringArray(v) => write_joined(f, v.iter().cloned()),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: impl Iterator<Item = String>) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn format_int(v: i32) -> String {
    if v == MISSING_INTEGER {
        ".".to_string()
    } else {
        v.to_string()
    }
}

fn format_float_element(v: f64) -> String {
    if is_missing_float(v) {
        ".".to_string()
    } else {
        format_float(v)
    }
}

/// Compact text form of a float: four decimals when |v| > 0.02, five
/// significant digits otherwise, with trailing zeros and dot removed.
pub fn format_float(v: f64) -> String {
    let text = if v.abs() > 0.02 {
        trim_fraction(&format!("{v:.4}"))
    } else {
        format_general(v, 5)
    };
    match text.as_str() {
        "" | "-" | "-0" => "0".to_string(),
        _ => text,
    }
}

fn trim_fraction(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}

/// `%g`-style formatting with `precision` significant digits.
fn format_general(v: f64, precision: usize) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    if !v.is_finite() {
        return v.to_string();
    }
    let sci = format!("{:.*e}", precision - 1, v);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    if exp < -4 || exp >= precision as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exp.abs())
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        trim_fraction(&format!("{v:.decimals$}"))
    }
}

/// Parses a single value. `.` decodes to `Missing`.
pub(crate) fn parse_scalar(raw: &str, value_type: ValueType) -> Option<InfoValue> {
    if raw == "." {
        return Some(InfoValue::Missing);
    }
    match value_type {
        ValueType::Integer => raw.parse().ok().map(InfoValue::Int),
        ValueType::Float => raw.parse().ok().map(InfoValue::Float),
        ValueType::Flag => None,
        ValueType::String | ValueType::Character => Some(InfoValue::String(raw.to_string())),
    }
}

/// Parses a comma-separated list of values of one type.
pub(crate) fn parse_array(raw: &str, value_type: ValueType) -> Option<InfoValue> {
    let items = raw.split(',');
    match value_type {
        ValueType::Integer => items
            .map(|s| match s {
                "." => Some(MISSING_INTEGER),
                s => s.parse().ok(),
            })
            .collect::<Option<Vec<_>>>()
            .map(InfoValue::IntArray),
        ValueType::Float => items
            .map(|s| match s {
                "." => Some(MISSING_FLOAT),
                s => s.parse().ok(),
            })
            .collect::<Option<Vec<_>>>()
            .map(InfoValue::FloatArray),
        ValueType::Flag => None,
        ValueType::String | ValueType::Character => Some(InfoValue::StringArray(
            items.map(str::to_string).collect(),
        )),
    }
}
