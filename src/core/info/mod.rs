mod span;
mod value;

pub use span::{find_entry, Entry, Span};
pub use value::{format_float, InfoValue};

use crate::core::header::{Header, Number, ValueType};
use std::{borrow::Cow, fmt};
use thiserror::Error;
use value::{parse_array, parse_scalar};

/// Per-field decode outcomes. None of these abort a record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InfoError {
    #[error("INFO field {key} not found in record")]
    NotInBuffer { key: String },
    /// `value` carries what was found in the buffer: `Bool(true)` for a bare
    /// flag, the raw text otherwise, `Missing` when absent.
    #[error("INFO field {key} not found in header")]
    NotInHeader { key: String, value: InfoValue },
    /// `value` is `Bool(true)`: the bare key is present.
    #[error("INFO flag {key} is not declared as a Flag in the header")]
    FlagNotDeclared { key: String, value: InfoValue },
    #[error("INFO flag {key} has a value")]
    FlagHasValue { key: String },
    /// `value` holds everything that parsed.
    #[error("INFO field {key} expected {expected} values, found {found}")]
    CountMismatch {
        key: String,
        expected: usize,
        found: usize,
        value: InfoValue,
    },
    #[error("INFO field {key} has invalid {value_type} value {raw:?}")]
    Parse {
        key: String,
        value_type: ValueType,
        raw: String,
    },
}

/// Typed view over the raw INFO column of one record.
///
/// Reads borrow the line buffer; the first `set` or `delete` copies it.
#[derive(Debug, Clone)]
pub struct InfoBuffer<'a> {
    buf: Cow<'a, [u8]>,
    header: &'a Header,
    alt_count: usize,
}

impl<'a> InfoBuffer<'a> {
    pub fn new(raw: &'a [u8], header: &'a Header, alt_count: usize) -> Self {
        let raw: &[u8] = if raw == b"." { b"" } else { raw };
        InfoBuffer {
            buf: Cow::Borrowed(raw),
            header,
            alt_count,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.into_owned()
    }

    pub fn contains(&self, key: &str) -> bool {
        find_entry(&self.buf, key.as_bytes()).is_some()
    }

    pub fn keys(&self) -> Vec<String> {
        self.buf
            .split(|&b| b == b';')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let key = pair.split(|&b| b == b'=').next().unwrap_or(pair);
                String::from_utf8_lossy(key).into_owned()
            })
            .collect()
    }

    /// Raw bytes of the value for `key`; a bare flag yields its key.
    pub fn raw_value(&self, key: &str) -> Option<&[u8]> {
        let entry = find_entry(&self.buf, key.as_bytes())?;
        let span = entry.value.unwrap_or(entry.key);
        Some(&self.buf[span.range()])
    }

    /// Decodes `key` according to its header definition.
    pub fn get(&self, key: &str) -> Result<InfoValue, InfoError> {
        let entry = find_entry(&self.buf, key.as_bytes());
        let Some(field) = self.header.info(key) else {
            let value = match entry {
                None => InfoValue::Missing,
                Some(Entry { value: None, .. }) => InfoValue::Bool(true),
                Some(Entry {
                    value: Some(span), ..
                }) => InfoValue::String(String::from_utf8_lossy(&self.buf[span.range()]).into()),
            };
            return Err(InfoError::NotInHeader {
                key: key.to_string(),
                value,
            });
        };

        let Some(entry) = entry else {
            return if field.is_flag() {
                Ok(InfoValue::Bool(false))
            } else {
                Err(InfoError::NotInBuffer {
                    key: key.to_string(),
                })
            };
        };
        let Some(span) = entry.value else {
            return if field.is_flag() {
                Ok(InfoValue::Bool(true))
            } else {
                Err(InfoError::FlagNotDeclared {
                    key: key.to_string(),
                    value: InfoValue::Bool(true),
                })
            };
        };
        if field.is_flag() || field.number == Number::Fixed(0) {
            return Err(InfoError::FlagHasValue {
                key: key.to_string(),
            });
        }

        let parse_error = |raw: &str| InfoError::Parse {
            key: key.to_string(),
            value_type: field.value_type,
            raw: raw.to_string(),
        };
        let raw = std::str::from_utf8(&self.buf[span.range()])
            .map_err(|_| parse_error(&String::from_utf8_lossy(&self.buf[span.range()])))?;

        let is_scalar = match field.number {
            Number::Fixed(1) => true,
            Number::Unbounded => !raw.contains(','),
            _ => false,
        };
        if is_scalar {
            return parse_scalar(raw, field.value_type).ok_or_else(|| parse_error(raw));
        }

        let value = parse_array(raw, field.value_type).ok_or_else(|| parse_error(raw))?;
        match field.number.expected_count(self.alt_count) {
            Some(expected) if expected != value.len() => Err(InfoError::CountMismatch {
                key: key.to_string(),
                expected,
                found: value.len(),
                value,
            }),
            _ => Ok(value),
        }
    }

    /// Writes `key` with `value`, replacing any existing entry. `Bool(true)`
    /// writes a flag and `Bool(false)` removes the key.
    pub fn set(&mut self, key: &str, value: &InfoValue) {
        let text = match value {
            InfoValue::Bool(false) => {
                self.delete(key);
                return;
            }
            InfoValue::Bool(true) => key.to_string(),
            other => format!("{key}={other}"),
        };
        let entry = find_entry(&self.buf, key.as_bytes());
        let buf = self.buf.to_mut();
        match entry {
            Some(entry) => {
                buf.splice(entry.full().range(), text.into_bytes());
            }
            None => {
                if !buf.is_empty() {
                    buf.push(b';');
                }
                buf.extend_from_slice(text.as_bytes());
            }
        }
    }

    /// Removes `key` and its separator. Returns whether anything was removed.
    pub fn delete(&mut self, key: &str) -> bool {
        let Some(entry) = find_entry(&self.buf, key.as_bytes()) else {
            return false;
        };
        let Span { start, end } = entry.full();
        let buf = self.buf.to_mut();
        if end < buf.len() {
            buf.drain(start..=end);
        } else if start > 0 {
            buf.drain(start - 1..end);
        } else {
            buf.clear();
        }
        true
    }
}

impl fmt::Display for InfoBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.buf.is_empty() {
            write!(f, ".")
        } else {
            write!(f, "{}", String::from_utf8_lossy(&self.buf))
        }
    }
}
