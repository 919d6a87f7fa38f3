use memchr::{memchr, memmem};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Location of one `key=value` or flag entry inside an INFO buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub key: Span,
    /// `None` for flag entries.
    pub value: Option<Span>,
}

impl Entry {
    /// Span covering the key, the `=` and the value.
    pub fn full(&self) -> Span {
        Span {
            start: self.key.start,
            end: self.value.map_or(self.key.end, |v| v.end),
        }
    }

    pub fn is_flag(&self) -> bool {
        self.value.is_none()
    }
}

fn value_span(buf: &[u8], start: usize) -> Span {
    let end = memchr(b';', &buf[start..]).map_or(buf.len(), |i| start + i);
    Span { start, end }
}

/// Finds `key` in a `;`-separated INFO buffer without tokenizing it.
///
/// Keys sharing a prefix with `key` and occurrences inside other values are
/// rejected by checking the bytes on both sides of each hit.
pub fn find_entry(buf: &[u8], key: &[u8]) -> Option<Entry> {
    if key.is_empty() || buf.len() < key.len() {
        return None;
    }

    let mut needle = Vec::with_capacity(key.len() + 2);
    needle.push(b';');
    needle.extend_from_slice(key);
    needle.push(b'=');
    if let Some(pos) = memmem::find(buf, &needle) {
        let key_start = pos + 1;
        let key_end = key_start + key.len();
        return Some(Entry {
            key: Span {
                start: key_start,
                end: key_end,
            },
            value: Some(value_span(buf, key_end + 1)),
        });
    }

    for pos in memmem::find_iter(buf, key) {
        if pos != 0 && buf[pos - 1] != b';' {
            continue;
        }
        let key_end = pos + key.len();
        let key_span = Span {
            start: pos,
            end: key_end,
        };
        match buf.get(key_end) {
            None | Some(b';') => {
                return Some(Entry {
                    key: key_span,
                    value: None,
                })
            }
            Some(b'=') => {
                return Some(Entry {
                    key: key_span,
                    value: Some(value_span(buf, key_end + 1)),
                })
            }
            Some(_) => continue,
        }
    }
    None
}
