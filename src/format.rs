//! Record formatting and overflow splitting.
//!
//! A logical record is a key plus an ordered list of values. NIS tools
//! choke on long lines, so a record that does not fit the line budget is
//! split: the tail of the value list moves under a minted continuation
//! key, repeatedly, until the remainder fits under the original key.
//!
//! Two continuation styles exist:
//!
//! ```text
//! SharedId (group):     example0:*:1000:u110,...,u250
//!                       examplegrp:*:1000:u1,...,u109
//!
//! Nested (netgroup):    x00 (,u110,) ... (,u250,)
//!                       staff x00 (,u1,) ... (,u109,)
//! ```
//!
//! Posix groups repeat the gid on every physical line. Netgroups have no
//! id, so the continuation key is injected as a member of the remainder.

use crate::error::FormatError;
use crate::names::TmpNameFactory;

/// How continuation keys are threaded back into the parent record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Continuation lines repeat the key separator (and with it the gid).
    SharedId,
    /// The continuation key becomes a member of the remaining record.
    Nested,
}

/// Separators and continuation style of one map type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    pub key_separator: String,
    pub value_separator: char,
    pub continuation: Continuation,
}

impl RecordLayout {
    /// `name:*:gid:member,member,...`
    pub fn group(gid: u32) -> Self {
        Self {
            key_separator: format!(":*:{}:", gid),
            value_separator: ',',
            continuation: Continuation::SharedId,
        }
    }

    /// `name member member ...`
    pub fn netgroup() -> Self {
        Self {
            key_separator: " ".to_string(),
            value_separator: ' ',
            continuation: Continuation::Nested,
        }
    }

    /// Bytes left for values on a line keyed `key`.
    fn budget(&self, key: &str, max_line_length: usize) -> Result<usize, FormatError> {
        max_line_length
            .checked_sub(key.len() + self.key_separator.len())
            .filter(|budget| *budget > 0)
            .ok_or_else(|| FormatError::KeyTooLong {
                key: key.to_string(),
                max_line_length,
            })
    }

    fn render(&self, key: &str, values: &[String]) -> String {
        let capacity = key.len() + self.key_separator.len() + joined_len(values) + 1;
        let mut line = String::with_capacity(capacity);
        line.push_str(key);
        line.push_str(&self.key_separator);
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                line.push(self.value_separator);
            }
            line.push_str(value);
        }
        line.push('\n');
        line
    }
}

/// Length of `values` joined by a one-byte separator.
fn joined_len(values: &[String]) -> usize {
    let bytes: usize = values.iter().map(String::len).sum();
    bytes + values.len().saturating_sub(1)
}

/// Index of the first value of the longest tail of `values` that fits `budget`.
///
/// `None` if not even the last value fits.
fn tail_start(values: &[String], budget: usize) -> Option<usize> {
    let mut len = 0;
    let mut start = None;
    for (i, value) in values.iter().enumerate().rev() {
        let add = if start.is_none() { value.len() } else { value.len() + 1 };
        if len + add > budget {
            break;
        }
        len += add;
        start = Some(i);
    }
    start
}

/// Lay out one logical record as physical lines of at most
/// `max_line_length` bytes each, not counting the trailing newline.
///
/// Every value ends up on exactly one line. Continuation lines come first;
/// the line carrying `key` is always last.
pub fn split_record(
    key: &str,
    values: &[String],
    layout: &RecordLayout,
    max_line_length: usize,
    names: &mut TmpNameFactory,
) -> Result<Vec<String>, FormatError> {
    let main_budget = layout.budget(key, max_line_length)?;
    let mut remaining = values.to_vec();
    let mut lines = Vec::new();

    while joined_len(&remaining) > main_budget {
        let aux = names.mint(key)?;
        let aux_budget = layout.budget(&aux, max_line_length)?;

        let widest = aux_budget.max(main_budget);
        let unplaceable = remaining.iter().find(|v| v.len() > widest).cloned();
        let start = tail_start(&remaining, aux_budget).filter(|_| unplaceable.is_none());
        let Some(start) = start else {
            let value = unplaceable
                .or_else(|| remaining.last().cloned())
                .unwrap_or_default();
            return Err(FormatError::ValueTooLong {
                key: key.to_string(),
                len: value.len(),
                value,
                budget: aux_budget,
            });
        };

        let before = joined_len(&remaining);
        let chunk = remaining.split_off(start);
        lines.push(layout.render(&aux, &chunk));

        if layout.continuation == Continuation::Nested {
            remaining.insert(0, aux);
            if joined_len(&remaining) >= before {
                return Err(FormatError::NoProgress { key: key.to_string() });
            }
        }
    }

    lines.push(layout.render(key, &remaining));
    Ok(lines)
}

/// Values of a user netgroup: referenced netgroups, then `(,user,)` triples.
pub fn user_netgroup_values<'a>(
    group_refs: impl IntoIterator<Item = &'a String>,
    users: impl IntoIterator<Item = &'a String>,
) -> Vec<String> {
    group_refs
        .into_iter()
        .cloned()
        .chain(users.into_iter().map(|u| format!("(,{},)", u)))
        .collect()
}

/// Values of a host netgroup.
///
/// Hosts inside `zone` are listed once by their zone-relative name; every
/// host is also listed by its fully qualified name without the trailing dot.
pub fn host_netgroup_values<'a>(
    group_refs: impl IntoIterator<Item = &'a String>,
    hosts: &[&'a String],
    zone: Option<&str>,
) -> Vec<String> {
    let zone = zone.filter(|z| !z.is_empty());
    let short = hosts.iter().filter_map(|h| {
        let zone = zone?;
        h.strip_suffix(zone)
            .filter(|s| !s.is_empty())
            .map(|s| format!("({},-,)", s))
    });
    let full = hosts.iter().map(|h| {
        let h: &str = h;
        format!("({},-,)", h.strip_suffix('.').unwrap_or(h))
    });
    group_refs.into_iter().cloned().chain(short).chain(full).collect()
}
