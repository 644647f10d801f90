//! jq-style path expressions over JSON bodies.
//!
//! Supported grammar (a subset of jq paths):
//! ```text
//! .            identity
//! .name        object field
//! ."a-b"       quoted object field
//! .["a-b"]     quoted object field
//! .[2] .[-1]   array index (negative counts from the end)
//! .[]          iterate array elements or object values
//! ```
//! Segments chain freely: `.data.items[].id`.
//!
//! # Design Decisions
//! - Query semantics follow jq: a missing field yields `null`, not zero matches
//! - `set` mirrors `path |= value`: missing fields and indices are created

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{ChainError, ChainResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(i64),
    Iterate,
}

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    source: String,
    segments: Vec<Segment>,
}

impl JsonPath {
    /// Evaluate the path, returning every match in document order.
    pub fn query(&self, root: &Value) -> ChainResult<Vec<Value>> {
        let mut current = vec![root.clone()];
        for segment in &self.segments {
            let mut next = Vec::with_capacity(current.len());
            for value in current {
                match (segment, value) {
                    (Segment::Key(key), Value::Object(mut map)) => {
                        next.push(map.remove(key).unwrap_or(Value::Null));
                    }
                    (Segment::Index(idx), Value::Array(items)) => {
                        next.push(resolve_index(*idx, items.len())
                            .and_then(|i| items.into_iter().nth(i))
                            .unwrap_or(Value::Null));
                    }
                    (Segment::Key(_) | Segment::Index(_), Value::Null) => next.push(Value::Null),
                    (Segment::Iterate, Value::Array(items)) => next.extend(items),
                    (Segment::Iterate, Value::Object(map)) => next.extend(map.into_iter().map(|(_, v)| v)),
                    (segment, value) => {
                        return Err(ChainError::JsonPath(format!(
                            "cannot apply {} to {}",
                            segment_label(segment),
                            type_name(&value)
                        )));
                    }
                }
            }
            current = next;
        }
        Ok(current)
    }

    /// Assign `new_value` at every location the path designates.
    pub fn set(&self, root: &mut Value, new_value: &Value) -> ChainResult<()> {
        assign(root, &self.segments, new_value)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn assign(target: &mut Value, segments: &[Segment], new_value: &Value) -> ChainResult<()> {
    let Some((segment, rest)) = segments.split_first() else {
        *target = new_value.clone();
        return Ok(());
    };

    match segment {
        Segment::Key(key) => {
            if target.is_null() {
                *target = Value::Object(serde_json::Map::new());
            }
            match target {
                Value::Object(map) => {
                    let slot = map.entry(key.clone()).or_insert(Value::Null);
                    assign(slot, rest, new_value)
                }
                other => Err(ChainError::JsonPath(format!(
                    "cannot index {} with {key:?}",
                    type_name(other)
                ))),
            }
        }
        Segment::Index(idx) => {
            if target.is_null() {
                *target = Value::Array(Vec::new());
            }
            match target {
                Value::Array(items) => {
                    let pos = if *idx < 0 {
                        resolve_index(*idx, items.len()).ok_or_else(|| {
                            ChainError::JsonPath(format!("index {idx} out of bounds"))
                        })?
                    } else {
                        usize::try_from(*idx)
                            .map_err(|_| ChainError::JsonPath(format!("index {idx} too large")))?
                    };
                    if pos >= items.len() {
                        items.resize(pos + 1, Value::Null);
                    }
                    assign(&mut items[pos], rest, new_value)
                }
                other => Err(ChainError::JsonPath(format!(
                    "cannot index {} with number",
                    type_name(other)
                ))),
            }
        }
        Segment::Iterate => match target {
            Value::Array(items) => items
                .iter_mut()
                .try_for_each(|item| assign(item, rest, new_value)),
            Value::Object(map) => map
                .values_mut()
                .try_for_each(|item| assign(item, rest, new_value)),
            other => Err(ChainError::JsonPath(format!(
                "cannot iterate over {}",
                type_name(other)
            ))),
        },
    }
}

fn resolve_index(idx: i64, len: usize) -> Option<usize> {
    if idx >= 0 {
        usize::try_from(idx).ok()
    } else {
        let back = usize::try_from(idx.unsigned_abs()).ok()?;
        len.checked_sub(back)
    }
}

fn segment_label(segment: &Segment) -> String {
    match segment {
        Segment::Key(key) => format!("field {key:?}"),
        Segment::Index(idx) => format!("index {idx}"),
        Segment::Iterate => "iteration".to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl FromStr for JsonPath {
    type Err = ChainError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let err = |msg: &str| ChainError::JsonPath(format!("{msg} in {source:?}"));
        let chars: Vec<char> = source.trim().chars().collect();
        if chars.first() != Some(&'.') {
            return Err(err("path must start with '.'"));
        }

        let mut segments = Vec::new();
        let mut pos = 0;
        while pos < chars.len() {
            match chars[pos] {
                '.' => {
                    pos += 1;
                    match chars.get(pos) {
                        None if segments.is_empty() && pos == 1 => {}
                        None => return Err(err("dangling '.'")),
                        Some('[') => {}
                        Some('"') => {
                            let (key, next) = read_quoted(&chars, pos).ok_or_else(|| err("unterminated string"))?;
                            segments.push(Segment::Key(key));
                            pos = next;
                        }
                        Some(c) if is_ident(*c) => {
                            let start = pos;
                            while pos < chars.len() && is_ident(chars[pos]) {
                                pos += 1;
                            }
                            segments.push(Segment::Key(chars[start..pos].iter().collect()));
                        }
                        Some(c) => return Err(err(&format!("unexpected {c:?}"))),
                    }
                }
                '[' => {
                    pos += 1;
                    match chars.get(pos) {
                        Some(']') => {
                            segments.push(Segment::Iterate);
                            pos += 1;
                        }
                        Some('"') => {
                            let (key, next) = read_quoted(&chars, pos).ok_or_else(|| err("unterminated string"))?;
                            if chars.get(next) != Some(&']') {
                                return Err(err("expected ']'"));
                            }
                            segments.push(Segment::Key(key));
                            pos = next + 1;
                        }
                        Some(_) => {
                            let start = pos;
                            while pos < chars.len() && chars[pos] != ']' {
                                pos += 1;
                            }
                            if pos >= chars.len() {
                                return Err(err("expected ']'"));
                            }
                            let digits: String = chars[start..pos].iter().collect();
                            let idx = digits
                                .trim()
                                .parse::<i64>()
                                .map_err(|_| err(&format!("invalid index {digits:?}")))?;
                            segments.push(Segment::Index(idx));
                            pos += 1;
                        }
                        None => return Err(err("expected ']'")),
                    }
                }
                c => return Err(err(&format!("unexpected {c:?}"))),
            }
        }

        Ok(Self {
            source: source.trim().to_string(),
            segments,
        })
    }
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Read a double-quoted string starting at `start` (the opening quote).
/// Returns the unescaped content and the position after the closing quote.
fn read_quoted(chars: &[char], start: usize) -> Option<(String, usize)> {
    let mut out = String::new();
    let mut pos = start + 1;
    while pos < chars.len() {
        match chars[pos] {
            '"' => return Some((out, pos + 1)),
            '\\' => {
                out.push(*chars.get(pos + 1)?);
                pos += 2;
            }
            c => {
                out.push(c);
                pos += 1;
            }
        }
    }
    None
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
