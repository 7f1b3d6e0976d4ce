//! Field annotation parsing.
//!
//! Annotations are written as space-separated `key:"value"` pairs, e.g.
//! `method:"GET,POST" route:",items"`. Values are trimmed; lists split on
//! commas with every element trimmed and validated on its own.

use std::fmt;

use thiserror::Error;

/// Errors produced while extracting annotation values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("must have {0:?} tag")]
    Missing(String),

    #[error("cannot have empty tag {0:?}")]
    Empty(String),
}

/// A raw annotation string attached to a field.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Tag(String);

impl Tag {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Look up the raw (unquoted, untrimmed) value for `key`.
    ///
    /// Parsing stops at the first malformed pair; keys after it are absent.
    pub fn lookup(&self, key: &str) -> Option<String> {
        let mut rest = self.0.as_str();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                return None;
            }

            let name_len = rest
                .bytes()
                .position(|b| b <= b' ' || b == b':' || b == b'"' || b == 0x7f)
                .unwrap_or(rest.len());
            let bytes = rest.as_bytes();
            if name_len == 0 || name_len + 1 >= bytes.len() || bytes[name_len] != b':' || bytes[name_len + 1] != b'"' {
                return None;
            }
            let name = &rest[..name_len];
            rest = &rest[name_len + 1..];

            // rest starts at the opening quote
            let bytes = rest.as_bytes();
            let mut i = 1;
            while i < bytes.len() && bytes[i] != b'"' {
                if bytes[i] == b'\\' {
                    i += 1;
                }
                i += 1;
            }
            if i >= bytes.len() {
                return None;
            }
            let quoted = &rest[1..i];
            rest = &rest[i + 1..];

            if name == key {
                return unquote(quoted);
            }
        }
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`", self.0)
    }
}

fn unquote(quoted: &str) -> Option<String> {
    let mut out = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            _ => return None,
        }
    }
    Some(out)
}

/// How a tag is validated.
#[derive(Debug, Clone, Copy)]
pub struct TagSpec<'a> {
    pub key: &'a str,
    pub required: bool,
    pub allow_empty: bool,
}

impl<'a> TagSpec<'a> {
    pub const fn required(key: &'a str) -> Self {
        Self { key, required: true, allow_empty: false }
    }

    pub const fn optional(key: &'a str) -> Self {
        Self { key, required: false, allow_empty: false }
    }

    pub const fn allow_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }

    fn check(&self, value: &str) -> Result<String, TagError> {
        let value = value.trim();
        if value.is_empty() && !self.allow_empty {
            return Err(TagError::Empty(self.key.to_string()));
        }
        Ok(value.to_string())
    }
}

/// Shapes an annotation value can be extracted as.
pub trait TagValue: Sized {
    fn parse(raw: &str, spec: &TagSpec<'_>) -> Result<Self, TagError>;
}

impl TagValue for String {
    fn parse(raw: &str, spec: &TagSpec<'_>) -> Result<Self, TagError> {
        spec.check(raw)
    }
}

impl TagValue for Vec<String> {
    fn parse(raw: &str, spec: &TagSpec<'_>) -> Result<Self, TagError> {
        raw.split(',').map(|part| spec.check(part)).collect()
    }
}

/// Extract a tag. Absent optional tags yield `None`.
pub fn extract<T: TagValue>(tag: &Tag, spec: TagSpec<'_>) -> Result<Option<T>, TagError> {
    match tag.lookup(spec.key) {
        Some(raw) => T::parse(&raw, &spec).map(Some),
        None if spec.required => Err(TagError::Missing(spec.key.to_string())),
        None => Ok(None),
    }
}

/// Extract a tag that must be present.
pub fn require<T: TagValue>(tag: &Tag, spec: TagSpec<'_>) -> Result<T, TagError> {
    let spec = TagSpec { required: true, ..spec };
    extract(tag, spec)?.ok_or_else(|| TagError::Missing(spec.key.to_string()))
}
