//! Core document model: directives, spans, fragments, documents
//!
//! A parsed Markdown file is an ordered sequence of fragments — literal text
//! spans indexing into the source string, and typed directives parsed from
//! `yaml embedm` fenced blocks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::status::Status;

/// A typed instruction block parsed from a `yaml embedm` fence.
///
/// `source` is either empty or a resolved absolute path. Option values are
/// carried as strings through the plan; plugins narrow them to typed values
/// via [`Directive::int_option`] and [`Directive::bool_option`]. Booleans
/// are stored in their textual forms `True`/`False`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub type_name: String,
    pub source: String,
    pub options: BTreeMap<String, String>,
}

impl Directive {
    pub fn new(type_name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            source: source.into(),
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Raw string value of an option, if present.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Integer value of an option.
    ///
    /// Returns `default` when the option is absent, or an error `Status`
    /// when the value does not parse as an integer.
    pub fn int_option(&self, key: &str, default: i64) -> Result<i64, Status> {
        match self.option(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                Status::error(format!("option '{key}' must be an integer, got '{raw}'"))
            }),
        }
    }

    /// Boolean value of an option.
    ///
    /// Only the textual forms `True` and `False` (case-insensitive) are
    /// accepted — the parser emits these from YAML scalars, so any other
    /// spelling is an invalid-option error.
    pub fn bool_option(&self, key: &str, default: bool) -> Result<bool, Status> {
        match self.option(key) {
            None => Ok(default),
            Some(raw) => parse_bool(raw).ok_or_else(|| {
                Status::error(format!(
                    "option '{key}' must be 'True' or 'False', got '{raw}'"
                ))
            }),
        }
    }

    /// Whether the directive carries a non-empty source path.
    pub fn has_source(&self) -> bool {
        !self.source.is_empty()
    }
}

/// Parse the textual boolean forms `True`/`False` (case-insensitive).
pub fn parse_bool(raw: &str) -> Option<bool> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Some(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// An immutable byte range into the Markdown source that produced it.
///
/// Spans own no text; the compiler resolves them against a freshly cached
/// copy of the source at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub offset: usize,
    pub length: usize,
}

impl Span {
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    /// Resolve this span to a slice of `source`.
    pub fn resolve<'a>(&self, source: &'a str) -> &'a str {
        let end = (self.offset + self.length).min(source.len());
        let start = self.offset.min(end);
        &source[start..end]
    }
}

/// A literal text span or a directive; the unit of the parser's output and
/// of the compiler's input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fragment {
    Span(Span),
    Directive(Directive),
}

impl Fragment {
    pub fn as_directive(&self) -> Option<&Directive> {
        match self {
            Fragment::Directive(directive) => Some(directive),
            Fragment::Span(_) => None,
        }
    }
}

/// An originating absolute file path plus its ordered fragment list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub file_name: String,
    pub fragments: Vec<Fragment>,
}

impl Document {
    pub fn new(file_name: impl Into<String>, fragments: Vec<Fragment>) -> Self {
        Self {
            file_name: file_name.into(),
            fragments,
        }
    }

    /// Iterate the directives in fragment order.
    pub fn directives(&self) -> impl Iterator<Item = &Directive> {
        self.fragments.iter().filter_map(Fragment::as_directive)
    }

    /// Count of directives with a non-empty source.
    pub fn source_directive_count(&self) -> usize {
        self.directives().filter(|d| d.has_source()).count()
    }
}
