//! Parser for `key<delimiter>value` lines.
//!
//! Only lines of the form `key <delimiter> value` carry entries. Comments,
//! blank lines and anything else are kept as opaque text so that a file can
//! be written back exactly as it was read.

use crate::error::{Error, Result};
use regex::Regex;

/// Matches entry lines for one delimiter.
#[derive(Debug, Clone)]
pub struct LinePattern {
    delimiter: String,
    regex: Regex,
}

impl LinePattern {
    /// Build a pattern for the given delimiter (e.g. `=` or `:`).
    pub fn new(delimiter: &str) -> Result<Self> {
        if delimiter.trim().is_empty() {
            return Err(Error::InvalidDelimiter(delimiter.to_string()));
        }

        // Lazy key so values may contain the delimiter (DNs in CS.cfg do)
        let pattern = format!(r"^\s*(\S*?)\s*{}\s*(.*?)\s*$", regex::escape(delimiter.trim()));
        let regex = Regex::new(&pattern).map_err(|_| Error::InvalidDelimiter(delimiter.to_string()))?;

        Ok(Self {
            delimiter: delimiter.to_string(),
            regex,
        })
    }

    /// The delimiter used when rendering new lines.
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Split an entry line into `(key, value)`.
    ///
    /// Returns `None` for comments, blank lines and lines without a key.
    pub fn parse<'a>(&self, line: &'a str) -> Option<(&'a str, &'a str)> {
        if line.trim_start().starts_with('#') {
            return None;
        }

        let caps = self.regex.captures(line)?;
        let key = caps.get(1)?.as_str();
        if key.is_empty() {
            return None;
        }
        let value = caps.get(2).map_or("", |m| m.as_str());
        Some((key, value))
    }

    /// Whether the line holds an entry for `name` (case-insensitive).
    pub fn matches(&self, line: &str, name: &str) -> bool {
        self.parse(line)
            .is_some_and(|(key, _)| key.eq_ignore_ascii_case(name))
    }

    /// Render an entry line.
    pub fn format(&self, key: &str, value: &str) -> String {
        format!("{key}{}{value}", self.delimiter)
    }
}

/// Split file content into lines, remembering whether it ended with a newline.
pub fn split_lines(content: &str) -> (Vec<String>, bool) {
    if content.is_empty() {
        return (Vec::new(), true);
    }

    let trailing_newline = content.ends_with('\n');
    let body = content.strip_suffix('\n').unwrap_or(content);
    let lines = body.split('\n').map(str::to_string).collect();
    (lines, trailing_newline)
}
