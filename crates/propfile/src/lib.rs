//! # propfile
//!
//! Line-oriented `key<delimiter>value` files, as used by PKI instance
//! registry files and subsystem `CS.cfg` files.
//!
//! The file is held as its original lines. Reading and then writing a file
//! reproduces it byte-for-byte; edits only touch the lines of the keys they
//! change, so comments, ordering and unrelated entries survive.
//!
//! ## Example
//!
//! ```no_run
//! use propfile::PropertyFile;
//!
//! let mut registry = PropertyFile::new("/etc/sysconfig/pki/tomcat/pki-tomcat/pki-tomcat", "=")?;
//! registry.read()?;
//! if registry.get("PKI_VERSION").is_none() {
//!     registry.set("PKI_VERSION", "10.1.0");
//! }
//! registry.write()?;
//! # Ok::<(), propfile::Error>(())
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod parser;
pub mod writer;

pub use error::{Error, Result};
pub use parser::LinePattern;

use std::path::{Path, PathBuf};

/// A property file held as its original lines.
#[derive(Debug, Clone)]
pub struct PropertyFile {
    path: PathBuf,
    pattern: LinePattern,
    lines: Vec<String>,
    trailing_newline: bool,
}

impl PropertyFile {
    /// Create an empty document bound to `path`; nothing is read yet.
    pub fn new(path: impl AsRef<Path>, delimiter: &str) -> Result<Self> {
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            pattern: LinePattern::new(delimiter)?,
            lines: Vec::new(),
            trailing_newline: true,
        })
    }

    /// Create a document and read it from disk.
    pub fn open(path: impl AsRef<Path>, delimiter: &str) -> Result<Self> {
        let mut file = Self::new(path, delimiter)?;
        file.read()?;
        Ok(file)
    }

    /// Path this document reads from and writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delimiter between keys and values.
    pub fn delimiter(&self) -> &str {
        self.pattern.delimiter()
    }

    /// Whether the backing file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// (Re)load all lines from disk. A missing file is an empty document.
    pub fn read(&mut self) -> Result<()> {
        if !self.path.exists() {
            self.lines.clear();
            self.trailing_newline = true;
            return Ok(());
        }

        let content = std::fs::read_to_string(&self.path).map_err(|source| Error::Read {
            path: self.path.clone(),
            source,
        })?;
        self.parse_str(&content);
        Ok(())
    }

    /// Replace the document with the given content.
    pub fn parse_str(&mut self, content: &str) {
        let (lines, trailing_newline) = parser::split_lines(content);
        self.lines = lines;
        self.trailing_newline = trailing_newline;
    }

    /// Render the document as file content.
    pub fn render(&self) -> String {
        writer::render(&self.lines, self.trailing_newline)
    }

    /// Write all lines back in their original order.
    pub fn write(&self) -> Result<()> {
        writer::write_atomic(&self.path, &self.render())
    }

    /// All lines, entries and otherwise.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Insert a raw line.
    pub fn insert_line(&mut self, index: usize, line: impl Into<String>) {
        let index = index.min(self.lines.len());
        self.lines.insert(index, line.into());
    }

    /// Remove a raw line, returning it.
    pub fn remove_line(&mut self, index: usize) -> Option<String> {
        (index < self.lines.len()).then(|| self.lines.remove(index))
    }

    /// Append a blank separator unless the document is empty or already ends with one.
    pub fn ensure_blank_separator(&mut self) {
        if self.lines.last().is_some_and(|l| !l.is_empty()) {
            self.lines.push(String::new());
        }
    }

    /// Line index of `name`, matched case-insensitively.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| self.pattern.matches(line, name))
    }

    /// Value of `name`, matched case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| {
            self.pattern
                .parse(line)
                .filter(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value)
        })
    }

    /// Value of `name` parsed into `T`.
    pub fn get_parsed<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>> {
        self.get(name)
            .map(|value| {
                value.parse().map_err(|_| Error::InvalidValue {
                    key: name.to_string(),
                    value: value.to_string(),
                })
            })
            .transpose()
    }

    /// Set `name` in place if present (keeping the key's spelling), else append.
    pub fn set(&mut self, name: &str, value: &str) {
        self.set_with(name, value, None);
    }

    /// Set `name` in place if present, else insert the entry at `index`.
    pub fn set_at(&mut self, name: &str, value: &str, index: usize) {
        self.set_with(name, value, Some(index));
    }

    fn set_with(&mut self, name: &str, value: &str, index: Option<usize>) {
        if let Some(i) = self.index_of(name) {
            let key = self
                .pattern
                .parse(&self.lines[i])
                .map_or(name.to_string(), |(key, _)| key.to_string());
            self.lines[i] = self.pattern.format(&key, value);
            return;
        }

        let line = self.pattern.format(name, value);
        match index {
            Some(i) => self.insert_line(i, line),
            None => self.lines.push(line),
        }
    }

    /// Remove the first entry for `name`, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let i = self.index_of(name)?;
        let line = self.lines.remove(i);
        self.pattern.parse(&line).map(|(_, value)| value.to_string())
    }

    /// Iterate over `(key, value)` entries in file order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.lines.iter().filter_map(|line| self.pattern.parse(line))
    }
}
