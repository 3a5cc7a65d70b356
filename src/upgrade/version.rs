//! Dotted release versions

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Version every unit is assumed to run when it records none
pub const BASELINE: &str = "10.0.0";

#[derive(Debug, thiserror::Error)]
#[error("invalid version '{0}' (expected dotted numbers such as 10.1.0)")]
pub struct InvalidVersion(pub String);

/// A dotted numeric version
///
/// Compared numerically component by component; trailing zero components do
/// not matter, so `1.0 == 1.0.0`. Display keeps the original spelling.
#[derive(Debug, Clone)]
pub struct Version {
    parts: Vec<u64>,
    text: String,
}

impl Version {
    pub fn parse(text: &str) -> Result<Self, InvalidVersion> {
        let text = text.trim();
        let parts = text
            .split('.')
            .map(|part| part.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| InvalidVersion(text.to_string()))?;
        Ok(Self {
            parts,
            text: text.to_string(),
        })
    }

    pub fn from_parts(parts: &[u64]) -> Self {
        Self {
            parts: parts.to_vec(),
            text: parts
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join("."),
        }
    }

    pub fn baseline() -> Self {
        Self::from_parts(&[10, 0, 0])
    }

    /// Components without trailing zeros
    fn significant(&self) -> &[u64] {
        let len = self
            .parts
            .iter()
            .rposition(|&p| p != 0)
            .map_or(0, |i| i + 1);
        &self.parts[..len]
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.significant() == other.significant()
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        // Slices compare lexicographically, and a shorter significant prefix
        // is smaller, which is exactly numeric version order
        self.significant().cmp(other.significant())
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Version {
    type Err = InvalidVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
