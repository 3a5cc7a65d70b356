//! Compile-time registry from configured names to scriptlet factories

use crate::error::{Error, Result};
use crate::scriptlet::BoxedScriptlet;
use std::collections::BTreeMap;

/// Function producing a fresh scriptlet instance
pub type Factory<C> = fn() -> BoxedScriptlet<C>;

/// Maps configured scriptlet names to their implementations
///
/// Names are resolved up front, so a typo in a configured list fails before
/// the first scriptlet touches anything.
pub struct Registry<C: ?Sized> {
    factories: BTreeMap<&'static str, Factory<C>>,
}

impl<C: ?Sized> Registry<C> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Register a factory under `name`, replacing any previous one
    pub fn register(mut self, name: &'static str, factory: Factory<C>) -> Self {
        self.factories.insert(name, factory);
        self
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    /// Build the scriptlet registered under `name`
    pub fn resolve(&self, name: &str) -> Result<BoxedScriptlet<C>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| Error::UnknownScriptlet {
                name: name.to_string(),
                known: self.names().iter().map(ToString::to_string).collect(),
            })
    }

    /// Build every scriptlet of a configured list, in configured order
    pub fn resolve_all<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<BoxedScriptlet<C>>> {
        if names.is_empty() {
            return Err(Error::EmptySequence);
        }
        names.iter().map(|n| self.resolve(n.as_ref())).collect()
    }
}

impl<C: ?Sized> Default for Registry<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a whitespace- or comma-separated configured list
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
