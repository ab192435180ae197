//! Environment snapshot.
//!
//! # Responsibilities
//! - Capture process environment once at startup
//! - Allow explicit construction for tests and embedding
//! - Remember keys whose values are not valid UTF-8
//!
//! # Design Decisions
//! - Snapshot is immutable; nothing reads `std::env` after capture
//! - Blank values are treated as unset

use std::collections::{BTreeMap, BTreeSet};

/// Immutable key/value view of the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
    non_unicode: BTreeSet<String>,
}

/// Result of looking up a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    /// Key is set to a non-blank value (trimmed).
    Present(&'a str),
    /// Key is unset or blank.
    Absent,
    /// Key is set but its value is not valid UTF-8.
    NotUnicode,
}

impl Environment {
    /// Snapshot the current process environment.
    pub fn capture() -> Self {
        let mut env = Self::default();
        for (key, value) in std::env::vars_os() {
            let Ok(key) = key.into_string() else {
                continue;
            };
            match value.into_string() {
                Ok(value) => {
                    env.vars.insert(key, value);
                }
                Err(_) => {
                    env.non_unicode.insert(key);
                }
            }
        }
        env
    }

    /// Build an environment from explicit pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            non_unicode: BTreeSet::new(),
        }
    }

    /// Mark a key as holding a value that is not valid UTF-8.
    pub fn with_non_unicode(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.vars.remove(&key);
        self.non_unicode.insert(key);
        self
    }

    /// Look up a key.
    pub fn lookup(&self, key: &str) -> Lookup<'_> {
        if self.non_unicode.contains(key) {
            return Lookup::NotUnicode;
        }
        match self.vars.get(key).map(|v| v.trim()) {
            Some(v) if !v.is_empty() => Lookup::Present(v),
            _ => Lookup::Absent,
        }
    }

    /// Convenience accessor that ignores non-UTF-8 values.
    pub fn get(&self, key: &str) -> Option<&str> {
        match self.lookup(key) {
            Lookup::Present(v) => Some(v),
            _ => None,
        }
    }

    /// Number of captured keys (including non-UTF-8 ones).
    pub fn len(&self) -> usize {
        self.vars.len() + self.non_unicode.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
