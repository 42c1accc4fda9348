//! Compilation cache for the regex patterns declared in mappings.
//!
//! Patterns are compiled once at load time, keyed by the raw pattern string
//! so identical patterns across mappings share one compiled regex. Matching
//! at request time only looks up, never compiles.

use crate::mapping::{Criterion, Mapping};
use regex::Regex;
use std::collections::HashMap;

/// An invalid regex pattern in a mapping. Raised at load time only; the
/// loader rejects the whole mapping file that carried the pattern.
#[derive(Debug, thiserror::Error)]
#[error("invalid regex pattern '{pattern}': {source}")]
pub struct PatternCompileError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

#[derive(Debug, Default)]
pub struct RegexCache {
    cache: HashMap<String, Regex>,
}

impl RegexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every pattern a mapping declares: path patterns, each
    /// header's patterns, and body patterns. Compilation happens once per
    /// distinct pattern string; re-adding a known pattern is a no-op.
    ///
    /// Fails on the first invalid pattern. Patterns compiled earlier during
    /// the same call stay cached; the caller rejects the mapping either way.
    pub fn add_from_mapping(&mut self, mapping: &Mapping) -> Result<(), PatternCompileError> {
        self.add_criterion(&mapping.request.path)?;
        for criterion in mapping.request.headers.values() {
            self.add_criterion(criterion)?;
        }
        self.add_criterion(&mapping.request.body)
    }

    fn add_criterion(&mut self, criterion: &Criterion) -> Result<(), PatternCompileError> {
        for pattern in &criterion.pattern {
            if self.cache.contains_key(pattern) {
                continue;
            }
            let compiled = Regex::new(pattern).map_err(|source| PatternCompileError {
                pattern: pattern.clone(),
                source,
            })?;
            self.cache.insert(pattern.clone(), compiled);
        }
        Ok(())
    }

    /// Compiled regex for a pattern string. `None` against a rule set that
    /// passed load-time validation is a programming error.
    pub fn lookup(&self, pattern: &str) -> Option<&Regex> {
        self.cache.get(pattern)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
