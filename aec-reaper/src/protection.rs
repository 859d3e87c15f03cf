//! Protection policy (`spec.md` §4.7): entities whose path matches a
//! configured literal path or regex are exempt from reaping regardless of
//! vitality age.

use crate::error::Result;
use regex::RegexSet;

pub struct ProtectedPaths {
    literals: Vec<String>,
    patterns: RegexSet,
}

impl ProtectedPaths {
    pub fn new(literals: Vec<String>, patterns: Vec<String>) -> Result<Self> {
        Ok(Self {
            literals,
            patterns: RegexSet::new(patterns)?,
        })
    }

    pub fn empty() -> Self {
        Self {
            literals: Vec::new(),
            patterns: RegexSet::empty(),
        }
    }

    /// Entities without a physical path are never path-protected; they are
    /// only exempt via dependents (`spec.md` §9 — logical entities).
    pub fn is_protected(&self, path: Option<&str>) -> bool {
        let Some(path) = path else { return false };
        self.literals.iter().any(|l| l == path) || self.patterns.is_match(path)
    }
}
