//! Reaper bookkeeping entity, per `spec.md` §3 ("CodeEntity").

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    File,
    Module,
    Function,
    Class,
}

/// A unit the entropy reaper tracks vitality for. Entities without a
/// physical `path` are logical (a function or class with no on-disk
/// representation) — `spec.md` §9 treats archival of those as a best-effort
/// no-op rather than a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeEntity {
    pub entity_id: String,
    pub path: Option<String>,
    pub kind: EntityKind,
    pub created_cycle: u64,
    pub last_vitality_cycle: u64,
    pub access_count: u64,
    pub dependents: BTreeSet<String>,
    pub bytes: u64,
}

impl CodeEntity {
    pub fn new(entity_id: impl Into<String>, kind: EntityKind, created_cycle: u64) -> Self {
        Self {
            entity_id: entity_id.into(),
            path: None,
            kind,
            created_cycle,
            last_vitality_cycle: created_cycle,
            access_count: 0,
            dependents: BTreeSet::new(),
            bytes: 0,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn record_access(&mut self, current_cycle: u64) {
        debug_assert!(self.last_vitality_cycle <= current_cycle);
        self.last_vitality_cycle = current_cycle;
        self.access_count += 1;
    }

    pub fn has_dependents(&self) -> bool {
        !self.dependents.is_empty()
    }
}
