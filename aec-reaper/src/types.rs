use aec_core::CodeEntity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReapReason {
    Stale,
    Orphan,
}

impl std::fmt::Display for ReapReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReapReason::Stale => "STALE",
            ReapReason::Orphan => "ORPHAN",
        };
        write!(f, "{s}")
    }
}

/// Written alongside an archived artifact so `resurrect` can restore it
/// (`spec.md` §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub entity_id: String,
    pub original_path: Option<String>,
    pub reason: ReapReason,
    pub age_cycles: u64,
    pub entity_snapshot: CodeEntity,
    pub revival_key: String,
    pub archived_at_cycle: u64,
    pub bytes: u64,
}

/// Result of a single `reap()` pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReapReport {
    pub scanned: u64,
    pub marked: u64,
    pub archived: u64,
    pub preserved: u64,
    pub bytes_saved: u64,
    pub death_list: Vec<(String, ReapReason)>,
}
