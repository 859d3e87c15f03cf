//! Entropy Reaper (C7): tracks vitality per `CodeEntity` and periodically
//! reclaims entities that have gone stale or orphaned, per `spec.md` §4.7.
//!
//! The archive is a content-addressed key-value store rather than a real
//! filesystem directory (`spec.md` §9 redesign guidance): each archived
//! artifact is keyed by its `revival_key`, which makes `resurrect` and unit
//! tests independent of any on-disk layout.

use crate::error::Result;
use crate::protection::ProtectedPaths;
use crate::types::{ManifestEntry, ReapReason, ReapReport};
use aec_core::{kv::put_with_retry, CodeEntity, EntityKind, KvStore, SecureRandom, VitalityRegistrar};
use aec_token::TokenService;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Default staleness threshold in cycles (`spec.md` §4.7).
pub const DEFAULT_STALE_THRESHOLD: u64 = 10_000;
/// Default archive byte budget before `clean_archive` starts evicting.
pub const DEFAULT_MAX_ARCHIVE_BYTES: u64 = 64 * 1024 * 1024;

fn entity_key(entity_id: &str) -> String {
    format!("reaper/entity/{entity_id}")
}

fn archive_key(revival_key: &str) -> String {
    format!("reaper/archive/{revival_key}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArchiveRecord {
    manifest: ManifestEntry,
    payload: Vec<u8>,
}

/// Entropy Reaper. Starts in dry-run mode; `set_live_mode(true)` is the
/// explicit operator action `spec.md` §4.7 requires before archival becomes
/// destructive.
pub struct Reaper {
    kv: Arc<dyn KvStore>,
    tokens: Arc<TokenService>,
    random: Arc<dyn SecureRandom>,
    protected: ProtectedPaths,
    entities: RwLock<HashMap<String, CodeEntity>>,
    archive: RwLock<HashMap<String, ArchiveRecord>>,
    cycle: AtomicU64,
    dry_run: AtomicBool,
    stale_threshold: u64,
    max_archive_bytes: u64,
}

impl Reaper {
    pub fn new(kv: Arc<dyn KvStore>, tokens: Arc<TokenService>, random: Arc<dyn SecureRandom>, protected: ProtectedPaths) -> Self {
        Self {
            kv,
            tokens,
            random,
            protected,
            entities: RwLock::new(HashMap::new()),
            archive: RwLock::new(HashMap::new()),
            cycle: AtomicU64::new(0),
            dry_run: AtomicBool::new(true),
            stale_threshold: DEFAULT_STALE_THRESHOLD,
            max_archive_bytes: DEFAULT_MAX_ARCHIVE_BYTES,
        }
    }

    pub fn with_stale_threshold(mut self, cycles: u64) -> Self {
        self.stale_threshold = cycles;
        self
    }

    pub fn with_max_archive_bytes(mut self, bytes: u64) -> Self {
        self.max_archive_bytes = bytes;
        self
    }

    pub fn cycle(&self) -> u64 {
        self.cycle.load(Ordering::SeqCst)
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run.load(Ordering::SeqCst)
    }

    /// Switch the reaper into live archival mode. Requires an explicit
    /// operator call (`spec.md` §4.7) — never flipped automatically.
    pub fn set_live_mode(&self, live: bool) {
        self.dry_run.store(!live, Ordering::SeqCst);
    }

    fn persist_entity(&self, entity: &CodeEntity) -> Result<()> {
        put_with_retry(self.kv.as_ref(), &entity_key(&entity.entity_id), serde_json::to_vec(entity)?)?;
        Ok(())
    }

    /// Rehydrate the cycle counter, entity registry, and archive from
    /// `KvStore` — the counterpart to every `persist_*` call, used at
    /// process startup so state survives a restart.
    pub fn load_from_kv(&self) -> Result<()> {
        if let Some(bytes) = self.kv.get("reaper/cycle").map_err(crate::error::ReaperError::Persistence)? {
            if let Ok(text) = String::from_utf8(bytes) {
                if let Ok(n) = text.parse::<u64>() {
                    self.cycle.store(n, Ordering::SeqCst);
                }
            }
        }

        let mut entities = self.entities.write();
        for (_, bytes) in self.kv.scan("reaper/entity/").map_err(crate::error::ReaperError::Persistence)? {
            let entity: CodeEntity = serde_json::from_slice(&bytes)?;
            entities.insert(entity.entity_id.clone(), entity);
        }
        drop(entities);

        let mut archive = self.archive.write();
        for (_, bytes) in self.kv.scan("reaper/archive/").map_err(crate::error::ReaperError::Persistence)? {
            let record: ArchiveRecord = serde_json::from_slice(&bytes)?;
            archive.insert(record.manifest.revival_key.clone(), record);
        }
        Ok(())
    }

    /// Snapshot of every live-registry entity, for status reporting.
    pub fn entities_snapshot(&self) -> Vec<CodeEntity> {
        self.entities.read().values().cloned().collect()
    }

    fn persist_cycle(&self) -> Result<()> {
        put_with_retry(self.kv.as_ref(), "reaper/cycle", self.cycle().to_string().into_bytes())?;
        Ok(())
    }

    /// Register a newly-seen entity, or return the existing one untouched.
    pub fn register_entity(&self, entity_id: &str, kind: EntityKind, path: Option<String>) -> Result<CodeEntity> {
        let mut entities = self.entities.write();
        if let Some(existing) = entities.get(entity_id) {
            return Ok(existing.clone());
        }
        let mut entity = CodeEntity::new(entity_id, kind, self.cycle());
        if let Some(path) = path {
            entity = entity.with_path(path);
        }
        entities.insert(entity_id.to_string(), entity.clone());
        drop(entities);
        self.persist_entity(&entity)?;
        Ok(entity)
    }

    pub fn entity(&self, entity_id: &str) -> Option<CodeEntity> {
        self.entities.read().get(entity_id).cloned()
    }

    /// Mark `dependency_id` as depended-on-by `entity_id`'s existence; used
    /// by tests and callers that know a dependency graph.
    pub fn add_dependent(&self, entity_id: &str, dependent_id: &str) -> Result<()> {
        let mut entities = self.entities.write();
        if let Some(entity) = entities.get_mut(entity_id) {
            entity.dependents.insert(dependent_id.to_string());
            let snapshot = entity.clone();
            drop(entities);
            self.persist_entity(&snapshot)?;
        }
        Ok(())
    }

    /// Record a fresh access, creating the entity (as a bare `Module`) if it
    /// does not exist yet (`spec.md` §3 lifecycle: "created on first
    /// access").
    #[tracing::instrument(skip(self))]
    pub fn record_access(&self, entity_id: &str) -> Result<CodeEntity> {
        let current_cycle = self.cycle();
        let mut entities = self.entities.write();
        let entity = entities
            .entry(entity_id.to_string())
            .or_insert_with(|| CodeEntity::new(entity_id, EntityKind::Module, current_cycle));
        entity.record_access(current_cycle);
        let snapshot = entity.clone();
        drop(entities);
        self.persist_entity(&snapshot)?;
        Ok(snapshot)
    }

    /// Advance the monotonic cycle counter. Persists every 100 ticks and
    /// logs a milestone every 1000 (`spec.md` §4.7).
    pub fn advance_cycle(&self) -> Result<u64> {
        let next = self.cycle.fetch_add(1, Ordering::SeqCst) + 1;
        if next % 100 == 0 {
            self.persist_cycle()?;
        }
        if next % 1000 == 0 {
            tracing::info!(cycle = next, "reaper:milestone");
        }
        Ok(next)
    }

    /// Scan the registry and archive (or, in dry-run mode, only mark)
    /// entities that have gone stale or orphaned.
    #[tracing::instrument(skip(self))]
    pub fn reap(&self) -> ReapReport {
        let current_cycle = self.cycle();
        let snapshot: Vec<CodeEntity> = self.entities.read().values().cloned().collect();
        let mut report = ReapReport {
            scanned: snapshot.len() as u64,
            ..Default::default()
        };

        for entity in &snapshot {
            if entity.has_dependents() || self.protected.is_protected(entity.path.as_deref()) {
                report.preserved += 1;
                continue;
            }

            let age = current_cycle.saturating_sub(entity.last_vitality_cycle);
            let reason = if age >= self.stale_threshold {
                Some(ReapReason::Stale)
            } else if age > self.stale_threshold / 2 {
                Some(ReapReason::Orphan)
            } else {
                None
            };

            let Some(reason) = reason else {
                report.preserved += 1;
                continue;
            };

            report.marked += 1;
            report.death_list.push((entity.entity_id.clone(), reason));

            if self.is_dry_run() {
                continue;
            }

            match self.archive_entity(entity, reason, age, current_cycle) {
                Ok(bytes) => {
                    report.archived += 1;
                    report.bytes_saved += bytes;
                }
                Err(err) => {
                    // Best-effort: a single entity's archival failure must
                    // never abort the scan (`spec.md` §4.7).
                    tracing::warn!(entity_id = %entity.entity_id, error = %err, "reaper:archive_failed");
                }
            }
        }

        report
    }

    fn archive_entity(&self, entity: &CodeEntity, reason: ReapReason, age: u64, current_cycle: u64) -> Result<u64> {
        let revival_key = hex::encode(self.random.bytes(16));
        let manifest = ManifestEntry {
            entity_id: entity.entity_id.clone(),
            original_path: entity.path.clone(),
            reason,
            age_cycles: age,
            entity_snapshot: entity.clone(),
            revival_key: revival_key.clone(),
            archived_at_cycle: current_cycle,
            bytes: entity.bytes,
        };
        // Entities without a physical path carry no byte payload to move;
        // the manifest alone preserves enough to resurrect the bookkeeping.
        let record = ArchiveRecord {
            manifest: manifest.clone(),
            payload: Vec::new(),
        };
        put_with_retry(self.kv.as_ref(), &archive_key(&revival_key), serde_json::to_vec(&record)?)?;
        self.archive.write().insert(revival_key, record);
        self.entities.write().remove(&entity.entity_id);
        self.kv.delete(&entity_key(&entity.entity_id)).map_err(crate::error::ReaperError::Persistence)?;
        Ok(entity.bytes)
    }

    /// Restore an archived entity to the live registry, byte-for-byte
    /// (`spec.md` §8 "Reaper roundtrip").
    pub fn resurrect(&self, revival_key: &str) -> Result<Option<CodeEntity>> {
        let record = self.archive.write().remove(revival_key);
        let Some(record) = record else { return Ok(None) };

        let current_cycle = self.cycle();
        let mut restored = record.manifest.entity_snapshot;
        restored.last_vitality_cycle = current_cycle;

        self.entities.write().insert(restored.entity_id.clone(), restored.clone());
        self.persist_entity(&restored)?;
        self.kv.delete(&archive_key(revival_key)).map_err(crate::error::ReaperError::Persistence)?;
        Ok(Some(restored))
    }

    /// Evict the oldest archive entries until total archived bytes drop
    /// below `max_archive_bytes`.
    pub fn clean_archive(&self) -> Result<u64> {
        let mut archive = self.archive.write();
        let mut total: u64 = archive.values().map(|r| r.manifest.bytes).sum();
        if total <= self.max_archive_bytes {
            return Ok(0);
        }

        let mut by_age: Vec<(String, u64, u64)> = archive
            .iter()
            .map(|(k, r)| (k.clone(), r.manifest.archived_at_cycle, r.manifest.bytes))
            .collect();
        by_age.sort_by_key(|(_, archived_at, _)| *archived_at);

        let mut evicted = 0u64;
        for (key, _, bytes) in by_age {
            if total <= self.max_archive_bytes {
                break;
            }
            archive.remove(&key);
            drop_archive_key(&self.kv, &key);
            total = total.saturating_sub(bytes);
            evicted += bytes;
        }
        Ok(evicted)
    }
}

fn drop_archive_key(kv: &Arc<dyn KvStore>, revival_key: &str) {
    if let Err(err) = kv.delete(&archive_key(revival_key)) {
        tracing::warn!(revival_key, %err, "reaper:archive_eviction_failed");
    }
}

impl VitalityRegistrar for Reaper {
    /// Verify the vitality token via C3 and, on success, behave as
    /// `record_access`; on failure emit `vitality:rejected` and leave the
    /// registry untouched (`spec.md` §4.7).
    fn register_vitality(&self, module_id: &str, token: &str) -> bool {
        let result = self.tokens.verify(token, module_id);
        if !result.ok {
            tracing::warn!(module_id, reason = ?result.reason, "vitality:rejected");
            return false;
        }
        matches!(self.record_access(module_id), Ok(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aec_core::{FixedClock, MemKvStore, OsRandom};
    use aec_token::TokenStatus;

    fn reaper() -> Reaper {
        let clock: Arc<dyn aec_core::Clock> = Arc::new(FixedClock::new(0));
        let kv: Arc<dyn KvStore> = Arc::new(MemKvStore::new());
        let tokens = Arc::new(TokenService::new(b"reaper-secret".to_vec(), clock).unwrap());
        let random: Arc<dyn SecureRandom> = Arc::new(OsRandom);
        Reaper::new(kv, tokens, random, ProtectedPaths::empty())
    }

    #[test]
    fn record_access_creates_then_updates_entity() {
        let r = reaper();
        let first = r.record_access("moduleA").unwrap();
        assert_eq!(first.access_count, 1);
        for _ in 0..9 {
            r.advance_cycle().unwrap();
        }
        let second = r.record_access("moduleA").unwrap();
        assert_eq!(second.access_count, 2);
        assert_eq!(second.last_vitality_cycle, 9);
    }

    #[test]
    fn register_vitality_accepts_valid_token() {
        let r = reaper();
        let token = r.tokens.issue("moduleA", TokenStatus::Healthy);
        assert!(r.register_vitality("moduleA", &token));
        assert!(r.entity("moduleA").is_some());
    }

    #[test]
    fn register_vitality_rejects_forged_token() {
        let r = reaper();
        let valid = r.tokens.issue("moduleB", TokenStatus::Healthy);
        // A token minted for a different module must not register moduleA.
        assert!(!r.register_vitality("moduleA", &valid));
        assert!(r.entity("moduleA").is_none());
    }

    #[test]
    fn reap_marks_and_archives_stale_entity_in_live_mode() {
        let r = reaper().with_stale_threshold(100);
        r.register_entity("moduleA", EntityKind::Module, None).unwrap();
        for _ in 0..100 {
            r.advance_cycle().unwrap();
        }
        r.set_live_mode(true);
        let report = r.reap();
        assert_eq!(report.archived, 1);
        assert!(report.death_list.iter().any(|(id, reason)| id == "moduleA" && *reason == ReapReason::Stale));
        assert!(r.entity("moduleA").is_none());
    }

    #[test]
    fn reap_in_dry_run_marks_but_does_not_archive() {
        let r = reaper().with_stale_threshold(100);
        r.register_entity("moduleA", EntityKind::Module, None).unwrap();
        for _ in 0..100 {
            r.advance_cycle().unwrap();
        }
        let report = r.reap();
        assert_eq!(report.marked, 1);
        assert_eq!(report.archived, 0);
        assert!(r.entity("moduleA").is_some());
    }

    #[test]
    fn reap_preserves_entity_with_dependents() {
        let r = reaper().with_stale_threshold(10);
        r.register_entity("libcore", EntityKind::Module, None).unwrap();
        r.add_dependent("libcore", "moduleA").unwrap();
        for _ in 0..10 {
            r.advance_cycle().unwrap();
        }
        r.set_live_mode(true);
        let report = r.reap();
        assert_eq!(report.preserved, 1);
        assert_eq!(report.archived, 0);
        assert!(r.entity("libcore").is_some());
    }

    #[test]
    fn reap_preserves_protected_path() {
        let protected = ProtectedPaths::new(vec![], vec![r"^schema/.*".into()]).unwrap();
        let clock: Arc<dyn aec_core::Clock> = Arc::new(FixedClock::new(0));
        let kv: Arc<dyn KvStore> = Arc::new(MemKvStore::new());
        let tokens = Arc::new(TokenService::new(b"reaper-secret".to_vec(), clock).unwrap());
        let random: Arc<dyn SecureRandom> = Arc::new(OsRandom);
        let r = Reaper::new(kv, tokens, random, protected).with_stale_threshold(5);
        r.register_entity("schema_v1", EntityKind::File, Some("schema/v1.sql".into())).unwrap();
        for _ in 0..5 {
            r.advance_cycle().unwrap();
        }
        r.set_live_mode(true);
        let report = r.reap();
        assert_eq!(report.preserved, 1);
        assert!(r.entity("schema_v1").is_some());
    }

    #[test]
    fn resurrect_restores_entity_after_archival() {
        let r = reaper().with_stale_threshold(10);
        r.register_entity("moduleA", EntityKind::Module, None).unwrap();
        for _ in 0..10 {
            r.advance_cycle().unwrap();
        }
        r.set_live_mode(true);
        let report = r.reap();
        assert_eq!(report.death_list.len(), 1);
        let revival_key = r.archive.read().keys().next().cloned().unwrap();

        let restored = r.resurrect(&revival_key).unwrap().unwrap();
        assert_eq!(restored.entity_id, "moduleA");
        assert_eq!(restored.last_vitality_cycle, r.cycle());
        assert!(r.entity("moduleA").is_some());
    }

    #[test]
    fn resurrect_of_unknown_key_returns_none() {
        let r = reaper();
        assert!(r.resurrect("no-such-key").unwrap().is_none());
    }

    #[test]
    fn clean_archive_evicts_oldest_first() {
        let r = reaper().with_stale_threshold(1).with_max_archive_bytes(10);
        for name in ["a", "b", "c"] {
            let mut entities = r.entities.write();
            entities.insert(
                name.to_string(),
                CodeEntity::new(name, EntityKind::Module, 0),
            );
            if let Some(e) = entities.get_mut(name) {
                e.bytes = 8;
            }
            drop(entities);
        }
        for _ in 0..2 {
            r.advance_cycle().unwrap();
        }
        r.set_live_mode(true);
        r.reap();
        let evicted = r.clean_archive().unwrap();
        assert!(evicted > 0);
        let remaining: u64 = r.archive.read().values().map(|rec| rec.manifest.bytes).sum();
        assert!(remaining <= 10);
    }
}
