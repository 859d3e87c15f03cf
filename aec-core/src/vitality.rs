//! Cross-component hand-off between C6 and C7: the workflow mints a token
//! via the Token Service and hands it to the reaper as a "register
//! vitality" call, without either crate depending on the other's internals.

/// Implemented by the entropy reaper (`spec.md` §4.7 `register_vitality`).
pub trait VitalityRegistrar: Send + Sync {
    fn register_vitality(&self, module_id: &str, token: &str) -> bool;
}
