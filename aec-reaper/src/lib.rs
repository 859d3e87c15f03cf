//! Entropy Reaper (C7): periodic vitality scan that archives entities whose
//! tokens have gone stale, with a dry-run mode and a revivable archive,
//! per `spec.md` §4.7.

pub mod error;
pub mod protection;
pub mod reaper;
pub mod types;

pub use error::{ReaperError, Result};
pub use protection::ProtectedPaths;
pub use reaper::{Reaper, DEFAULT_MAX_ARCHIVE_BYTES, DEFAULT_STALE_THRESHOLD};
pub use types::{ManifestEntry, ReapReason, ReapReport};
