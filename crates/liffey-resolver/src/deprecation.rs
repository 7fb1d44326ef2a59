//! Deprecation warnings with per-process deduplication.

use rustc_hash::FxHashSet;
use std::fmt;
use std::sync::Mutex;

/// Deprecation codes emitted by the resolver.
pub mod codes {
    /// Legacy `main`/index fallback chose the entry point of an ES module
    /// package.
    pub const LEGACY_INDEX: &str = "DEP0151";
    /// `exports` pattern key matched a subpath with a trailing slash.
    pub const TRAILING_SLASH_PATTERN: &str = "DEP0155";
    /// `exports`/`imports` target or capture contained an empty path
    /// segment.
    pub const INVALID_SEGMENT: &str = "DEP0166";
}

/// Receives deprecation warnings raised during resolution.
pub trait DeprecationSink: Send + Sync + fmt::Debug {
    /// Report `message` under `code`. `dedup_key` identifies the site; the
    /// same `(code, dedup_key)` pair must be reported at most once per
    /// process.
    fn emit(&self, code: &'static str, dedup_key: &str, message: &str);
}

/// Sink forwarding deprecations to `tracing::warn!`, deduplicated for the
/// life of the process.
#[derive(Debug, Default)]
pub struct LoggingDeprecationSink {
    seen: Mutex<FxHashSet<(&'static str, String)>>,
}

impl DeprecationSink for LoggingDeprecationSink {
    fn emit(&self, code: &'static str, dedup_key: &str, message: &str) {
        let mut seen = self.seen.lock().expect("deprecation dedup lock");
        if seen.insert((code, dedup_key.to_string())) {
            tracing::warn!(code, "{message}");
        }
    }
}
