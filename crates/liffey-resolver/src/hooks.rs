//! Host integration points consulted during resolution.
//!
//! All three hooks are optional; the resolver works stand-alone. They exist
//! so the runtime can plug in its format detection, its policy manifest
//! enforcement, and its CommonJS resolver for "did you mean" hints.

use std::fmt;
use url::Url;

/// Decides the module format of a resolved URL (`module`, `commonjs`,
/// `json`, `builtin`, …).
///
/// When installed, this overrides the resolver's built-in extension and
/// package-`type` probe, including the gate that restricts the legacy-main
/// deprecation to ES modules.
pub trait FormatProbe: Send + Sync + fmt::Debug {
    fn format(&self, url: &Url) -> Option<String>;
}

/// Outcome of consulting the policy manifest for one dependency edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyMapping {
    /// No mapper governs this parent; resolution proceeds normally.
    Unrestricted,
    /// The edge is allowed as requested.
    Allowed,
    /// The edge is redirected to a fixed URL, bypassing resolution.
    Redirect(Url),
    /// The edge is not listed; resolution must fail.
    Missing,
}

/// Dependency mapper of an installed policy manifest.
pub trait PolicyManifest: Send + Sync + fmt::Debug {
    fn map_dependency(&self, parent: &Url, specifier: &str, conditions: &[String])
        -> PolicyMapping;
}

/// Best-effort CommonJS-style lookup used to decorate not-found errors with
/// a "did you mean" suggestion. Failures are ignored.
pub trait CjsFallbackHint: Send + Sync + fmt::Debug {
    fn find_match(&self, specifier: &str, parent: &Url) -> Option<String>;
}
