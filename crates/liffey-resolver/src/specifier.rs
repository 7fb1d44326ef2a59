//! Specifier classification and bare-specifier parsing.

use crate::error::ResolveError;
use url::Url;

/// How a specifier string should be routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    /// Empty string.
    Invalid,
    /// Starts with `/`.
    Absolute,
    /// `.`, `./…`, `..` or `../…`.
    Relative,
    /// `#`-prefixed, resolved through the enclosing package's `imports`.
    Private,
    /// Parses as an absolute URL.
    Url,
    /// A package name with an optional subpath, e.g. `lodash/fp`.
    Bare,
}

/// Classify a specifier given the scheme of the importing module's URL.
///
/// `#`-prefixed specifiers are only private imports when the parent lives
/// in the file namespace; from a remote parent they fall through to URL and
/// bare classification.
#[must_use]
pub fn classify(specifier: &str, parent_scheme: &str) -> SpecifierKind {
    if specifier.is_empty() {
        return SpecifierKind::Invalid;
    }
    if specifier.starts_with('/') {
        return SpecifierKind::Absolute;
    }
    if is_relative(specifier) {
        return SpecifierKind::Relative;
    }
    if specifier.starts_with('#') && parent_scheme == "file" {
        return SpecifierKind::Private;
    }
    if Url::parse(specifier).is_ok() {
        return SpecifierKind::Url;
    }
    SpecifierKind::Bare
}

fn is_relative(specifier: &str) -> bool {
    let bytes = specifier.as_bytes();
    if bytes[0] != b'.' {
        return false;
    }
    bytes.len() == 1
        || bytes[1] == b'/'
        || (bytes[1] == b'.' && (bytes.len() == 2 || bytes[2] == b'/'))
}

/// Whether the specifier names a filesystem location relative to its parent
/// (`/…`, `.`, `./…`, `..`, `../…`).
#[must_use]
pub fn is_relative_or_absolute(specifier: &str) -> bool {
    !specifier.is_empty() && (specifier.starts_with('/') || is_relative(specifier))
}

/// A bare specifier split into its package name and subpath.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageName {
    /// Package name, including the scope for `@scope/name` packages.
    pub name: String,
    /// Subpath normalized to start with `.` (`.` or `./feature`).
    pub subpath: String,
    /// Whether the name is `@scope/…`-scoped.
    pub scoped: bool,
}

/// Split a bare specifier into `(name, subpath)`.
///
/// Names may not be empty, start with `.`, or contain `%` or `\`; scoped
/// names must have a `/` after the scope.
pub fn parse_package_name(specifier: &str, base: &Url) -> Result<PackageName, ResolveError> {
    let mut separator = specifier.find('/');
    let mut valid = !specifier.is_empty();
    let mut scoped = false;

    if specifier.starts_with('@') {
        scoped = true;
        match separator {
            // The name of a scoped package spans through the second slash.
            Some(first) => {
                separator = specifier[first + 1..].find('/').map(|i| first + 1 + i);
            }
            None => valid = false,
        }
    }

    let name = separator.map_or(specifier, |i| &specifier[..i]);
    if name.starts_with('.') || name.contains('%') || name.contains('\\') {
        valid = false;
    }
    if !valid {
        return Err(ResolveError::invalid_specifier(
            specifier,
            "is not a valid package name",
            Some(base),
        ));
    }

    let subpath = separator.map_or_else(|| ".".to_string(), |i| format!(".{}", &specifier[i..]));
    Ok(PackageName {
        name: name.to_string(),
        subpath,
        scoped,
    })
}
