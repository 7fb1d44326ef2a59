//! Resolver error types.
//!
//! Every failure carries a stable `SCREAMING_SNAKE_CASE` code so that hosts
//! can match on failures without parsing messages.

use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Stable error codes for resolution failures.
pub mod codes {
    pub const INVALID_PARENT_URL: &str = "INVALID_PARENT_URL";
    pub const INVALID_MODULE_SPECIFIER: &str = "INVALID_MODULE_SPECIFIER";
    pub const INVALID_PACKAGE_CONFIG: &str = "INVALID_PACKAGE_CONFIG";
    pub const INVALID_PACKAGE_TARGET: &str = "INVALID_PACKAGE_TARGET";
    pub const PACKAGE_PATH_NOT_EXPORTED: &str = "PACKAGE_PATH_NOT_EXPORTED";
    pub const PACKAGE_IMPORT_NOT_DEFINED: &str = "PACKAGE_IMPORT_NOT_DEFINED";
    pub const MODULE_NOT_FOUND: &str = "MODULE_NOT_FOUND";
    pub const UNSUPPORTED_DIR_IMPORT: &str = "UNSUPPORTED_DIR_IMPORT";
    pub const UNSUPPORTED_URL_SCHEME: &str = "UNSUPPORTED_URL_SCHEME";
    pub const NETWORK_IMPORT_DISALLOWED: &str = "NETWORK_IMPORT_DISALLOWED";
    pub const INPUT_TYPE_NOT_ALLOWED: &str = "INPUT_TYPE_NOT_ALLOWED";
    pub const MANIFEST_DEPENDENCY_MISSING: &str = "MANIFEST_DEPENDENCY_MISSING";
}

/// Render a URL the way it is quoted in error messages: file URLs as plain
/// paths, everything else as the full URL.
pub(crate) fn url_display(url: &Url) -> String {
    if url.scheme() == "file" {
        if let Ok(path) = url.to_file_path() {
            return path.display().to_string();
        }
    }
    url.to_string()
}

fn imported_from(base: &Option<String>) -> String {
    base.as_ref()
        .map(|b| format!(" imported from {b}"))
        .unwrap_or_default()
}

fn suggestion_note(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" Did you mean to import {s}?"))
        .unwrap_or_default()
}

fn field_name(internal: &bool) -> &'static str {
    if *internal {
        "imports"
    } else {
        "exports"
    }
}

fn in_package(pjson_path: &Option<PathBuf>) -> String {
    pjson_path
        .as_ref()
        .map(|p| format!(" in package {}", p.display()))
        .unwrap_or_default()
}

/// Resolution failure.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Invalid parent URL {parent:?}")]
    InvalidParentUrl { parent: String },

    #[error("Invalid module specifier {specifier:?}: {reason}{}", imported_from(.base))]
    InvalidModuleSpecifier {
        specifier: String,
        reason: String,
        base: Option<String>,
    },

    #[error("Invalid package configuration {}: {detail}{}", .pjson_path.display(), imported_from(.base))]
    InvalidPackageConfig {
        pjson_path: PathBuf,
        base: Option<String>,
        detail: String,
    },

    #[error(
        "Invalid \"{}\" target {target} defined for {key:?} in the package config of {}{}",
        field_name(.internal), .pkg_path.display(), imported_from(.base)
    )]
    InvalidPackageTarget {
        pkg_path: PathBuf,
        key: String,
        target: String,
        internal: bool,
        base: Option<String>,
    },

    #[error(
        "Package subpath {subpath:?} is not defined by \"exports\" in {}{}",
        .pjson_path.display(), imported_from(.base)
    )]
    PackageSubpathNotExported {
        pjson_path: PathBuf,
        subpath: String,
        base: Option<String>,
    },

    #[error(
        "Package import specifier {name:?} is not defined{}{}",
        in_package(.pjson_path), imported_from(.base)
    )]
    PackageImportNotDefined {
        name: String,
        pjson_path: Option<PathBuf>,
        base: Option<String>,
    },

    #[error("Cannot find module '{path}'{}{}", imported_from(.base), suggestion_note(.suggestion))]
    ModuleNotFound {
        path: String,
        base: Option<String>,
        suggestion: Option<String>,
    },

    #[error(
        "Directory import '{path}' is not supported when resolving ES modules{}{}",
        imported_from(.base), suggestion_note(.suggestion)
    )]
    UnsupportedDirectoryImport {
        path: String,
        base: Option<String>,
        suggestion: Option<String>,
    },

    #[error("Only file, data, and node URLs are supported by the default loader: {url}")]
    UnsupportedUrlScheme { url: String },

    #[error("Import of {specifier:?} by {parent} is not supported: {reason}")]
    NetworkImportDisallowed {
        specifier: String,
        parent: String,
        reason: &'static str,
    },

    #[error(
        "Input type is fixed for in-memory input, but the entry point {specifier:?} resolves to a file"
    )]
    InputTypeNotAllowed { specifier: String },

    #[error("Dependency {specifier:?} of {parent} is not allowed by the policy manifest")]
    ManifestDependencyMissing { parent: String, specifier: String },
}

impl ResolveError {
    /// Stable code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParentUrl { .. } => codes::INVALID_PARENT_URL,
            Self::InvalidModuleSpecifier { .. } => codes::INVALID_MODULE_SPECIFIER,
            Self::InvalidPackageConfig { .. } => codes::INVALID_PACKAGE_CONFIG,
            Self::InvalidPackageTarget { .. } => codes::INVALID_PACKAGE_TARGET,
            Self::PackageSubpathNotExported { .. } => codes::PACKAGE_PATH_NOT_EXPORTED,
            Self::PackageImportNotDefined { .. } => codes::PACKAGE_IMPORT_NOT_DEFINED,
            Self::ModuleNotFound { .. } => codes::MODULE_NOT_FOUND,
            Self::UnsupportedDirectoryImport { .. } => codes::UNSUPPORTED_DIR_IMPORT,
            Self::UnsupportedUrlScheme { .. } => codes::UNSUPPORTED_URL_SCHEME,
            Self::NetworkImportDisallowed { .. } => codes::NETWORK_IMPORT_DISALLOWED,
            Self::InputTypeNotAllowed { .. } => codes::INPUT_TYPE_NOT_ALLOWED,
            Self::ManifestDependencyMissing { .. } => codes::MANIFEST_DEPENDENCY_MISSING,
        }
    }

    /// Create an invalid-specifier error.
    pub fn invalid_specifier(
        specifier: impl Into<String>,
        reason: impl Into<String>,
        base: Option<&Url>,
    ) -> Self {
        Self::InvalidModuleSpecifier {
            specifier: specifier.into(),
            reason: reason.into(),
            base: base.map(url_display),
        }
    }

    /// Create an invalid-package-config error.
    pub fn invalid_package_config(
        pjson_path: &Path,
        base: Option<&Url>,
        detail: impl Into<String>,
    ) -> Self {
        Self::InvalidPackageConfig {
            pjson_path: pjson_path.to_path_buf(),
            base: base.map(url_display),
            detail: detail.into(),
        }
    }

    /// Create a not-exported error for a package subpath.
    #[must_use]
    pub fn not_exported(pjson_path: PathBuf, subpath: &str, base: &Url) -> Self {
        Self::PackageSubpathNotExported {
            pjson_path,
            subpath: subpath.to_string(),
            base: Some(url_display(base)),
        }
    }

    /// Create a not-defined error for an `imports` specifier.
    #[must_use]
    pub fn import_not_defined(name: &str, pjson_path: Option<PathBuf>, base: &Url) -> Self {
        Self::PackageImportNotDefined {
            name: name.to_string(),
            pjson_path,
            base: Some(url_display(base)),
        }
    }

    /// Create a module-not-found error.
    pub fn module_not_found(path: impl Into<String>, base: Option<&Url>) -> Self {
        Self::ModuleNotFound {
            path: path.into(),
            base: base.map(url_display),
            suggestion: None,
        }
    }

    /// Create a directory-import error.
    pub fn unsupported_dir_import(path: impl Into<String>, base: &Url) -> Self {
        Self::UnsupportedDirectoryImport {
            path: path.into(),
            base: Some(url_display(base)),
            suggestion: None,
        }
    }

    /// Attach a "did you mean" suggestion to a not-found style error.
    /// Other variants pass through unchanged.
    #[must_use]
    pub fn with_suggestion(self, hint: impl Into<String>) -> Self {
        match self {
            Self::ModuleNotFound {
                path,
                base,
                suggestion: _,
            } => Self::ModuleNotFound {
                path,
                base,
                suggestion: Some(hint.into()),
            },
            Self::UnsupportedDirectoryImport {
                path,
                base,
                suggestion: _,
            } => Self::UnsupportedDirectoryImport {
                path,
                base,
                suggestion: Some(hint.into()),
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_uppercase() {
        let all_codes = [
            codes::INVALID_PARENT_URL,
            codes::INVALID_MODULE_SPECIFIER,
            codes::INVALID_PACKAGE_CONFIG,
            codes::INVALID_PACKAGE_TARGET,
            codes::PACKAGE_PATH_NOT_EXPORTED,
            codes::PACKAGE_IMPORT_NOT_DEFINED,
            codes::MODULE_NOT_FOUND,
            codes::UNSUPPORTED_DIR_IMPORT,
            codes::UNSUPPORTED_URL_SCHEME,
            codes::NETWORK_IMPORT_DISALLOWED,
            codes::INPUT_TYPE_NOT_ALLOWED,
            codes::MANIFEST_DEPENDENCY_MISSING,
        ];

        for code in all_codes {
            assert!(
                code.chars().all(|c| c.is_uppercase() || c == '_'),
                "Error code '{code}' should be SCREAMING_SNAKE_CASE"
            );
        }
    }

    #[test]
    fn test_message_contains_base() {
        let base = Url::parse("file:///app/index.js").unwrap();
        let err = ResolveError::module_not_found("/app/missing.js", Some(&base));
        assert_eq!(err.code(), codes::MODULE_NOT_FOUND);
        assert!(err.to_string().contains("imported from /app/index.js"));
    }

    #[test]
    fn test_with_suggestion_decorates_not_found() {
        let err = ResolveError::module_not_found("/app/missing", None)
            .with_suggestion("file:///app/missing.js");
        assert!(err
            .to_string()
            .contains("Did you mean to import file:///app/missing.js?"));
    }

    #[test]
    fn test_with_suggestion_ignores_other_kinds() {
        let err = ResolveError::invalid_specifier("", "is empty", None).with_suggestion("x");
        assert_eq!(err.code(), codes::INVALID_MODULE_SPECIFIER);
        assert!(!err.to_string().contains("Did you mean"));
    }

    #[test]
    fn test_file_url_displayed_as_path() {
        let url = Url::parse("file:///srv/app/main.mjs").unwrap();
        assert_eq!(url_display(&url), "/srv/app/main.mjs");

        let remote = Url::parse("https://example.com/mod.js").unwrap();
        assert_eq!(url_display(&remote), "https://example.com/mod.js");
    }
}
