//! Top-level resolution driver.
//!
//! [`Resolver::resolve`] wires the pieces together: URL pass-through for
//! schemes the loader does not own, the network-import gate, `imports` and
//! bare-package dispatch, and the final filesystem realization (directory
//! rejection, symlink canonicalization).

use crate::builtins::{BuiltinRegistry, NodeBuiltins};
use crate::deprecation::{DeprecationSink, LoggingDeprecationSink};
use crate::error::ResolveError;
use crate::fs::{FileKind, FsProbe, RealFs};
use crate::hooks::{CjsFallbackHint, FormatProbe, PolicyManifest, PolicyMapping};
use crate::pkg_json::{PackageJsonReader, PackageType};
use crate::specifier::{classify, is_relative_or_absolute, SpecifierKind};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use url::Url;

/// Environment variable that opts missing-dependency reports into the
/// watcher protocol.
pub const WATCH_REPORT_DEPENDENCIES_ENV: &str = "WATCH_REPORT_DEPENDENCIES";

/// Resolver configuration.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Default conditions for `exports`/`imports` maps. `default` always
    /// applies and is not listed.
    pub conditions: Vec<String>,
    /// Skip symlink canonicalization for non-main resolutions.
    pub preserve_symlinks: bool,
    /// Skip symlink canonicalization for the main entry point.
    pub preserve_symlinks_main: bool,
    /// Allow `http(s):` module URLs.
    pub experimental_network_imports: bool,
    /// When set, the program entry is in-memory input and may not resolve
    /// to a file.
    pub input_type: Option<String>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            conditions: vec!["node".to_string(), "import".to_string()],
            preserve_symlinks: false,
            preserve_symlinks_main: false,
            experimental_network_imports: false,
            input_type: None,
        }
    }
}

/// An unordered set of export/import conditions.
///
/// `default` is handled by the map scan itself and need not be present.
#[derive(Debug, Clone, Default)]
pub struct ConditionSet {
    conditions: Vec<String>,
}

impl ConditionSet {
    #[must_use]
    pub fn contains(&self, condition: &str) -> bool {
        self.conditions.iter().any(|c| c == condition)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.conditions
    }
}

impl<S: Into<String>> FromIterator<S> for ConditionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            conditions: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Per-call resolution context.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveContext<'a> {
    /// URL of the importing module; `None` designates the main entry,
    /// resolved against the process working directory.
    pub parent_url: Option<&'a str>,
    /// Conditions overriding the resolver-wide default for this call.
    pub conditions: Option<&'a [String]>,
}

/// A successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub url: Url,
    pub format: Option<String>,
}

/// The module resolver. Cheap to share behind an `Arc`; all caches are
/// internally synchronized.
#[derive(Debug)]
pub struct Resolver {
    pub(crate) options: ResolverOptions,
    pub(crate) fs: Arc<dyn FsProbe>,
    pub(crate) pkg_json: PackageJsonReader,
    pub(crate) builtins: Arc<dyn BuiltinRegistry>,
    pub(crate) deprecations: Arc<dyn DeprecationSink>,
    pub(crate) format_probe: Option<Arc<dyn FormatProbe>>,
    pub(crate) policy: Option<Arc<dyn PolicyManifest>>,
    pub(crate) cjs_hint: Option<Arc<dyn CjsFallbackHint>>,
    realpath_cache: Mutex<FxHashMap<PathBuf, PathBuf>>,
}

impl Resolver {
    #[must_use]
    pub fn new(options: ResolverOptions) -> Self {
        Self {
            options,
            fs: Arc::new(RealFs),
            pkg_json: PackageJsonReader::default(),
            builtins: Arc::new(NodeBuiltins),
            deprecations: Arc::new(LoggingDeprecationSink::default()),
            format_probe: None,
            policy: None,
            cjs_hint: None,
            realpath_cache: Mutex::new(FxHashMap::default()),
        }
    }

    #[must_use]
    pub fn with_fs(mut self, fs: Arc<dyn FsProbe>) -> Self {
        self.fs = fs;
        self
    }

    #[must_use]
    pub fn with_builtins(mut self, builtins: Arc<dyn BuiltinRegistry>) -> Self {
        self.builtins = builtins;
        self
    }

    #[must_use]
    pub fn with_deprecation_sink(mut self, sink: Arc<dyn DeprecationSink>) -> Self {
        self.deprecations = sink;
        self
    }

    #[must_use]
    pub fn with_format_probe(mut self, probe: Arc<dyn FormatProbe>) -> Self {
        self.format_probe = Some(probe);
        self
    }

    #[must_use]
    pub fn with_policy_manifest(mut self, policy: Arc<dyn PolicyManifest>) -> Self {
        self.policy = Some(policy);
        self
    }

    #[must_use]
    pub fn with_cjs_fallback_hint(mut self, hint: Arc<dyn CjsFallbackHint>) -> Self {
        self.cjs_hint = Some(hint);
        self
    }

    #[must_use]
    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Resolve `specifier` to the URL of the module to load.
    pub fn resolve(
        &self,
        specifier: &str,
        ctx: &ResolveContext<'_>,
    ) -> Result<Resolved, ResolveError> {
        let parent = match ctx.parent_url {
            Some(raw) => Some(Url::parse(raw).map_err(|_| ResolveError::InvalidParentUrl {
                parent: raw.to_string(),
            })?),
            None => None,
        };
        let conditions: ConditionSet = match ctx.conditions {
            Some(overridden) => overridden.iter().cloned().collect(),
            None => self.options.conditions.iter().cloned().collect(),
        };

        if let (Some(policy), Some(parent)) = (&self.policy, &parent) {
            match policy.map_dependency(parent, specifier, conditions.as_slice()) {
                PolicyMapping::Redirect(url) => {
                    tracing::debug!(specifier, %url, "policy manifest redirected dependency");
                    return Ok(Resolved { url, format: None });
                }
                PolicyMapping::Missing => {
                    return Err(ResolveError::ManifestDependencyMissing {
                        parent: parent.to_string(),
                        specifier: specifier.to_string(),
                    });
                }
                PolicyMapping::Unrestricted | PolicyMapping::Allowed => {}
            }
        }

        let parsed = if is_relative_or_absolute(specifier) {
            parent.as_ref().and_then(|p| p.join(specifier).ok())
        } else {
            Url::parse(specifier).ok()
        };

        // The remote-parent gate runs before any pass-through: a remote
        // module must not reach local namespaces through them.
        if let Some(url) = self.network_import_gate(specifier, parsed.as_ref(), parent.as_ref())? {
            return Ok(Resolved {
                format: self.module_format(&url),
                url,
            });
        }

        // Schemes the loader passes through untouched.
        if let Some(url) = &parsed {
            let pass_through = url.scheme() == "data"
                || (self.options.experimental_network_imports
                    && matches!(url.scheme(), "http" | "https"));
            if pass_through {
                return Ok(Resolved {
                    format: self.module_format(url),
                    url: url.clone(),
                });
            }
        }

        if let Some(url) = &parsed {
            if url.scheme() == "node" {
                return Ok(Resolved {
                    format: self.module_format(url),
                    url: url.clone(),
                });
            }
            if !matches!(url.scheme(), "file" | "http" | "https")
                || (matches!(url.scheme(), "http" | "https")
                    && !self.options.experimental_network_imports)
            {
                return Err(ResolveError::UnsupportedUrlScheme {
                    url: url.to_string(),
                });
            }
        }

        let is_main = parent.is_none();
        let parent = match parent {
            Some(parent) => parent,
            None => {
                // Reaching this point means the entry resolves through the
                // filesystem, which in-memory input forbids.
                if self.options.input_type.is_some() {
                    return Err(ResolveError::InputTypeNotAllowed {
                        specifier: specifier.to_string(),
                    });
                }
                cwd_url()?
            }
        };

        let preserve_symlinks = if is_main {
            self.options.preserve_symlinks_main
        } else {
            self.options.preserve_symlinks
        };

        let url = self
            .module_resolve(specifier, &parent, &conditions, preserve_symlinks)
            .map_err(|e| self.decorate_not_found(e, specifier, &parent))?;
        tracing::debug!(specifier, %url, "resolved module");
        Ok(Resolved {
            format: self.module_format(&url),
            url,
        })
    }

    /// Dispatch one specifier against a known parent URL (C1 routing), then
    /// realize `file:` results on the filesystem.
    fn module_resolve(
        &self,
        specifier: &str,
        base: &Url,
        conditions: &ConditionSet,
        preserve_symlinks: bool,
    ) -> Result<Url, ResolveError> {
        let resolved = match classify(specifier, base.scheme()) {
            SpecifierKind::Invalid => {
                return Err(ResolveError::invalid_specifier(
                    specifier,
                    "is an empty specifier",
                    Some(base),
                ));
            }
            SpecifierKind::Relative | SpecifierKind::Absolute => {
                base.join(specifier).map_err(|_| {
                    ResolveError::invalid_specifier(
                        specifier,
                        "could not be resolved against its parent URL",
                        Some(base),
                    )
                })?
            }
            SpecifierKind::Private => {
                self.package_imports_resolve(specifier, base, conditions, 0)?
            }
            SpecifierKind::Url => Url::parse(specifier).map_err(|_| {
                ResolveError::invalid_specifier(specifier, "is not a valid URL", Some(base))
            })?,
            SpecifierKind::Bare => self.package_resolve(specifier, base, conditions, 0)?,
        };

        self.finalize_resolution(resolved, base, preserve_symlinks)
    }

    /// Reject or pass through imports originating from a remote parent.
    /// Returns the resolved URL when the gate itself settles the import.
    fn network_import_gate(
        &self,
        specifier: &str,
        parsed: Option<&Url>,
        parent: Option<&Url>,
    ) -> Result<Option<Url>, ResolveError> {
        let Some(parent) = parent else {
            return Ok(None);
        };
        if !matches!(parent.scheme(), "http" | "https") {
            return Ok(None);
        }

        let local = "remote modules cannot import from a local location";
        let bare = "only relative, absolute, and remote specifiers are supported from remote modules";
        let deny = |reason| {
            Err(ResolveError::NetworkImportDisallowed {
                specifier: specifier.to_string(),
                parent: parent.to_string(),
                reason,
            })
        };

        if is_relative_or_absolute(specifier) {
            return match parsed {
                Some(url) if matches!(url.scheme(), "http" | "https") => Ok(Some(url.clone())),
                _ => deny(local),
            };
        }
        if self.builtins.is_builtin(specifier) {
            return deny(local);
        }
        match parsed {
            Some(url) if matches!(url.scheme(), "http" | "https") => Ok(Some(url.clone())),
            Some(_) => deny(local),
            None => deny(bare),
        }
    }

    /// Realize a `file:` URL on the filesystem: reject directories, confirm
    /// the file exists, canonicalize symlinks. Non-`file:` URLs pass
    /// through unchanged.
    pub(crate) fn finalize_resolution(
        &self,
        resolved: Url,
        base: &Url,
        preserve_symlinks: bool,
    ) -> Result<Url, ResolveError> {
        if resolved.scheme() != "file" {
            return Ok(resolved);
        }

        if has_encoded_separator(resolved.path()) {
            return Err(ResolveError::invalid_specifier(
                resolved.path(),
                "must not include encoded \"/\" or \"\\\" characters",
                Some(base),
            ));
        }

        let path = resolved.to_file_path().map_err(|()| {
            ResolveError::invalid_specifier(
                resolved.as_str(),
                "could not be converted to a file path",
                Some(base),
            )
        })?;
        let display = path.display().to_string();
        let probe = display.strip_suffix('/').unwrap_or(&display);

        match self.fs.kind(Path::new(probe)) {
            FileKind::Directory => {
                Err(ResolveError::unsupported_dir_import(display.as_str(), base))
            }
            FileKind::Missing => {
                self.report_watch_miss(probe);
                Err(ResolveError::module_not_found(display.as_str(), Some(base)))
            }
            FileKind::File => {
                if preserve_symlinks {
                    Ok(resolved)
                } else {
                    Ok(self.canonicalize(resolved, Path::new(probe)))
                }
            }
        }
    }

    fn canonicalize(&self, resolved: Url, path: &Path) -> Url {
        let real = {
            let mut cache = self.realpath_cache.lock().expect("realpath cache lock");
            if let Some(hit) = cache.get(path) {
                hit.clone()
            } else {
                let real = self
                    .fs
                    .realpath(path)
                    .unwrap_or_else(|_| path.to_path_buf());
                cache.insert(path.to_path_buf(), real.clone());
                real
            }
        };
        let Ok(mut url) = Url::from_file_path(&real) else {
            return resolved;
        };
        url.set_query(resolved.query());
        url.set_fragment(resolved.fragment());
        url
    }

    fn report_watch_miss(&self, path: &str) {
        if std::env::var_os(WATCH_REPORT_DEPENDENCIES_ENV).is_some() {
            let payload = serde_json::json!({ "watch:require": [path] });
            tracing::info!(target: "liffey::watch", %payload, "missing dependency reported to watcher");
        }
    }

    /// Best-effort "did you mean" decoration via the CommonJS hint hook.
    fn decorate_not_found(
        &self,
        error: ResolveError,
        specifier: &str,
        parent: &Url,
    ) -> ResolveError {
        let Some(hint) = &self.cjs_hint else {
            return error;
        };
        if !matches!(
            error,
            ResolveError::ModuleNotFound { .. } | ResolveError::UnsupportedDirectoryImport { .. }
        ) {
            return error;
        }
        match hint.find_match(specifier, parent) {
            Some(suggestion) => error.with_suggestion(suggestion),
            None => error,
        }
    }

    /// Module format of a resolved URL. A host-installed probe wins;
    /// otherwise extension and package `type` decide.
    pub(crate) fn module_format(&self, url: &Url) -> Option<String> {
        if let Some(probe) = &self.format_probe {
            return probe.format(url);
        }
        match url.scheme() {
            "node" => return Some("builtin".to_string()),
            "data" => {
                // data:<mime>[;base64],<payload>
                let mime = url.path().split([';', ',']).next().unwrap_or("");
                return match mime {
                    "text/javascript" => Some("module".to_string()),
                    "application/json" => Some("json".to_string()),
                    _ => None,
                };
            }
            "file" => {}
            _ => return None,
        }

        let path = url.path();
        let extension = Path::new(path).extension().and_then(|e| e.to_str());
        match extension {
            Some("mjs") => Some("module".to_string()),
            Some("cjs") => Some("commonjs".to_string()),
            Some("json") => Some("json".to_string()),
            Some("js") => {
                let scope = self.pkg_json.scope_config(url).ok()?;
                match scope.package_type {
                    PackageType::Module => Some("module".to_string()),
                    PackageType::CommonJs | PackageType::None => Some("commonjs".to_string()),
                }
            }
            _ => None,
        }
    }
}

fn has_encoded_separator(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.contains("%2f") || lower.contains("%5c")
}

fn cwd_url() -> Result<Url, ResolveError> {
    let cwd = std::env::current_dir().map_err(|_| ResolveError::InvalidParentUrl {
        parent: "<process working directory>".to_string(),
    })?;
    Url::from_directory_path(&cwd).map_err(|()| ResolveError::InvalidParentUrl {
        parent: cwd.display().to_string(),
    })
}
