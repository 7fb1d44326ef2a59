//! `package.json` reading, field extraction, and the package-scope walk.
//!
//! Parsed configs are memoized per path for the process lifetime; missing
//! files are cached too, which keeps repeated scope walks cheap.
//!
//! Reader contract: the JSON parser preserves key order (`serde_json` with
//! `preserve_order`). Conditional selection in the exports engine depends
//! on it: the first applicable condition in source order wins.

use crate::error::ResolveError;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use url::Url;

/// The `"type"` field of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackageType {
    Module,
    CommonJs,
    /// Absent or unrecognized.
    #[default]
    None,
}

/// The fields of one `package.json` the resolver consumes.
#[derive(Debug, Clone, Default)]
pub struct PackageConfig {
    /// Did the file exist and parse?
    pub exists: bool,
    /// Absolute path of the `package.json` that produced this config.
    pub pjson_path: PathBuf,
    pub name: Option<String>,
    pub main: Option<String>,
    pub package_type: PackageType,
    pub exports: Option<Value>,
    pub imports: Option<Value>,
}

impl PackageConfig {
    fn missing(pjson_path: PathBuf) -> Self {
        Self {
            pjson_path,
            ..Self::default()
        }
    }

    /// The `exports` field when it is present and not `null`.
    #[must_use]
    pub fn exports_value(&self) -> Option<&Value> {
        self.exports.as_ref().filter(|v| !v.is_null())
    }

    /// URL of the `package.json` file itself.
    pub(crate) fn url(&self) -> Option<Url> {
        Url::from_file_path(&self.pjson_path).ok()
    }
}

/// Memoizing `package.json` reader.
#[derive(Debug, Default)]
pub struct PackageJsonReader {
    cache: Mutex<FxHashMap<PathBuf, Arc<PackageConfig>>>,
}

impl PackageJsonReader {
    /// Read and memoize the config at `path` (a `package.json` file path).
    ///
    /// A missing or unreadable file yields a config with `exists == false`;
    /// a file that fails to parse is an `InvalidPackageConfig` error.
    pub fn read(&self, path: &Path, base: Option<&Url>) -> Result<Arc<PackageConfig>, ResolveError> {
        if let Some(hit) = self.cache.lock().expect("package.json cache lock").get(path) {
            return Ok(Arc::clone(hit));
        }

        let config = match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(path, &text, base)?,
            Err(_) => PackageConfig::missing(path.to_path_buf()),
        };

        let config = Arc::new(config);
        self.cache
            .lock()
            .expect("package.json cache lock")
            .insert(path.to_path_buf(), Arc::clone(&config));
        Ok(config)
    }

    fn parse(path: &Path, text: &str, base: Option<&Url>) -> Result<PackageConfig, ResolveError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ResolveError::invalid_package_config(path, base, e.to_string()))?;

        let mut config = PackageConfig {
            exists: true,
            pjson_path: path.to_path_buf(),
            ..PackageConfig::default()
        };

        // A non-object top level parses but carries no fields.
        if let Some(map) = value.as_object() {
            config.name = map.get("name").and_then(Value::as_str).map(str::to_string);
            config.main = map.get("main").and_then(Value::as_str).map(str::to_string);
            config.package_type = match map.get("type").and_then(Value::as_str) {
                Some("module") => PackageType::Module,
                Some("commonjs") => PackageType::CommonJs,
                _ => PackageType::None,
            };
            config.exports = map.get("exports").cloned();
            config.imports = map.get("imports").cloned();
        }

        Ok(config)
    }

    /// Locate the `package.json` governing `url` by walking parent
    /// directories. The walk stops without crossing a `node_modules`
    /// boundary; if nothing is found a config with `exists == false` is
    /// returned.
    pub fn scope_config(&self, url: &Url) -> Result<Arc<PackageConfig>, ResolveError> {
        let Ok(mut pjson_url) = url.join("./package.json") else {
            return Ok(Arc::new(PackageConfig::missing(PathBuf::new())));
        };

        loop {
            if pjson_url.path().ends_with("node_modules/package.json") {
                break;
            }
            let Ok(pjson_path) = pjson_url.to_file_path() else {
                // Non-file scope: nothing to read.
                return Ok(Arc::new(PackageConfig::missing(PathBuf::new())));
            };
            let config = self.read(&pjson_path, Some(url))?;
            if config.exists {
                return Ok(config);
            }

            let last = pjson_url.clone();
            let Ok(next) = pjson_url.join("../package.json") else {
                break;
            };
            pjson_url = next;
            if pjson_url.path() == last.path() {
                // Filesystem root reached.
                break;
            }
        }

        let pjson_path = pjson_url.to_file_path().unwrap_or_default();
        Ok(Arc::new(PackageConfig::missing(pjson_path)))
    }
}
