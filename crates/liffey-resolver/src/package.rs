//! Bare-specifier resolution: the `node_modules` walk and the legacy
//! `main` fallback for packages without an `exports` field.

use crate::deprecation::codes as dep_codes;
use crate::error::{url_display, ResolveError};
use crate::fs::FileKind;
use crate::pkg_json::PackageConfig;
use crate::resolve::{ConditionSet, Resolver};
use crate::specifier::parse_package_name;
use url::Url;

/// Cap on `imports`-to-bare-specifier redirection chains.
const MAX_PACKAGE_REDIRECTS: usize = 32;

/// Probe order for the legacy `main` field, relative to the value of
/// `main` itself.
const MAIN_SUFFIXES: &[&str] = &[
    "",
    ".js",
    ".json",
    ".node",
    "/index.js",
    "/index.json",
    "/index.node",
];

const INDEX_CANDIDATES: &[&str] = &["./index.js", "./index.json", "./index.node"];

impl Resolver {
    /// Resolve a bare specifier to a URL.
    pub(crate) fn package_resolve(
        &self,
        specifier: &str,
        base: &Url,
        conditions: &ConditionSet,
        depth: usize,
    ) -> Result<Url, ResolveError> {
        if depth > MAX_PACKAGE_REDIRECTS {
            return Err(ResolveError::invalid_specifier(
                specifier,
                "exceeds the maximum package redirection depth",
                Some(base),
            ));
        }

        if self.builtins.is_builtin(specifier) {
            let url = Url::parse(&format!("node:{specifier}")).map_err(|_| {
                ResolveError::invalid_specifier(specifier, "is not a valid builtin name", Some(base))
            })?;
            return Ok(url);
        }

        let parsed = parse_package_name(specifier, base)?;

        // A package with an `exports` field may refer to itself by name.
        let scope = self.pkg_json.scope_config(base)?;
        if scope.exists && scope.name.as_deref() == Some(parsed.name.as_str()) {
            if let (Some(pjson_url), Some(exports)) = (scope.url(), scope.exports_value()) {
                tracing::debug!(specifier, "resolving package self-reference");
                return self.package_exports_resolve(
                    &pjson_url,
                    &parsed.subpath,
                    exports,
                    base,
                    conditions,
                    depth,
                );
            }
        }

        let mut pjson_url = base
            .join(&format!("./node_modules/{}/package.json", parsed.name))
            .map_err(|_| {
                ResolveError::invalid_specifier(specifier, "is not a valid package name", Some(base))
            })?;

        loop {
            let Ok(pjson_path) = pjson_url.to_file_path() else {
                break;
            };
            let Some(pkg_dir) = pjson_path.parent() else {
                break;
            };

            if self.fs.kind(pkg_dir) != FileKind::Directory {
                // Cross one nesting level of node_modules and retry; the
                // candidate stops changing at the filesystem root.
                let up = if parsed.scoped {
                    "../../../../node_modules/"
                } else {
                    "../../../node_modules/"
                };
                let Ok(next) = pjson_url.join(&format!("{up}{}/package.json", parsed.name)) else {
                    break;
                };
                if next.path() == pjson_url.path() {
                    break;
                }
                pjson_url = next;
                continue;
            }

            let config = self.pkg_json.read(&pjson_path, Some(base))?;
            if let Some(exports) = config.exports_value() {
                return self.package_exports_resolve(
                    &pjson_url,
                    &parsed.subpath,
                    exports,
                    base,
                    conditions,
                    depth,
                );
            }
            if parsed.subpath == "." {
                return self.legacy_main_resolve(&pjson_url, &config, base);
            }
            return pjson_url.join(&parsed.subpath).map_err(|_| {
                ResolveError::invalid_specifier(specifier, "is not a valid subpath", Some(base))
            });
        }

        Err(ResolveError::module_not_found(parsed.name.as_str(), Some(base)))
    }

    /// Entry-point resolution for packages without `exports`: probe the
    /// `main` field and the extension/index ladder.
    pub(crate) fn legacy_main_resolve(
        &self,
        pjson_url: &Url,
        config: &PackageConfig,
        base: &Url,
    ) -> Result<Url, ResolveError> {
        let mut chosen: Option<(Url, bool)> = None;

        if let Some(main) = &config.main {
            for (i, suffix) in MAIN_SUFFIXES.iter().enumerate() {
                let Ok(candidate) = pjson_url.join(&format!("./{main}{suffix}")) else {
                    continue;
                };
                if self.url_is_file(&candidate) {
                    chosen = Some((candidate, i > 0));
                    break;
                }
            }
        }

        if chosen.is_none() {
            for candidate in INDEX_CANDIDATES {
                let Ok(candidate) = pjson_url.join(candidate) else {
                    continue;
                };
                if self.url_is_file(&candidate) {
                    chosen = Some((candidate, true));
                    break;
                }
            }
        }

        match chosen {
            Some((url, used_fallback)) => {
                if used_fallback {
                    self.emit_legacy_index_deprecation(&url, pjson_url, base, config.main.as_deref());
                }
                Ok(url)
            }
            None => {
                let dir = pjson_url
                    .join(".")
                    .map_or_else(|_| pjson_url.to_string(), |u| url_display(&u));
                Err(ResolveError::module_not_found(dir, Some(base)))
            }
        }
    }

    fn url_is_file(&self, url: &Url) -> bool {
        url.to_file_path()
            .map(|path| self.fs.is_file(&path))
            .unwrap_or(false)
    }

    /// The extension/index ladder is tolerated for CommonJS, deprecated for
    /// ES modules; the format probe gates the warning.
    fn emit_legacy_index_deprecation(
        &self,
        chosen: &Url,
        pjson_url: &Url,
        base: &Url,
        main: Option<&str>,
    ) {
        if self.module_format(chosen).as_deref() != Some("module") {
            return;
        }
        let pkg_dir = pjson_url
            .join(".")
            .map_or_else(|_| pjson_url.to_string(), |u| url_display(&u));
        let entry = url_display(chosen);
        let rel = entry.strip_prefix(&pkg_dir).unwrap_or(&entry);
        let base_path = url_display(base);

        let message = match main {
            Some(main) => format!(
                "Package {pkg_dir} has a \"main\" field set to {main:?} which omits the full \
                 filename of the resolved entry point {rel:?}, imported from {base_path}. \
                 Automatic extension and index resolution of \"main\" is deprecated for ES \
                 modules."
            ),
            None => format!(
                "Package {pkg_dir} defines neither \"main\" nor \"exports\"; the main entry \
                 point {rel:?} was chosen by the default index lookup, imported from \
                 {base_path}. Default index lookups are deprecated for ES modules."
            ),
        };
        self.deprecations
            .emit(dep_codes::LEGACY_INDEX, &format!("{pkg_dir}|{rel}"), &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::{Resolver, ResolverOptions};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn resolver() -> Resolver {
        Resolver::new(ResolverOptions::default())
    }

    fn conditions() -> ConditionSet {
        ["node", "import"].into_iter().collect()
    }

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn file_url(path: &Path) -> Url {
        Url::from_file_path(path).unwrap()
    }

    #[test]
    fn test_walk_finds_package_in_parent_dir() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        write(
            &root.join("node_modules/dep/package.json"),
            r#"{"exports": {".": "./entry.js"}}"#,
        );
        write(&root.join("node_modules/dep/entry.js"), "");
        write(&root.join("src/deep/mod.js"), "");

        let base = file_url(&root.join("src/deep/mod.js"));
        let url = resolver()
            .package_resolve("dep", &base, &conditions(), 0)
            .unwrap();
        assert_eq!(url, file_url(&root.join("node_modules/dep/entry.js")));
    }

    #[test]
    fn test_nearest_node_modules_wins() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        write(
            &root.join("node_modules/dep/package.json"),
            r#"{"exports": "./outer.js"}"#,
        );
        write(&root.join("node_modules/dep/outer.js"), "");
        write(
            &root.join("app/node_modules/dep/package.json"),
            r#"{"exports": "./inner.js"}"#,
        );
        write(&root.join("app/node_modules/dep/inner.js"), "");
        write(&root.join("app/main.js"), "");

        let base = file_url(&root.join("app/main.js"));
        let url = resolver()
            .package_resolve("dep", &base, &conditions(), 0)
            .unwrap();
        assert_eq!(url, file_url(&root.join("app/node_modules/dep/inner.js")));
    }

    #[test]
    fn test_scoped_package_walk() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        write(
            &root.join("node_modules/@scope/dep/package.json"),
            r#"{"exports": {"./util": "./lib/util.js"}}"#,
        );
        write(&root.join("node_modules/@scope/dep/lib/util.js"), "");
        write(&root.join("a/b/mod.js"), "");

        let base = file_url(&root.join("a/b/mod.js"));
        let url = resolver()
            .package_resolve("@scope/dep/util", &base, &conditions(), 0)
            .unwrap();
        assert_eq!(
            url,
            file_url(&root.join("node_modules/@scope/dep/lib/util.js"))
        );
    }

    #[test]
    fn test_missing_package_is_module_not_found() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        write(&root.join("main.js"), "");

        let base = file_url(&root.join("main.js"));
        let err = resolver()
            .package_resolve("ghost", &base, &conditions(), 0)
            .unwrap_err();
        assert_eq!(err.code(), crate::error::codes::MODULE_NOT_FOUND);
    }

    #[test]
    fn test_builtin_short_circuits() {
        let base = Url::parse("file:///app/main.js").unwrap();
        let url = resolver()
            .package_resolve("fs/promises", &base, &conditions(), 0)
            .unwrap();
        assert_eq!(url.as_str(), "node:fs/promises");
    }

    #[test]
    fn test_self_reference_through_exports() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        write(
            &root.join("package.json"),
            r#"{"name": "selfie", "exports": {"./feature": "./lib/feature.js"}}"#,
        );
        write(&root.join("lib/feature.js"), "");
        write(&root.join("src/mod.js"), "");

        let base = file_url(&root.join("src/mod.js"));
        let url = resolver()
            .package_resolve("selfie/feature", &base, &conditions(), 0)
            .unwrap();
        assert_eq!(url, file_url(&root.join("lib/feature.js")));
    }

    #[test]
    fn test_subpath_without_exports_maps_directly() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        write(&root.join("node_modules/old/package.json"), r#"{"main": "./x.js"}"#);
        write(&root.join("node_modules/old/server.js"), "");
        write(&root.join("main.js"), "");

        let base = file_url(&root.join("main.js"));
        let url = resolver()
            .package_resolve("old/server.js", &base, &conditions(), 0)
            .unwrap();
        assert_eq!(url, file_url(&root.join("node_modules/old/server.js")));
    }

    #[test]
    fn test_legacy_main_exact_hit() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        write(&root.join("node_modules/old/package.json"), r#"{"main": "./entry.js"}"#);
        write(&root.join("node_modules/old/entry.js"), "");
        write(&root.join("main.js"), "");

        let base = file_url(&root.join("main.js"));
        let url = resolver()
            .package_resolve("old", &base, &conditions(), 0)
            .unwrap();
        assert_eq!(url, file_url(&root.join("node_modules/old/entry.js")));
    }

    #[test]
    fn test_legacy_main_extension_ladder() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        write(&root.join("node_modules/old/package.json"), r#"{"main": "entry"}"#);
        write(&root.join("node_modules/old/entry.json"), "{}");
        write(&root.join("main.js"), "");

        let base = file_url(&root.join("main.js"));
        let url = resolver()
            .package_resolve("old", &base, &conditions(), 0)
            .unwrap();
        assert_eq!(url, file_url(&root.join("node_modules/old/entry.json")));
    }

    #[test]
    fn test_legacy_main_directory_index() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        write(&root.join("node_modules/old/package.json"), r#"{"main": "./lib"}"#);
        write(&root.join("node_modules/old/lib/index.js"), "");
        write(&root.join("main.js"), "");

        let base = file_url(&root.join("main.js"));
        let url = resolver()
            .package_resolve("old", &base, &conditions(), 0)
            .unwrap();
        assert_eq!(url, file_url(&root.join("node_modules/old/lib/index.js")));
    }

    #[test]
    fn test_legacy_plain_index_without_main() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        write(&root.join("node_modules/old/package.json"), r#"{"name": "old"}"#);
        write(&root.join("node_modules/old/index.js"), "");
        write(&root.join("main.js"), "");

        let base = file_url(&root.join("main.js"));
        let url = resolver()
            .package_resolve("old", &base, &conditions(), 0)
            .unwrap();
        assert_eq!(url, file_url(&root.join("node_modules/old/index.js")));
    }

    #[test]
    fn test_legacy_main_nothing_found() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        write(&root.join("node_modules/old/package.json"), r#"{"main": "gone"}"#);
        write(&root.join("main.js"), "");

        let base = file_url(&root.join("main.js"));
        let err = resolver()
            .package_resolve("old", &base, &conditions(), 0)
            .unwrap_err();
        assert_eq!(err.code(), crate::error::codes::MODULE_NOT_FOUND);
    }
}
