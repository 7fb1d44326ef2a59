//! `package.json` `exports` / `imports` evaluation.
//!
//! Implements the shared machinery of both fields:
//! - best-match selection over pattern keys (`./features/*`)
//! - recursive target resolution over strings, ordered fallback arrays,
//!   conditional maps, and `null`
//! - path-safety validation of targets and pattern captures

use crate::deprecation::codes as dep_codes;
use crate::error::{url_display, ResolveError};
use crate::resolve::{ConditionSet, Resolver};
use serde_json::{Map, Value};
use std::path::PathBuf;
use url::Url;

/// Outcome of resolving one target value.
///
/// `Blocked` (an explicit `null` target) and `NotApplicable` (no branch
/// matched the condition set) are distinct: a blocked subpath surfaces as
/// "not exported" upstream, while a not-applicable branch lets the caller
/// keep scanning alternatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TargetResolution {
    Resolved(Url),
    Blocked,
    NotApplicable,
}

/// Verdict of scanning a path for forbidden segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SegmentVerdict {
    Clean,
    /// Empty segments only (`a//b`, a leading or trailing slash). Accepted
    /// with a deprecation warning.
    DeprecatedForm,
    /// A `.`, `..`, or `node_modules` segment, literal or percent-encoded.
    Invalid,
}

fn hex_val(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Percent-decode and lowercase a path segment for comparison. Non-ASCII
/// input only has to compare unequal to the ASCII words we look for, so
/// byte-wise handling is enough.
fn decoded_lower(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut out = String::with_capacity(segment.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                out.push((((hi << 4) | lo) as char).to_ascii_lowercase());
                i += 3;
                continue;
            }
        }
        out.push((bytes[i] as char).to_ascii_lowercase());
        i += 1;
    }
    out
}

/// Scan a `/`- or `\`-delimited path for segments that must never appear in
/// a resolved target or pattern capture.
pub(crate) fn scan_segments(path: &str) -> SegmentVerdict {
    let mut verdict = SegmentVerdict::Clean;
    for segment in path.split(['/', '\\']) {
        if segment.is_empty() {
            verdict = SegmentVerdict::DeprecatedForm;
            continue;
        }
        let decoded = decoded_lower(segment);
        if decoded == "." || decoded == ".." || decoded == "node_modules" {
            return SegmentVerdict::Invalid;
        }
    }
    verdict
}

/// JavaScript array-index check: map keys that look like array indices
/// would make the object a list in disguise and are rejected.
fn is_array_index(key: &str) -> bool {
    match key.parse::<u32>() {
        Ok(n) => n.to_string() == key && n != u32::MAX,
        Err(_) => false,
    }
}

/// Select the best-matching pattern key for `query`.
///
/// A key `prefix*suffix` (exactly one `*`) matches when the query carries
/// the prefix and suffix and is at least as long as the key. The best match
/// has the longest prefix; ties go to the longest full key. The scan keeps
/// a running best over all keys, so map order does not matter.
///
/// Returns the winning key and the captured middle of the query.
pub(crate) fn best_pattern_match<'m>(
    map: &'m Map<String, Value>,
    query: &str,
) -> Option<(&'m str, String)> {
    let mut best: Option<(&str, usize)> = None;
    let mut capture = String::new();

    for key in map.keys() {
        let Some(star) = key.find('*') else { continue };
        if key[star + 1..].contains('*') {
            continue;
        }
        let prefix = &key[..star];
        let suffix = &key[star + 1..];
        if query.len() < key.len() || !query.starts_with(prefix) || !query.ends_with(suffix) {
            continue;
        }
        let better = match best {
            None => true,
            Some((best_key, best_prefix)) => {
                prefix.len() > best_prefix
                    || (prefix.len() == best_prefix && key.len() > best_key.len())
            }
        };
        if better {
            best = Some((key, prefix.len()));
            capture = query[prefix.len()..query.len() - suffix.len()].to_string();
        }
    }

    best.map(|(key, _)| (key, capture))
}

/// Filesystem path of the directory containing `package.json`, for error
/// and warning messages.
fn pkg_dir_path(pjson_url: &Url) -> PathBuf {
    pjson_url
        .join(".")
        .ok()
        .and_then(|u| u.to_file_path().ok())
        .unwrap_or_default()
}

fn invalid_target(
    pjson_url: &Url,
    key: &str,
    target: String,
    internal: bool,
    base: &Url,
) -> ResolveError {
    ResolveError::InvalidPackageTarget {
        pkg_path: pkg_dir_path(pjson_url),
        key: key.to_string(),
        target,
        internal,
        base: Some(url_display(base)),
    }
}

/// `exports` sugar: a bare string, array, or all-condition map stands for
/// `{ ".": … }`. A map mixing condition keys and subpath keys is malformed.
fn is_conditional_sugar(exports: &Value, pjson_url: &Url, base: &Url) -> Result<bool, ResolveError> {
    if exports.is_string() || exports.is_array() {
        return Ok(true);
    }
    let Some(map) = exports.as_object() else {
        return Ok(false);
    };

    let mut sugar = None;
    for key in map.keys() {
        let key_is_condition = key.is_empty() || !key.starts_with('.');
        match sugar {
            None => sugar = Some(key_is_condition),
            Some(prev) if prev != key_is_condition => {
                return Err(ResolveError::invalid_package_config(
                    &pjson_url.to_file_path().unwrap_or_default(),
                    Some(base),
                    "\"exports\" cannot contain some keys starting with '.' and some not; \
                     the map must hold only subpath keys or only condition keys",
                ));
            }
            Some(_) => {}
        }
    }
    Ok(sugar.unwrap_or(false))
}

impl Resolver {
    /// Resolve `subpath` against a package's `exports` field.
    pub(crate) fn package_exports_resolve(
        &self,
        pjson_url: &Url,
        subpath: &str,
        exports: &Value,
        base: &Url,
        conditions: &ConditionSet,
        depth: usize,
    ) -> Result<Url, ResolveError> {
        let not_exported = || {
            ResolveError::not_exported(
                pjson_url.to_file_path().unwrap_or_default(),
                subpath,
                base,
            )
        };

        if is_conditional_sugar(exports, pjson_url, base)? {
            if subpath != "." {
                return Err(not_exported());
            }
            return match self.resolve_package_target(
                pjson_url, exports, "", ".", base, false, false, false, conditions, depth,
            )? {
                TargetResolution::Resolved(url) => Ok(url),
                TargetResolution::Blocked | TargetResolution::NotApplicable => Err(not_exported()),
            };
        }

        let Some(map) = exports.as_object() else {
            return Err(not_exported());
        };

        // Literal keys take priority over patterns and are matched by
        // direct lookup.
        if !subpath.contains('*') && !subpath.ends_with('/') {
            if let Some(target) = map.get(subpath) {
                return match self.resolve_package_target(
                    pjson_url, target, "", subpath, base, false, false, false, conditions, depth,
                )? {
                    TargetResolution::Resolved(url) => Ok(url),
                    TargetResolution::Blocked | TargetResolution::NotApplicable => {
                        Err(not_exported())
                    }
                };
            }
        }

        if let Some((key, capture)) = best_pattern_match(map, subpath) {
            let is_path_map = subpath.ends_with('/');
            if is_path_map {
                let pjson_path = pjson_url.to_file_path().unwrap_or_default();
                self.deprecations.emit(
                    dep_codes::TRAILING_SLASH_PATTERN,
                    &format!("{}|{subpath}", pjson_path.display()),
                    &format!(
                        "Resolving the trailing-slash subpath {subpath:?} through pattern \
                         {key:?} in the \"exports\" of {} is deprecated; specifiers ending \
                         in \"/\" will stop matching.",
                        pjson_path.display()
                    ),
                );
            }
            return match self.resolve_package_target(
                pjson_url,
                &map[key],
                &capture,
                key,
                base,
                true,
                false,
                is_path_map,
                conditions,
                depth,
            )? {
                TargetResolution::Resolved(url) => Ok(url),
                TargetResolution::Blocked | TargetResolution::NotApplicable => Err(not_exported()),
            };
        }

        Err(not_exported())
    }

    /// Resolve a `#`-prefixed specifier against the enclosing package's
    /// `imports` field.
    pub(crate) fn package_imports_resolve(
        &self,
        name: &str,
        base: &Url,
        conditions: &ConditionSet,
        depth: usize,
    ) -> Result<Url, ResolveError> {
        if name == "#" || name.starts_with("#/") || name.ends_with('/') {
            return Err(ResolveError::invalid_specifier(
                name,
                "is not a valid internal imports specifier name",
                Some(base),
            ));
        }

        let config = self.pkg_json.scope_config(base)?;
        let mut pjson_path = None;
        if config.exists {
            if let (Some(pjson_url), Some(imports)) =
                (config.url(), config.imports.as_ref().and_then(Value::as_object))
            {
                if !name.contains('*') && imports.contains_key(name) {
                    if let TargetResolution::Resolved(url) = self.resolve_package_target(
                        &pjson_url, &imports[name], "", name, base, false, true, false,
                        conditions, depth,
                    )? {
                        return Ok(url);
                    }
                } else if let Some((key, capture)) = best_pattern_match(imports, name) {
                    if let TargetResolution::Resolved(url) = self.resolve_package_target(
                        &pjson_url,
                        &imports[key],
                        &capture,
                        key,
                        base,
                        true,
                        true,
                        false,
                        conditions,
                        depth,
                    )? {
                        return Ok(url);
                    }
                }
            }
            pjson_path = Some(config.pjson_path.clone());
        }

        Err(ResolveError::import_not_defined(name, pjson_path, base))
    }

    /// Resolve one target value to a URL, honoring the condition set.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn resolve_package_target(
        &self,
        pjson_url: &Url,
        target: &Value,
        capture: &str,
        match_key: &str,
        base: &Url,
        is_pattern: bool,
        internal: bool,
        is_path_map: bool,
        conditions: &ConditionSet,
        depth: usize,
    ) -> Result<TargetResolution, ResolveError> {
        match target {
            Value::String(text) => self
                .resolve_target_string(
                    pjson_url, text, capture, match_key, base, is_pattern, internal, is_path_map,
                    conditions, depth,
                )
                .map(TargetResolution::Resolved),

            Value::Array(alternatives) => {
                if alternatives.is_empty() {
                    return Ok(TargetResolution::Blocked);
                }
                // First alternative that neither misses the condition set
                // nor fails with an invalid target wins. The last blocked
                // or invalid outcome is what surfaces if none does.
                enum Last {
                    Unset,
                    Blocked,
                    Invalid(ResolveError),
                }
                let mut last = Last::Unset;
                for alternative in alternatives {
                    match self.resolve_package_target(
                        pjson_url, alternative, capture, match_key, base, is_pattern, internal,
                        is_path_map, conditions, depth,
                    ) {
                        Ok(TargetResolution::NotApplicable) => {}
                        Ok(TargetResolution::Blocked) => last = Last::Blocked,
                        Ok(resolved) => return Ok(resolved),
                        Err(e @ ResolveError::InvalidPackageTarget { .. }) => {
                            last = Last::Invalid(e);
                        }
                        Err(e) => return Err(e),
                    }
                }
                match last {
                    Last::Unset => Ok(TargetResolution::NotApplicable),
                    Last::Blocked => Ok(TargetResolution::Blocked),
                    Last::Invalid(e) => Err(e),
                }
            }

            Value::Object(branches) => {
                for key in branches.keys() {
                    if is_array_index(key) {
                        return Err(ResolveError::invalid_package_config(
                            &pjson_url.to_file_path().unwrap_or_default(),
                            Some(base),
                            "\"exports\" cannot contain numeric property keys",
                        ));
                    }
                }
                // Insertion order decides: the first applicable condition
                // wins, with `default` matching unconditionally.
                for (key, branch) in branches {
                    if key == "default" || conditions.contains(key) {
                        match self.resolve_package_target(
                            pjson_url, branch, capture, match_key, base, is_pattern, internal,
                            is_path_map, conditions, depth,
                        )? {
                            TargetResolution::NotApplicable => {}
                            resolved => return Ok(resolved),
                        }
                    }
                }
                Ok(TargetResolution::NotApplicable)
            }

            Value::Null => Ok(TargetResolution::Blocked),

            other => Err(invalid_target(
                pjson_url,
                match_key,
                other.to_string(),
                internal,
                base,
            )),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_target_string(
        &self,
        pjson_url: &Url,
        target: &str,
        capture: &str,
        match_key: &str,
        base: &Url,
        is_pattern: bool,
        internal: bool,
        is_path_map: bool,
        conditions: &ConditionSet,
        depth: usize,
    ) -> Result<Url, ResolveError> {
        let fail =
            || invalid_target(pjson_url, match_key, format!("{target:?}"), internal, base);

        // A non-pattern key can only carry a capture when its target is a
        // directory mapping (legacy trailing-slash form).
        if !capture.is_empty() && !is_pattern && !target.ends_with('/') {
            return Err(fail());
        }

        if !target.starts_with("./") {
            // `imports` may re-export from another package by bare name;
            // anything that parses as a URL is not one.
            let bare_reexport = internal
                && !target.starts_with("../")
                && !target.starts_with('/')
                && Url::parse(target).is_err();
            if bare_reexport {
                let export_target = if is_pattern {
                    target.replacen('*', capture, 1)
                } else {
                    format!("{target}{capture}")
                };
                return self.package_resolve(&export_target, pjson_url, conditions, depth + 1);
            }
            return Err(fail());
        }

        match scan_segments(&target[2..]) {
            SegmentVerdict::Invalid => return Err(fail()),
            SegmentVerdict::DeprecatedForm if !is_path_map => {
                self.emit_invalid_segment_deprecation(
                    pjson_url, target, capture, match_key, is_pattern, internal,
                );
            }
            SegmentVerdict::DeprecatedForm | SegmentVerdict::Clean => {}
        }

        let resolved = pjson_url.join(target).map_err(|_| fail())?;
        let package_root = pjson_url.join(".").map_err(|_| fail())?;
        if !resolved.path().starts_with(package_root.path()) {
            return Err(fail());
        }

        if capture.is_empty() {
            return Ok(resolved);
        }

        match scan_segments(capture) {
            SegmentVerdict::Invalid => {
                let request = if is_pattern {
                    match_key.replacen('*', capture, 1)
                } else {
                    format!("{match_key}{capture}")
                };
                let field = if internal { "imports" } else { "exports" };
                return Err(ResolveError::invalid_specifier(
                    request,
                    format!(
                        "is not a valid match in pattern {match_key:?} for the \"{field}\" \
                         resolution of {}",
                        pjson_url.to_file_path().unwrap_or_default().display()
                    ),
                    Some(base),
                ));
            }
            SegmentVerdict::DeprecatedForm if !is_path_map => {
                self.emit_invalid_segment_deprecation(
                    pjson_url, target, capture, match_key, is_pattern, internal,
                );
            }
            SegmentVerdict::DeprecatedForm | SegmentVerdict::Clean => {}
        }

        if is_pattern {
            // Substitute on the full serialized URL so a query or fragment
            // in the target survives.
            let substituted = resolved.as_str().replacen('*', capture, 1);
            return Url::parse(&substituted).map_err(|_| fail());
        }
        resolved.join(capture).map_err(|_| fail())
    }

    fn emit_invalid_segment_deprecation(
        &self,
        pjson_url: &Url,
        target: &str,
        capture: &str,
        match_key: &str,
        is_pattern: bool,
        internal: bool,
    ) {
        let request = if is_pattern {
            match_key.replacen('*', capture, 1)
        } else {
            format!("{match_key}{capture}")
        };
        let resolved_target = if is_pattern {
            target.replacen('*', capture, 1)
        } else {
            target.to_string()
        };
        let field = if internal { "imports" } else { "exports" };
        let pjson_path = pjson_url.to_file_path().unwrap_or_default();
        self.deprecations.emit(
            dep_codes::INVALID_SEGMENT,
            &format!("{}|{request}", pjson_path.display()),
            &format!(
                "Resolving {resolved_target:?} for request {request:?} in the \"{field}\" of \
                 the package at {} relies on empty path segments, which is deprecated.",
                pjson_path.display()
            ),
        );
    }
}
