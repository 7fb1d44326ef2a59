#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]

//! ES module resolution for the liffey runtime.
//!
//! Given a specifier string and the URL of the importing module, resolves
//! the absolute URL of the module to load:
//! - relative and absolute path specifiers
//! - bare specifiers through `node_modules`, including `package.json`
//!   `exports` subpath, pattern, and conditional maps
//! - `#`-prefixed private specifiers through the `imports` field
//! - `node:` and `data:` URLs, plus `http(s):` when network imports are on
//!
//! Resolution is URL-in, URL-out. Loading and transforming module source is
//! the runtime's job; the resolver only decides *which* URL to load.

pub mod builtins;
pub mod deprecation;
pub mod error;
mod exports;
pub mod fs;
pub mod hooks;
mod package;
pub mod pkg_json;
pub mod resolve;
pub mod specifier;

pub use builtins::{BuiltinRegistry, NodeBuiltins};
pub use deprecation::{DeprecationSink, LoggingDeprecationSink};
pub use error::{codes as error_codes, ResolveError};
pub use fs::{FileKind, FsProbe, RealFs};
pub use hooks::{CjsFallbackHint, FormatProbe, PolicyManifest, PolicyMapping};
pub use pkg_json::{PackageConfig, PackageJsonReader, PackageType};
pub use resolve::{
    ConditionSet, Resolved, ResolveContext, Resolver, ResolverOptions,
};
pub use specifier::{classify, parse_package_name, PackageName, SpecifierKind};
