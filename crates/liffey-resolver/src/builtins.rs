//! Builtin module registry.
//!
//! Bare specifiers naming a builtin short-circuit package resolution and
//! resolve to a `node:` URL. Hosts embedding the resolver supply their own
//! registry; [`NodeBuiltins`] covers the standard set.

use std::fmt;

/// Builtin module names, without the `node:` prefix. Sorted so membership
/// checks can binary search.
pub const NODE_BUILTINS: &[&str] = &[
    "assert",
    "assert/strict",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "diagnostics_channel",
    "dns",
    "dns/promises",
    "domain",
    "events",
    "fs",
    "fs/promises",
    "http",
    "http2",
    "https",
    "inspector",
    "module",
    "net",
    "os",
    "path",
    "path/posix",
    "path/win32",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "readline/promises",
    "repl",
    "stream",
    "stream/consumers",
    "stream/promises",
    "stream/web",
    "string_decoder",
    "sys",
    "timers",
    "timers/promises",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "util/types",
    "v8",
    "vm",
    "wasi",
    "worker_threads",
    "zlib",
];

/// Answers "is this bare name a builtin module?".
pub trait BuiltinRegistry: Send + Sync + fmt::Debug {
    /// `name` is given without the `node:` prefix (e.g. `fs`,
    /// `fs/promises`).
    fn is_builtin(&self, name: &str) -> bool;
}

/// Registry backed by the static [`NODE_BUILTINS`] table.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeBuiltins;

impl BuiltinRegistry for NodeBuiltins {
    fn is_builtin(&self, name: &str) -> bool {
        NODE_BUILTINS.binary_search(&name).is_ok()
    }
}
