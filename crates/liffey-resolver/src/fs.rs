//! Filesystem probes used by resolution.
//!
//! The resolver itself never touches `std::fs` directly; everything goes
//! through [`FsProbe`] so hosts can substitute virtual filesystems.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// What a path points at on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
    Missing,
}

/// Stat and realpath primitives consumed by the resolver.
pub trait FsProbe: Send + Sync + fmt::Debug {
    /// Classify what `path` points at.
    fn kind(&self, path: &Path) -> FileKind;

    /// Canonicalize `path`, resolving symbolic links.
    fn realpath(&self, path: &Path) -> io::Result<PathBuf>;

    /// Whether `path` is a regular file.
    fn is_file(&self, path: &Path) -> bool {
        matches!(self.kind(path), FileKind::File)
    }
}

/// Probe backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFs;

impl FsProbe for RealFs {
    fn kind(&self, path: &Path) -> FileKind {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_dir() => FileKind::Directory,
            Ok(meta) if meta.is_file() => FileKind::File,
            // Sockets, fifos and the like are not loadable modules.
            Ok(_) | Err(_) => FileKind::Missing,
        }
    }

    fn realpath(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::canonicalize(path)
    }
}
