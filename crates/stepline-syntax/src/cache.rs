//! Per-file cache of breakable lines.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::breakable::compute_breakable_lines;

/// Where source text comes from when the caller does not supply it.
pub trait SourceLoader {
    fn load(&self, path: &Path) -> io::Result<String>;
}

/// Reads source files from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSourceLoader;

impl SourceLoader for FsSourceLoader {
    fn load(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// Remembers the breakable line set of each file, or that it failed to
/// compile (`None`).
pub struct BreakLineCache<L = FsSourceLoader> {
    loader: L,
    entries: FxHashMap<PathBuf, Option<BTreeSet<u32>>>,
}

impl Default for BreakLineCache<FsSourceLoader> {
    fn default() -> Self {
        Self::new(FsSourceLoader)
    }
}

impl<L: SourceLoader> BreakLineCache<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            entries: FxHashMap::default(),
        }
    }

    /// Breakable lines of `path`.
    ///
    /// A cached entry wins unless `enforce_recalc` is set. Otherwise the
    /// lines are computed from `source`, or from the file when no text is
    /// given. Any failure yields `None`, which is cached like a result when
    /// `save_to_cache` is set.
    pub fn breakable_lines(
        &mut self,
        path: &Path,
        source: Option<&str>,
        enforce_recalc: bool,
        save_to_cache: bool,
    ) -> Option<BTreeSet<u32>> {
        if !enforce_recalc {
            if let Some(cached) = self.entries.get(path) {
                return cached.clone();
            }
        }

        let computed = match source {
            Some(text) => Self::compute(path, text),
            None => match self.loader.load(path) {
                Ok(text) => Self::compute(path, &text),
                Err(err) => {
                    tracing::debug!("cannot read {}: {err}", path.display());
                    None
                }
            },
        };

        if save_to_cache {
            self.entries.insert(path.to_path_buf(), computed.clone());
        }
        computed
    }

    fn compute(path: &Path, text: &str) -> Option<BTreeSet<u32>> {
        match compute_breakable_lines(text) {
            Ok(lines) => Some(lines),
            Err(err) => {
                tracing::debug!("{} does not compile: {err}", path.display());
                None
            }
        }
    }

    /// Cached entry. The outer `None` means "not cached".
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&Option<BTreeSet<u32>>> {
        self.entries.get(path)
    }

    pub fn put(&mut self, path: impl Into<PathBuf>, lines: Option<BTreeSet<u32>>) {
        self.entries.insert(path.into(), lines);
    }

    pub fn remove(&mut self, path: &Path) -> Option<Option<BTreeSet<u32>>> {
        self.entries.remove(path)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
