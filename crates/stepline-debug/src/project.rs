//! Project root resolution.

use std::path::{Path, PathBuf};

/// Resolves project-relative breakpoint locations.
pub trait ProjectRoot {
    fn is_loaded(&self) -> bool;
    fn project_dir(&self) -> Option<&Path>;
    fn is_project_file(&self, path: &Path) -> bool;
}

/// A project rooted at a directory. Every file below the root belongs to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDir {
    root: PathBuf,
}

impl ProjectDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ProjectRoot for ProjectDir {
    fn is_loaded(&self) -> bool {
        true
    }

    fn project_dir(&self) -> Option<&Path> {
        Some(&self.root)
    }

    fn is_project_file(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }
}

/// No project loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProject;

impl ProjectRoot for NoProject {
    fn is_loaded(&self) -> bool {
        false
    }

    fn project_dir(&self) -> Option<&Path> {
        None
    }

    fn is_project_file(&self, _path: &Path) -> bool {
        false
    }
}
