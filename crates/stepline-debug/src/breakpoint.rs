//! Line breakpoints and their persisted form.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::project::ProjectRoot;

/// A user breakpoint.
///
/// Files inside the loaded project are stored relative to the project root,
/// so breakpoints survive moving the project. A line of `0` means unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Breakpoint {
    file: Option<PathBuf>,
    line: u32,
    condition: String,
    temporary: bool,
    enabled: bool,
    ignore_count: u32,
}

impl Breakpoint {
    pub fn new(
        project: &dyn ProjectRoot,
        file: Option<PathBuf>,
        line: u32,
        condition: impl Into<String>,
        temporary: bool,
        enabled: bool,
        ignore_count: u32,
    ) -> Self {
        Self {
            file: file.map(|file| relative_to_project(project, file)),
            line,
            condition: condition.into(),
            temporary,
            enabled,
            ignore_count,
        }
    }

    /// Enabled, unconditional breakpoint.
    pub fn at(project: &dyn ProjectRoot, file: impl Into<PathBuf>, line: u32) -> Self {
        Self::new(project, Some(file.into()), line, "", false, true, 0)
    }

    /// Copy every field of `other`.
    pub fn update(&mut self, other: &Breakpoint) {
        self.clone_from(other);
    }

    pub fn update_line_number(&mut self, line: u32) {
        self.line = line;
    }

    /// Stored file, possibly project-relative.
    #[must_use]
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    #[must_use]
    pub fn condition(&self) -> &str {
        &self.condition
    }

    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    pub fn set_temporary(&mut self, temporary: bool) {
        self.temporary = temporary;
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    #[must_use]
    pub fn ignore_count(&self) -> u32 {
        self.ignore_count
    }

    pub fn set_ignore_count(&mut self, count: u32) {
        self.ignore_count = count;
    }

    /// A breakpoint is valid when its file exists and its line is set.
    #[must_use]
    pub fn is_valid(&self, project: &dyn ProjectRoot) -> bool {
        let Some(path) = self.absolute_path(project) else {
            return false;
        };
        path.exists() && self.line > 0
    }

    /// Resolve the stored file. Relative files resolve against the project
    /// root when a project is loaded, otherwise against the working directory.
    #[must_use]
    pub fn absolute_path(&self, project: &dyn ProjectRoot) -> Option<PathBuf> {
        let file = self.file.as_ref()?;
        if file.is_absolute() {
            return Some(file.clone());
        }
        if let Some(root) = project.project_dir().filter(|_| project.is_loaded()) {
            return Some(root.join(file));
        }
        Some(std::path::absolute(file).unwrap_or_else(|_| file.clone()))
    }

    /// `name:line`, or `full/path:line` when `full` is set.
    #[must_use]
    pub fn location(&self, project: &dyn ProjectRoot, full: bool) -> String {
        let Some(file) = self.file.as_ref() else {
            return format!("None:{}", self.line);
        };
        if full {
            let path = self.absolute_path(project).unwrap_or_else(|| file.clone());
            return format!("{}:{}", path.display(), self.line);
        }
        let name = file
            .file_name()
            .map_or_else(|| file.display().to_string(), |name| name.to_string_lossy().into_owned());
        format!("{name}:{}", self.line)
    }

    #[must_use]
    pub fn tooltip(&self, project: &dyn ProjectRoot) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "Location: {}", self.location(project, true));
        let _ = writeln!(text, "Enabled: {}", self.enabled);
        let _ = writeln!(text, "Temporary: {}", self.temporary);
        let _ = writeln!(text, "Ignore count: {}", self.ignore_count);
        let _ = write!(text, "Condition: {}", self.condition);
        text
    }

    #[must_use]
    pub fn serialize(&self) -> BreakpointRecord {
        BreakpointRecord {
            file: self.file.clone(),
            line: (self.line > 0).then_some(self.line),
            condition: self.condition.clone(),
            temp: self.temporary,
            enabled: self.enabled,
            ignorecnt: self.ignore_count,
        }
    }

    /// Load every field from `record` as stored. Returns whether the result
    /// is valid.
    pub fn deserialize(&mut self, record: &BreakpointRecord, project: &dyn ProjectRoot) -> bool {
        self.file.clone_from(&record.file);
        self.line = record.line.unwrap_or(0);
        self.condition.clone_from(&record.condition);
        self.temporary = record.temp;
        self.enabled = record.enabled;
        self.ignore_count = record.ignorecnt;
        self.is_valid(project)
    }
}

/// Persisted breakpoint, one per entry in the project state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakpointRecord {
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub condition: String,
    #[serde(default)]
    pub temp: bool,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub ignorecnt: u32,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn relative_to_project(project: &dyn ProjectRoot, file: PathBuf) -> PathBuf {
    if !file.is_absolute() || !project.is_loaded() || !project.is_project_file(&file) {
        return file;
    }
    match project.project_dir().and_then(|root| file.strip_prefix(root).ok()) {
        Some(relative) => relative.to_path_buf(),
        None => file,
    }
}
