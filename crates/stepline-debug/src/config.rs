//! Session configuration loaded from `stepline.toml`.

use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use smol_str::SmolStr;
use tracing::debug;

use crate::error::DebuggerError;

pub const CONFIG_FILE: &str = "stepline.toml";

/// Debugger behavior for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugSettings {
    pub report_exceptions: bool,
    pub trace_interpreter: bool,
    /// When unset, the automatic stop right after launch is skipped.
    pub stop_at_first_line: bool,
    /// Answer fork requests without asking the user.
    pub autofork: bool,
    /// Fork target used with `autofork`.
    pub follow_child: bool,
    /// Handled exception types that resume execution after being reported.
    pub ignored_exceptions: IndexSet<String>,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            report_exceptions: true,
            trace_interpreter: true,
            stop_at_first_line: true,
            autofork: false,
            follow_child: false,
            ignored_exceptions: IndexSet::new(),
        }
    }
}

/// How the debuggee is launched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunParameters {
    pub arguments: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub environment: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Directory the configuration was read from.
    pub base_dir: PathBuf,
    pub project_root: Option<PathBuf>,
    pub debug: DebugSettings,
    pub run: RunParameters,
}

impl SessionConfig {
    /// Defaults, rooted at `base_dir`.
    pub fn base(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            project_root: None,
            debug: DebugSettings::default(),
            run: RunParameters::default(),
        }
    }

    /// Read a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, DebuggerError> {
        let base_dir = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(Self::base(&base_dir));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_contents(&base_dir, &contents)
            .map_err(|err| DebuggerError::Config(SmolStr::new(format!("{}: {err}", path.display()))))
    }

    pub fn from_contents(base_dir: &Path, contents: &str) -> Result<Self, DebuggerError> {
        let parsed: ConfigFile = toml::from_str(contents)
            .map_err(|err| DebuggerError::Config(SmolStr::new(err.to_string())))?;
        let mut config = Self::base(base_dir);
        config.project_root = parsed
            .project
            .root
            .map(|root| resolve_path(base_dir, &root));
        config.debug = parsed.debug.into();
        config.run = RunParameters {
            arguments: parsed.run.arguments,
            working_dir: parsed
                .run
                .working_dir
                .map(|dir| resolve_path(base_dir, &dir)),
            environment: parsed.run.environment,
        };
        Ok(config)
    }
}

fn resolve_path(base: &Path, value: &str) -> PathBuf {
    let path = PathBuf::from(value);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    project: ProjectSection,
    #[serde(default)]
    debug: DebugSection,
    #[serde(default)]
    run: RunSection,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectSection {
    root: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DebugSection {
    report_exceptions: Option<bool>,
    trace_interpreter: Option<bool>,
    stop_at_first_line: Option<bool>,
    autofork: Option<bool>,
    follow_child: Option<bool>,
    #[serde(default)]
    ignored_exceptions: IndexSet<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RunSection {
    #[serde(default)]
    arguments: Vec<String>,
    working_dir: Option<String>,
    #[serde(default)]
    environment: IndexMap<String, String>,
}

impl From<DebugSection> for DebugSettings {
    fn from(section: DebugSection) -> Self {
        let defaults = DebugSettings::default();
        Self {
            report_exceptions: section
                .report_exceptions
                .unwrap_or(defaults.report_exceptions),
            trace_interpreter: section
                .trace_interpreter
                .unwrap_or(defaults.trace_interpreter),
            stop_at_first_line: section
                .stop_at_first_line
                .unwrap_or(defaults.stop_at_first_line),
            autofork: section.autofork.unwrap_or(defaults.autofork),
            follow_child: section.follow_child.unwrap_or(defaults.follow_child),
            ignored_exceptions: section.ignored_exceptions,
        }
    }
}
