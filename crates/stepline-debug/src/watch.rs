//! Watch expressions.

use serde::{Deserialize, Serialize};

/// Trigger for a watch expression other than "condition is true".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchSpecial {
    /// Fires when the watched variable comes into existence.
    Created,
    /// Fires when the watched value changes.
    Changed,
}

impl WatchSpecial {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Changed => "changed",
        }
    }

    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "created" => Some(Self::Created),
            "changed" => Some(Self::Changed),
            _ => None,
        }
    }
}

/// A watch expression, keyed by its condition and special marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchExpression {
    pub condition: String,
    #[serde(default)]
    pub special: Option<WatchSpecial>,
    #[serde(default)]
    pub temporary: bool,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub ignore_count: u32,
}

fn enabled_by_default() -> bool {
    true
}

impl WatchExpression {
    pub fn new(condition: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            special: None,
            temporary: false,
            enabled: true,
            ignore_count: 0,
        }
    }

    #[must_use]
    pub fn with_special(mut self, special: WatchSpecial) -> Self {
        self.special = Some(special);
        self
    }

    /// Whether this watch answers to `condition`; a given `special` must
    /// match as well.
    #[must_use]
    pub fn matches(&self, condition: &str, special: Option<WatchSpecial>) -> bool {
        self.condition == condition && special.is_none_or(|special| self.special == Some(special))
    }
}
