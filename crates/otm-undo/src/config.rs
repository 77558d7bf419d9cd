#![forbid(unsafe_code)]

//! History configuration and the merge-window rule.
//!
//! With the `config` feature, [`HistoryConfig`] can be loaded from TOML or
//! JSON so editors can ship their history limits as data:
//!
//! ```toml
//! # otm-undo.toml
//! max_undo_count = 250
//! merge_pause_ms = 750
//! ```
//!
//! Missing keys fall back to [`HistoryConfig::default`].

#[cfg(feature = "config")]
use std::path::Path;
use std::time::Duration;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::action::ActionMetadata;

/// Configuration for an [`UndoManager`](crate::UndoManager).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct HistoryConfig {
    /// Maximum actions retained on each stack. Negative means unlimited.
    pub max_undo_count: isize,
    /// Longest gap between two edits of the same control that still merge.
    #[cfg_attr(
        feature = "config",
        serde(
            rename = "merge_pause_ms",
            serialize_with = "serialize_millis",
            deserialize_with = "deserialize_millis"
        )
    )]
    pub merge_pause: Duration,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_undo_count: 100,
            merge_pause: Duration::from_millis(500),
        }
    }
}

impl HistoryConfig {
    /// Create a configuration with the given depth limit and default pause.
    #[must_use]
    pub fn new(max_undo_count: isize) -> Self {
        Self {
            max_undo_count,
            ..Self::default()
        }
    }

    /// Keep every action.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(-1)
    }

    /// Set the merge pause.
    #[must_use]
    pub fn with_merge_pause(mut self, pause: Duration) -> Self {
        self.merge_pause = pause;
        self
    }

    /// The depth limit as a count, `None` when unlimited.
    #[must_use]
    pub fn depth_limit(&self) -> Option<usize> {
        usize::try_from(self.max_undo_count).ok()
    }

    /// Merge policy derived from this configuration.
    #[must_use]
    pub fn merge_policy(&self) -> MergePolicy {
        MergePolicy::new(self.merge_pause)
    }

    /// Validate parameters. An empty list means the config is usable.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.merge_pause.is_zero() {
            errors.push("merge_pause_ms must be > 0".into());
        }
        errors
    }

    /// Load from a TOML string.
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(ConfigError::Toml)?;
        config.checked()
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s).map_err(ConfigError::Json)?;
        config.checked()
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    #[cfg(feature = "config")]
    fn checked(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Time-window rule for coalescing consecutive edits of one control.
///
/// A previous action accepts a merge only if it has never been undone and
/// it last executed less than `pause` before `now`.
///
/// The manager separately refuses any merge across a completed undo or redo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergePolicy {
    pub pause: Duration,
}

impl Default for MergePolicy {
    fn default() -> Self {
        HistoryConfig::default().merge_policy()
    }
}

impl MergePolicy {
    #[must_use]
    pub fn new(pause: Duration) -> Self {
        Self { pause }
    }

    /// Whether an edit at `now` may fold into the action owning `previous`.
    #[must_use]
    pub fn allows(&self, previous: &ActionMetadata, now: Instant) -> bool {
        if previous.undo_count() > 0 {
            return false;
        }
        let Some(last) = previous.last_executed() else {
            return false;
        };
        now.saturating_duration_since(last) < self.pause
    }
}

/// Errors that can occur when loading a history configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    #[cfg(feature = "config")]
    Toml(toml::de::Error),
    /// JSON parse error.
    #[cfg(feature = "config")]
    Json(serde_json::Error),
    /// Validation errors.
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "config")]
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            #[cfg(feature = "config")]
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => {
                write!(f, "validation errors: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            #[cfg(feature = "config")]
            Self::Toml(e) => Some(e),
            #[cfg(feature = "config")]
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde helpers for Duration
// ---------------------------------------------------------------------------

#[cfg(feature = "config")]
fn serialize_millis<S>(pause: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let millis = u64::try_from(pause.as_millis()).unwrap_or(u64::MAX);
    serializer.serialize_u64(millis)
}

#[cfg(feature = "config")]
fn deserialize_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let millis = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(millis))
}
