//! Cue catalog configuration schema
//!
//! Types deserialized from the YAML catalog file. Each cue lists its
//! stages in order; a stage may leave by a timed `advance`, by named
//! `gates` (user actions), or be the terminal stage.

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ============================================================================
// Top-Level Configuration
// ============================================================================

/// Root of a cue catalog file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CatalogConfig {
    /// Catalog metadata
    #[serde(default)]
    pub catalog: CatalogMetadata,

    /// Cue definitions, in dashboard order
    #[serde(default)]
    pub cues: Vec<CueDefinition>,
}

/// Catalog-level metadata shown by the Command Center listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CatalogMetadata {
    /// Display name of the catalog
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ============================================================================
// Cue Definitions
// ============================================================================

/// A single NaviCue: an ordered stage list with its timing plan and gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct CueDefinition {
    /// Unique identifier within the catalog
    pub id: String,

    /// Display title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Free-form tags used for filtering
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Ordered stages; the first one is the initial stage
    #[serde(default)]
    pub stages: Vec<StageDefinition>,
}

/// One stage of a cue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct StageDefinition {
    /// Stage name, unique within the cue
    pub name: String,

    /// Whether arriving here completes the cue
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub terminal: bool,

    /// Timed transition out of this stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advance: Option<AdvanceConfig>,

    /// Gated transitions: action name -> target stage
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub gates: IndexMap<String, String>,
}

/// Timed transition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct AdvanceConfig {
    /// Delay after stage entry, in humantime syntax (`2s`, `1500ms`)
    pub after: String,

    /// Target stage; defaults to the next stage in the list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl AdvanceConfig {
    /// Parses the `after` delay.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `after` is not a valid duration.
    pub fn delay(&self) -> Result<Duration, ConfigError> {
        parse_delay(&self.after)
    }
}

/// Parses a humantime delay such as `2s` or `1500ms`.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` if the string is not a duration.
pub fn parse_delay(s: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(s.trim()).map_err(|e| ConfigError::InvalidValue {
        field: "after".to_string(),
        value: s.to_string(),
        expected: format!("a duration like '2s' or '1500ms' ({e})"),
    })
}

impl CueDefinition {
    /// Returns the title, falling back to the id.
    #[must_use]
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }

    /// Whether the stage at `index` is terminal.
    ///
    /// When no stage declares `terminal`, the last stage is terminal.
    #[must_use]
    pub fn is_terminal(&self, index: usize) -> bool {
        if self.stages.iter().any(|s| s.terminal) {
            self.stages.get(index).is_some_and(|s| s.terminal)
        } else {
            index + 1 == self.stages.len()
        }
    }

    /// Returns the index of the stage named `name`.
    #[must_use]
    pub fn stage_index(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.name == name)
    }

    /// Returns the target stage name of the timed advance at `index`.
    ///
    /// Uses `to` when given, otherwise the next stage in the list.
    #[must_use]
    pub fn advance_target(&self, index: usize) -> Option<&str> {
        let advance = self.stages.get(index)?.advance.as_ref()?;
        advance.to.as_deref().map_or_else(
            || self.stages.get(index + 1).map(|s| s.name.as_str()),
            Some,
        )
    }

    /// Stage names joined in list order, for display.
    #[must_use]
    pub fn stage_chain(&self) -> String {
        self.stages
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Sum of all parseable timed advance delays, saturating at
    /// `Duration::MAX`.
    #[must_use]
    pub fn total_timed_duration(&self) -> Duration {
        self.stages
            .iter()
            .filter_map(|s| s.advance.as_ref())
            .filter_map(|a| a.delay().ok())
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}
