//! Command Center catalog
//!
//! A cursor over the loaded cues, used by the dashboard to step through
//! cards one at a time.

use std::sync::Arc;

use crate::config::{CatalogConfig, CueDefinition, suggest};
use crate::error::NaviCueError;

/// Cursor over the cues of a loaded catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    config: Arc<CatalogConfig>,
    cursor: usize,
}

impl Catalog {
    /// Wraps a loaded catalog with the cursor on the first cue.
    #[must_use]
    pub const fn from_config(config: Arc<CatalogConfig>) -> Self {
        Self { config, cursor: 0 }
    }

    /// Display name of the catalog.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.config.catalog.name.as_deref()
    }

    /// Cue under the cursor, or `None` for an empty catalog.
    #[must_use]
    pub fn current(&self) -> Option<&CueDefinition> {
        self.config.cues.get(self.cursor)
    }

    /// Index of the cue under the cursor.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.cursor
    }

    /// Moves to the next cue. Returns `false` at the last cue.
    pub fn advance(&mut self) -> bool {
        if self.cursor + 1 < self.config.cues.len() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    /// Moves to the previous cue. Returns `false` at the first cue.
    pub fn retreat(&mut self) -> bool {
        if self.cursor > 0 {
            self.cursor -= 1;
            true
        } else {
            false
        }
    }

    /// Moves the cursor to the cue with `id`.
    ///
    /// # Errors
    ///
    /// Returns `NaviCueError::Usage` naming the closest known id when
    /// `id` is not in the catalog. The cursor does not move.
    pub fn select(&mut self, id: &str) -> Result<&CueDefinition, NaviCueError> {
        let Some(index) = self.config.cues.iter().position(|c| c.id == id) else {
            return Err(self.unknown(id));
        };
        self.cursor = index;
        Ok(&self.config.cues[index])
    }

    /// Looks up a cue by id without moving the cursor.
    ///
    /// # Errors
    ///
    /// Returns `NaviCueError::Usage` when `id` is not in the catalog.
    pub fn get(&self, id: &str) -> Result<&CueDefinition, NaviCueError> {
        self.config
            .cues
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| self.unknown(id))
    }

    /// Number of cues.
    #[must_use]
    pub fn len(&self) -> usize {
        self.config.cues.len()
    }

    /// Whether the catalog has no cues.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.config.cues.is_empty()
    }

    /// Iterates the cues in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &CueDefinition> {
        self.config.cues.iter()
    }

    fn unknown(&self, id: &str) -> NaviCueError {
        let ids = self.config.cues.iter().map(|c| c.id.as_str());
        let message = suggest(id, ids).map_or_else(
            || format!("unknown cue '{id}'"),
            |hint| format!("unknown cue '{id}'. Did you mean '{hint}'?"),
        );
        NaviCueError::Usage(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        let config: CatalogConfig = serde_yaml::from_str(
            r"
catalog: { name: Command Center }
cues:
  - id: boundary-breath
    stages: [{ name: done }]
  - id: gentle-pause
    stages: [{ name: done }]
  - id: soft-landing
    stages: [{ name: done }]
",
        )
        .unwrap();
        Catalog::from_config(Arc::new(config))
    }

    #[test]
    fn test_cursor_saturates_at_ends() {
        let mut catalog = catalog();
        assert_eq!(catalog.name(), Some("Command Center"));
        assert_eq!(catalog.current().unwrap().id, "boundary-breath");
        assert!(!catalog.retreat());

        assert!(catalog.advance());
        assert!(catalog.advance());
        assert_eq!(catalog.position(), 2);
        assert!(!catalog.advance());
        assert_eq!(catalog.current().unwrap().id, "soft-landing");

        assert!(catalog.retreat());
        assert_eq!(catalog.current().unwrap().id, "gentle-pause");
    }

    #[test]
    fn test_select() {
        let mut catalog = catalog();
        assert_eq!(catalog.select("soft-landing").unwrap().id, "soft-landing");
        assert_eq!(catalog.position(), 2);
    }

    #[test]
    fn test_select_unknown_suggests() {
        let mut catalog = catalog();
        let err = catalog.select("gentle-paus").unwrap_err();
        assert!(err.to_string().contains("Did you mean 'gentle-pause'?"));
        assert_eq!(catalog.position(), 0);

        let err = catalog.get("zzz").unwrap_err();
        assert_eq!(err.to_string(), "usage error: unknown cue 'zzz'");
    }

    #[test]
    fn test_empty_catalog() {
        let mut catalog = Catalog::from_config(Arc::new(CatalogConfig {
            catalog: crate::config::CatalogMetadata::default(),
            cues: vec![],
        }));
        assert!(catalog.is_empty());
        assert!(catalog.current().is_none());
        assert!(!catalog.advance());
        assert!(!catalog.retreat());
    }

    #[test]
    fn test_iter_in_order() {
        let ids: Vec<_> = catalog().iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, ["boundary-breath", "gentle-pause", "soft-landing"]);
        assert_eq!(catalog().len(), 3);
    }
}
