//! Cue catalog loader
//!
//! Loading pipeline:
//! 1. Size check against [`ConfigLimits::max_config_size`]
//! 2. Read, strip a UTF-8 BOM, reject empty files
//! 3. YAML parsing into [`CatalogConfig`]
//! 4. Validation
//! 5. Freeze with `Arc`

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::config::schema::CatalogConfig;
use crate::config::validation::Validator;
use crate::error::ConfigError;

// ============================================================================
// Public API
// ============================================================================

/// Options for the catalog loader.
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    /// Limits for catalog size.
    pub config_limits: ConfigLimits,
}

/// Limits on catalog size to keep a bad file from exhausting resources.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum number of cues in one catalog.
    pub max_cues: usize,

    /// Maximum number of stages in one cue.
    pub max_stages: usize,

    /// Maximum catalog file size in bytes.
    pub max_config_size: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_cues: env_or("NAVICUE_MAX_CUES", 500),
            max_stages: env_or("NAVICUE_MAX_STAGES", 32),
            max_config_size: env_or("NAVICUE_MAX_CONFIG_SIZE", 1024 * 1024),
        }
    }
}

/// Result of loading a catalog file.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated catalog.
    pub config: Arc<CatalogConfig>,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during catalog loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} at {location}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Catalog loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: LoaderOptions,
}

impl ConfigLoader {
    /// Creates a loader with the given options.
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Creates a loader with default options.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(LoaderOptions::default())
    }

    /// Loads, validates, and freezes a catalog file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read or exceeds the size limit
    /// - The file is empty
    /// - YAML parsing fails
    /// - Validation reports errors
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let limit = self.options.config_limits.max_config_size;
        if usize::try_from(metadata.len()).map_or(true, |size| size > limit) {
            return Err(ConfigError::TooLarge {
                path: path.to_path_buf(),
                size: metadata.len(),
                limit,
            });
        }

        let bytes = std::fs::read(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        let content = String::from_utf8(bytes).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            line: None,
            message: format!("file is not valid UTF-8: {e}"),
        })?;

        self.load_str(&content, path)
    }

    /// Parses and validates catalog text; `origin` is used in messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is empty, fails to parse, or fails
    /// validation.
    pub fn load_str(&self, content: &str, origin: &Path) -> Result<LoadResult, ConfigError> {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        if content.trim().is_empty() {
            return Err(ConfigError::EmptyFile {
                path: origin.to_path_buf(),
            });
        }

        let config: CatalogConfig =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
                path: origin.to_path_buf(),
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;

        let mut validator = Validator::new();
        let result = validator.validate(&config, &self.options.config_limits);
        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: origin.display().to_string(),
                errors: result.errors,
            });
        }

        let warnings: Vec<LoadWarning> = result
            .warnings
            .into_iter()
            .map(|issue| LoadWarning {
                message: issue.message,
                location: Some(issue.path),
            })
            .collect();
        debug!(
            file = %origin.display(),
            cues = config.cues.len(),
            warnings = warnings.len(),
            "catalog loaded"
        );

        Ok(LoadResult {
            config: Arc::new(config),
            warnings,
        })
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
