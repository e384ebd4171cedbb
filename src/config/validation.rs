//! Cue catalog validation
//!
//! Semantic checks on a deserialized [`CatalogConfig`]. Validation
//! collects every issue instead of stopping at the first one, so a single
//! `navicue cue validate` run reports everything wrong with a file.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use crate::config::loader::ConfigLimits;
use crate::config::schema::{CatalogConfig, CueDefinition, parse_delay};
use crate::error::{Severity, ValidationIssue};

/// Combined timed duration above which a cue is reported as too slow.
pub const MAX_COMFORTABLE_DURATION: Duration = Duration::from_secs(16);

/// Longest single timed advance a catalog may declare.
pub const MAX_DELAY: Duration = Duration::from_secs(60 * 60);

// ============================================================================
// Public API
// ============================================================================

/// Result of catalog validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Catalog validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a catalog and returns every error and warning found.
    pub fn validate(&mut self, config: &CatalogConfig, limits: &ConfigLimits) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        if config.cues.is_empty() {
            self.add_error("cues", "Catalog must define at least one cue");
        }

        let mut seen_ids = HashSet::new();
        for (i, cue) in config.cues.iter().enumerate() {
            let path = format!("cues[{i}]");
            if cue.id.trim().is_empty() {
                self.add_error(&format!("{path}.id"), "Cue id cannot be empty");
            } else if !seen_ids.insert(cue.id.as_str()) {
                self.add_error(
                    &format!("{path}.id"),
                    &format!("Duplicate cue id '{}'", cue.id),
                );
            }
            self.validate_cue(cue, &path);
        }

        self.validate_limits(config, limits);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Cue Validation
    // ========================================================================

    fn validate_cue(&mut self, cue: &CueDefinition, path: &str) {
        if cue.stages.is_empty() {
            self.add_error(
                &format!("{path}.stages"),
                &format!("Cue '{}' has no stages", cue.id),
            );
            return;
        }

        let names: Vec<&str> = cue.stages.iter().map(|s| s.name.as_str()).collect();
        let mut seen = HashSet::new();
        for (i, name) in names.iter().enumerate() {
            let stage_path = format!("{path}.stages[{i}].name");
            if name.trim().is_empty() {
                self.add_error(&stage_path, "Stage name cannot be empty");
            } else if !seen.insert(*name) {
                self.add_error(&stage_path, &format!("Duplicate stage name '{name}'"));
            }
        }

        let terminals: Vec<&str> = cue
            .stages
            .iter()
            .filter(|s| s.terminal)
            .map(|s| s.name.as_str())
            .collect();
        if terminals.len() > 1 {
            self.add_error(
                &format!("{path}.stages"),
                &format!(
                    "Cue must have exactly one terminal stage, found {}: {}",
                    terminals.len(),
                    terminals.join(", ")
                ),
            );
        }

        for (i, stage) in cue.stages.iter().enumerate() {
            let stage_path = format!("{path}.stages[{i}]");
            let terminal = cue.is_terminal(i);

            if let Some(advance) = &stage.advance {
                let advance_path = format!("{stage_path}.advance");
                match parse_delay(&advance.after) {
                    Ok(delay) if delay > MAX_DELAY => self.add_error(
                        &format!("{advance_path}.after"),
                        &format!(
                            "Delay '{}' exceeds the maximum of {}",
                            advance.after.trim(),
                            humantime::format_duration(MAX_DELAY)
                        ),
                    ),
                    Ok(_) => {}
                    Err(e) => self.add_error(&format!("{advance_path}.after"), &e.to_string()),
                }
                if terminal {
                    self.add_error(
                        &advance_path,
                        &format!(
                            "Terminal stage '{}' cannot have a timed advance",
                            stage.name
                        ),
                    );
                }
                match &advance.to {
                    Some(target) => self.check_target(target, &names, &format!("{advance_path}.to")),
                    None if i + 1 == cue.stages.len() => self.add_error(
                        &advance_path,
                        &format!(
                            "Stage '{}' is the last stage; its advance needs an explicit 'to'",
                            stage.name
                        ),
                    ),
                    None => {}
                }
            }

            for (action, target) in &stage.gates {
                let gate_path = format!("{stage_path}.gates.{action}");
                if action.trim().is_empty() {
                    self.add_error(&gate_path, "Gate action name cannot be empty");
                }
                self.check_target(target, &names, &gate_path);
            }

            if terminal && !stage.gates.is_empty() {
                self.add_warning(
                    &format!("{stage_path}.gates"),
                    &format!(
                        "Gates on terminal stage '{}' only apply after the cue has completed",
                        stage.name
                    ),
                );
            }

            if !terminal && stage.advance.is_none() && stage.gates.is_empty() {
                self.add_warning(
                    &stage_path,
                    &format!(
                        "Stage '{}' has no advance and no gates; the cue can get stuck here",
                        stage.name
                    ),
                );
            }
        }

        self.validate_reachability(cue, path);

        let total = cue.total_timed_duration();
        if total > MAX_COMFORTABLE_DURATION {
            self.add_warning(
                &format!("{path}.stages"),
                &format!(
                    "Timed advances add up to {} (recommended: at most {})",
                    humantime::format_duration(total),
                    humantime::format_duration(MAX_COMFORTABLE_DURATION)
                ),
            );
        }
    }

    /// Checks that `target` names a stage of the cue.
    fn check_target(&mut self, target: &str, names: &[&str], path: &str) {
        if names.contains(&target) {
            return;
        }
        let message = suggest(target, names.iter().copied()).map_or_else(
            || format!("Unknown stage '{target}'"),
            |hint| format!("Unknown stage '{target}'. Did you mean '{hint}'?"),
        );
        self.add_error(path, &message);
    }

    /// Warns about stages no transition leads to from the initial stage.
    fn validate_reachability(&mut self, cue: &CueDefinition, path: &str) {
        let index: HashMap<&str, usize> = cue
            .stages
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.as_str(), i))
            .collect();

        let mut reached = vec![false; cue.stages.len()];
        let mut queue = VecDeque::from([0]);
        reached[0] = true;
        while let Some(i) = queue.pop_front() {
            let stage = &cue.stages[i];
            let timed = cue.advance_target(i);
            let gated = stage.gates.values().map(String::as_str);
            for target in timed.into_iter().chain(gated) {
                if let Some(&j) = index.get(target) {
                    if !reached[j] {
                        reached[j] = true;
                        queue.push_back(j);
                    }
                }
            }
        }

        for (i, stage) in cue.stages.iter().enumerate() {
            if !reached[i] {
                self.add_warning(
                    &format!("{path}.stages[{i}]"),
                    &format!(
                        "Stage '{}' is unreachable from '{}'",
                        stage.name, cue.stages[0].name
                    ),
                );
            }
        }
    }

    /// Validates configuration against size limits.
    fn validate_limits(&mut self, config: &CatalogConfig, limits: &ConfigLimits) {
        if config.cues.len() > limits.max_cues {
            self.add_error(
                "cues",
                &format!(
                    "Too many cues: {} (maximum: {}). \
                     Set NAVICUE_MAX_CUES to increase the limit.",
                    config.cues.len(),
                    limits.max_cues
                ),
            );
        }

        for (i, cue) in config.cues.iter().enumerate() {
            if cue.stages.len() > limits.max_stages {
                self.add_error(
                    &format!("cues[{i}].stages"),
                    &format!(
                        "Too many stages: {} (maximum: {}). \
                         Set NAVICUE_MAX_STAGES to increase the limit.",
                        cue.stages.len(),
                        limits.max_stages
                    ),
                );
            }
        }
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

/// Suggests the closest candidate for a mistyped name.
///
/// Returns the closest match if its Damerau-Levenshtein distance is at most 3.
#[must_use]
pub fn suggest<'a>(input: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    candidates
        .into_iter()
        .map(|c| (c, strsim::damerau_levenshtein(input, c)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(name, _)| name)
}
