//! Mapping file discovery, decoding, and validation.
//!
//! Everything here runs before the server accepts traffic: any schema,
//! pattern, or scenario-state problem aborts startup instead of surfacing at
//! match time.

use crate::mapping::types::{Mapping, Mappings, ResponseDelay, SCENARIO_STARTED};
use crate::matching::{PatternCompileError, RegexCache, ScenarioGroup};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Errors that abort startup.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid mapping {}: {errors}", .path.display())]
    Validation {
        path: PathBuf,
        errors: ValidationErrors,
    },
    #[error("invalid mapping {}: {source}", .path.display())]
    Pattern {
        path: PathBuf,
        #[source]
        source: PatternCompileError,
    },
    #[error("scenario '{scenario}' rule in {} requires state '{state}' that no rule reaches", .path.display())]
    UnknownScenarioState {
        scenario: String,
        state: String,
        path: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    fn push(&mut self, field: &str, message: &str) {
        self.0.push(ValidationError {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

/// Everything the loader produces: the general rule set, the scenario rule
/// groups, and the regex cache populated from both.
pub struct Loaded {
    pub mappings: Mappings,
    pub scenarios: Vec<ScenarioGroup>,
    pub cache: RegexCache,
}

/// Loads mapping files from a directory tree.
#[derive(Debug, Default)]
pub struct FileLoader;

impl FileLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load every `.json` mapping under `mappings_dir`, resolving response
    /// body files against `responses_dir`.
    ///
    /// Files are visited in path order so declaration order is stable across
    /// platforms.
    pub fn load(&self, mappings_dir: &Path, responses_dir: &Path) -> Result<Loaded, LoaderError> {
        let mut files = Vec::new();
        collect_mapping_files(mappings_dir, &mut files)?;
        files.sort();

        let mut cache = RegexCache::new();
        let mut mappings: Mappings = HashMap::new();
        let mut scenarios: Vec<ScenarioGroup> = Vec::new();
        let mut rule_count = 0usize;

        for path in files {
            let mut mapping = self.decode_file(&path)?;

            let errors = validate(&mapping);
            if !errors.is_empty() {
                return Err(LoaderError::Validation { path, errors });
            }

            self.resolve_body_file(&mut mapping, responses_dir)?;
            cache
                .add_from_mapping(&mapping)
                .map_err(|source| LoaderError::Pattern {
                    path: path.clone(),
                    source,
                })?;

            normalize(&mut mapping, &path);
            rule_count += 1;

            let scenario_name = mapping.scenario.as_ref().map(|s| s.name.clone());
            let mapping = Arc::new(mapping);
            match scenario_name {
                Some(name) => match scenarios.iter_mut().find(|g| g.name == name) {
                    Some(group) => group.rules.push(mapping),
                    None => scenarios.push(ScenarioGroup {
                        name,
                        rules: vec![mapping],
                    }),
                },
                None => mappings
                    .entry(mapping.request.method.clone())
                    .or_default()
                    .push(mapping),
            }
        }

        validate_scenario_states(&scenarios)?;

        info!(
            rules = rule_count,
            scenarios = scenarios.len(),
            patterns = cache.len(),
            "mappings loaded"
        );
        Ok(Loaded {
            mappings,
            scenarios,
            cache,
        })
    }

    fn decode_file(&self, path: &Path) -> Result<Mapping, LoaderError> {
        if !path.is_file() {
            return Err(LoaderError::FileNotFound(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path).map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| LoaderError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read the referenced body file into the mapping. The file only fills
    /// `body` when no inline body was given; the inline body wins otherwise.
    fn resolve_body_file(
        &self,
        mapping: &mut Mapping,
        responses_dir: &Path,
    ) -> Result<(), LoaderError> {
        let Some(file) = &mapping.response.body_file else {
            return Ok(());
        };
        let path = responses_dir.join(file);
        if !path.is_file() {
            return Err(LoaderError::FileNotFound(path));
        }
        let content = fs::read_to_string(&path).map_err(|source| LoaderError::Io {
            path,
            source,
        })?;
        if mapping.response.body.as_deref().unwrap_or("").is_empty() {
            mapping.response.body = Some(content);
        }
        Ok(())
    }
}

/// Upper-case the method, lower-case header names, and stamp the source file.
fn normalize(mapping: &mut Mapping, path: &Path) {
    mapping.request.method = mapping.request.method.to_uppercase();
    let headers = std::mem::take(&mut mapping.request.headers);
    mapping.request.headers = headers
        .into_iter()
        .map(|(name, criterion)| (name.to_lowercase(), criterion))
        .collect();
    mapping.file_path = path.display().to_string();
}

fn validate(mapping: &Mapping) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    let request = &mapping.request;

    if request.method.trim().is_empty() {
        errors.push("request.method", "method is required");
    }

    if request.path.exact.is_some() && !request.path.pattern.is_empty() {
        errors.push("request.path", "exact and pattern are mutually exclusive");
    }
    for (name, criterion) in &request.headers {
        if criterion.exact.is_some() && !criterion.pattern.is_empty() {
            errors.push(
                &format!("request.headers.{name}"),
                "exact and pattern are mutually exclusive",
            );
        }
    }
    if request.body.exact.is_some() && !request.body.pattern.is_empty() {
        errors.push("request.body", "exact and pattern are mutually exclusive");
    }

    if !(100..=599).contains(&mapping.response.status_code) {
        errors.push("response.statusCode", "status code out of range");
    }
    if let Some(ResponseDelay::Range { min_ms, max_ms }) = &mapping.response.delay {
        if min_ms > max_ms {
            errors.push("response.delay", "min must not exceed max");
        }
    }

    if let Some(scenario) = &mapping.scenario {
        if scenario.name.trim().is_empty() {
            errors.push("scenario.name", "scenario name is required");
        }
        if scenario.required_state.trim().is_empty() {
            errors.push("scenario.requiredState", "required state is required");
        }
    }

    errors
}

/// Every required state must be `Started` or declared as some rule's new
/// state within the same scenario; anything else can never become current.
fn validate_scenario_states(scenarios: &[ScenarioGroup]) -> Result<(), LoaderError> {
    for group in scenarios {
        let reachable: HashSet<&str> = std::iter::once(SCENARIO_STARTED)
            .chain(
                group
                    .rules
                    .iter()
                    .filter_map(|m| m.scenario.as_ref())
                    .filter_map(|s| s.new_state.as_deref()),
            )
            .collect();

        for rule in &group.rules {
            let Some(scenario) = &rule.scenario else {
                continue;
            };
            if !reachable.contains(scenario.required_state.as_str()) {
                return Err(LoaderError::UnknownScenarioState {
                    scenario: group.name.clone(),
                    state: scenario.required_state.clone(),
                    path: PathBuf::from(&rule.file_path),
                });
            }
        }
    }
    Ok(())
}

fn collect_mapping_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), LoaderError> {
    if !dir.is_dir() {
        return Err(LoaderError::FileNotFound(dir.to_path_buf()));
    }
    let entries = fs::read_dir(dir).map_err(|source| LoaderError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| LoaderError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_mapping_files(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    Ok(())
}
