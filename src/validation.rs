//! Input validation: effort grammar, dependency-spec grammar, and
//! resource-spec group references.
//!
//! Raw roadmap input arrives with string-encoded effort and dependency
//! fields (`"3d"`, `"design + 1w"`); this module turns that into the typed
//! [`Task`] records the rest of the crate operates on, failing fast on
//! malformed input rather than letting a bad value silently propagate into
//! the scheduler.

use chrono::NaiveDate;
use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::log_changes;
use crate::models::{Dependency, Task};
use crate::scheduler::ResourceConfig;

/// Errors detected while validating raw roadmap input.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("task '{0}': dependency spec '{1}' has more than one '+' separator")]
    MalformedDependencySpec(String, String),
    #[error("task '{0}': depends on undefined task '{1}'")]
    UndefinedDependency(String, String),
    #[error("task '{0}': resource_spec '{1}' references undefined group '{2}'")]
    UndefinedResourceGroup(String, String, String),
    #[error("task '{0}': resource entry '{1}' has a non-numeric allocation")]
    InvalidResourceAllocation(String, String),
    #[error("duplicate task id '{0}'")]
    DuplicateTaskId(String),
}

/// Raw, string-encoded task input as it arrives from a document or CLI layer,
/// before the effort and dependency-spec grammars have been parsed.
#[derive(Clone, Debug)]
pub struct RawTaskSpec {
    pub id: String,
    /// Effort grammar string, e.g. `"3d"`, `"2w"`, `"L"`.
    pub effort: String,
    /// Dependency-spec strings, e.g. `"design + 1w"`.
    pub dependencies: Vec<String>,
    /// Explicit resource entries, e.g. `"alice:1.0"` (allocation optional, defaults to 1.0).
    pub resources: Vec<String>,
    pub resource_spec: Option<String>,
    pub start_after: Option<NaiveDate>,
    pub end_before: Option<NaiveDate>,
    pub start_on: Option<NaiveDate>,
    pub end_on: Option<NaiveDate>,
    pub priority: Option<i32>,
}

/// Parse an effort-grammar string into a number of work days.
///
/// Grammar: an optional decimal number followed by a unit letter (`d`, `w`,
/// `m`), or the bare letter `L`/`l` (fixed at 60 days, no number allowed).
/// Anything else falls back to 7 days with a logged warning.
pub fn parse_effort(raw: &str, verbosity: u8) -> f64 {
    let trimmed = raw.trim();

    if trimmed.eq_ignore_ascii_case("l") {
        return 60.0;
    }

    if let Some(unit) = trimmed.chars().last() {
        let unit_lower = unit.to_ascii_lowercase();
        if matches!(unit_lower, 'd' | 'w' | 'm') {
            let number_part = &trimmed[..trimmed.len() - unit.len_utf8()];
            if let Ok(n) = number_part.trim().parse::<f64>() {
                return match unit_lower {
                    'd' => n,
                    'w' => n * 7.0,
                    'm' => n * 30.0,
                    _ => unreachable!(),
                };
            }
        }
    }

    log_changes!(verbosity, "  Could not parse effort '{}', defaulting to 7 days", raw);
    7.0
}

/// Parse a dependency-spec string into a predecessor id and lag in days.
///
/// Grammar: `"predecessor_id"` (lag 0) or `"predecessor_id + <effort>"`.
pub fn parse_dependency_spec(
    task_id: &str,
    raw: &str,
    verbosity: u8,
) -> Result<Dependency, ValidationError> {
    let parts: Vec<&str> = raw.split('+').collect();
    match parts.as_slice() {
        [predecessor] => Ok(Dependency::new(predecessor.trim().to_string(), 0.0)),
        [predecessor, effort] => {
            let lag_days = parse_effort(effort, verbosity);
            Ok(Dependency::new(predecessor.trim().to_string(), lag_days))
        }
        _ => Err(ValidationError::MalformedDependencySpec(
            task_id.to_string(),
            raw.to_string(),
        )),
    }
}

/// Parse a single explicit resource entry (`"name"` or `"name:allocation"`).
pub fn parse_resource_entry(
    task_id: &str,
    raw: &str,
) -> Result<(String, f64), ValidationError> {
    match raw.split_once(':') {
        Some((name, allocation)) => {
            let allocation: f64 = allocation.trim().parse().map_err(|_| {
                ValidationError::InvalidResourceAllocation(task_id.to_string(), raw.to_string())
            })?;
            Ok((name.trim().to_string(), allocation))
        }
        None => Ok((raw.trim().to_string(), 1.0)),
    }
}

/// Validate a `resource_spec` string's group references against the
/// configured registry.
///
/// The `"*"` wildcard and `"!name"` exclusions are always valid. Any other
/// `|`-separated part is checked against the registry's known resources and
/// group aliases; a part matching neither is an undefined-group error. Bare
/// resource names not yet declared in `resource_order` are rejected the same
/// way, since an undeclared name can never be expanded to a concrete
/// resource.
pub fn validate_resource_spec(
    task_id: &str,
    spec: &str,
    config: &ResourceConfig,
) -> Result<(), ValidationError> {
    for part in spec.split('|').map(|s| s.trim()) {
        let name = part.strip_prefix('!').unwrap_or(part);
        if name.is_empty() || name == "*" {
            continue;
        }
        let known = config.resource_order.iter().any(|r| r == name)
            || config.spec_expansion.contains_key(name);
        if !known {
            return Err(ValidationError::UndefinedResourceGroup(
                task_id.to_string(),
                spec.to_string(),
                name.to_string(),
            ));
        }
    }
    Ok(())
}

/// Validate and parse a full roadmap's raw task specs into typed [`Task`]
/// records.
///
/// Fails fast on the first input-shape or graph error: a malformed effort or
/// dependency-spec string, a dependency on an undefined task, or a
/// `resource_spec` referencing an undefined group.
pub fn validate_roadmap(
    raw_tasks: &[RawTaskSpec],
    resource_config: &ResourceConfig,
    verbosity: u8,
) -> Result<Vec<Task>, ValidationError> {
    let mut seen_ids: FxHashSet<String> = FxHashSet::default();
    for raw in raw_tasks {
        if !seen_ids.insert(raw.id.clone()) {
            return Err(ValidationError::DuplicateTaskId(raw.id.clone()));
        }
    }

    let mut tasks = Vec::with_capacity(raw_tasks.len());
    for raw in raw_tasks {
        let duration_days = parse_effort(&raw.effort, verbosity);

        let mut dependencies = Vec::with_capacity(raw.dependencies.len());
        for dep_spec in &raw.dependencies {
            let dep = parse_dependency_spec(&raw.id, dep_spec, verbosity)?;
            if !seen_ids.contains(&dep.entity_id) {
                return Err(ValidationError::UndefinedDependency(
                    raw.id.clone(),
                    dep.entity_id.clone(),
                ));
            }
            dependencies.push(dep);
        }

        let mut resources = Vec::with_capacity(raw.resources.len());
        for entry in &raw.resources {
            resources.push(parse_resource_entry(&raw.id, entry)?);
        }

        if let Some(spec) = &raw.resource_spec {
            validate_resource_spec(&raw.id, spec, resource_config)?;
        }

        let mut task = Task {
            id: raw.id.clone(),
            duration_days,
            resources,
            dependencies,
            start_after: raw.start_after,
            end_before: raw.end_before,
            start_on: raw.start_on,
            end_on: raw.end_on,
            resource_spec: raw.resource_spec.clone(),
            priority: raw.priority,
        };
        task.assign_unassigned_if_needed();
        tasks.push(task);
    }

    Ok(tasks)
}
