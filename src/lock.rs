//! YAML lock-file codec.
//!
//! The lock file is the crate's only on-disk persistence: a prior
//! scheduling run's resolved placements for a subset of tasks, reapplied as
//! hard `start_on`/`end_on`/`resources` overrides on a later run.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::SchedulingResult;
use crate::validation::{parse_resource_entry, ValidationError};

/// Errors that can occur reading or writing a lock file.
#[derive(Error, Debug)]
pub enum LockFileError {
    #[error("missing 'version' field")]
    MissingVersion,
    #[error("unsupported lock file version: {0}")]
    UnsupportedVersion(u32),
    #[error("lock entry '{0}' missing start_date or end_date")]
    MissingDates(String),
    #[error("lock entry '{0}': {1}")]
    InvalidResourceEntry(String, ValidationError),
    #[error("failed to parse lock file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// One locked task's resolved schedule.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskLock {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub resources: Vec<(String, f64)>,
}

/// A parsed lock file: resolved schedules for tasks locked from a prior run.
#[derive(Clone, Debug, Default)]
pub struct ScheduleLock {
    pub locks: HashMap<String, TaskLock>,
}

/// On-wire representation, matching the YAML shape exactly.
#[derive(Serialize, Deserialize)]
struct LockFileWire {
    version: Option<u32>,
    #[serde(default)]
    locks: HashMap<String, LockEntryWire>,
}

#[derive(Serialize, Deserialize)]
struct LockEntryWire {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    #[serde(default)]
    resources: Vec<String>,
}

const SUPPORTED_VERSION: u32 = 1;

/// Parse a lock file's YAML text into a [`ScheduleLock`].
///
/// Unknown fields are ignored. A missing or unsupported `version` is an
/// error, as is a lock entry missing either date. Malformed resource entries
/// (a non-numeric allocation) are also errors — the lock file is either
/// fully trustworthy or rejected outright, since it is meant to pin down an
/// already-solved placement.
pub fn read_lock_file(yaml: &str) -> Result<ScheduleLock, LockFileError> {
    let wire: LockFileWire = serde_yaml::from_str(yaml)?;

    let version = wire.version.ok_or(LockFileError::MissingVersion)?;
    if version != SUPPORTED_VERSION {
        return Err(LockFileError::UnsupportedVersion(version));
    }

    let mut locks = HashMap::with_capacity(wire.locks.len());
    for (task_id, entry) in wire.locks {
        let start_date = entry
            .start_date
            .ok_or_else(|| LockFileError::MissingDates(task_id.clone()))?;
        let end_date = entry
            .end_date
            .ok_or_else(|| LockFileError::MissingDates(task_id.clone()))?;

        let mut resources = Vec::with_capacity(entry.resources.len());
        for raw in &entry.resources {
            let (name, allocation) = parse_resource_entry(&task_id, raw)
                .map_err(|e| LockFileError::InvalidResourceEntry(task_id.clone(), e))?;
            resources.push((name, allocation));
        }

        locks.insert(
            task_id,
            TaskLock {
                start_date,
                end_date,
                resources,
            },
        );
    }

    Ok(ScheduleLock { locks })
}

/// Serialize a [`SchedulingResult`]'s tasks back into the lock-file shape.
///
/// `filter` selects which scheduled tasks are written; pass `|_| true` to
/// write every task.
pub fn write_lock_file(
    result: &SchedulingResult,
    filter: impl Fn(&str) -> bool,
) -> Result<String, LockFileError> {
    let mut locks = HashMap::new();
    for task in &result.scheduled_tasks {
        if !filter(&task.task_id) {
            continue;
        }
        locks.insert(
            task.task_id.clone(),
            LockEntryWire {
                start_date: Some(task.start_date),
                end_date: Some(task.end_date),
                resources: task.resources.iter().map(|r| format!("{}:1.0", r)).collect(),
            },
        );
    }

    let wire = LockFileWire {
        version: Some(SUPPORTED_VERSION),
        locks,
    };

    serde_yaml::to_string(&wire).map_err(LockFileError::Parse)
}
