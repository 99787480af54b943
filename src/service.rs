//! Scheduling Service: the single entry point that turns raw roadmap input
//! into a [`SchedulingResult`].
//!
//! The Service owns the full pipeline — validate, apply a prior lock file,
//! run the backward pass, dispatch to the chosen algorithm, then merge
//! everything into one result with per-task annotations. Each stage's error
//! type feeds [`ServiceError`] through `#[from]`, so callers only ever match
//! on one error enum regardless of which stage failed.

use std::collections::HashMap;

use chrono::NaiveDate;
use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::backward_pass::{backward_pass, BackwardPassConfig, BackwardPassError};
use crate::config::SchedulingConfig;
use crate::cpsat::{CpSatConfig, CpSatError, CpSatScheduler};
use crate::critical_path::{CriticalPathConfig, CriticalPathScheduler, CriticalPathSchedulerError};
use crate::lock::{LockFileError, ScheduleLock};
use crate::models::{AlgorithmResult, ScheduleAnnotations, SchedulingResult, Task};
use crate::scheduler::{ParallelScheduler, ResourceConfig, SchedulerError};
use crate::validation::{validate_roadmap, RawTaskSpec, ValidationError};
use crate::{log_changes, log_checks};

/// Errors from any stage of the Service's pipeline.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("lock file error: {0}")]
    LockFile(#[from] LockFileError),
    #[error("backward pass failed: {0}")]
    BackwardPass(#[from] BackwardPassError),
    #[error("parallel scheduler failed: {0}")]
    Scheduler(#[from] SchedulerError),
    #[error("critical path scheduler failed: {0}")]
    CriticalPath(#[from] CriticalPathSchedulerError),
    #[error("bounded search failed: {0}")]
    CpSat(#[from] CpSatError),
    #[error("task '{0}' is locked to dates that conflict with its dependencies")]
    LockConflict(String),
}

/// Which scheduling algorithm the Service should dispatch to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulingAlgorithm {
    /// Greedy Parallel SGS, no rollout.
    ParallelSgs,
    /// Greedy Parallel SGS with bounded rollout simulation for contested resources.
    BoundedRollout,
    /// Critical-path scheduling with unified task scoring.
    CriticalPath,
    /// Bounded interval-constraint search seeded by the greedy pass.
    CpSat,
}

/// Aggregate configuration for a single scheduling run.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub algorithm: SchedulingAlgorithm,
    pub scheduling: SchedulingConfig,
    pub rollout: crate::config::RolloutConfig,
    pub critical_path: CriticalPathConfig,
    pub cpsat: CpSatConfig,
    pub resource_config: Option<ResourceConfig>,
    pub global_dns_periods: Vec<(NaiveDate, NaiveDate)>,
    pub verbosity: u8,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            algorithm: SchedulingAlgorithm::ParallelSgs,
            scheduling: SchedulingConfig::default(),
            rollout: crate::config::RolloutConfig::default(),
            critical_path: CriticalPathConfig::default(),
            cpsat: CpSatConfig::default(),
            resource_config: None,
            global_dns_periods: Vec::new(),
            verbosity: 0,
        }
    }
}

/// The Scheduling Service: validate, lock, backward-pass, dispatch, merge.
pub struct SchedulingService {
    config: SchedulerConfig,
}

impl SchedulingService {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline for one scheduling request.
    ///
    /// `lock` entries pin a task's `start_date`/`end_date`/`resources` as
    /// hard overrides, bypassing the algorithm entirely for that task; the
    /// produced annotation for a locked task carries `was_fixed = true`.
    pub fn run(
        &self,
        raw_tasks: &[RawTaskSpec],
        current_date: NaiveDate,
        completed_task_ids: FxHashSet<String>,
        lock: Option<&ScheduleLock>,
    ) -> Result<SchedulingResult, ServiceError> {
        let resource_config = self.config.resource_config.clone().unwrap_or_default();

        log_changes!(self.config.verbosity, "  Validating {} raw task specs", raw_tasks.len());
        let mut tasks = validate_roadmap(raw_tasks, &resource_config, self.config.verbosity)?;

        let mut warnings = Vec::new();
        if let Some(lock) = lock {
            self.apply_lock(&mut tasks, lock, &mut warnings)?;
            let known_ids: FxHashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
            for task_id in lock.locks.keys() {
                if !known_ids.contains(task_id.as_str()) {
                    warnings.push(format!(
                        "lock entry '{}' does not match any task in this run, dropped",
                        task_id
                    ));
                }
            }
        }

        let bp_config = BackwardPassConfig {
            default_priority: self.config.scheduling.default_priority,
        };
        log_checks!(self.config.verbosity, "  Running backward pass over {} tasks", tasks.len());
        let bp_result = backward_pass(&tasks, &completed_task_ids, &bp_config)?;

        let mut algorithm_result = self.dispatch(&tasks, current_date, completed_task_ids.clone(), &bp_result)?;
        algorithm_result
            .scheduled_tasks
            .sort_by(|a, b| a.start_date.cmp(&b.start_date).then_with(|| a.task_id.cmp(&b.task_id)));

        let annotations = self.build_annotations(&tasks, &algorithm_result, &bp_result, lock);

        Ok(SchedulingResult {
            scheduled_tasks: algorithm_result.scheduled_tasks,
            annotations,
            warnings,
            algorithm_metadata: algorithm_result.algorithm_metadata,
        })
    }

    /// Overwrite each locked task's date/resource fields with the lock file's
    /// resolved placement, so the algorithm treats it as already fixed.
    fn apply_lock(
        &self,
        tasks: &mut [Task],
        lock: &ScheduleLock,
        warnings: &mut Vec<String>,
    ) -> Result<(), ServiceError> {
        for task in tasks.iter_mut() {
            let Some(entry) = lock.locks.get(&task.id) else {
                continue;
            };
            if let Some(start_after) = task.start_after {
                if entry.start_date < start_after {
                    return Err(ServiceError::LockConflict(task.id.clone()));
                }
            }
            task.start_on = Some(entry.start_date);
            task.end_on = Some(entry.end_date);
            if !entry.resources.is_empty() {
                task.resources = entry.resources.clone();
            }
            log_changes!(
                self.config.verbosity,
                "  Locked '{}' to {} - {}",
                task.id,
                entry.start_date,
                entry.end_date
            );
            warnings.push(format!("task '{}' fixed from lock file", task.id));
        }
        Ok(())
    }

    fn dispatch(
        &self,
        tasks: &[Task],
        current_date: NaiveDate,
        completed_task_ids: FxHashSet<String>,
        bp_result: &crate::backward_pass::BackwardPassResult,
    ) -> Result<AlgorithmResult, ServiceError> {
        match self.config.algorithm {
            SchedulingAlgorithm::ParallelSgs => {
                let mut scheduler = ParallelScheduler::new(
                    tasks.to_vec(),
                    current_date,
                    completed_task_ids,
                    self.config.scheduling.clone(),
                    None,
                    self.config.resource_config.clone(),
                    self.config.global_dns_periods.clone(),
                    Some(bp_result.computed_deadlines.clone()),
                    Some(bp_result.computed_priorities.clone()),
                )?;
                Ok(scheduler.schedule()?)
            }
            SchedulingAlgorithm::BoundedRollout => {
                let mut scheduler = ParallelScheduler::new(
                    tasks.to_vec(),
                    current_date,
                    completed_task_ids,
                    self.config.scheduling.clone(),
                    Some(self.config.rollout.clone()),
                    self.config.resource_config.clone(),
                    self.config.global_dns_periods.clone(),
                    Some(bp_result.computed_deadlines.clone()),
                    Some(bp_result.computed_priorities.clone()),
                )?;
                Ok(scheduler.schedule()?)
            }
            SchedulingAlgorithm::CriticalPath => {
                let adjusted_tasks = self.fold_backward_pass_into_tasks(tasks, bp_result);
                let mut scheduler = CriticalPathScheduler::new(
                    adjusted_tasks,
                    current_date,
                    completed_task_ids,
                    self.config.scheduling.default_priority,
                    self.config.critical_path.clone(),
                    self.config.resource_config.clone(),
                    self.config.global_dns_periods.clone(),
                );
                Ok(scheduler.schedule()?)
            }
            SchedulingAlgorithm::CpSat => {
                let mut scheduler = CpSatScheduler::new(
                    tasks.to_vec(),
                    current_date,
                    completed_task_ids,
                    self.config.scheduling.default_priority,
                    self.config.cpsat.clone(),
                    self.config.resource_config.clone(),
                    self.config.global_dns_periods.clone(),
                );
                Ok(scheduler.schedule()?)
            }
        }
    }

    /// `CriticalPathScheduler` reads `end_before`/`priority` straight off each
    /// `Task` rather than accepting precomputed maps, so the propagated
    /// backward-pass values have to be folded back into a cloned task list
    /// before it runs.
    fn fold_backward_pass_into_tasks(
        &self,
        tasks: &[Task],
        bp_result: &crate::backward_pass::BackwardPassResult,
    ) -> Vec<Task> {
        tasks
            .iter()
            .cloned()
            .map(|mut task| {
                if let Some(&deadline) = bp_result.computed_deadlines.get(&task.id) {
                    task.end_before = Some(deadline);
                }
                if let Some(&priority) = bp_result.computed_priorities.get(&task.id) {
                    task.priority = Some(priority);
                }
                task
            })
            .collect()
    }

    fn build_annotations(
        &self,
        tasks: &[Task],
        algorithm_result: &AlgorithmResult,
        bp_result: &crate::backward_pass::BackwardPassResult,
        lock: Option<&ScheduleLock>,
    ) -> HashMap<String, ScheduleAnnotations> {
        let mut annotations = HashMap::with_capacity(algorithm_result.scheduled_tasks.len());
        for scheduled in &algorithm_result.scheduled_tasks {
            let task = tasks.iter().find(|t| t.id == scheduled.task_id);
            let computed_deadline = bp_result.computed_deadlines.get(&scheduled.task_id).copied();
            let computed_priority = bp_result
                .computed_priorities
                .get(&scheduled.task_id)
                .copied()
                .unwrap_or(self.config.scheduling.default_priority);
            let deadline_violated = computed_deadline
                .map(|deadline| scheduled.end_date > deadline)
                .unwrap_or(false);
            let was_fixed = lock
                .map(|l| l.locks.contains_key(&scheduled.task_id))
                .unwrap_or(false)
                || task
                    .map(|t| t.start_on.is_some() || t.end_on.is_some())
                    .unwrap_or(false);
            let resources_were_computed = task
                .map(|t| t.resource_spec.is_some() || t.resources.is_empty())
                .unwrap_or(true);

            annotations.insert(
                scheduled.task_id.clone(),
                ScheduleAnnotations {
                    estimated_start: scheduled.start_date,
                    estimated_end: scheduled.end_date,
                    computed_deadline,
                    computed_priority,
                    deadline_violated,
                    resource_assignments: scheduled
                        .resources
                        .iter()
                        .map(|r| (r.clone(), 1.0))
                        .collect(),
                    resources_were_computed,
                    was_fixed,
                },
            );
        }
        annotations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::TaskLock;

    fn spec(id: &str, effort: &str, deps: Vec<&str>) -> RawTaskSpec {
        RawTaskSpec {
            id: id.to_string(),
            effort: effort.to_string(),
            dependencies: deps.into_iter().map(|s| s.to_string()).collect(),
            resources: vec!["alice".to_string()],
            resource_spec: None,
            start_after: None,
            end_before: None,
            start_on: None,
            end_on: None,
            priority: None,
        }
    }

    fn resource_config() -> ResourceConfig {
        ResourceConfig {
            resource_order: vec!["alice".to_string(), "bob".to_string()],
            dns_periods: HashMap::new(),
            spec_expansion: HashMap::new(),
        }
    }

    #[test]
    fn test_run_parallel_sgs_basic() {
        let specs = vec![spec("a", "2d", vec![]), spec("b", "3d", vec!["a"])];
        let service = SchedulingService::new(SchedulerConfig {
            resource_config: Some(resource_config()),
            ..SchedulerConfig::default()
        });
        let result = service
            .run(
                &specs,
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                FxHashSet::default(),
                None,
            )
            .unwrap();
        assert_eq!(result.scheduled_tasks.len(), 2);
        assert!(result.annotations.contains_key("a"));
        assert!(result.annotations.contains_key("b"));
    }

    #[test]
    fn test_run_critical_path_algorithm() {
        let specs = vec![spec("a", "2d", vec![]), spec("b", "3d", vec!["a"])];
        let service = SchedulingService::new(SchedulerConfig {
            algorithm: SchedulingAlgorithm::CriticalPath,
            resource_config: Some(resource_config()),
            ..SchedulerConfig::default()
        });
        let result = service
            .run(
                &specs,
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                FxHashSet::default(),
                None,
            )
            .unwrap();
        assert_eq!(result.scheduled_tasks.len(), 2);
    }

    #[test]
    fn test_run_validation_error_propagates() {
        let specs = vec![spec("b", "2d", vec!["missing"])];
        let service = SchedulingService::new(SchedulerConfig {
            resource_config: Some(resource_config()),
            ..SchedulerConfig::default()
        });
        let err = service
            .run(
                &specs,
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                FxHashSet::default(),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn test_run_applies_lock_as_fixed() {
        let specs = vec![spec("a", "2d", vec![])];
        let mut locks = HashMap::new();
        locks.insert(
            "a".to_string(),
            TaskLock {
                start_date: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2025, 2, 3).unwrap(),
                resources: vec![("alice".to_string(), 1.0)],
            },
        );
        let lock = ScheduleLock { locks };

        let service = SchedulingService::new(SchedulerConfig {
            resource_config: Some(resource_config()),
            ..SchedulerConfig::default()
        });
        let result = service
            .run(
                &specs,
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                FxHashSet::default(),
                Some(&lock),
            )
            .unwrap();

        let annotation = result.annotations.get("a").unwrap();
        assert!(annotation.was_fixed);
        assert_eq!(
            annotation.estimated_start,
            NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()
        );
    }
}
