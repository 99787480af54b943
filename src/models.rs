//! Core data types for the scheduling system.

use chrono::NaiveDate;
use std::collections::HashMap;

/// Reserved pseudo-resource a task with no `resources` and no `resource_spec`
/// is serialized onto, so it still occupies a single-capacity timeline instead
/// of vanishing from the schedule. Never listed in a resource registry's
/// order; it only exists inside the resource-schedule maps the algorithms
/// build from each task's own `resources`.
pub const UNASSIGNED_RESOURCE: &str = "unassigned";

/// A dependency on another task with optional lag time.
#[derive(Clone, Debug, PartialEq)]
pub struct Dependency {
    pub entity_id: String,
    pub lag_days: f64,
}

impl Dependency {
    pub fn new(entity_id: impl Into<String>, lag_days: f64) -> Self {
        Self {
            entity_id: entity_id.into(),
            lag_days,
        }
    }
}

/// A task to be scheduled.
#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    pub id: String,
    pub duration_days: f64,
    pub resources: Vec<(String, f64)>,
    pub dependencies: Vec<Dependency>,
    pub start_after: Option<NaiveDate>,
    pub end_before: Option<NaiveDate>,
    pub start_on: Option<NaiveDate>,
    pub end_on: Option<NaiveDate>,
    pub resource_spec: Option<String>,
    pub priority: Option<i32>,
}

impl Task {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        duration_days: f64,
        resources: Vec<(String, f64)>,
        dependencies: Vec<Dependency>,
        start_after: Option<NaiveDate>,
        end_before: Option<NaiveDate>,
        start_on: Option<NaiveDate>,
        end_on: Option<NaiveDate>,
        resource_spec: Option<String>,
        priority: Option<i32>,
    ) -> Self {
        Self {
            id: id.into(),
            duration_days,
            resources,
            dependencies,
            start_after,
            end_before,
            start_on,
            end_on,
            resource_spec,
            priority,
        }
    }

    /// Whether this task is a milestone (occupies no resource time).
    pub fn is_milestone(&self) -> bool {
        self.duration_days == 0.0
    }

    /// Serialize a resource-less, non-milestone task onto the reserved
    /// `"unassigned"` pseudo-resource, so it still competes for a timeline
    /// slot instead of falling through every placement attempt.
    pub fn assign_unassigned_if_needed(&mut self) {
        if !self.is_milestone() && self.resources.is_empty() && self.resource_spec.is_none() {
            self.resources.push((UNASSIGNED_RESOURCE.to_string(), 1.0));
        }
    }
}

/// A task that has been scheduled.
///
/// `start_date` is inclusive, `end_date` is exclusive.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduledTask {
    pub task_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_days: f64,
    pub resources: Vec<String>,
}

/// Result from a scheduling algorithm.
#[derive(Clone, Debug, Default)]
pub struct AlgorithmResult {
    pub scheduled_tasks: Vec<ScheduledTask>,
    pub algorithm_metadata: HashMap<String, String>,
}

/// Result from a pre-processor (the backward pass).
#[derive(Clone, Debug, Default)]
pub struct PreProcessResult {
    pub computed_deadlines: HashMap<String, NaiveDate>,
    pub computed_priorities: HashMap<String, i32>,
}

/// Per-task annotations describing how the Service arrived at its placement.
#[derive(Clone, Debug)]
pub struct ScheduleAnnotations {
    pub estimated_start: NaiveDate,
    pub estimated_end: NaiveDate,
    pub computed_deadline: Option<NaiveDate>,
    pub computed_priority: i32,
    pub deadline_violated: bool,
    pub resource_assignments: Vec<(String, f64)>,
    pub resources_were_computed: bool,
    pub was_fixed: bool,
}

/// The uniform output of a scheduling run, produced by the Scheduling Service.
#[derive(Clone, Debug, Default)]
pub struct SchedulingResult {
    pub scheduled_tasks: Vec<ScheduledTask>,
    pub annotations: HashMap<String, ScheduleAnnotations>,
    pub warnings: Vec<String>,
    pub algorithm_metadata: HashMap<String, String>,
}
