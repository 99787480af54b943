//! Scheduler state for critical path scheduling and rollout simulations.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::models::ScheduledTask;
use crate::scheduler::ResourceSchedule;

use super::rollout::ResourceReservation;
use super::types::ResourceMask;

/// Snapshot of critical path scheduler state.
///
/// Keeps both the resource schedules used for placement and a string-keyed
/// view of what has been scheduled, since rollout simulation re-derives
/// critical paths and scores by task ID rather than by interned integer.
#[derive(Clone)]
pub struct CriticalPathSchedulerState {
    /// Tasks scheduled so far, keyed by task ID, as (start_date, end_date).
    pub scheduled: FxHashMap<String, (NaiveDate, NaiveDate)>,
    /// Task IDs not yet scheduled.
    pub unscheduled: FxHashSet<String>,
    /// Resource schedules indexed by resource ID.
    pub resource_schedules: Vec<ResourceSchedule>,
    /// Current simulation time.
    pub current_time: NaiveDate,
    /// Scheduled task results, in scheduling order.
    pub result: Vec<ScheduledTask>,
    /// Resource reservations held by rollout decisions, keyed by resource ID.
    pub reservations: FxHashMap<u32, ResourceReservation>,
}

impl CriticalPathSchedulerState {
    /// Create a new scheduler state.
    pub fn new(
        scheduled: FxHashMap<String, (NaiveDate, NaiveDate)>,
        unscheduled: FxHashSet<String>,
        resource_schedules: Vec<ResourceSchedule>,
        current_time: NaiveDate,
    ) -> Self {
        Self {
            scheduled,
            unscheduled,
            resource_schedules,
            current_time,
            result: Vec::new(),
            reservations: FxHashMap::default(),
        }
    }

    /// Create a deep copy for rollout simulation.
    pub fn clone_for_rollout(&self) -> Self {
        self.clone()
    }

    /// Compute the bitmask of resources available at current_time.
    pub fn available_mask(&self) -> ResourceMask {
        let mut mask = ResourceMask::new();
        for (id, schedule) in self.resource_schedules.iter().enumerate() {
            if schedule.next_available_time(self.current_time) == self.current_time {
                mask.set(id as u32);
            }
        }
        mask
    }
}
