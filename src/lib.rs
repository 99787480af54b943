//! Resource-constrained project scheduler for engineering roadmaps.
//!
//! This crate provides data types and algorithms for turning a roadmap of
//! tasks, dependencies, and resource constraints into a concrete schedule:
//! a backward pass for deadline/priority propagation, priority-dispatch
//! sorting strategies, a Parallel SGS scheduler with bounded rollout, a
//! critical-path scheduler with unified task scoring, and a bounded
//! interval-constraint search for exact placement over small horizons.

pub mod backward_pass;
pub mod config;
pub mod cpsat;
pub mod critical_path;
pub mod interner;
pub mod lock;
pub mod logging;
pub mod models;
pub mod scheduler;
pub mod service;
pub mod sorting;
pub mod validation;

pub use backward_pass::{backward_pass, BackwardPassConfig, BackwardPassError, BackwardPassResult};
pub use config::{RolloutConfig, SchedulingConfig};
pub use critical_path::{CriticalPathScheduler, CriticalPathSchedulerError};
pub use lock::{LockFileError, ScheduleLock, TaskLock};
pub use models::{
    AlgorithmResult, Dependency, PreProcessResult, ScheduleAnnotations, ScheduledTask,
    SchedulingResult, Task,
};
pub use scheduler::{ParallelScheduler, ResourceConfig, SchedulerError};
pub use service::{SchedulingAlgorithm, SchedulingService, ServiceError};
pub use sorting::{sort_tasks, AtcParams, SortKey, SortingError, TaskSortInfo};
pub use validation::{validate_roadmap, RawTaskSpec, ValidationError};
pub use cpsat::{CpSatConfig, CpSatError, CpSatScheduler};
pub use service::SchedulerConfig;
