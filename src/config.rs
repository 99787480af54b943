//! Configuration types for the scheduling system.

/// Configuration for task prioritization and algorithm selection.
#[derive(Clone, Debug)]
pub struct SchedulingConfig {
    /// Prioritization strategy: "priority_first", "cr_first", "weighted", or "atc"
    pub strategy: String,
    /// Weight for critical ratio in weighted strategy
    pub cr_weight: f64,
    /// Weight for priority in weighted strategy
    pub priority_weight: f64,
    /// Default priority for tasks without explicit priority (0-100)
    pub default_priority: i32,
    /// Multiplier for computing default CR (max_cr * multiplier)
    pub default_cr_multiplier: f64,
    /// Minimum CR for tasks without deadlines
    pub default_cr_floor: f64,
    /// ATC lookahead parameter (1.5-3.0 typical)
    pub atc_k: f64,
    /// ATC multiplier for default urgency
    pub atc_default_urgency_multiplier: f64,
    /// ATC minimum urgency for no-deadline tasks
    pub atc_default_urgency_floor: f64,
    /// Logging verbosity: 0=silent, 1=changes, 2=checks, 3=debug.
    pub verbosity: u8,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            strategy: "weighted".to_string(),
            cr_weight: 10.0,
            priority_weight: 1.0,
            default_priority: 50,
            default_cr_multiplier: 2.0,
            default_cr_floor: 10.0,
            atc_k: 2.0,
            atc_default_urgency_multiplier: 1.0,
            atc_default_urgency_floor: 0.3,
            verbosity: 0,
        }
    }
}

/// Configuration for the bounded rollout algorithm.
#[derive(Clone, Debug)]
pub struct RolloutConfig {
    /// Priority threshold: only trigger rollout for tasks below this priority
    pub priority_threshold: i32,
    /// Minimum priority difference to consider rollout worthwhile
    pub min_priority_gap: i32,
    /// CR threshold: only trigger rollout for tasks with CR above this (relaxed tasks)
    pub cr_relaxed_threshold: f64,
    /// Minimum CR gap: upcoming task must have CR at least this much lower (more urgent)
    pub min_cr_urgency_gap: f64,
    /// Maximum rollout horizon in days (limits simulation depth for performance)
    pub max_horizon_days: Option<i32>,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            priority_threshold: 70,
            min_priority_gap: 20,
            cr_relaxed_threshold: 5.0,
            min_cr_urgency_gap: 3.0,
            max_horizon_days: Some(30),
        }
    }
}
