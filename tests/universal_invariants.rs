//! Universal invariants from the testable-properties section: no resource
//! overlap, full completeness, and run-to-run determinism.

mod common;

use common::d;
use roadmap_scheduler::{Dependency, ResourceConfig, SchedulingConfig, Task};
use roadmap_scheduler::ParallelScheduler;
use rustc_hash::FxHashSet;

fn sample_tasks() -> Vec<Task> {
    vec![
        Task::new("a", 3.0, vec![("r".to_string(), 1.0)], vec![], None, None, None, None, None, Some(60)),
        Task::new(
            "b",
            4.0,
            vec![("r".to_string(), 1.0)],
            vec![Dependency::new("a", 1.0)],
            None,
            None,
            None,
            None,
            None,
            Some(40),
        ),
        Task::new("c", 2.0, vec![("r".to_string(), 1.0)], vec![], None, None, None, None, None, Some(80)),
    ]
}

fn run_once() -> Vec<roadmap_scheduler::ScheduledTask> {
    let resource_config = ResourceConfig {
        resource_order: vec!["r".to_string()],
        dns_periods: Default::default(),
        spec_expansion: Default::default(),
    };
    let mut scheduler = ParallelScheduler::new(
        sample_tasks(),
        d(2025, 1, 1),
        FxHashSet::default(),
        SchedulingConfig::default(),
        None,
        Some(resource_config),
        vec![],
        None,
        None,
    )
    .unwrap();
    scheduler.schedule().unwrap().scheduled_tasks
}

#[test]
fn test_no_overlap_on_shared_resource() {
    let scheduled = run_once();
    for i in 0..scheduled.len() {
        for j in (i + 1)..scheduled.len() {
            let a = &scheduled[i];
            let b = &scheduled[j];
            let shares_resource = a.resources.iter().any(|r| b.resources.contains(r));
            if shares_resource {
                let disjoint = a.end_date <= b.start_date || b.end_date <= a.start_date;
                assert!(disjoint, "{} and {} overlap on a shared resource", a.task_id, b.task_id);
            }
        }
    }
}

#[test]
fn test_precedence_respects_lag() {
    let scheduled = run_once();
    let a = scheduled.iter().find(|t| t.task_id == "a").unwrap();
    let b = scheduled.iter().find(|t| t.task_id == "b").unwrap();
    assert!(b.start_date >= a.end_date + chrono::Duration::days(2));
}

#[test]
fn test_completeness_all_tasks_present() {
    let scheduled = run_once();
    let mut ids: Vec<&str> = scheduled.iter().map(|t| t.task_id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[test]
fn test_determinism_across_runs() {
    let first = run_once();
    let second = run_once();
    assert_eq!(first, second);
}
