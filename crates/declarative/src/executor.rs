//! Execution engine - refreshes tracked state and applies planned changes
//! with bounded parallelism
//!
//! Each worker reconciles exactly one instance. Results are merged into the
//! tracked state only after the pool finishes, so workers never share
//! mutable state.

use crate::context::{ConfirmCallback, ProgressCallback};
use crate::planner::{ExecutionPlan, PlannedChange};
use crate::resource::{DynKind, Registry};
use crate::types::{Action, Address, ApplyResult, ExecuteOptions, ExecuteSummary, ReadOutcome, Record, Tracked};
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

/// Outcome of refreshing every tracked instance
#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    /// Tracked state with every successful read applied and missing
    /// instances dropped
    pub tracked: Tracked,
    /// Instances the remote side no longer has
    pub missing: BTreeSet<Address>,
    /// Instances whose read failed; their prior state is kept
    pub errors: Vec<(Address, String)>,
}

impl RefreshReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

enum Refreshed {
    Found(Record),
    Missing,
    Failed(Record, String),
}

/// Read every tracked instance from the remote side
pub fn refresh(registry: &Registry, tracked: &Tracked, jobs: usize) -> Result<RefreshReport> {
    let entries: Vec<(&Address, &Record)> = tracked.iter().collect();
    let pool = thread_pool(jobs)?;

    let results: Vec<(Address, Refreshed)> = pool.install(|| {
        entries
            .par_iter()
            .map(|(address, record)| {
                let outcome = match registry.require(&address.kind).and_then(|k| k.read(record)) {
                    Ok(ReadOutcome::Found(fresh)) => Refreshed::Found(fresh),
                    Ok(ReadOutcome::Missing) => Refreshed::Missing,
                    Err(e) => Refreshed::Failed((*record).clone(), format!("{e:#}")),
                };
                ((*address).clone(), outcome)
            })
            .collect()
    });

    let mut report = RefreshReport::default();
    for (address, outcome) in results {
        match outcome {
            Refreshed::Found(record) => {
                report.tracked.insert(address, record);
            }
            Refreshed::Missing => {
                log::warn!("{address} no longer exists remotely, dropping it from state");
                report.missing.insert(address);
            }
            Refreshed::Failed(prior, error) => {
                log::warn!("Failed to refresh {address}: {error}");
                report.tracked.insert(address.clone(), prior);
                report.errors.push((address, error));
            }
        }
    }

    Ok(report)
}

/// How an applied change affects the tracked state
#[derive(Debug)]
enum Mutation {
    Keep,
    Upsert(Record),
    Remove,
}

/// Execute a plan, updating `tracked` with every successful change
///
/// # Arguments
/// * `registry` - Resource kinds referenced by the plan
/// * `plan` - The execution plan to run
/// * `tracked` - Recorded state, updated in place
/// * `opts` - Execution options (dry_run, jobs, verbose)
/// * `progress` - Progress callback
/// * `confirm` - Confirmation callback
///
/// # Returns
/// Summary of execution results. Failures of individual changes are
/// counted, not returned as errors; the instance keeps its prior state
/// (or stays absent when a create fails).
pub fn execute<P, C>(
    registry: &Registry,
    plan: &ExecutionPlan,
    tracked: &mut Tracked,
    opts: &ExecuteOptions,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteSummary>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let pending: Vec<&PlannedChange> = plan.pending().collect();
    let unchanged = plan.total_resources() - pending.len();

    if pending.is_empty() {
        return Ok(ExecuteSummary {
            no_change: unchanged,
            ..Default::default()
        });
    }

    if opts.dry_run {
        return Ok(ExecuteSummary::default());
    }

    // Confirm before proceeding
    if !confirm.confirm(&format!("Apply {} change(s)?", pending.len()))? {
        let declined = ApplyResult::Skipped {
            reason: "not confirmed".to_string(),
        };
        let mut summary = ExecuteSummary::default();
        for change in &pending {
            log::info!("Skipping {} {}", change.action, change.address);
            summary.add_result(&declined);
        }
        return Ok(summary);
    }

    progress.on_batch_start(pending.len());

    let pool = thread_pool(opts.jobs)?;
    let shared = Mutex::new(&mut *progress);

    let results: Vec<(Address, ApplyResult, Mutation)> = pool.install(|| {
        pending
            .par_iter()
            .map(|change| {
                shared
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .on_resource_start(&change.address, &change.action);

                let (result, mutation) = match registry.require(&change.address.kind) {
                    Ok(kind) => apply_change(kind, change),
                    Err(e) => (failed(&e), Mutation::Keep),
                };

                shared
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .on_resource_complete(&change.address, &result);

                (change.address.clone(), result, mutation)
            })
            .collect()
    });

    let progress = shared.into_inner().unwrap_or_else(PoisonError::into_inner);
    progress.on_batch_complete();

    let mut summary = ExecuteSummary {
        no_change: unchanged,
        ..Default::default()
    };
    for (address, result, mutation) in results {
        summary.add_result(&result);
        match mutation {
            Mutation::Keep => {}
            Mutation::Upsert(record) => {
                tracked.insert(address, record);
            }
            Mutation::Remove => {
                tracked.remove(&address);
            }
        }
    }

    Ok(summary)
}

fn thread_pool(jobs: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .context("Failed to create thread pool")
}

fn failed(error: &anyhow::Error) -> ApplyResult {
    ApplyResult::Failed {
        error: format!("{error:#}"),
    }
}

fn require_config(change: &PlannedChange) -> Result<&serde_json::Value> {
    change
        .config
        .as_ref()
        .with_context(|| format!("{} has no declared attributes", change.address))
}

fn require_prior(change: &PlannedChange) -> Result<&Record> {
    change
        .prior
        .as_ref()
        .with_context(|| format!("{} has no recorded state", change.address))
}

/// Apply a single planned change
fn apply_change(kind: &dyn DynKind, change: &PlannedChange) -> (ApplyResult, Mutation) {
    let address = &change.address;

    let outcome = match &change.action {
        Action::NoChange => return (ApplyResult::NoChange, Mutation::Keep),
        Action::Create | Action::Recreate => require_config(change)
            .and_then(|config| kind.create(config))
            .map(|record| (ApplyResult::Created, Mutation::Upsert(record))),
        Action::Update { fields } => require_prior(change)
            .and_then(|prior| kind.update(prior, require_config(change)?, fields))
            .map(|record| (ApplyResult::Modified, Mutation::Upsert(record))),
        Action::Delete => require_prior(change)
            .and_then(|prior| kind.delete(prior))
            .map(|()| (ApplyResult::Removed, Mutation::Remove)),
        Action::Replace { .. } => {
            if let Err(e) = require_prior(change).and_then(|prior| kind.delete(prior)) {
                log::warn!("{address}: delete before replace failed: {e:#}");
                return (failed(&e), Mutation::Keep);
            }
            // The old instance is gone; a failed create leaves it absent.
            return match require_config(change).and_then(|config| kind.create(config)) {
                Ok(record) => {
                    log::info!("{address}: replaced (id {})", record.id);
                    (ApplyResult::Replaced, Mutation::Upsert(record))
                }
                Err(e) => {
                    log::warn!("{address}: create after delete failed: {e:#}");
                    (failed(&e), Mutation::Remove)
                }
            };
        }
    };

    match outcome {
        Ok((result, mutation)) => {
            log::info!("{address}: {result:?}");
            (result, mutation)
        }
        Err(e) => {
            log::warn!("{address}: {} failed: {e:#}", change.action);
            (failed(&e), Mutation::Keep)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AutoConfirm, AutoDecline, NoProgress};
    use crate::planner::Declaration;
    use crate::resource::testing::WidgetKind;
    use serde_json::json;

    fn setup() -> (WidgetKind, Registry) {
        let kind = WidgetKind::default();
        let mut registry = Registry::new();
        registry.register(kind.clone());
        (kind, registry)
    }

    fn decl(name: &str, config: serde_json::Value) -> Declaration {
        Declaration::new(Address::new("widget", name), config)
    }

    fn plan(registry: &Registry, decls: &[Declaration], tracked: &Tracked) -> ExecutionPlan {
        ExecutionPlan::build(registry, decls, tracked, &BTreeSet::new()).unwrap()
    }

    fn run(registry: &Registry, plan: &ExecutionPlan, tracked: &mut Tracked) -> ExecuteSummary {
        execute(
            registry,
            plan,
            tracked,
            &ExecuteOptions::default(),
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap()
    }

    #[test]
    fn test_execute_empty_plan() {
        let (_, registry) = setup();
        let mut tracked = Tracked::new();
        let summary = run(&registry, &ExecutionPlan::new(), &mut tracked);
        assert_eq!(summary.total(), 0);
    }

    #[test]
    fn test_execute_creates_and_records() {
        let (kind, registry) = setup();
        let mut tracked = Tracked::new();
        let decls = [decl("a", json!({"name": "a"})), decl("b", json!({"name": "b"}))];

        let summary = run(&registry, &plan(&registry, &decls, &tracked), &mut tracked);
        assert_eq!(summary.created, 2);
        assert_eq!(tracked.len(), 2);
        assert_eq!(kind.store.lock().unwrap().len(), 2);

        // a second run converges to no change
        let summary = run(&registry, &plan(&registry, &decls, &tracked), &mut tracked);
        assert_eq!(summary.total_changes(), 0);
        assert_eq!(summary.no_change, 2);
    }

    #[test]
    fn test_failed_create_leaves_instance_absent() {
        let (kind, registry) = setup();
        *kind.fail_create.lock().unwrap() = Some("bad".to_string());
        let mut tracked = Tracked::new();
        let decls = [decl("bad", json!({"name": "bad"})), decl("good", json!({"name": "good"}))];

        let summary = run(&registry, &plan(&registry, &decls, &tracked), &mut tracked);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.created, 1);
        assert!(!tracked.contains_key(&Address::new("widget", "bad")));
        assert!(tracked.contains_key(&Address::new("widget", "good")));
    }

    #[test]
    fn test_update_in_place_keeps_identity() {
        let (_, registry) = setup();
        let mut tracked = Tracked::new();
        run(
            &registry,
            &plan(&registry, &[decl("a", json!({"name": "a"}))], &tracked),
            &mut tracked,
        );
        let serial = tracked[&Address::new("widget", "a")].attributes["serial"].clone();

        let decls = [decl("a", json!({"name": "a", "color": "blue"}))];
        let summary = run(&registry, &plan(&registry, &decls, &tracked), &mut tracked);
        assert_eq!(summary.modified, 1);
        let record = &tracked[&Address::new("widget", "a")];
        assert_eq!(record.attributes["color"], "blue");
        assert_eq!(record.attributes["serial"], serial);
    }

    #[test]
    fn test_replace_deletes_then_creates() {
        let (_, registry) = setup();
        let mut tracked = Tracked::new();
        run(
            &registry,
            &plan(&registry, &[decl("a", json!({"name": "a", "size": 1}))], &tracked),
            &mut tracked,
        );

        let decls = [decl("a", json!({"name": "a", "size": 2}))];
        let summary = run(&registry, &plan(&registry, &decls, &tracked), &mut tracked);
        assert_eq!(summary.replaced, 1);
        let record = &tracked[&Address::new("widget", "a")];
        assert_eq!(record.attributes["size"], 2);
        assert_eq!(record.attributes["serial"], 2);
    }

    #[test]
    fn test_replace_failing_after_delete_leaves_absent() {
        let (kind, registry) = setup();
        let mut tracked = Tracked::new();
        run(
            &registry,
            &plan(&registry, &[decl("a", json!({"name": "a", "size": 1}))], &tracked),
            &mut tracked,
        );
        *kind.fail_create.lock().unwrap() = Some("a".to_string());

        let decls = [decl("a", json!({"name": "a", "size": 2}))];
        let summary = run(&registry, &plan(&registry, &decls, &tracked), &mut tracked);
        assert_eq!(summary.failed, 1);
        assert!(tracked.is_empty());
        assert!(kind.store.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failed_delete_keeps_prior_state() {
        let (kind, registry) = setup();
        let mut tracked = Tracked::new();
        let prior = kind.seed("a", "grey");
        tracked.insert(Address::new("widget", "a"), prior.clone());
        kind.store.lock().unwrap().clear();

        let summary = run(&registry, &ExecutionPlan::destroy(&tracked), &mut tracked);
        assert_eq!(summary.failed, 1);
        assert_eq!(tracked[&Address::new("widget", "a")], prior);
    }

    #[test]
    fn test_declined_and_dry_run_change_nothing() {
        let (kind, registry) = setup();
        let mut tracked = Tracked::new();
        let p = plan(&registry, &[decl("a", json!({"name": "a"}))], &tracked);

        let summary = execute(
            &registry,
            &p,
            &mut tracked,
            &ExecuteOptions::default(),
            &mut NoProgress,
            &mut AutoDecline,
        )
        .unwrap();
        assert_eq!(summary.skipped, 1);

        let opts = ExecuteOptions {
            dry_run: true,
            ..Default::default()
        };
        execute(&registry, &p, &mut tracked, &opts, &mut NoProgress, &mut AutoConfirm).unwrap();

        assert!(tracked.is_empty());
        assert!(kind.store.lock().unwrap().is_empty());
    }

    #[test]
    fn test_refresh_drops_missing_and_keeps_failed() {
        let (kind, registry) = setup();
        let mut tracked = Tracked::new();
        tracked.insert(Address::new("widget", "live"), kind.seed("live", "grey"));
        tracked.insert(
            Address::new("widget", "gone"),
            Record {
                id: "gone".into(),
                attributes: json!({"id": "gone", "name": "gone", "color": "grey", "size": null, "serial": 0}),
            },
        );
        let orphan = Record {
            id: "x".into(),
            attributes: json!({}),
        };
        tracked.insert(Address::new("gadget", "x"), orphan.clone());

        kind.store.lock().unwrap().get_mut("live").unwrap().color = "red".into();

        let report = refresh(&registry, &tracked, 2).unwrap();
        assert!(report.missing.contains(&Address::new("widget", "gone")));
        assert_eq!(
            report.tracked[&Address::new("widget", "live")].attributes["color"],
            "red"
        );
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.tracked[&Address::new("gadget", "x")], orphan);
        assert!(!report.tracked.contains_key(&Address::new("widget", "gone")));
    }

    #[test]
    fn test_progress_sees_every_change() {
        #[derive(Default)]
        struct Counting {
            started: usize,
            completed: usize,
            batches: usize,
        }
        impl ProgressCallback for Counting {
            fn on_batch_start(&mut self, _count: usize) {
                self.batches += 1;
            }
            fn on_resource_start(&mut self, _address: &Address, _action: &Action) {
                self.started += 1;
            }
            fn on_resource_complete(&mut self, _address: &Address, _result: &ApplyResult) {
                self.completed += 1;
            }
            fn on_batch_complete(&mut self) {}
        }

        let (_, registry) = setup();
        let mut tracked = Tracked::new();
        let decls: Vec<_> = (0..5)
            .map(|i| decl(&format!("w{i}"), json!({"name": format!("w{i}")})))
            .collect();
        let mut progress = Counting::default();
        execute(
            &registry,
            &plan(&registry, &decls, &tracked),
            &mut tracked,
            &ExecuteOptions::default(),
            &mut progress,
            &mut AutoConfirm,
        )
        .unwrap();

        assert_eq!(progress.batches, 1);
        assert_eq!(progress.started, 5);
        assert_eq!(progress.completed, 5);
    }
}
