// src/supervisor/reconcile.rs

//! Converging the live worker set onto a desired config.
//!
//! The diff is a pure function ([`ReconcilePlan::compute`]) that can be
//! tested without Tokio or processes; [`reconcile`] is the async shell that
//! applies it to a [`Registry`].

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{ConfigFile, WorkerConfig};
use crate::supervisor::registry::{Registry, WorkerMap};
use crate::supervisor::worker::{Worker, WorkerEnv};

/// What a reconcile pass does, in application order: remove, update, add.
///
/// Removing before adding means an id is never backed by two relays at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Live ids missing from the desired set.
    pub remove: Vec<String>,
    /// Ids in both sets whose endpoints changed; carries the new config.
    pub update: Vec<WorkerConfig>,
    /// Desired configs with no live worker yet.
    pub add: Vec<WorkerConfig>,
    /// Ids in both sets with identical endpoints.
    pub unchanged: Vec<String>,
}

impl ReconcilePlan {
    /// Diff `live` (id → current config) against `desired`.
    pub fn compute(live: &BTreeMap<String, WorkerConfig>, desired: &ConfigFile) -> Self {
        let mut plan = ReconcilePlan::default();

        for id in live.keys() {
            if desired.get(id).is_none() {
                plan.remove.push(id.clone());
            }
        }

        for (id, wanted) in desired.streams() {
            match live.get(id) {
                Some(current) if current.same_endpoints(wanted) => {
                    plan.unchanged.push(id.clone());
                }
                Some(_) => plan.update.push(wanted.clone()),
                None => plan.add.push(wanted.clone()),
            }
        }

        plan
    }

    /// True when applying the plan would not start or stop anything.
    pub fn is_noop(&self) -> bool {
        self.remove.is_empty() && self.update.is_empty() && self.add.is_empty()
    }
}

/// Make the registry match `desired`.
///
/// Runs entirely under the registry's write lock, so a concurrent watchdog
/// pass sees either the old or the new worker set. Individual start/stop
/// problems are logged by the workers and never abort the pass.
pub async fn reconcile(desired: &ConfigFile, registry: &Registry, env: &WorkerEnv) -> ReconcilePlan {
    let mut workers = registry.write().await;

    let mut live = BTreeMap::new();
    for (id, worker) in workers.iter() {
        live.insert(id.clone(), worker.config().await);
    }

    let plan = ReconcilePlan::compute(&live, desired);
    debug!(?plan, "reconcile plan computed");

    apply_plan(&plan, &mut workers, env).await;
    plan
}

async fn apply_plan(plan: &ReconcilePlan, workers: &mut WorkerMap, env: &WorkerEnv) {
    for id in &plan.remove {
        if let Some(worker) = workers.get(id) {
            info!(stream_id = %id, "removing worker");
            worker.stop().await;
        }
        workers.remove(id);
    }

    for config in &plan.update {
        if let Some(worker) = workers.get(&config.id) {
            info!(stream_id = %config.id, "updating worker");
            worker.stop().await;
            worker.replace_config(config.clone()).await;
            worker.start().await;
        }
    }

    for config in &plan.add {
        info!(stream_id = %config.id, "adding new worker");
        let worker = Worker::new(config.clone(), env.clone());
        workers.insert(config.id.clone(), Arc::clone(&worker));
        worker.start().await;
    }
}
