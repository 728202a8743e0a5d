// src/supervisor/registry.rs

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::supervisor::worker::Worker;

/// Map from stream id to its worker.
pub type WorkerMap = HashMap<String, Arc<Worker>>;

/// Shared index of live workers.
///
/// Cloning is cheap and every clone sees the same map. Lock order: take this
/// lock first, then at most one worker's own lock. Workers never touch the
/// registry, so the reverse order cannot happen.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    workers: Arc<RwLock<WorkerMap>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared access, for iteration.
    pub async fn read(&self) -> RwLockReadGuard<'_, WorkerMap> {
        self.workers.read().await
    }

    /// Exclusive access, for structural changes (insert, remove, replace).
    pub async fn write(&self) -> RwLockWriteGuard<'_, WorkerMap> {
        self.workers.write().await
    }

    /// Clone out every worker handle; the lock is released before returning.
    pub async fn snapshot(&self) -> Vec<Arc<Worker>> {
        let mut workers: Vec<_> = self.read().await.values().cloned().collect();
        workers.sort_by(|a, b| a.id().cmp(b.id()));
        workers
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Worker>> {
        self.read().await.get(id).cloned()
    }

    /// Sorted list of registered ids.
    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.read().await.is_empty()
    }
}
