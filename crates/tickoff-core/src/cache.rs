use std::sync::Arc;

use parking_lot::RwLock;
use tickoff_shared::{Task, TaskId};
use tracing::{debug, trace};

/// The client-side copy of the task collection. Order is the order the
/// backend returned tasks in, followed by tasks created since.
///
/// Only four writers exist: `hydrate`, `append`, `replace` and `remove`.
/// Every write that changes the collection bumps `version`.
#[derive(Debug, Clone, Default)]
pub struct TaskCache {
    tasks: Vec<Task>,
    version: u64,
}

pub type SharedTaskCache = Arc<RwLock<TaskCache>>;

pub fn shared() -> SharedTaskCache {
    Arc::new(RwLock::new(TaskCache::default()))
}

impl TaskCache {
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| &task.id == id)
    }

    pub fn hydrate(&mut self, tasks: Vec<Task>) {
        debug!(count = tasks.len(), "hydrating task cache");
        self.tasks = tasks;
        self.bump();
    }

    /// Appends a freshly created task. An id already present is replaced in
    /// place so ids stay unique.
    pub fn append(&mut self, task: Task) {
        if self.replace(task.clone()) {
            debug!(id = %task.id, "append for known id treated as replace");
            return;
        }
        trace!(id = %task.id, "appending task");
        self.tasks.push(task);
        self.bump();
    }

    /// Last write wins. Returns false when the id is unknown.
    pub fn replace(&mut self, task: Task) -> bool {
        let Some(slot) = self.tasks.iter_mut().find(|existing| existing.id == task.id) else {
            return false;
        };
        trace!(id = %task.id, "replacing task");
        *slot = task;
        self.bump();
        true
    }

    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        let idx = self.tasks.iter().position(|task| &task.id == id)?;
        trace!(%id, "removing task");
        let removed = self.tasks.remove(idx);
        self.bump();
        Some(removed)
    }

    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}
