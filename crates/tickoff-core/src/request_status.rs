use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Read,
    Create,
    Update,
    Delete,
}

impl RequestType {
    pub const ALL: [RequestType; 4] = [Self::Read, Self::Create, Self::Update, Self::Delete];

    fn slot(self) -> usize {
        match self {
            Self::Read => 0,
            Self::Create => 1,
            Self::Update => 2,
            Self::Delete => 3,
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "READ",
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        })
    }
}

/// Per-kind counters of requests currently on the wire.
#[derive(Debug, Default)]
pub struct RunningOperations {
    counts: [AtomicUsize; 4],
}

impl RunningOperations {
    pub fn begin(self: &Arc<Self>, kind: RequestType) -> OperationGuard {
        self.counts[kind.slot()].fetch_add(1, Ordering::SeqCst);
        OperationGuard {
            running: Arc::clone(self),
            kind,
        }
    }

    pub fn count(&self, kind: RequestType) -> usize {
        self.counts[kind.slot()].load(Ordering::SeqCst)
    }

    pub fn is_busy(&self) -> bool {
        RequestType::ALL.iter().any(|kind| self.count(*kind) > 0)
    }

    /// Status lines for every kind with at least one request running.
    pub fn status_lines(&self) -> Vec<String> {
        RequestType::ALL
            .iter()
            .filter_map(|kind| request_status_text(*kind, self.count(*kind)))
            .collect()
    }
}

#[must_use = "the operation stops counting as running when the guard drops"]
pub struct OperationGuard {
    running: Arc<RunningOperations>,
    kind: RequestType,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.running.counts[self.kind.slot()].fetch_sub(1, Ordering::SeqCst);
    }
}

fn quantity(count: usize) -> String {
    if count == 1 {
        "a task".to_string()
    } else {
        format!("{count} tasks")
    }
}

pub fn request_status_text(kind: RequestType, count: usize) -> Option<String> {
    if count < 1 {
        return None;
    }

    Some(match kind {
        RequestType::Read => "Loading tasks...".to_string(),
        RequestType::Create => format!("Creating {}...", quantity(count)),
        RequestType::Update => format!("Updating {}...", quantity(count)),
        RequestType::Delete => format!("Deleting {}...", quantity(count)),
    })
}
