//! Fan-out of one user action over many tasks, reported as a single summary.

use std::fmt::Display;
use std::future::Future;

use futures::future::join_all;
use tickoff_shared::TaskId;
use tracing::{info, instrument, warn};

use crate::notify::{Notification, Notifier};

pub type SummaryText = fn(usize) -> String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BulkOutcome {
    pub succeeded: usize,
    pub failed: usize,
}

impl BulkOutcome {
    pub fn tally<T, E>(results: &[Result<T, E>]) -> Self {
        results.iter().fold(Self::default(), |acc, result| match result {
            Ok(_) => Self {
                succeeded: acc.succeeded + 1,
                ..acc
            },
            Err(_) => Self {
                failed: acc.failed + 1,
                ..acc
            },
        })
    }

    pub fn summary(&self, success_text: SummaryText, failed_text: SummaryText) -> Notification {
        if self.failed == 0 {
            Notification::success(success_text(self.succeeded))
        } else if self.succeeded > 0 {
            Notification::warning(format!(
                "{}, {}",
                success_text(self.succeeded),
                failed_text(self.failed)
            ))
        } else {
            Notification::error(failed_text(self.failed))
        }
    }
}

pub fn count_tasks(count: usize) -> String {
    if count == 1 {
        "1 task".to_string()
    } else {
        format!("{count} tasks")
    }
}

pub fn completed_text(count: usize) -> String {
    format!("{} completed", count_tasks(count))
}

pub fn deleted_text(count: usize) -> String {
    format!("{} deleted", count_tasks(count))
}

pub fn failed_text(count: usize) -> String {
    format!("{} failed", count_tasks(count))
}

pub struct BulkHandler<F> {
    name: &'static str,
    action: F,
    success_text: SummaryText,
    failed_text: SummaryText,
}

impl<F> BulkHandler<F> {
    pub fn new(
        name: &'static str,
        action: F,
        success_text: SummaryText,
        failed_text: SummaryText,
    ) -> Self {
        Self {
            name,
            action,
            success_text,
            failed_text,
        }
    }

    pub fn complete(action: F) -> Self {
        Self::new("complete", action, completed_text, failed_text)
    }

    pub fn delete(action: F) -> Self {
        Self::new("delete", action, deleted_text, failed_text)
    }

    /// Runs the action for every id at once and emits one summary. Individual
    /// failures are logged, never returned.
    #[instrument(skip_all, fields(bulk = self.name, count = ids.len()))]
    pub async fn run<Fut, T, E>(&self, ids: &[TaskId], notifier: &dyn Notifier)
    where
        F: Fn(TaskId) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let results = join_all(ids.iter().cloned().map(&self.action)).await;

        for (id, result) in ids.iter().zip(&results) {
            if let Err(err) = result {
                warn!(%id, error = %err, "bulk item failed");
            }
        }

        let outcome = BulkOutcome::tally(&results);
        info!(
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            "bulk operation settled"
        );
        notifier.notify(outcome.summary(self.success_text, self.failed_text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotificationLevel;

    #[test]
    fn tally_counts_fulfilled_and_rejected() {
        let results: Vec<Result<(), &str>> = vec![Ok(()), Err("x"), Ok(()), Err("y"), Err("z")];
        assert_eq!(
            BulkOutcome::tally(&results),
            BulkOutcome {
                succeeded: 2,
                failed: 3
            }
        );
    }

    #[test]
    fn summary_picks_level_from_counts() {
        let all_ok = BulkOutcome {
            succeeded: 3,
            failed: 0,
        }
        .summary(completed_text, failed_text);
        assert_eq!(all_ok.level, NotificationLevel::Success);
        assert_eq!(all_ok.message, "3 tasks completed");

        let mixed = BulkOutcome {
            succeeded: 1,
            failed: 2,
        }
        .summary(deleted_text, failed_text);
        assert_eq!(mixed.level, NotificationLevel::Warning);
        assert_eq!(mixed.message, "1 task deleted, 2 tasks failed");

        let none_ok = BulkOutcome {
            succeeded: 0,
            failed: 1,
        }
        .summary(completed_text, failed_text);
        assert_eq!(none_ok.level, NotificationLevel::Error);
        assert_eq!(none_ok.message, "1 task failed");
    }

    #[test]
    fn empty_bulk_reports_success() {
        let outcome = BulkOutcome::tally::<(), ()>(&[]);
        let note = outcome.summary(completed_text, failed_text);
        assert_eq!(note.level, NotificationLevel::Success);
        assert_eq!(note.message, "0 tasks completed");
    }
}
