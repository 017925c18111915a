use tickoff_shared::{Filter, Task, TaskId};

use crate::cache::TaskCache;

/// Everything a list view needs from one pass over the task collection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionResult {
    pub items: Vec<Task>,
    pub count: usize,
    pub active_count: usize,
    pub complete_count: usize,
    pub visible_active_ids: Vec<TaskId>,
    pub visible_completed_ids: Vec<TaskId>,
}

pub fn select(tasks: &[Task], filter: Filter) -> SelectionResult {
    tasks.iter().fold(SelectionResult::default(), |mut acc, task| {
        acc.count += 1;
        if task.completed {
            acc.complete_count += 1;
        } else {
            acc.active_count += 1;
        }

        if filter.matches(task) {
            if task.completed {
                acc.visible_completed_ids.push(task.id.clone());
            } else {
                acc.visible_active_ids.push(task.id.clone());
            }
            acc.items.push(task.clone());
        }
        acc
    })
}

/// Caches the last selection, keyed by cache version and filter.
#[derive(Debug, Default)]
pub struct SelectionMemo {
    entry: Option<((u64, Filter), SelectionResult)>,
}

impl SelectionMemo {
    pub fn get(&mut self, cache: &TaskCache, filter: Filter) -> &SelectionResult {
        let key = (cache.version(), filter);
        let entry = match self.entry.take() {
            Some((cached, result)) if cached == key => (cached, result),
            _ => (key, select(cache.tasks(), filter)),
        };
        &self.entry.insert(entry).1
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use tickoff_shared::TaskText;

    use super::*;

    fn task(n: u32, completed: bool) -> Task {
        Task {
            id: TaskId::parse(format!("{n:0>21}")).expect("id"),
            text: TaskText::parse(format!("task {n}")).expect("text"),
            completed,
            created_date: DateTime::from_timestamp_millis(0).expect("ts"),
            completed_date: completed.then(|| DateTime::from_timestamp_millis(1).expect("ts")),
        }
    }

    #[test]
    fn active_filter_scenario() {
        let tasks = vec![task(1, false), task(2, true)];
        let result = select(&tasks, Filter::Active);

        assert_eq!(result.items, vec![task(1, false)]);
        assert_eq!(result.count, 2);
        assert_eq!(result.active_count, 1);
        assert_eq!(result.complete_count, 1);
        assert_eq!(result.visible_active_ids, vec![task(1, false).id]);
        assert!(result.visible_completed_ids.is_empty());
    }

    #[test]
    fn invariants_hold_for_every_filter() {
        let tasks: Vec<Task> = (0..12).map(|n| task(n, n % 3 == 0)).collect();

        for filter in Filter::VALUES {
            let result = select(&tasks, filter);
            assert_eq!(result.count, tasks.len());
            assert_eq!(result.active_count + result.complete_count, result.count);
            assert_eq!(
                result.visible_active_ids.len() + result.visible_completed_ids.len(),
                result.items.len()
            );

            let expected: Vec<Task> = tasks
                .iter()
                .filter(|t| filter.matches(t))
                .cloned()
                .collect();
            assert_eq!(result.items, expected, "filter {filter}");
        }
    }

    #[test]
    fn repeated_selection_is_value_equal() {
        let tasks = vec![task(1, true), task(2, false), task(3, true)];
        assert_eq!(
            select(&tasks, Filter::Completed),
            select(&tasks, Filter::Completed)
        );
    }

    #[test]
    fn memo_recomputes_after_cache_write() {
        let mut cache = TaskCache::default();
        cache.hydrate(vec![task(1, false)]);
        let mut memo = SelectionMemo::default();

        assert_eq!(memo.get(&cache, Filter::All).count, 1);
        cache.append(task(2, true));
        assert_eq!(memo.get(&cache, Filter::All).count, 2);
        assert_eq!(memo.get(&cache, Filter::Completed).items.len(), 1);
    }
}
