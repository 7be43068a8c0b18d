//! Filtered, ordered projection of the task collection.
//!
//! Everything here is a pure function of the collection, the structured
//! [`TaskFilter`] and the free-text search term. The projection is rebuilt
//! on demand and never mutates tasks.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use tasknest_proto::{SUGGESTED_CATEGORIES, SortBy, SortOrder, Task, TaskFilter};

/// Returns `true` if `task` passes every structured criterion of `filter`.
#[must_use]
pub fn matches_filter(task: &Task, filter: &TaskFilter) -> bool {
    filter.status.matches(task.completed)
        && filter.priority.is_none_or(|p| task.priority == p)
        && filter
            .category
            .as_deref()
            .is_none_or(|c| task.category.as_deref() == Some(c))
        && filter
            .tag
            .as_deref()
            .is_none_or(|tag| task.tags.iter().any(|t| t == tag))
}

/// Case-insensitive substring match over title, description and tags.
/// An empty or whitespace-only term matches everything.
#[must_use]
pub fn matches_search(task: &Task, term: &str) -> bool {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    task.title.to_lowercase().contains(&needle)
        || task
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(&needle))
        || task.tags.iter().any(|t| t.to_lowercase().contains(&needle))
}

/// Orders two tasks by `sort_by` in direction `order`.
///
/// Tasks without a due date sort after dated ones under `DueDate` in both
/// directions.
#[must_use]
pub fn compare(a: &Task, b: &Task, sort_by: SortBy, order: SortOrder) -> Ordering {
    let directed = |ord: Ordering| match order {
        SortOrder::Asc => ord,
        SortOrder::Desc => ord.reverse(),
    };

    match sort_by {
        SortBy::Title => directed(
            a.title
                .to_lowercase()
                .cmp(&b.title.to_lowercase())
                .then_with(|| a.title.cmp(&b.title)),
        ),
        SortBy::DueDate => match (a.due_date, b.due_date) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => directed(x.cmp(&y)),
        },
        SortBy::Priority => directed(a.priority.rank().cmp(&b.priority.rank())),
        SortBy::Created => directed(a.created_at.cmp(&b.created_at)),
    }
}

/// Builds the projection: filtered by `filter` and `search`, then stably
/// sorted. Ties keep collection order.
#[must_use]
pub fn project<'a>(tasks: &'a [Task], filter: &TaskFilter, search: &str) -> Vec<&'a Task> {
    let mut view: Vec<&Task> = tasks
        .iter()
        .filter(|t| matches_filter(t, filter) && matches_search(t, search))
        .collect();
    view.sort_by(|a, b| compare(a, b, filter.sort_by, filter.sort_order));
    view
}

/// Completion counts for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryStats {
    pub name: String,
    pub total: usize,
    pub completed: usize,
}

/// Summary figures over a set of tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub active: usize,
    pub overdue: usize,
    /// One entry per suggested category, in suggestion order.
    pub categories: Vec<CategoryStats>,
}

impl TaskStats {
    /// Percentage of completed tasks, `0` for an empty set.
    #[must_use]
    pub fn completion_rate(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        u8::try_from(self.completed * 100 / self.total).unwrap_or(100)
    }
}

/// Computes statistics over `tasks` as of `now`.
#[must_use]
pub fn stats<'a, I>(tasks: I, now: DateTime<Utc>) -> TaskStats
where
    I: IntoIterator<Item = &'a Task>,
{
    let tasks: Vec<&Task> = tasks.into_iter().collect();
    let completed = tasks.iter().filter(|t| t.completed).count();
    let categories = SUGGESTED_CATEGORIES
        .iter()
        .map(|&name| {
            let in_category = tasks
                .iter()
                .filter(|t| t.category.as_deref() == Some(name));
            CategoryStats {
                name: name.to_string(),
                total: in_category.clone().count(),
                completed: in_category.filter(|t| t.completed).count(),
            }
        })
        .collect();

    TaskStats {
        total: tasks.len(),
        completed,
        active: tasks.len() - completed,
        overdue: tasks.iter().filter(|t| t.is_overdue(now)).count(),
        categories,
    }
}
