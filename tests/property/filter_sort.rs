//! Property-based tests for the filtered, sorted projection and the mirror.
//!
//! Uses proptest to verify:
//! 1. Status filters never admit a task of the wrong completion state.
//! 2. Sorting by due date puts every undated task after every dated one.
//! 3. Sorting by priority follows rank order in both directions.
//! 4. The projection is a subset of the collection and never duplicates.
//! 5. Saving to the mirror and loading back reproduces the tasks exactly.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use tasknest::mirror::{MemoryMirror, TaskMirror};
use tasknest::tasks::project;
use tasknest_proto::{Priority, SortBy, SortOrder, StatusFilter, Task, TaskFilter, TaskId};

// --- Strategies ---

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap_or_default()
}

fn arb_priority() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Low),
        Just(Priority::Medium),
        Just(Priority::High)
    ]
}

fn arb_status() -> impl Strategy<Value = StatusFilter> {
    prop_oneof![
        Just(StatusFilter::All),
        Just(StatusFilter::Active),
        Just(StatusFilter::Completed)
    ]
}

fn arb_sort_by() -> impl Strategy<Value = SortBy> {
    prop_oneof![
        Just(SortBy::DueDate),
        Just(SortBy::Priority),
        Just(SortBy::Created),
        Just(SortBy::Title)
    ]
}

fn arb_order() -> impl Strategy<Value = SortOrder> {
    prop_oneof![Just(SortOrder::Asc), Just(SortOrder::Desc)]
}

/// Tasks with unique ids and random metadata.
fn arb_tasks() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec(
        (
            "[a-zA-Z ]{1,24}",
            proptest::option::of("[a-z ]{0,40}"),
            any::<bool>(),
            arb_priority(),
            proptest::option::of(prop_oneof![Just("work"), Just("personal"), Just("health")]),
            prop::collection::vec("[a-z]{1,8}", 0..4),
            proptest::option::of(-1000i64..1000),
            0i64..10_000,
        ),
        0..24,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(
                |(i, (title, description, completed, priority, category, tags, due, created))| {
                    let created_at = epoch() + Duration::minutes(created);
                    Task {
                        id: TaskId::new(format!("t{i}")),
                        title,
                        description,
                        completed,
                        priority,
                        category: category.map(str::to_string),
                        tags,
                        due_date: due.map(|d| epoch() + Duration::hours(d)),
                        created_at,
                        updated_at: created_at,
                        user_id: "u-1".to_string(),
                        order: i64::try_from(i).unwrap_or_default(),
                    }
                },
            )
            .collect()
    })
}

fn filter(status: StatusFilter, sort_by: SortBy, sort_order: SortOrder) -> TaskFilter {
    TaskFilter {
        status,
        sort_by,
        sort_order,
        ..TaskFilter::default()
    }
}

// --- Properties ---

proptest! {
    #[test]
    fn status_filter_is_exact(
        tasks in arb_tasks(),
        status in arb_status(),
        sort_by in arb_sort_by(),
        order in arb_order(),
    ) {
        let view = project(&tasks, &filter(status, sort_by, order), "");
        match status {
            StatusFilter::Active => prop_assert!(view.iter().all(|t| !t.completed)),
            StatusFilter::Completed => prop_assert!(view.iter().all(|t| t.completed)),
            StatusFilter::All => prop_assert_eq!(view.len(), tasks.len()),
        }
        let expected = tasks.iter().filter(|t| status.matches(t.completed)).count();
        prop_assert_eq!(view.len(), expected);
    }

    #[test]
    fn undated_tasks_sort_last(tasks in arb_tasks(), order in arb_order()) {
        let view = project(&tasks, &filter(StatusFilter::All, SortBy::DueDate, order), "");
        if let Some(first_undated) = view.iter().position(|t| t.due_date.is_none()) {
            prop_assert!(view[first_undated..].iter().all(|t| t.due_date.is_none()));
        }
        let dated: Vec<_> = view.iter().filter_map(|t| t.due_date).collect();
        let sorted = dated.windows(2).all(|w| match order {
            SortOrder::Asc => w[0] <= w[1],
            SortOrder::Desc => w[0] >= w[1],
        });
        prop_assert!(sorted);
    }

    #[test]
    fn priority_follows_rank(tasks in arb_tasks(), order in arb_order()) {
        let view = project(&tasks, &filter(StatusFilter::All, SortBy::Priority, order), "");
        let ranks: Vec<u8> = view.iter().map(|t| t.priority.rank()).collect();
        let sorted = ranks.windows(2).all(|w| match order {
            SortOrder::Asc => w[0] <= w[1],
            SortOrder::Desc => w[0] >= w[1],
        });
        prop_assert!(sorted, "ranks out of order: {:?}", ranks);
    }

    #[test]
    fn projection_is_a_subset_without_duplicates(
        tasks in arb_tasks(),
        status in arb_status(),
        sort_by in arb_sort_by(),
        order in arb_order(),
        term in "[a-z]{0,3}",
    ) {
        let view = project(&tasks, &filter(status, sort_by, order), &term);
        let ids: HashSet<&TaskId> = view.iter().map(|t| &t.id).collect();
        prop_assert_eq!(ids.len(), view.len());
        prop_assert!(view.iter().all(|v| tasks.iter().any(|t| t == *v)));
    }

    #[test]
    fn mirror_round_trip(tasks in arb_tasks()) {
        let mirror = MemoryMirror::new();
        mirror.save("u-1", &tasks).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let loaded = mirror.load("u-1");
        prop_assert_eq!(loaded, Some(tasks));
    }
}
