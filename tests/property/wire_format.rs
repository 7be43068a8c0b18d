//! Property-based wire-format tests for the task API types.
//!
//! Uses proptest to verify:
//! 1. A patch keeps "clear this field" (`null`) distinct from "leave it".
//! 2. Records keyed by the legacy `_id` decode to the same task as `id`.
//! 3. Arbitrary JSON never panics the task decoder.

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use tasknest_proto::{Priority, Task, TaskId, TaskPatch};

fn arb_priority() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Low),
        Just(Priority::Medium),
        Just(Priority::High)
    ]
}

fn arb_time() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_000_000_000).prop_map(|secs| DateTime::from_timestamp(secs, 0).unwrap_or_default())
}

/// `None`, `Some(None)` or `Some(Some(_))`.
fn arb_clearable<T: std::fmt::Debug + Clone + 'static>(
    inner: impl Strategy<Value = T> + 'static,
) -> impl Strategy<Value = Option<Option<T>>> {
    proptest::option::of(proptest::option::of(inner))
}

fn arb_patch() -> impl Strategy<Value = TaskPatch> {
    (
        proptest::option::of("[^\x00]{1,32}"),
        arb_clearable("[^\x00]{0,64}"),
        proptest::option::of(any::<bool>()),
        proptest::option::of(arb_priority()),
        arb_clearable("[a-z]{1,12}"),
        proptest::option::of(prop::collection::vec("[a-z]{1,8}", 0..4)),
        arb_clearable(arb_time()),
    )
        .prop_map(
            |(title, description, completed, priority, category, tags, due_date)| TaskPatch {
                title,
                description,
                completed,
                priority,
                category,
                tags,
                due_date,
                order: None,
            },
        )
}

fn arb_task() -> impl Strategy<Value = Task> {
    (
        "[a-f0-9]{8,24}",
        "[^\x00]{1,32}",
        any::<bool>(),
        arb_priority(),
        proptest::option::of(arb_time()),
        arb_time(),
    )
        .prop_map(|(id, title, completed, priority, due_date, created_at)| Task {
            id: TaskId::new(id),
            title,
            description: None,
            completed,
            priority,
            category: None,
            tags: Vec::new(),
            due_date,
            created_at,
            updated_at: created_at,
            user_id: "u-1".to_string(),
            order: 0,
        })
}

proptest! {
    #[test]
    fn patch_survives_the_wire(patch in arb_patch()) {
        let json = serde_json::to_string(&patch).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let decoded: TaskPatch =
            serde_json::from_str(&json).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(decoded, patch);
    }

    #[test]
    fn underscore_id_decodes_identically(task in arb_task()) {
        let mut value = serde_json::to_value(&task).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let obj = value.as_object_mut().ok_or_else(|| TestCaseError::fail("not an object"))?;
        let id = obj.remove("id").ok_or_else(|| TestCaseError::fail("missing id"))?;
        obj.insert("_id".to_string(), id);

        let decoded: Task =
            serde_json::from_value(value).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(decoded, task);
    }

    #[test]
    fn random_json_never_panics(input in "\\PC{0,256}") {
        let _ = serde_json::from_str::<Task>(&input);
        let _ = serde_json::from_str::<TaskPatch>(&input);
    }
}
