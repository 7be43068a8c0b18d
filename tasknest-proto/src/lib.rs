//! Shared data model and API definitions for `TaskNest`.

pub mod api;
pub mod filter;
pub mod task;

pub use filter::{FilterUpdate, SortBy, SortOrder, StatusFilter, TaskFilter};
pub use task::{
    CreateTaskRequest, MAX_TASK_TITLE_LENGTH, Priority, SUGGESTED_CATEGORIES, Task, TaskDraft,
    TaskId, TaskPatch,
};
