//! Task collection state for the signed-in user.
//!
//! [`TaskCollection`] owns the canonical in-memory task list, applies
//! mutations only after the remote store confirms them, mirrors every change
//! locally, and derives the filtered/sorted projection shown to the user.

pub mod collection;
pub mod view;

pub use collection::TaskCollection;
pub use view::{CategoryStats, TaskStats, compare, matches_filter, matches_search, project, stats};

use tasknest_proto::TaskId;
use thiserror::Error;

use crate::store::{ErrorKind, StoreError};

/// Errors that can occur during task operations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Task title cannot be empty or whitespace.
    #[error("task title cannot be empty")]
    TitleEmpty,
    /// Task title exceeds the maximum length.
    #[error("task title too long (max {max} characters)")]
    TitleTooLong {
        /// Configured limit in characters.
        max: usize,
    },
    /// Task id is empty.
    #[error("invalid task id")]
    InvalidId,
    /// Task with the given ID is not in the collection.
    #[error("task not found: {0}")]
    NotFound(TaskId),
    /// A position outside the current view.
    #[error("position {index} out of range (view has {len} tasks)")]
    InvalidIndex {
        /// Offending position.
        index: usize,
        /// Number of tasks in the view.
        len: usize,
    },
    /// No user is signed in.
    #[error("no active session")]
    NoSession,
    /// The remote store rejected or never received the request.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TaskError {
    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(e) => e.kind(),
            _ => ErrorKind::Validation,
        }
    }
}
