//! Remote task store abstraction for `TaskNest`.
//!
//! Defines the [`TaskStore`] trait every backend must satisfy.
//! Concrete implementations:
//! - [`http::HttpTaskStore`]: REST client for the remote todo API
//! - [`memory::MemoryTaskStore`]: in-process store for tests and offline demos

pub mod http;
pub mod memory;

use std::fmt;

use tasknest_proto::{Task, TaskDraft, TaskId, TaskPatch};

/// Coarse classification of a failure, used to pick user-facing wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected locally before any request was sent.
    Validation,
    /// No response reached the service.
    Transport,
    /// The service answered with a failure.
    Service,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Transport => write!(f, "transport"),
            Self::Service => write!(f, "service"),
        }
    }
}

/// Errors returned by a [`TaskStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The request never produced a response (connection refused, DNS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("service error ({status}): {message}")]
    Service {
        /// HTTP status code.
        status: u16,
        /// Message from the error body, or the status reason.
        message: String,
    },

    /// A success response whose body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl StoreError {
    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transport,
            Self::Service { .. } | Self::InvalidResponse(_) => ErrorKind::Service,
        }
    }

    /// Returns `true` for a 404 from the service.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Service { status: 404, .. })
    }

    /// Returns `true` for a 401 or 403 from the service.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Service { status: 401 | 403, .. })
    }
}

/// Async CRUD interface to the authoritative task store.
///
/// Each call is exactly one request/response round trip: no retries, no
/// batching, no side effects beyond the single mutation it names.
pub trait TaskStore: Send + Sync {
    /// Create a task owned by `user_id`. The store assigns the id.
    fn create(
        &self,
        draft: &TaskDraft,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<Task, StoreError>> + Send;

    /// List every task of the authenticated user.
    fn list(&self) -> impl std::future::Future<Output = Result<Vec<Task>, StoreError>> + Send;

    /// Fetch one task.
    fn get_by_id(
        &self,
        id: &TaskId,
    ) -> impl std::future::Future<Output = Result<Task, StoreError>> + Send;

    /// Apply a partial update and return the stored record.
    fn update(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> impl std::future::Future<Output = Result<Task, StoreError>> + Send;

    /// Delete a task.
    fn delete(&self, id: &TaskId)
    -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}
