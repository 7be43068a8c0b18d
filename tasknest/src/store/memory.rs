//! In-process task store for tests and offline demos.
//!
//! Behaves like the remote service (assigns ids, stamps timestamps, answers
//! 404 for unknown ids) and can be told to fail the next calls so callers'
//! error paths can be exercised. Every call is counted.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use parking_lot::Mutex;

use tasknest_proto::{Task, TaskDraft, TaskId, TaskPatch};

use super::{StoreError, TaskStore};

/// A failure to inject into the next call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Simulate an unreachable service.
    Transport,
    /// Simulate a non-success response with the given status.
    Service(u16),
}

impl Failure {
    fn into_error(self) -> StoreError {
        match self {
            Self::Transport => StoreError::Transport("connection refused".to_string()),
            Self::Service(status) => StoreError::Service {
                status,
                message: "injected failure".to_string(),
            },
        }
    }
}

/// In-memory [`TaskStore`].
pub struct MemoryTaskStore {
    tasks: Mutex<Vec<Task>>,
    failures: Mutex<VecDeque<Failure>>,
    calls: AtomicUsize,
}

impl MemoryTaskStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Makes the next call fail with `failure`. Queued failures are
    /// consumed in FIFO order, one per call.
    pub fn fail_next(&self, failure: Failure) {
        self.failures.lock().push_back(failure);
    }

    /// Number of calls received so far (including failed ones).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Snapshot of everything stored, across all users.
    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.lock().clone()
    }

    fn begin_call(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failures.lock().pop_front() {
            Some(failure) => Err(failure.into_error()),
            None => Ok(()),
        }
    }

    fn not_found(id: &TaskId) -> StoreError {
        StoreError::Service {
            status: 404,
            message: format!("task {id} not found"),
        }
    }
}

impl Default for MemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore for MemoryTaskStore {
    async fn create(&self, draft: &TaskDraft, user_id: &str) -> Result<Task, StoreError> {
        self.begin_call()?;
        if draft.title.trim().is_empty() {
            return Err(StoreError::Service {
                status: 400,
                message: "title is required".to_string(),
            });
        }
        let now = Utc::now();
        let mut tasks = self.tasks.lock();
        let order = i64::try_from(tasks.iter().filter(|t| t.user_id == user_id).count())
            .unwrap_or(i64::MAX);
        let task = Task {
            id: TaskId::generate(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            completed: false,
            priority: draft.priority,
            category: draft.category.clone(),
            tags: draft.tags.clone(),
            due_date: draft.due_date,
            created_at: now,
            updated_at: now,
            user_id: user_id.to_string(),
            order,
        };
        tasks.push(task.clone());
        drop(tasks);
        Ok(task)
    }

    /// Returns every stored task regardless of owner, like a service that
    /// does not scope its listing. Callers filter by user.
    async fn list(&self) -> Result<Vec<Task>, StoreError> {
        self.begin_call()?;
        Ok(self.tasks.lock().clone())
    }

    async fn get_by_id(&self, id: &TaskId) -> Result<Task, StoreError> {
        self.begin_call()?;
        self.tasks
            .lock()
            .iter()
            .find(|t| t.id == *id)
            .cloned()
            .ok_or_else(|| Self::not_found(id))
    }

    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, StoreError> {
        self.begin_call()?;
        let mut tasks = self.tasks.lock();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == *id)
            .ok_or_else(|| Self::not_found(id))?;
        task.apply_patch(patch, Utc::now());
        Ok(task.clone())
    }

    async fn delete(&self, id: &TaskId) -> Result<(), StoreError> {
        self.begin_call()?;
        let mut tasks = self.tasks.lock();
        let before = tasks.len();
        tasks.retain(|t| t.id != *id);
        if tasks.len() == before {
            return Err(Self::not_found(id));
        }
        Ok(())
    }
}
