//! Task collection for the signed-in user.
//!
//! `TaskCollection` provides the application-layer interface for creating,
//! updating, deleting, toggling and reordering tasks. Remote mutations are
//! applied locally only after the store confirms them; a failure leaves the
//! list exactly as it was. Calls on one collection are serialized by
//! `&mut self`. Separate collections talking to the same store are not
//! coordinated, so the last response to arrive wins.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;

use tasknest_proto::{
    FilterUpdate, MAX_TASK_TITLE_LENGTH, Task, TaskDraft, TaskFilter, TaskId, TaskPatch,
};

use super::TaskError;
use super::view::{self, TaskStats};
use crate::mirror::TaskMirror;
use crate::notify::{Notification, Notifier};
use crate::store::TaskStore;

/// Holds `loading = true` until dropped.
struct LoadingGuard(Arc<watch::Sender<bool>>);

impl LoadingGuard {
    fn start(flag: &Arc<watch::Sender<bool>>) -> Self {
        flag.send_replace(true);
        Self(Arc::clone(flag))
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

/// The current user's tasks, backed by a remote [`TaskStore`] and mirrored
/// into a [`TaskMirror`].
pub struct TaskCollection<S: TaskStore, M: TaskMirror> {
    store: S,
    mirror: M,
    notifier: Notifier,
    /// Signed-in user; `None` outside a session.
    user_id: Option<String>,
    tasks: Vec<Task>,
    filter: TaskFilter,
    search: String,
    loading: Arc<watch::Sender<bool>>,
    max_title_len: usize,
}

impl<S: TaskStore, M: TaskMirror> TaskCollection<S, M> {
    /// Creates an empty collection with no active session.
    pub fn new(store: S, mirror: M, notifier: Notifier) -> Self {
        let (loading, _) = watch::channel(false);
        Self {
            store,
            mirror,
            notifier,
            user_id: None,
            tasks: Vec::new(),
            filter: TaskFilter::default(),
            search: String::new(),
            loading: Arc::new(loading),
            max_title_len: MAX_TASK_TITLE_LENGTH,
        }
    }

    /// Sets the maximum title length in characters.
    #[must_use]
    pub const fn with_max_title_len(mut self, max: usize) -> Self {
        self.max_title_len = max;
        self
    }

    // --- session lifecycle ---

    /// Starts a session for `user_id`.
    ///
    /// The collection is cleared first, then hydrated from the local mirror,
    /// then replaced by the remote list. If the remote list cannot be
    /// fetched the mirrored tasks stay in place and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Store`] if listing tasks fails.
    pub async fn open_session(&mut self, user_id: &str) -> Result<(), TaskError> {
        self.tasks.clear();
        self.filter = TaskFilter::default();
        self.search.clear();
        self.user_id = Some(user_id.to_string());

        if let Some(cached) = self.mirror.load(user_id) {
            self.tasks = cached.into_iter().filter(|t| t.user_id == user_id).collect();
            tracing::debug!(user_id, count = self.tasks.len(), "hydrated from mirror");
        }

        self.refresh().await
    }

    /// Switches to another user. Same as [`open_session`](Self::open_session).
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Store`] if listing the new user's tasks fails.
    pub async fn switch_user(&mut self, user_id: &str) -> Result<(), TaskError> {
        if let Some(previous) = &self.user_id {
            tracing::info!(from = %previous, to = user_id, "switching user");
        }
        self.open_session(user_id).await
    }

    /// Ends the session and forgets all in-memory state. The mirror is kept.
    pub fn close_session(&mut self) {
        self.user_id = None;
        self.tasks.clear();
        self.filter = TaskFilter::default();
        self.search.clear();
    }

    /// Replaces the collection with the authoritative remote list.
    ///
    /// Records owned by another user are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NoSession`] outside a session, or
    /// [`TaskError::Store`] if the request fails (state unchanged).
    pub async fn refresh(&mut self) -> Result<(), TaskError> {
        let user_id = self.user_id.clone().ok_or(TaskError::NoSession)?;
        let _loading = LoadingGuard::start(&self.loading);

        let remote = match self.store.list().await {
            Ok(tasks) => tasks,
            Err(e) => {
                let err = TaskError::from(e);
                self.report("Failed to load tasks", &err);
                return Err(err);
            }
        };

        let total = remote.len();
        self.tasks = remote.into_iter().filter(|t| t.user_id == user_id).collect();
        if self.tasks.len() != total {
            tracing::warn!(
                user_id = %user_id,
                dropped = total - self.tasks.len(),
                "ignoring tasks owned by another user"
            );
        }
        tracing::info!(user_id = %user_id, count = self.tasks.len(), "tasks loaded");
        self.persist();
        Ok(())
    }

    // --- mutations ---

    /// Creates a task from `draft` and appends the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::TitleEmpty`] or [`TaskError::TitleTooLong`]
    /// without contacting the store, [`TaskError::NoSession`] outside a
    /// session, or [`TaskError::Store`] if the store rejects it.
    pub async fn create_task(&mut self, draft: TaskDraft) -> Result<Task, TaskError> {
        let result = self.try_create(draft).await;
        match &result {
            Ok(task) => {
                tracing::info!(task_id = %task.id, "task created");
                self.notifier.notify(Notification::success(
                    "Task created",
                    "Your task has been added successfully",
                ));
            }
            Err(e) => self.report("Failed to create task", e),
        }
        result
    }

    async fn try_create(&mut self, mut draft: TaskDraft) -> Result<Task, TaskError> {
        draft.title = self.validate_title(&draft.title)?;
        let user_id = self.user_id.clone().ok_or(TaskError::NoSession)?;

        let _loading = LoadingGuard::start(&self.loading);
        let task = self.store.create(&draft, &user_id).await?;
        self.tasks.push(task.clone());
        self.persist();
        Ok(task)
    }

    /// Sends `patch` for task `id` and replaces the local copy with the
    /// stored record.
    ///
    /// An id that is not in the collection is rejected locally with
    /// [`TaskError::NotFound`]; nothing is sent.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidId`], [`TaskError::NotFound`] or a title
    /// validation error without contacting the store, or
    /// [`TaskError::Store`] if the update fails (state unchanged).
    pub async fn update_task(&mut self, id: &TaskId, patch: TaskPatch) -> Result<Task, TaskError> {
        let result = self.try_update(id, patch).await;
        match &result {
            Ok(task) => {
                tracing::info!(task_id = %task.id, "task updated");
                self.notifier.notify(Notification::success(
                    "Task updated",
                    "Your changes have been saved",
                ));
            }
            Err(e) => self.report("Failed to update task", e),
        }
        result
    }

    async fn try_update(&mut self, id: &TaskId, mut patch: TaskPatch) -> Result<Task, TaskError> {
        self.require_local(id)?;
        if let Some(title) = &patch.title {
            patch.title = Some(self.validate_title(title)?);
        }

        let _loading = LoadingGuard::start(&self.loading);
        let updated = self.store.update(id, &patch).await?;
        self.merge(updated.clone());
        self.persist();
        Ok(updated)
    }

    /// Deletes task `id`. The local copy is removed only after the store
    /// confirms.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidId`] or [`TaskError::NotFound`] without
    /// contacting the store, or [`TaskError::Store`] if the delete fails.
    pub async fn delete_task(&mut self, id: &TaskId) -> Result<(), TaskError> {
        let result = self.try_delete(id).await;
        match &result {
            Ok(()) => {
                tracing::info!(task_id = %id, "task deleted");
                self.notifier
                    .notify(Notification::success("Task deleted", "Task has been removed"));
            }
            Err(e) => self.report("Failed to delete task", e),
        }
        result
    }

    async fn try_delete(&mut self, id: &TaskId) -> Result<(), TaskError> {
        self.require_local(id)?;

        let _loading = LoadingGuard::start(&self.loading);
        self.store.delete(id).await?;
        self.tasks.retain(|t| t.id != *id);
        self.persist();
        Ok(())
    }

    /// Flips the completion flag of task `id`.
    ///
    /// Returns `Ok(None)` without contacting the store if the id is unknown.
    ///
    /// # Errors
    ///
    /// Same as [`update_task`](Self::update_task).
    pub async fn toggle_task(&mut self, id: &TaskId) -> Result<Option<Task>, TaskError> {
        let Some(completed) = self.find(id).map(|t| t.completed) else {
            tracing::debug!(task_id = %id, "toggle ignored: task not in collection");
            return Ok(None);
        };
        self.update_task(id, TaskPatch::completed(!completed))
            .await
            .map(Some)
    }

    /// Fetches task `id` from the store and merges it into the collection.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidId`] for a blank id, or
    /// [`TaskError::Store`] if the fetch fails.
    pub async fn get_task(&mut self, id: &TaskId) -> Result<Task, TaskError> {
        if id.is_blank() {
            return Err(TaskError::InvalidId);
        }
        let _loading = LoadingGuard::start(&self.loading);
        let task = match self.store.get_by_id(id).await {
            Ok(task) => task,
            Err(e) => {
                let err = TaskError::from(e);
                self.report("Failed to load task", &err);
                return Err(err);
            }
        };
        if self.user_id.as_deref() == Some(task.user_id.as_str()) {
            if self.find(&task.id).is_some() {
                self.merge(task.clone());
            } else {
                self.tasks.push(task.clone());
            }
            self.persist();
        }
        Ok(task)
    }

    /// Moves the task at `start` of the current view to `end`, then assigns
    /// `order = 0..n` to every task in the view.
    ///
    /// View tasks are written back into the collection slots they already
    /// occupied; tasks outside the view are untouched. Local only: nothing
    /// is sent to the store.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidIndex`] if either position is outside the
    /// view.
    pub fn reorder_tasks(&mut self, start: usize, end: usize) -> Result<(), TaskError> {
        let mut reordered: Vec<TaskId> = self.view().iter().map(|t| t.id.clone()).collect();
        let len = reordered.len();
        for index in [start, end] {
            if index >= len {
                return Err(TaskError::InvalidIndex { index, len });
            }
        }

        let moved = reordered.remove(start);
        reordered.insert(end, moved);

        let in_view: HashSet<&TaskId> = reordered.iter().collect();
        let slots: Vec<usize> = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| in_view.contains(&t.id))
            .map(|(i, _)| i)
            .collect();
        let mut by_id: HashMap<TaskId, Task> = slots
            .iter()
            .filter_map(|&i| self.tasks.get(i))
            .map(|t| (t.id.clone(), t.clone()))
            .collect();

        for (order, (&slot, id)) in slots.iter().zip(&reordered).enumerate() {
            if let Some(mut task) = by_id.remove(id) {
                task.order = i64::try_from(order).unwrap_or(i64::MAX);
                self.tasks[slot] = task;
            }
        }

        tracing::debug!(start, end, count = len, "tasks reordered");
        self.persist();
        Ok(())
    }

    // --- view ---

    /// Merges a partial change into the filter.
    pub fn set_filter(&mut self, update: FilterUpdate) {
        self.filter.apply(update);
    }

    /// Restores the default filter.
    pub fn reset_filter(&mut self) {
        self.filter = TaskFilter::default();
    }

    /// Sets the free-text search term layered over the filter.
    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
    }

    #[must_use]
    pub const fn filter(&self) -> &TaskFilter {
        &self.filter
    }

    #[must_use]
    pub fn search(&self) -> &str {
        &self.search
    }

    /// The filtered, sorted projection of the collection.
    #[must_use]
    pub fn view(&self) -> Vec<&Task> {
        view::project(&self.tasks, &self.filter, &self.search)
    }

    /// Statistics over the current view.
    #[must_use]
    pub fn stats(&self) -> TaskStats {
        view::stats(self.view(), Utc::now())
    }

    /// Distinct tags across all tasks, in first-seen order.
    #[must_use]
    pub fn all_tags(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.tasks
            .iter()
            .flat_map(|t| t.tags.iter())
            .filter(|tag| seen.insert(tag.as_str()))
            .cloned()
            .collect()
    }

    // --- accessors ---

    /// Every task of the current user, in collection order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Looks up a task by id.
    #[must_use]
    pub fn find(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == *id)
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Whether a store call is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Watches the loading flag.
    #[must_use]
    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn mirror(&self) -> &M {
        &self.mirror
    }

    // --- internal helpers ---

    fn validate_title(&self, title: &str) -> Result<String, TaskError> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(TaskError::TitleEmpty);
        }
        if trimmed.chars().count() > self.max_title_len {
            return Err(TaskError::TitleTooLong {
                max: self.max_title_len,
            });
        }
        Ok(trimmed.to_string())
    }

    fn require_local(&self, id: &TaskId) -> Result<(), TaskError> {
        if id.is_blank() {
            return Err(TaskError::InvalidId);
        }
        if self.find(id).is_none() {
            return Err(TaskError::NotFound(id.clone()));
        }
        Ok(())
    }

    /// Replaces the local task with the same id by `task`.
    fn merge(&mut self, task: Task) {
        if let Some(local) = self.tasks.iter_mut().find(|t| t.id == task.id) {
            *local = task;
        }
    }

    /// Writes the list to the mirror. Failures are reported, never fatal.
    fn persist(&self) {
        let Some(user_id) = &self.user_id else {
            return;
        };
        if let Err(e) = self.mirror.save(user_id, &self.tasks) {
            tracing::warn!(user_id = %user_id, error = %e, "failed to mirror tasks locally");
            self.notifier.notify(Notification::warning(
                "Not saved locally",
                "Your tasks are synced but could not be cached on this device",
            ));
        }
    }

    fn report(&self, action: &str, err: &TaskError) {
        tracing::warn!(kind = %err.kind(), error = %err, "{action}");
        self.notifier
            .notify(Notification::error("Error", format!("{action}: {err}")));
    }
}
