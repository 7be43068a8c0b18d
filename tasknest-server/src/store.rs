//! In-memory accounts, bearer tokens and tasks.
//!
//! The [`ServerStore`] is the authoritative state behind the API. Every task
//! belongs to exactly one user; lookups by another user behave as if the
//! task did not exist.

use std::collections::HashMap;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use tasknest_proto::api::User;
use tasknest_proto::{MAX_TASK_TITLE_LENGTH, Task, TaskDraft, TaskId, TaskPatch};

/// Errors from store operations. Mapped to HTTP statuses by the API layer.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0}")]
    Invalid(String),

    #[error("email already registered")]
    EmailTaken,

    #[error("invalid email or password")]
    BadCredentials,

    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("password hashing failed: {0}")]
    Hash(String),
}

#[derive(Debug, Clone)]
struct Account {
    user: User,
    password_hash: String,
}

/// A bearer token's owner and expiry (`None` never expires).
#[derive(Debug, Clone)]
struct Grant {
    user_id: String,
    expires_at: Option<DateTime<Utc>>,
}

/// Thread-safe store for users, sessions and tasks.
pub struct ServerStore {
    accounts: RwLock<HashMap<String, Account>>,
    tokens: RwLock<HashMap<String, Grant>>,
    tasks: RwLock<Vec<Task>>,
    max_title_len: usize,
    token_ttl: Option<Duration>,
}

impl Default for ServerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerStore {
    /// Creates an empty store with the default title limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_title_len(MAX_TASK_TITLE_LENGTH)
    }

    /// Creates an empty store with a custom title limit.
    #[must_use]
    pub fn with_max_title_len(max_title_len: usize) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            tokens: RwLock::new(HashMap::new()),
            tasks: RwLock::new(Vec::new()),
            max_title_len,
            token_ttl: None,
        }
    }

    /// Sets how long issued tokens stay valid. `None` keeps them forever.
    #[must_use]
    pub fn with_token_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.token_ttl = ttl;
        self
    }

    // --- accounts ---

    /// Creates an account and returns a fresh token for it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for a blank email or password and
    /// [`StoreError::EmailTaken`] if the email is registered.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<(String, User), StoreError> {
        let email = normalize_email(email)?;
        if password.is_empty() {
            return Err(StoreError::Invalid("password is required".to_string()));
        }
        let password_hash = hash_password(password)?;

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&email) {
            return Err(StoreError::EmailTaken);
        }
        let user = User {
            id: Uuid::now_v7().to_string(),
            name: name.trim().to_string(),
            email: email.clone(),
        };
        accounts.insert(
            email,
            Account {
                user: user.clone(),
                password_hash,
            },
        );
        drop(accounts);

        tracing::info!(user_id = %user.id, "account registered");
        let token = self.issue_token(&user.id).await;
        Ok((token, user))
    }

    /// Checks credentials and returns a fresh token.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BadCredentials`] for an unknown email or a
    /// wrong password.
    pub async fn login(&self, email: &str, password: &str) -> Result<(String, User), StoreError> {
        let email = normalize_email(email).map_err(|_| StoreError::BadCredentials)?;
        let account = self
            .accounts
            .read()
            .await
            .get(&email)
            .cloned()
            .ok_or(StoreError::BadCredentials)?;
        if !verify_password(password, &account.password_hash) {
            tracing::debug!(user_id = %account.user.id, "password mismatch");
            return Err(StoreError::BadCredentials);
        }
        let token = self.issue_token(&account.user.id).await;
        Ok((token, account.user))
    }

    /// Resolves a bearer token to its user. Expired tokens are dropped.
    pub async fn user_for_token(&self, token: &str) -> Option<User> {
        let grant = self.tokens.read().await.get(token).cloned()?;
        if grant.expires_at.is_some_and(|at| at <= Utc::now()) {
            self.tokens.write().await.remove(token);
            tracing::debug!(user_id = %grant.user_id, "token expired");
            return None;
        }
        self.accounts
            .read()
            .await
            .values()
            .find(|a| a.user.id == grant.user_id)
            .map(|a| a.user.clone())
    }

    async fn issue_token(&self, user_id: &str) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let grant = Grant {
            user_id: user_id.to_string(),
            expires_at: self.token_ttl.map(|ttl| Utc::now() + ttl),
        };
        self.tokens.write().await.insert(token.clone(), grant);
        token
    }

    // --- tasks ---

    /// Stores a new task for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for a blank or over-long title.
    pub async fn create_task(&self, user_id: &str, draft: TaskDraft) -> Result<Task, StoreError> {
        let title = self.check_title(&draft.title)?;
        let now = Utc::now();
        let mut tasks = self.tasks.write().await;
        let order = i64::try_from(tasks.iter().filter(|t| t.user_id == user_id).count())
            .unwrap_or(i64::MAX);
        let task = Task {
            id: TaskId::generate(),
            title,
            description: draft.description,
            completed: false,
            priority: draft.priority,
            category: draft.category,
            tags: draft.tags,
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

    /// Every task owned by `user_id`, in creation order.
    pub async fn list_tasks(&self, user_id: &str) -> Vec<Task> {
        self.tasks
            .read()
            .await
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    /// One task owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the task does not exist or is
    /// owned by someone else.
    pub async fn get_task(&self, user_id: &str, id: &TaskId) -> Result<Task, StoreError> {
        self.tasks
            .read()
            .await
            .iter()
            .find(|t| t.id == *id && t.user_id == user_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    /// Applies `patch` to a task owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] as for [`get_task`](Self::get_task),
    /// or [`StoreError::Invalid`] for a bad title.
    pub async fn update_task(
        &self,
        user_id: &str,
        id: &TaskId,
        mut patch: TaskPatch,
    ) -> Result<Task, StoreError> {
        if let Some(title) = &patch.title {
            patch.title = Some(self.check_title(title)?);
        }
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == *id && t.user_id == user_id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        task.apply_patch(&patch, Utc::now());
        Ok(task.clone())
    }

    /// Removes a task owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] as for [`get_task`](Self::get_task).
    pub async fn delete_task(&self, user_id: &str, id: &TaskId) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|t| !(t.id == *id && t.user_id == user_id));
        if tasks.len() == before {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(())
    }

    fn check_title(&self, title: &str) -> Result<String, StoreError> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(StoreError::Invalid("title is required".to_string()));
        }
        if trimmed.chars().count() > self.max_title_len {
            return Err(StoreError::Invalid(format!(
                "title exceeds {} characters",
                self.max_title_len
            )));
        }
        Ok(trimmed.to_string())
    }
}

fn normalize_email(email: &str) -> Result<String, StoreError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(StoreError::Invalid("a valid email is required".to_string()));
    }
    Ok(email)
}

fn hash_password(password: &str) -> Result<String, StoreError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StoreError::Hash(e.to_string()))
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}
