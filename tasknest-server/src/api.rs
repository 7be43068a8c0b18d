//! HTTP API: routes, bearer authentication and error mapping.
//!
//! Every `/todos` route and `GET /auth/me` require `Authorization: Bearer
//! <token>`. Failures are answered with a JSON [`ErrorBody`].

use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use tasknest_proto::api::{self, AuthResponse, ErrorBody, LoginRequest, RegisterRequest, User};
use tasknest_proto::{CreateTaskRequest, Task, TaskId, TaskPatch};

use crate::store::{ServerStore, StoreError};

/// Shared server state.
pub struct AppState {
    pub store: ServerStore,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(ServerStore::new())
    }
}

impl AppState {
    #[must_use]
    pub const fn new(store: ServerStore) -> Self {
        Self { store }
    }
}

type SharedState = Arc<AppState>;

/// Error answered to the client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Invalid(msg) => Self::BadRequest(msg),
            StoreError::EmailTaken => Self::Conflict(err.to_string()),
            StoreError::BadCredentials => Self::Unauthorized(err.to_string()),
            StoreError::NotFound(_) => Self::NotFound(err.to_string()),
            StoreError::Hash(_) => Self::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "request rejected");
        }
        (
            status,
            Json(ErrorBody {
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// The user identified by the request's bearer token.
pub struct AuthUser(pub User);

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;
        state
            .store
            .user_for_token(token)
            .await
            .map(AuthUser)
            .ok_or_else(|| ApiError::Unauthorized("invalid or expired token".to_string()))
    }
}

/// Builds the router over `state`.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route(api::AUTH_REGISTER, post(register))
        .route(api::AUTH_LOGIN, post(login))
        .route(api::AUTH_ME, get(me))
        .route(api::TODOS_CREATE, post(create_task))
        .route(api::TODOS, get(list_tasks))
        .route(
            api::TODO_ITEM,
            get(get_task).put(update_task).delete(delete_task),
        )
        .with_state(state)
}

async fn register(
    State(state): State<SharedState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let (token, user) = state
        .store
        .register(&body.name, &body.email, &body.password)
        .await?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

async fn login(
    State(state): State<SharedState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let (token, user) = state.store.login(&body.email, &body.password).await?;
    tracing::info!(user_id = %user.id, "login");
    Ok(Json(AuthResponse { token, user }))
}

async fn me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

async fn create_task(
    State(state): State<SharedState>,
    AuthUser(user): AuthUser,
    Json(body): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    if body.user_id != user.id {
        return Err(ApiError::Forbidden(
            "cannot create tasks for another user".to_string(),
        ));
    }
    let task = state.store.create_task(&user.id, body.draft).await?;
    tracing::info!(user_id = %user.id, task_id = %task.id, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}

async fn list_tasks(
    State(state): State<SharedState>,
    AuthUser(user): AuthUser,
) -> Json<Vec<Task>> {
    Json(state.store.list_tasks(&user.id).await)
}

async fn get_task(
    State(state): State<SharedState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(state.store.get_task(&user.id, &TaskId::new(id)).await?))
}

async fn update_task(
    State(state): State<SharedState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<Task>, ApiError> {
    let task = state
        .store
        .update_task(&user.id, &TaskId::new(id), patch)
        .await?;
    tracing::info!(user_id = %user.id, task_id = %task.id, "task updated");
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<SharedState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = TaskId::new(id);
    state.store.delete_task(&user.id, &id).await?;
    tracing::info!(user_id = %user.id, task_id = %id, "task deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Starts the API server on `addr` with empty state.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: impl tokio::net::ToSocketAddrs,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(AppState::default())).await
}

/// Starts the API server with a pre-configured [`AppState`].
///
/// Bind to `127.0.0.1:0` for an OS-assigned port; the bound address is
/// returned alongside the server task handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: impl tokio::net::ToSocketAddrs,
    state: SharedState,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "api server error");
        }
    });

    Ok((bound_addr, handle))
}
