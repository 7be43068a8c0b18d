//! HTTP API surface shared by client and server: route paths, auth
//! payloads, and the error body format.

use serde::{Deserialize, Serialize};

/// `POST`: create a task.
pub const TODOS_CREATE: &str = "/todos/create";
/// `GET`: list the caller's tasks.
pub const TODOS: &str = "/todos";
/// `POST`: register a new account.
pub const AUTH_REGISTER: &str = "/auth/register";
/// `POST`: exchange credentials for a bearer token.
pub const AUTH_LOGIN: &str = "/auth/login";
/// `GET`: profile of the token's owner.
pub const AUTH_ME: &str = "/auth/me";

/// Route template of a single task (`GET`, `PUT`, `DELETE`). Clients
/// append the id as one percent-encoded path segment under [`TODOS`].
pub const TODO_ITEM: &str = "/todos/{id}";

/// An authenticated user's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub email: String,
}

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of `POST /auth/register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Response of login and register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// JSON body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}
