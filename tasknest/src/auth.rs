//! Authentication against `/auth/*` and the persisted session.
//!
//! A successful login or registration yields a bearer token and the user's
//! profile. Both are kept in `session.json` inside the data directory so that
//! later CLI invocations can reuse them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use tasknest_proto::api::{self, AuthResponse, LoginRequest, RegisterRequest, User};

use crate::store::http::{decode, endpoint, send};
use crate::store::{ErrorKind, StoreError};

/// Name of the session file inside the data directory.
pub const SESSION_FILE: &str = "session.json";

/// Errors from authentication and session persistence.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Email or password missing.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// No session is stored.
    #[error("not signed in (run `tasknest login`)")]
    NotSignedIn,

    /// The session file could not be read or written.
    #[error("session file {path}: {source}")]
    SessionIo {
        /// Path of the session file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The session file is not valid JSON.
    #[error("corrupt session file: {0}")]
    SessionFormat(#[from] serde_json::Error),

    /// The request failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(e) => e.kind(),
            _ => ErrorKind::Validation,
        }
    }
}

/// A signed-in user and their bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

impl From<AuthResponse> for Session {
    fn from(resp: AuthResponse) -> Self {
        Self {
            token: resp.token,
            user: resp.user,
        }
    }
}

impl Session {
    /// Path of the session file in `data_dir`.
    #[must_use]
    pub fn path_in(data_dir: &Path) -> PathBuf {
        data_dir.join(SESSION_FILE)
    }

    /// Reads the stored session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotSignedIn`] if there is no session file,
    /// or an I/O or format error if it cannot be read.
    pub fn load(data_dir: &Path) -> Result<Self, AuthError> {
        let path = Self::path_in(data_dir);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AuthError::NotSignedIn);
            }
            Err(source) => return Err(AuthError::SessionIo { path, source }),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    /// Writes the session, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be encoded or written.
    pub fn save(&self, data_dir: &Path) -> Result<(), AuthError> {
        let path = Self::path_in(data_dir);
        let encoded = serde_json::to_string_pretty(self)?;
        std::fs::create_dir_all(data_dir).map_err(|source| AuthError::SessionIo {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, encoded).map_err(|source| AuthError::SessionIo { path, source })?;
        tracing::debug!(user_id = %self.user.id, "session saved");
        Ok(())
    }

    /// Removes the stored session. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SessionIo`] if the file exists but cannot be removed.
    pub fn clear(data_dir: &Path) -> Result<(), AuthError> {
        let path = Self::path_in(data_dir);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(AuthError::SessionIo { path, source }),
        }
    }
}

/// HTTP client for the auth endpoints.
#[derive(Debug, Clone)]
pub struct AuthClient {
    client: Client,
    base_url: Url,
}

impl AuthClient {
    /// Creates a client for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if the HTTP client cannot be built.
    pub fn new(base_url: Url, timeout: Option<Duration>) -> Result<Self, AuthError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, base_url })
    }

    /// Creates an account and signs in.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingField`] for a blank email or password, or
    /// [`AuthError::Store`] if the service rejects the registration.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        require("email", email)?;
        require("password", password)?;
        let body = RegisterRequest {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let request = self
            .client
            .post(endpoint(&self.base_url, api::AUTH_REGISTER))
            .json(&body);
        let resp: AuthResponse = decode(send(request).await?).await?;
        tracing::info!(user_id = %resp.user.id, "registered");
        Ok(resp.into())
    }

    /// Exchanges credentials for a session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingField`] for a blank email or password, or
    /// [`AuthError::Store`] if the credentials are rejected.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        require("email", email)?;
        require("password", password)?;
        let body = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let request = self
            .client
            .post(endpoint(&self.base_url, api::AUTH_LOGIN))
            .json(&body);
        let resp: AuthResponse = decode(send(request).await?).await?;
        tracing::info!(user_id = %resp.user.id, "logged in");
        Ok(resp.into())
    }

    /// Fetches the profile of the token's owner.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if the token is rejected.
    #[instrument(skip_all)]
    pub async fn me(&self, token: &str) -> Result<User, AuthError> {
        let request = self
            .client
            .get(endpoint(&self.base_url, api::AUTH_ME))
            .bearer_auth(token);
        Ok(decode(send(request).await?).await?)
    }
}

fn require(field: &'static str, value: &str) -> Result<(), AuthError> {
    if value.trim().is_empty() {
        return Err(AuthError::MissingField(field));
    }
    Ok(())
}
