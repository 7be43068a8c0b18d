//! REST implementation of [`TaskStore`] over `reqwest`.
//!
//! Every request carries `Authorization: Bearer <token>` when a token is
//! configured. Without one, requests go out unauthenticated and the service
//! is expected to reject them with 401.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use tasknest_proto::api::{self, ErrorBody};
use tasknest_proto::{CreateTaskRequest, Task, TaskDraft, TaskId, TaskPatch};

use super::{StoreError, TaskStore};

/// HTTP client for the remote todo API.
#[derive(Debug, Clone)]
pub struct HttpTaskStore {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpTaskStore {
    /// Creates a client for the API rooted at `base_url`.
    ///
    /// `timeout` bounds each request; `None` keeps the transport default.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Transport`] if the HTTP client cannot be built.
    pub fn new(
        base_url: Url,
        token: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, StoreError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        endpoint(&self.base_url, path)
    }

    fn task_url(&self, id: &TaskId) -> Result<Url, StoreError> {
        task_endpoint(&self.base_url, id.as_str())
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl TaskStore for HttpTaskStore {
    #[instrument(skip(self, draft), fields(title = %draft.title))]
    async fn create(&self, draft: &TaskDraft, user_id: &str) -> Result<Task, StoreError> {
        let body = CreateTaskRequest {
            draft: draft.clone(),
            user_id: user_id.to_string(),
        };
        let request = self.client.post(self.url(api::TODOS_CREATE)).json(&body);
        let response = send(self.authorize(request)).await?;
        decode(response).await
    }

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<Task>, StoreError> {
        let request = self.client.get(self.url(api::TODOS));
        let response = send(self.authorize(request)).await?;
        decode(response).await
    }

    #[instrument(skip(self), fields(task_id = %id))]
    async fn get_by_id(&self, id: &TaskId) -> Result<Task, StoreError> {
        let request = self.client.get(self.task_url(id)?);
        let response = send(self.authorize(request)).await?;
        decode(response).await
    }

    #[instrument(skip(self, patch), fields(task_id = %id))]
    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, StoreError> {
        let request = self.client.put(self.task_url(id)?).json(patch);
        let response = send(self.authorize(request)).await?;
        decode(response).await
    }

    #[instrument(skip(self), fields(task_id = %id))]
    async fn delete(&self, id: &TaskId) -> Result<(), StoreError> {
        let request = self.client.delete(self.task_url(id)?);
        send(self.authorize(request)).await?;
        Ok(())
    }
}

/// Joins an API path onto the base URL, keeping any base path prefix
/// (e.g. `https://host/api` + `/todos` → `https://host/api/todos`).
pub(crate) fn endpoint(base: &Url, path: &str) -> String {
    format!("{}{path}", base.as_str().trim_end_matches('/'))
}

/// URL of a single task. The id is pushed as one path segment, so `/` and
/// `%` in it are percent-encoded and cannot escape the `/todos` prefix.
pub(crate) fn task_endpoint(base: &Url, id: &str) -> Result<Url, StoreError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| StoreError::Transport(format!("cannot build task URL from {base}")))?
        .pop_if_empty()
        .extend(api::TODOS.trim_start_matches('/').split('/'))
        .push(id);
    Ok(url)
}

/// Sends a request and converts non-2xx responses into [`StoreError::Service`].
pub(crate) async fn send(request: RequestBuilder) -> Result<Response, StoreError> {
    let response = request
        .send()
        .await
        .map_err(|e| StoreError::Transport(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        debug!(status = %status, "request succeeded");
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.message)
        .ok()
        .filter(|m| !m.is_empty())
        .or_else(|| (!body.is_empty()).then(|| body.clone()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    warn!(status = %status, message = %message, "request rejected by service");
    Err(StoreError::Service {
        status: status.as_u16(),
        message,
    })
}

/// Decodes a JSON success body.
pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    response
        .json()
        .await
        .map_err(|e| StoreError::InvalidResponse(e.to_string()))
}
