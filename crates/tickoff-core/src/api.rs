//! REST client for the todo backend.

use std::time::Duration;

use anyhow::{Context, anyhow};
use regex::Regex;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tickoff_shared::{CreateTaskRequest, Task, TaskId, UpdateTaskRequest};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

pub const FALLBACK_BASE_URL: &str = "http://localhost:8080";
const BASE_URL_PATTERN: &str = r"^https?://.+";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to reach {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("{method} {url} returned {status}")]
    Status {
        method: Method,
        url: String,
        status: StatusCode,
        message: Option<String>,
    },
    #[error("unexpected response from {url} ({status}): {detail}")]
    Parsing {
        url: String,
        status: StatusCode,
        detail: String,
    },
}

impl ApiError {
    /// Network failures and server errors may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch { .. } | Self::Timeout { .. } => true,
            Self::Status { status, .. } => status.is_server_error(),
            Self::Parsing { .. } => false,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Status {
                message: Some(message),
                ..
            } => message.clone(),
            Self::Fetch { .. } => {
                "Unable to connect to server. Please check your internet connection.".to_string()
            }
            Self::Timeout { .. } => "Request timed out. Please try again.".to_string(),
            Self::Status { status, .. } if status.is_server_error() => {
                "Server error. Please try again later.".to_string()
            }
            Self::Status {
                status: StatusCode::NOT_FOUND,
                ..
            } => "Resource not found.".to_string(),
            Self::Status {
                status: StatusCode::BAD_REQUEST,
                ..
            } => "Invalid request. Please check your input.".to_string(),
            Self::Status { .. } | Self::Parsing { .. } => {
                "An unexpected error occurred.".to_string()
            }
        }
    }

    fn from_transport(url: &Url, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Fetch {
                url: url.to_string(),
                source,
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Validates a configured base URL, falling back to the local default.
pub fn parse_base_url(raw: Option<&str>) -> Url {
    let candidate = raw.map(str::trim).unwrap_or_default();
    let matches = match Regex::new(BASE_URL_PATTERN) {
        Ok(pattern) => pattern.is_match(candidate),
        Err(err) => {
            warn!(error = %err, "base url pattern failed to compile");
            false
        }
    };

    let parsed = if matches {
        Url::parse(candidate).ok()
    } else {
        None
    };

    match parsed {
        Some(url) => url,
        None => {
            warn!(
                value = %candidate,
                fallback = FALLBACK_BASE_URL,
                "failed to parse API base url; check api.base_url or TICKOFF_API_BASE_URL"
            );
            fallback_base_url()
        }
    }
}

fn fallback_base_url() -> Url {
    Url::parse(FALLBACK_BASE_URL).expect("fallback base url is a valid url")
}

#[derive(Debug, Clone)]
pub struct TodoApi {
    client: reqwest::Client,
    base_url: Url,
}

impl TodoApi {
    pub fn new(base_url: Url) -> anyhow::Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("{base_url} cannot be used as an API base url"));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed building HTTP client for the todo API")?;

        Ok(Self { client, base_url })
    }

    #[instrument(skip(self))]
    pub async fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        self.send_json(Method::GET, &["tasks"], None::<&()>).await
    }

    #[instrument(skip(self, request), fields(text_len = request.text.as_str().len()))]
    pub async fn create_task(&self, request: &CreateTaskRequest) -> Result<Task, ApiError> {
        self.send_json(Method::POST, &["tasks"], Some(request)).await
    }

    #[instrument(skip(self, request), fields(%id))]
    pub async fn update_task(
        &self,
        id: &TaskId,
        request: &UpdateTaskRequest,
    ) -> Result<Task, ApiError> {
        self.send_json(Method::POST, &["tasks", id.as_str()], Some(request))
            .await
    }

    #[instrument(skip(self), fields(%id))]
    pub async fn complete_task(&self, id: &TaskId) -> Result<Task, ApiError> {
        self.send_json(Method::POST, &["tasks", id.as_str(), "complete"], None::<&()>)
            .await
    }

    #[instrument(skip(self), fields(%id))]
    pub async fn incomplete_task(&self, id: &TaskId) -> Result<Task, ApiError> {
        self.send_json(Method::POST, &["tasks", id.as_str(), "incomplete"], None::<&()>)
            .await
    }

    #[instrument(skip(self), fields(%id))]
    pub async fn delete_task(&self, id: &TaskId) -> Result<(), ApiError> {
        self.send(Method::DELETE, &["tasks", id.as_str()], None::<&()>)
            .await
            .map(|_| ())
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send_json<T, B>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let (url, status, text) = self.send(method, segments, body).await?;
        serde_json::from_str(&text).map_err(|err| ApiError::Parsing {
            url: url.to_string(),
            status,
            detail: err.to_string(),
        })
    }

    async fn send<B>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<(Url, StatusCode, String), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(segments);
        let request_id = Uuid::new_v4();
        debug!(%method, %url, %request_id, "sending request");

        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .header(REQUEST_ID_HEADER, request_id.to_string());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| ApiError::from_transport(&url, err))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| ApiError::from_transport(&url, err))?;
        debug!(%request_id, %status, bytes = text.len(), "received response");

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .map(|body| body.message);
            warn!(%method, %url, %status, ?message, "request failed");
            return Err(ApiError::Status {
                method,
                url: url.to_string(),
                status,
                message,
            });
        }

        Ok((url, status, text))
    }
}
