//! REST client for the `/plan-generation` endpoints.
//!
//! Wraps start, progress, cancel and result retrieval using [`reqwest`].
//! Non-2xx responses are decoded from the server's `{ error, code }` body
//! and mapped onto [`ClientError`].

use chrono::{DateTime, Utc};
use fitplan_core::plan_generation::{GenerationJob, GenerationParams};
use fitplan_core::types::DbId;
use reqwest::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

/// Path of the plan generation resource below the API root.
const PLAN_GENERATION_PATH: &str = "/api/v1/plan-generation";

/// HTTP client for one user's plan generation job.
pub struct PlanGenerationClient {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

/// Errors from the plan generation API layer.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request never produced a response (network, DNS, TLS, etc.).
    #[error("Request failed: {0}")]
    Transport(String),

    /// The user already has a pending or running job.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// No job (or no plan) exists for the user.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The bearer token was missing, invalid or expired.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-2xx response, or a body that could not be decoded.
    #[error("API error ({status} {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

impl ClientError {
    /// Whether retrying the same request later may succeed.
    ///
    /// Network failures, server errors and gateway timeouts are transient;
    /// domain errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Api { status, .. } => {
                *status >= 500 || *status == StatusCode::REQUEST_TIMEOUT.as_u16()
            }
            _ => false,
        }
    }
}

/// Error body produced by the server for every non-2xx response.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    code: String,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    progress: GenerationJob,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    message: String,
}

#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    data: T,
}

/// The persisted plan of a completed job.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePlan {
    pub id: DbId,
    pub owner_id: DbId,
    pub job_id: Uuid,
    pub goal: String,
    pub days_per_week: u8,
    pub plan: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl PlanGenerationClient {
    /// Create a client for the API at `api_url` authenticating with `token`.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://localhost:3000`.
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, token)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        api_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            api_url,
            token: token.into(),
        }
    }

    /// Start a generation job. Returns the initial `pending` snapshot.
    pub async fn start(&self, params: &GenerationParams) -> Result<GenerationJob, ClientError> {
        let response = self
            .client
            .post(self.url(""))
            .bearer_auth(&self.token)
            .json(params)
            .send()
            .await?;

        let body: StartResponse = Self::parse_response(response).await?;
        Ok(body.progress)
    }

    /// Current snapshot of the user's job.
    pub async fn get_progress(&self) -> Result<GenerationJob, ClientError> {
        let response = self
            .client
            .get(self.url("/progress"))
            .bearer_auth(&self.token)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Cancel the user's job. Returns the server's confirmation message.
    pub async fn cancel(&self) -> Result<String, ClientError> {
        let response = self
            .client
            .post(self.url("/cancel"))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let body: MessageResponse = Self::parse_response(response).await?;
        Ok(body.message)
    }

    /// The plan persisted by the user's most recent completed job.
    pub async fn get_result(&self) -> Result<ActivePlan, ClientError> {
        let response = self
            .client
            .get(self.url("/active"))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let body: DataResponse<ActivePlan> = Self::parse_response(response).await?;
        Ok(body.data)
    }

    // ---- private helpers ----

    fn url(&self, suffix: &str) -> String {
        format!("{}{PLAN_GENERATION_PATH}{suffix}", self.api_url)
    }

    /// Map a non-2xx response onto a [`ClientError`].
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(error_from_status(status, &text))
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let response = Self::ensure_success(response).await?;
        let status = response.status();
        response.json::<T>().await.map_err(|e| ClientError::Api {
            status: status.as_u16(),
            code: "INVALID_RESPONSE".to_string(),
            message: e.to_string(),
        })
    }
}

/// Build the error for a non-2xx `status` with raw body `text`.
fn error_from_status(status: StatusCode, text: &str) -> ClientError {
    let (code, message) = match serde_json::from_str::<ErrorBody>(text) {
        Ok(body) => (body.code, body.error),
        Err(_) => ("UNKNOWN".to_string(), text.to_string()),
    };

    match status {
        StatusCode::CONFLICT if code == "CONFLICT" => ClientError::Conflict(message),
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized(message),
        _ => ClientError::Api {
            status: status.as_u16(),
            code,
            message,
        },
    }
}
