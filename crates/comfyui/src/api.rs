//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps workflow submission (`POST /prompt`), history retrieval
//! (`GET /history/{prompt_id}`) and artifact download (`GET /view`)
//! using [`reqwest`]. No request is retried here.

use std::time::Duration;

use comfyvid_core::workflow::WorkflowGraph;
use serde::{Deserialize, Serialize};

use crate::history::{ArtifactRef, HistorySnapshot};

/// Server-assigned identifier correlating status queries to a job.
pub type PromptId = String;

/// HTTP client for a single ComfyUI instance.
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
}

/// Body of `POST /prompt`.
#[derive(Debug, Clone, Serialize)]
pub struct JobRequest {
    /// The fully instantiated workflow graph.
    pub prompt: WorkflowGraph,
}

/// Response returned by the ComfyUI `/prompt` endpoint.
///
/// Every field is optional on the wire; a response without a
/// `prompt_id` means the server did not queue the workflow.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub prompt_id: Option<String>,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: Option<i64>,
    /// Per-node validation errors reported by the server.
    #[serde(default)]
    pub node_errors: Option<serde_json::Value>,
}

impl SubmitResponse {
    /// Extract the prompt ID, failing with [`ComfyUIApiError::Protocol`]
    /// when it is missing or empty.
    pub fn into_prompt_id(self) -> Result<PromptId, ComfyUIApiError> {
        match self.prompt_id {
            Some(id) if !id.is_empty() => Ok(id),
            _ => {
                let detail = self
                    .node_errors
                    .filter(|errors| !errors.is_null())
                    .map(|errors| format!(" (node_errors: {errors})"))
                    .unwrap_or_default();
                Err(ComfyUIApiError::Protocol(format!(
                    "submission response has no prompt_id{detail}"
                )))
            }
        }
    }
}

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request failed (network, DNS, TLS, body decoding, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The base URL could not be combined into a request URL.
    #[error("Invalid ComfyUI URL: {0}")]
    InvalidUrl(String),

    /// A well-formed response whose payload is semantically unusable.
    #[error("ComfyUI protocol error: {0}")]
    Protocol(String),
}

impl ComfyUIApiError {
    /// Whether this is a payload problem rather than a transport failure.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

impl ComfyUIApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`. A trailing
    ///   slash is ignored.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    /// Create an API client whose connections give up after
    /// `connect_timeout`. Transfers themselves are not time-limited.
    pub fn with_connect_timeout(
        api_url: impl Into<String>,
        connect_timeout: Duration,
    ) -> Result<Self, ComfyUIApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self::with_client(client, api_url))
    }

    /// Base HTTP API URL without a trailing slash.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit a workflow for execution.
    ///
    /// Sends `POST /prompt` with `{"prompt": <graph>}` and returns the
    /// server-assigned `prompt_id`.
    pub async fn submit_workflow(&self, request: &JobRequest) -> Result<PromptId, ComfyUIApiError> {
        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(request)
            .send()
            .await?;

        let parsed: SubmitResponse = Self::parse_response(response).await?;
        if let Some(number) = parsed.number {
            tracing::debug!(queue_number = number, "Workflow queued");
        }
        parsed.into_prompt_id()
    }

    /// Retrieve execution history for a specific prompt.
    ///
    /// Sends `GET /history/{prompt_id}`. An unknown prompt yields an empty
    /// snapshot, not an error.
    pub async fn get_history(&self, prompt_id: &str) -> Result<HistorySnapshot, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Download the raw bytes of an artifact via `GET /view`.
    pub async fn download(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, ComfyUIApiError> {
        let url = self.view_url(artifact)?;
        tracing::debug!(url = %url, "Downloading artifact");

        let response = self.client.get(url).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Build the `/view` URL for an artifact.
    pub fn view_url(&self, artifact: &ArtifactRef) -> Result<reqwest::Url, ComfyUIApiError> {
        reqwest::Url::parse_with_params(
            &format!("{}/view", self.api_url),
            artifact.view_query(),
        )
        .map_err(|e| ComfyUIApiError::InvalidUrl(format!("{}: {e}", self.api_url)))
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ComfyUIApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUIApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyUIApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
