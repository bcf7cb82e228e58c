//! The seam between the job controller and a ComfyUI server.
//!
//! [`ComfyTransport`] is implemented by [`ComfyUIApi`] for real servers
//! and by in-memory fakes in tests.

use std::future::Future;

use crate::api::{ComfyUIApi, ComfyUIApiError, JobRequest, PromptId};
use crate::history::{ArtifactRef, HistorySnapshot};

/// Request/response exchanges against one ComfyUI endpoint.
///
/// Implementations perform each call exactly once; retry policy belongs
/// to the caller.
pub trait ComfyTransport: Send + Sync {
    /// Queue a job and return its handle.
    fn submit(
        &self,
        request: &JobRequest,
    ) -> impl Future<Output = Result<PromptId, ComfyUIApiError>> + Send;

    /// Fetch the current history snapshot for `prompt_id`.
    fn poll_status(
        &self,
        prompt_id: &str,
    ) -> impl Future<Output = Result<HistorySnapshot, ComfyUIApiError>> + Send;

    /// Retrieve the raw bytes of an artifact.
    fn fetch(
        &self,
        artifact: &ArtifactRef,
    ) -> impl Future<Output = Result<Vec<u8>, ComfyUIApiError>> + Send;
}

impl ComfyTransport for ComfyUIApi {
    async fn submit(&self, request: &JobRequest) -> Result<PromptId, ComfyUIApiError> {
        self.submit_workflow(request).await
    }

    async fn poll_status(&self, prompt_id: &str) -> Result<HistorySnapshot, ComfyUIApiError> {
        self.get_history(prompt_id).await
    }

    async fn fetch(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, ComfyUIApiError> {
        self.download(artifact).await
    }
}
