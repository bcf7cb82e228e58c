//! Shared test fixtures: a scripted in-memory [`ComfyTransport`].

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{json, Value};

use comfyvid_comfyui::api::{ComfyUIApiError, JobRequest, PromptId};
use comfyvid_comfyui::history::{ArtifactRef, HistorySnapshot};
use comfyvid_comfyui::transport::ComfyTransport;
use comfyvid_core::template::builtin_template;
use comfyvid_core::workflow::OverrideTargets;
use comfyvid_pipeline::controller::{JobController, PollSettings};

/// A single call observed by the fake, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Submit(Value),
    Poll(String),
    Fetch(ArtifactRef),
}

/// Scripted transport. Each queue is consumed front to back; once a
/// queue is empty the fake falls back to a well-behaved default:
///
/// * submit returns `prompt-{n}` for the n-th submission,
/// * poll returns a completed entry exposing `{prompt_id}.mp4`
///   (or a pending entry forever when built with [`never_completes`]),
/// * fetch returns `video:{filename}`.
///
/// [`never_completes`]: FakeTransport::never_completes
#[derive(Default)]
pub struct FakeTransport {
    submits: Mutex<VecDeque<Result<PromptId, ComfyUIApiError>>>,
    histories: Mutex<VecDeque<Result<Value, ComfyUIApiError>>>,
    fetches: Mutex<VecDeque<Result<Vec<u8>, ComfyUIApiError>>>,
    pending_forever: bool,
    calls: Mutex<Vec<Call>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn never_completes() -> Self {
        Self {
            pending_forever: true,
            ..Self::default()
        }
    }

    pub fn with_submit(self, result: Result<PromptId, ComfyUIApiError>) -> Self {
        self.submits.lock().unwrap().push_back(result);
        self
    }

    pub fn with_history(self, body: Value) -> Self {
        self.histories.lock().unwrap().push_back(Ok(body));
        self
    }

    pub fn with_history_error(self, error: ComfyUIApiError) -> Self {
        self.histories.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn with_fetch(self, result: Result<Vec<u8>, ComfyUIApiError>) -> Self {
        self.fetches.lock().unwrap().push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn submitted(&self) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Submit(body) => Some(body),
                _ => None,
            })
            .collect()
    }

    pub fn poll_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Poll(_)))
            .count()
    }

    pub fn fetched(&self) -> Vec<ArtifactRef> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Fetch(artifact) => Some(artifact),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ComfyTransport for FakeTransport {
    async fn submit(&self, request: &JobRequest) -> Result<PromptId, ComfyUIApiError> {
        self.record(Call::Submit(serde_json::to_value(request).unwrap()));
        let scripted = self.submits.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(format!("prompt-{}", self.submitted().len())))
    }

    async fn poll_status(&self, prompt_id: &str) -> Result<HistorySnapshot, ComfyUIApiError> {
        self.record(Call::Poll(prompt_id.to_string()));
        let scripted = self.histories.lock().unwrap().pop_front();
        let body = match scripted {
            Some(result) => result?,
            None if self.pending_forever => pending(prompt_id),
            None => completed(
                prompt_id,
                json!({ "102": { "videos": [video(&format!("{prompt_id}.mp4"))] } }),
            ),
        };
        Ok(serde_json::from_value(body).unwrap())
    }

    async fn fetch(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, ComfyUIApiError> {
        self.record(Call::Fetch(artifact.clone()));
        let scripted = self.fetches.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(format!("video:{}", artifact.filename).into_bytes()))
    }
}

// ---------------------------------------------------------------------------
// History payload builders
// ---------------------------------------------------------------------------

pub fn pending(prompt_id: &str) -> Value {
    json!({ prompt_id: { "status": { "completed": false }, "outputs": {} } })
}

pub fn completed(prompt_id: &str, outputs: Value) -> Value {
    json!({
        prompt_id: {
            "status": { "completed": true, "status_str": "success" },
            "outputs": outputs
        }
    })
}

pub fn video(filename: &str) -> Value {
    json!({ "filename": filename, "subfolder": "", "type": "output" })
}

// ---------------------------------------------------------------------------
// Controller construction
// ---------------------------------------------------------------------------

pub fn poll_settings() -> PollSettings {
    PollSettings {
        interval: Duration::from_secs(5),
        timeout: Duration::from_secs(60),
    }
}

pub fn controller(transport: FakeTransport) -> JobController<FakeTransport> {
    controller_with(transport, poll_settings())
}

pub fn controller_with(
    transport: FakeTransport,
    poll: PollSettings,
) -> JobController<FakeTransport> {
    JobController::new(
        transport,
        builtin_template().unwrap(),
        OverrideTargets::default(),
        poll,
    )
    .unwrap()
}
