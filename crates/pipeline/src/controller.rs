//! Single-job lifecycle: submit, poll, locate the video, download.
//!
//! ```text
//! Submitted ──► Polling ──► Completed
//!                  │  └────► TimedOut
//!                  └───────► Failed
//! ```
//!
//! Only the "not completed yet" condition is retried. Any transport error
//! ends the job at once, and a timed-out prompt is abandoned without a
//! cancellation request.

use std::path::{Path, PathBuf};
use std::time::Duration;

use comfyvid_comfyui::api::{JobRequest, PromptId};
use comfyvid_comfyui::history::{ArtifactRef, HistoryEntry, HistorySnapshot};
use comfyvid_comfyui::transport::ComfyTransport;
use comfyvid_core::error::CoreError;
use comfyvid_core::workflow::{JobOverrides, OverrideTargets, WorkflowGraph};
use tokio::time::Instant;

use crate::error::{JobError, JobState};
use crate::poll::{poll_until, PollError, Polled};

/// Default seconds between status queries.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
/// Default per-job deadline in seconds (six hours).
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 21_600;

/// Polling cadence and per-job deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            timeout: Duration::from_secs(DEFAULT_JOB_TIMEOUT_SECS),
        }
    }
}

/// Everything that varies between jobs of a batch.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub overrides: JobOverrides,
    /// Local file the downloaded video is written to.
    pub out_path: PathBuf,
}

/// Result of a completed job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub prompt_id: PromptId,
    pub seed: u64,
    /// Output node the video was taken from.
    pub node_id: String,
    pub artifact: ArtifactRef,
    pub out_path: PathBuf,
    pub bytes_written: usize,
    /// Number of status queries issued.
    pub polls: u32,
    pub elapsed: Duration,
}

/// Runs jobs built from one template against one transport.
pub struct JobController<T> {
    transport: T,
    template: WorkflowGraph,
    targets: OverrideTargets,
    poll: PollSettings,
}

impl<T: ComfyTransport> JobController<T> {
    /// Create a controller, checking up front that the template exposes
    /// every override target as a literal input.
    pub fn new(
        transport: T,
        template: WorkflowGraph,
        targets: OverrideTargets,
        poll: PollSettings,
    ) -> Result<Self, CoreError> {
        template.check_targets(&targets)?;
        Ok(Self {
            transport,
            template,
            targets,
            poll,
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Drive one job to a terminal state.
    pub async fn run_job(&self, spec: &JobSpec) -> Result<JobOutcome, JobError> {
        let started = Instant::now();
        let seed = spec.overrides.seed;

        let graph = self.template.build_job(&self.targets, &spec.overrides)?;
        let prompt_id = self
            .transport
            .submit(&JobRequest { prompt: graph })
            .await
            .map_err(JobError::Submission)?;
        log_transition(&prompt_id, seed, JobState::Submitted);

        let Polled {
            value: entry,
            attempts: polls,
            ..
        } = self.wait_for_completion(&prompt_id, seed).await?;
        log_transition(&prompt_id, seed, JobState::Completed);

        let (node_id, artifact) = match entry.first_video() {
            Some((node_id, artifact)) => (node_id.to_string(), artifact.clone()),
            None => return Err(JobError::MissingArtifact { prompt_id }),
        };
        tracing::info!(
            prompt_id = %prompt_id,
            node_id = %node_id,
            filename = %artifact.filename,
            subfolder = %artifact.subfolder,
            artifact_type = %artifact.artifact_type(),
            "Located video output",
        );

        let bytes = match self.transport.fetch(&artifact).await {
            Ok(bytes) => bytes,
            Err(source) => return Err(JobError::Transport { prompt_id, source }),
        };
        write_artifact(&spec.out_path, &bytes).await?;

        tracing::info!(
            prompt_id = %prompt_id,
            seed,
            path = %spec.out_path.display(),
            bytes = bytes.len(),
            "Video saved",
        );

        Ok(JobOutcome {
            prompt_id,
            seed,
            node_id,
            artifact,
            out_path: spec.out_path.clone(),
            bytes_written: bytes.len(),
            polls,
            elapsed: started.elapsed(),
        })
    }

    /// Poll history until the prompt's entry reports completion.
    ///
    /// A missing entry counts as still pending.
    async fn wait_for_completion(
        &self,
        prompt_id: &str,
        seed: u64,
    ) -> Result<Polled<HistoryEntry>, JobError> {
        log_transition(prompt_id, seed, JobState::Polling);

        let result = poll_until(self.poll.interval, self.poll.timeout, |attempt| async move {
            self.transport
                .poll_status(prompt_id)
                .await
                .map(|snapshot| completed_entry(snapshot, prompt_id, attempt))
        })
        .await;

        result.map_err(|e| match e {
            PollError::Failed(source) => JobError::Transport {
                prompt_id: prompt_id.to_string(),
                source,
            },
            PollError::DeadlineExceeded { attempts, waited } => JobError::Timeout {
                prompt_id: prompt_id.to_string(),
                attempts,
                waited,
            },
        })
    }
}

/// The prompt's entry if it is present and marked completed.
fn completed_entry(
    snapshot: HistorySnapshot,
    prompt_id: &str,
    attempt: u32,
) -> Option<HistoryEntry> {
    match snapshot.into_entry(prompt_id) {
        Some(entry) if entry.is_completed() => Some(entry),
        Some(entry) => {
            tracing::debug!(
                prompt_id,
                attempt,
                status = entry.status.status_str.as_deref().unwrap_or("running"),
                "Prompt not complete yet",
            );
            None
        }
        None => {
            tracing::debug!(prompt_id, attempt, "Prompt not in history yet");
            None
        }
    }
}

fn log_transition(prompt_id: &str, seed: u64, state: JobState) {
    tracing::info!(prompt_id, seed, state = %state, "Job state changed");
}

/// Write the whole buffer to `path`, creating missing parent directories.
async fn write_artifact(path: &Path, bytes: &[u8]) -> Result<(), JobError> {
    let to_error = |source: std::io::Error| JobError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(to_error)?;
    }
    tokio::fs::write(path, bytes).await.map_err(to_error)
}
