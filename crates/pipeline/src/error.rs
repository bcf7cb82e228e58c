//! Job and batch failure types, and their process exit codes.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use comfyvid_comfyui::api::ComfyUIApiError;
use comfyvid_core::error::CoreError;

// ---------------------------------------------------------------------------
// Exit codes
// ---------------------------------------------------------------------------

/// Every job completed and was downloaded.
pub const EXIT_SUCCESS: u8 = 0;
/// Submission failed or did not yield a prompt ID.
pub const EXIT_SUBMISSION_FAILED: u8 = 1;
/// The job completed but no video output was found.
pub const EXIT_MISSING_ARTIFACT: u8 = 2;
/// The job did not complete before its timeout.
pub const EXIT_TIMEOUT: u8 = 3;
/// A status query or download failed at the transport level.
pub const EXIT_TRANSPORT: u8 = 4;
/// The workflow template or batch parameters are invalid.
pub const EXIT_CONFIGURATION: u8 = 5;
/// The downloaded artifact could not be written to disk.
pub const EXIT_WRITE_FAILED: u8 = 6;

// ---------------------------------------------------------------------------
// Job state
// ---------------------------------------------------------------------------

/// Lifecycle of a single job.
///
/// `Completed`, `TimedOut` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Submitted,
    Polling,
    Completed,
    TimedOut,
    Failed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Polling => "polling",
            Self::Completed => "completed",
            Self::TimedOut => "timed_out",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Job errors
// ---------------------------------------------------------------------------

/// Why a job ended without a downloaded artifact.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The template could not be instantiated.
    #[error("Invalid workflow configuration: {0}")]
    Configuration(#[from] CoreError),

    /// The server did not accept the job (transport failure, rejection,
    /// or a response without a prompt ID).
    #[error("Failed to start prompt: {0}")]
    Submission(ComfyUIApiError),

    /// A status query or download failed after submission.
    #[error("Transport failure for prompt {prompt_id}: {source}")]
    Transport {
        prompt_id: String,
        #[source]
        source: ComfyUIApiError,
    },

    /// The server reported completion but exposed no video output.
    #[error("Prompt {prompt_id} completed but no video info found in outputs")]
    MissingArtifact { prompt_id: String },

    /// Polling gave up at the deadline.
    #[error("Timed out after {}s waiting for prompt {prompt_id} ({attempts} polls)", waited.as_secs())]
    Timeout {
        prompt_id: String,
        attempts: u32,
        waited: Duration,
    },

    /// The artifact was downloaded but could not be saved.
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl JobError {
    /// Terminal state this error leaves the job in.
    pub fn state(&self) -> JobState {
        match self {
            Self::Timeout { .. } => JobState::TimedOut,
            _ => JobState::Failed,
        }
    }

    /// Process exit code for this failure category.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration(_) => EXIT_CONFIGURATION,
            Self::Submission(_) => EXIT_SUBMISSION_FAILED,
            Self::Transport { .. } => EXIT_TRANSPORT,
            Self::MissingArtifact { .. } => EXIT_MISSING_ARTIFACT,
            Self::Timeout { .. } => EXIT_TIMEOUT,
            Self::Write { .. } => EXIT_WRITE_FAILED,
        }
    }
}

// ---------------------------------------------------------------------------
// Batch errors
// ---------------------------------------------------------------------------

/// The job that stopped a batch.
#[derive(Debug, thiserror::Error)]
#[error("Job {index} (seed {seed}) failed: {error}")]
pub struct BatchFailure {
    /// 1-based index of the failed job.
    pub index: u32,
    pub seed: u64,
    #[source]
    pub error: JobError,
}

impl BatchFailure {
    pub fn exit_code(&self) -> u8 {
        self.error.exit_code()
    }
}
