//! Sequential batch driver.
//!
//! A batch is `count` jobs sharing one prompt, with seeds
//! `base_seed, base_seed + 1, ...` and output files
//! `{out_prefix}_{index}.{extension}` (1-based index). Jobs run strictly
//! one after another, and the first failure stops the batch.

use std::path::PathBuf;

use comfyvid_comfyui::transport::ComfyTransport;
use comfyvid_core::error::CoreError;
use comfyvid_core::template::server_filename_prefix;
use comfyvid_core::workflow::JobOverrides;

use crate::controller::{JobController, JobOutcome, JobSpec};
use crate::error::BatchFailure;

/// Default local output prefix.
pub const DEFAULT_OUT_PREFIX: &str = "comfy_video";
/// Default output file extension.
pub const DEFAULT_EXTENSION: &str = "mp4";
/// Default number of jobs per batch.
pub const DEFAULT_COUNT: u32 = 5;

/// User-level description of a batch.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub prompt: String,
    pub negative: String,
    /// Local path prefix; `_{index}.{extension}` is appended.
    pub out_prefix: String,
    pub extension: String,
    pub count: u32,
    pub base_seed: u64,
    /// Server-side filename prefix; `_{seed}` is appended per job.
    pub server_prefix: String,
}

/// One job of a planned batch.
#[derive(Debug, Clone)]
pub struct PlannedJob {
    /// 1-based position in the batch.
    pub index: u32,
    pub spec: JobSpec,
}

impl PlannedJob {
    pub fn seed(&self) -> u64 {
        self.spec.overrides.seed
    }
}

/// The ordered jobs of a batch, computed before anything is submitted.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    jobs: Vec<PlannedJob>,
}

/// Successful batch result, in submission order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<JobOutcome>,
}

/// Local output path for the job at `index`.
pub fn output_path(out_prefix: &str, index: u32, extension: &str) -> PathBuf {
    PathBuf::from(format!("{out_prefix}_{index}.{extension}"))
}

impl BatchPlan {
    /// Expand a config into its jobs.
    ///
    /// Fails with [`CoreError::SeedOverflow`] if the last seed does not
    /// fit in a `u64`.
    pub fn new(config: &BatchConfig) -> Result<Self, CoreError> {
        let jobs = (1..=config.count)
            .map(|index| {
                let offset = u64::from(index - 1);
                let seed = config
                    .base_seed
                    .checked_add(offset)
                    .ok_or(CoreError::SeedOverflow {
                        base: config.base_seed,
                        offset,
                    })?;
                Ok(PlannedJob {
                    index,
                    spec: JobSpec {
                        overrides: JobOverrides {
                            prompt: config.prompt.clone(),
                            negative: config.negative.clone(),
                            seed,
                            filename_prefix: server_filename_prefix(&config.server_prefix, seed),
                        },
                        out_path: output_path(&config.out_prefix, index, &config.extension),
                    },
                })
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        Ok(Self { jobs })
    }

    pub fn jobs(&self) -> &[PlannedJob] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Run every job of `plan` in order, stopping at the first failure.
///
/// `on_complete` is called after each job's file has been written.
pub async fn run_batch<T, F>(
    controller: &JobController<T>,
    plan: &BatchPlan,
    mut on_complete: F,
) -> Result<BatchReport, BatchFailure>
where
    T: ComfyTransport,
    F: FnMut(&JobOutcome),
{
    let total = plan.len();
    let mut report = BatchReport::default();

    for job in plan.jobs() {
        tracing::info!(
            index = job.index,
            total,
            seed = job.seed(),
            out_path = %job.spec.out_path.display(),
            "Starting job",
        );

        match controller.run_job(&job.spec).await {
            Ok(outcome) => {
                on_complete(&outcome);
                report.outcomes.push(outcome);
            }
            Err(error) => {
                tracing::error!(
                    index = job.index,
                    seed = job.seed(),
                    state = %error.state(),
                    exit_code = error.exit_code(),
                    error = %error,
                    "Job failed, stopping batch",
                );
                return Err(BatchFailure {
                    index: job.index,
                    seed: job.seed(),
                    error,
                });
            }
        }
    }

    tracing::info!(completed = report.outcomes.len(), "Batch finished");
    Ok(report)
}
