//! Command-line flags, each with an environment-variable fallback.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use comfyvid_core::template::DEFAULT_SERVER_PREFIX;
use comfyvid_pipeline::batch::{BatchConfig, DEFAULT_COUNT, DEFAULT_EXTENSION, DEFAULT_OUT_PREFIX};
use comfyvid_pipeline::controller::{
    PollSettings, DEFAULT_JOB_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_SECS,
};

use crate::logging::LogFormat;

/// Default ComfyUI base URL.
pub const DEFAULT_HOST: &str = "http://127.0.0.1:8188";

/// Default TCP connect timeout for HTTP requests.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Generate a batch of videos through a ComfyUI server.
#[derive(Parser, Debug, Clone)]
#[command(name = "comfyvid", version, about, long_about = None)]
pub struct Args {
    /// ComfyUI base URL
    #[arg(long, env = "COMFYUI_URL", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Positive prompt text
    #[arg(long, env = "COMFYVID_PROMPT")]
    pub prompt: String,

    /// Negative prompt text
    #[arg(long, env = "COMFYVID_NEGATIVE", default_value = "")]
    pub negative: String,

    /// Output file prefix (without index/extension)
    #[arg(long, env = "COMFYVID_OUT", default_value = DEFAULT_OUT_PREFIX)]
    pub out: String,

    /// Output file extension
    #[arg(long, default_value = DEFAULT_EXTENSION)]
    pub extension: String,

    /// Per-job timeout in seconds
    #[arg(long, env = "COMFYVID_TIMEOUT_SECS", default_value_t = DEFAULT_JOB_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Poll interval in seconds
    #[arg(
        long,
        env = "COMFYVID_POLL_SECS",
        default_value_t = DEFAULT_POLL_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll: u64,

    /// Number of videos to generate
    #[arg(long, env = "COMFYVID_COUNT", default_value_t = DEFAULT_COUNT)]
    pub count: u32,

    /// Base seed, incremented per video (defaults to the current Unix time)
    #[arg(long, env = "COMFYVID_SEED")]
    pub seed: Option<u64>,

    /// Workflow template in ComfyUI API format (defaults to the bundled
    /// HunyuanVideo 1.5 text-to-video graph)
    #[arg(long, env = "COMFYVID_WORKFLOW")]
    pub workflow: Option<PathBuf>,

    /// Server-side filename prefix; the seed is appended
    #[arg(long, default_value = DEFAULT_SERVER_PREFIX)]
    pub server_prefix: String,

    /// TCP connect timeout in seconds
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout: u64,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Args {
    /// The explicit `--seed`, or the current Unix time.
    pub fn base_seed(&self) -> u64 {
        self.seed.unwrap_or_else(current_unix_seed)
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(self.poll),
            timeout: Duration::from_secs(self.timeout),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn batch_config(&self, base_seed: u64) -> BatchConfig {
        BatchConfig {
            prompt: self.prompt.clone(),
            negative: self.negative.clone(),
            out_prefix: self.out.clone(),
            extension: self.extension.clone(),
            count: self.count,
            base_seed,
            server_prefix: self.server_prefix.clone(),
        }
    }
}

fn current_unix_seed() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}
