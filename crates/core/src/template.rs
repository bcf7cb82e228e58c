//! Bundled workflow template and template loading.
//!
//! The bundled graph is the HunyuanVideo 1.5 720p text-to-video workflow
//! in ComfyUI API format. Custom templates can be loaded from disk as long
//! as they expose the four override targets.

use std::path::Path;

use crate::error::CoreError;
use crate::workflow::WorkflowGraph;

/// Bundled HunyuanVideo 1.5 text-to-video workflow (API format).
const HUNYUAN_VIDEO_T2V: &str = include_str!("../templates/hunyuan_video_1_5_t2v.json");

/// Positive prompt `CLIPTextEncode` node in the bundled template.
pub const POSITIVE_PROMPT_NODE: &str = "44";
/// Negative prompt `CLIPTextEncode` node in the bundled template.
pub const NEGATIVE_PROMPT_NODE: &str = "93";
/// `RandomNoise` node carrying `noise_seed`.
pub const NOISE_SEED_NODE: &str = "129";
/// `SaveVideo` node carrying `filename_prefix`.
pub const FILENAME_PREFIX_NODE: &str = "102";

/// Default server-side filename prefix; the seed is appended per job.
pub const DEFAULT_SERVER_PREFIX: &str = "video/hunyuan_video_1.5";

/// Parse the bundled template.
pub fn builtin_template() -> Result<WorkflowGraph, CoreError> {
    WorkflowGraph::from_json_str(HUNYUAN_VIDEO_T2V)
}

/// Load and validate a workflow template from a JSON file.
pub fn load_template(path: &Path) -> Result<WorkflowGraph, CoreError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        CoreError::Template(format!("failed to read {}: {e}", path.display()))
    })?;
    let graph = WorkflowGraph::from_json_str(&text)?;
    graph.validate()?;
    Ok(graph)
}

/// Server-side output prefix for a job: `{base}_{seed}`.
pub fn server_filename_prefix(base: &str, seed: u64) -> String {
    format!("{base}_{seed}")
}
