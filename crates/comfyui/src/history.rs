//! Types for the ComfyUI `/history/{prompt_id}` response.
//!
//! The history payload is keyed by prompt ID. An entry carries a
//! `status` block and an `outputs` map from node ID to whatever that
//! node produced. Only video outputs are modelled; every other field is
//! ignored during deserialization.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Artifact category used when a reference does not name one.
pub const DEFAULT_ARTIFACT_TYPE: &str = "output";

/// Snapshot of `/history/{prompt_id}`, in server order.
///
/// A prompt that the server has not recorded yet is simply absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct HistorySnapshot(IndexMap<String, HistoryEntry>);

impl HistorySnapshot {
    /// Entry for `prompt_id`, if the server has one.
    pub fn entry(&self, prompt_id: &str) -> Option<&HistoryEntry> {
        self.0.get(prompt_id)
    }

    /// Take ownership of the entry for `prompt_id`.
    pub fn into_entry(mut self, prompt_id: &str) -> Option<HistoryEntry> {
        self.0.shift_remove(prompt_id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One prompt's history record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub status: HistoryStatus,
    /// Per-node outputs keyed by node ID, in server order.
    #[serde(default)]
    pub outputs: IndexMap<String, NodeOutput>,
}

/// Execution status block of a history entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryStatus {
    #[serde(default)]
    pub completed: bool,
    /// Free-form status such as `"success"` or `"error"`.
    #[serde(default)]
    pub status_str: Option<String>,
}

/// Output record of a single node. Either field may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeOutput {
    #[serde(default)]
    pub videos: Option<Vec<ArtifactRef>>,
    #[serde(default)]
    pub video: Option<ArtifactRef>,
}

/// Identifies a file that can be retrieved through `/view`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl ArtifactRef {
    /// True for `{}`: no filename, subfolder or type.
    pub fn is_empty(&self) -> bool {
        self.filename.is_empty() && self.subfolder.is_empty() && self.kind.is_none()
    }

    /// Artifact category, falling back to [`DEFAULT_ARTIFACT_TYPE`].
    pub fn artifact_type(&self) -> &str {
        self.kind.as_deref().unwrap_or(DEFAULT_ARTIFACT_TYPE)
    }

    /// Query parameters for `GET /view`.
    pub fn view_query(&self) -> [(&'static str, &str); 3] {
        [
            ("filename", self.filename.as_str()),
            ("subfolder", self.subfolder.as_str()),
            ("type", self.artifact_type()),
        ]
    }
}

impl NodeOutput {
    /// The video this node exposes: the first element of a non-empty
    /// `videos` list, otherwise a non-empty singular `video` field.
    pub fn video_artifact(&self) -> Option<&ArtifactRef> {
        self.videos
            .as_ref()
            .and_then(|videos| videos.first())
            .or(self.video.as_ref().filter(|video| !video.is_empty()))
    }
}

impl HistoryEntry {
    pub fn is_completed(&self) -> bool {
        self.status.completed
    }

    /// First video artifact across all outputs, scanning nodes in server
    /// order. Returns the producing node ID along with the reference.
    pub fn first_video(&self) -> Option<(&str, &ArtifactRef)> {
        self.outputs
            .iter()
            .find_map(|(node_id, output)| output.video_artifact().map(|a| (node_id.as_str(), a)))
    }
}
