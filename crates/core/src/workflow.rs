//! ComfyUI workflow graph model and job instantiation.
//!
//! A workflow is an object keyed by node ID. Each node carries a
//! `class_type`, an `inputs` object and optional `_meta`. An input value
//! is either a literal or a link to another node's output, encoded as a
//! two-element array `[source_node_id, output_slot]`.
//!
//! [`WorkflowGraph`] is treated as an immutable template:
//! [`WorkflowGraph::build_job`] returns a fresh graph with a fixed set of
//! literal inputs overwritten and never touches the template or its links.

use std::collections::VecDeque;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::template::{
    FILENAME_PREFIX_NODE, NEGATIVE_PROMPT_NODE, NOISE_SEED_NODE, POSITIVE_PROMPT_NODE,
};

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// A single node in a ComfyUI workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// Input values keyed by input name (literals or links).
    #[serde(default)]
    pub inputs: Map<String, Value>,
    /// ComfyUI class type (e.g. "CLIPTextEncode", "SaveVideo").
    pub class_type: String,
    /// Editor metadata such as the node title. Passed through untouched.
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// A directed edge from a producer's output slot into a consumer input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLink {
    /// Producer node ID.
    pub from_node: String,
    /// Producer output slot index.
    pub from_output: u64,
    /// Consumer node ID.
    pub to_node: String,
    /// Consumer input name.
    pub to_input: String,
}

/// Location of a single input field: `(node_id, input_name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputRef {
    pub node_id: String,
    pub input: String,
}

impl InputRef {
    pub fn new(node_id: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            input: input.into(),
        }
    }
}

impl fmt::Display for InputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node_id, self.input)
    }
}

/// The four literal inputs rewritten for every job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideTargets {
    pub positive_text: InputRef,
    pub negative_text: InputRef,
    pub noise_seed: InputRef,
    pub filename_prefix: InputRef,
}

impl Default for OverrideTargets {
    /// Locations used by the bundled HunyuanVideo template.
    fn default() -> Self {
        Self {
            positive_text: InputRef::new(POSITIVE_PROMPT_NODE, "text"),
            negative_text: InputRef::new(NEGATIVE_PROMPT_NODE, "text"),
            noise_seed: InputRef::new(NOISE_SEED_NODE, "noise_seed"),
            filename_prefix: InputRef::new(FILENAME_PREFIX_NODE, "filename_prefix"),
        }
    }
}

/// Per-job values written into the override targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOverrides {
    pub prompt: String,
    pub negative: String,
    pub seed: u64,
    /// Server-side output filename prefix (e.g. `video/hunyuan_video_1.5_42`).
    pub filename_prefix: String,
}

/// An order-preserving ComfyUI workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowGraph {
    nodes: IndexMap<String, WorkflowNode>,
}

// ---------------------------------------------------------------------------
// Parsing and inspection
// ---------------------------------------------------------------------------

impl WorkflowGraph {
    /// Parse a workflow from API-format JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| CoreError::Template(format!("malformed JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Parse a workflow from an already-decoded JSON value.
    ///
    /// The value must be a non-empty object whose entries all carry a
    /// `class_type`.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        let obj = value.as_object().ok_or_else(|| {
            CoreError::Template("workflow JSON must be an object".to_string())
        })?;
        if obj.is_empty() {
            return Err(CoreError::Template(
                "workflow JSON must contain at least one node".to_string(),
            ));
        }
        serde_json::from_value(value).map_err(|e| CoreError::Template(e.to_string()))
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node by ID.
    pub fn node(&self, node_id: &str) -> Option<&WorkflowNode> {
        self.nodes.get(node_id)
    }

    /// Look up a single input value.
    pub fn input(&self, target: &InputRef) -> Option<&Value> {
        self.nodes
            .get(&target.node_id)
            .and_then(|node| node.inputs.get(&target.input))
    }

    /// Iterate nodes in document order.
    pub fn nodes(&self) -> impl Iterator<Item = (&str, &WorkflowNode)> {
        self.nodes.iter().map(|(id, node)| (id.as_str(), node))
    }

    /// All links in the graph, in node then input order.
    pub fn links(&self) -> Vec<NodeLink> {
        let mut links = Vec::new();
        for (node_id, node) in &self.nodes {
            for (input_name, value) in &node.inputs {
                if let Some((from_node, from_output)) = link_target(value) {
                    links.push(NodeLink {
                        from_node,
                        from_output,
                        to_node: node_id.clone(),
                        to_input: input_name.clone(),
                    });
                }
            }
        }
        links
    }

    /// Check that every link resolves to a node in this graph and that the
    /// link structure is acyclic.
    pub fn validate(&self) -> Result<(), CoreError> {
        let links = self.links();

        for link in &links {
            if !self.nodes.contains_key(&link.from_node) {
                return Err(CoreError::DanglingLink {
                    node_id: link.to_node.clone(),
                    input: link.to_input.clone(),
                    target: link.from_node.clone(),
                });
            }
        }

        // Kahn's algorithm: anything left with a non-zero in-degree sits on
        // a cycle (or downstream of one).
        let mut in_degree: IndexMap<&str, usize> =
            self.nodes.keys().map(|id| (id.as_str(), 0)).collect();
        for link in &links {
            if let Some(degree) = in_degree.get_mut(link.to_node.as_str()) {
                *degree += 1;
            }
        }

        let mut ready: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut visited = 0usize;

        while let Some(node_id) = ready.pop_front() {
            visited += 1;
            for link in links.iter().filter(|l| l.from_node == node_id) {
                if let Some(degree) = in_degree.get_mut(link.to_node.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(link.to_node.as_str());
                    }
                }
            }
        }

        if visited < self.nodes.len() {
            let stuck = in_degree
                .iter()
                .find(|(_, degree)| **degree > 0)
                .map(|(id, _)| id.to_string())
                .unwrap_or_default();
            return Err(CoreError::Cycle(stuck));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Job instantiation
// ---------------------------------------------------------------------------

impl WorkflowGraph {
    /// Produce a job graph from this template.
    ///
    /// The template is cloned and exactly the four `targets` are replaced
    /// with the values in `overrides`. Every other node, input and link is
    /// left as it was.
    pub fn build_job(
        &self,
        targets: &OverrideTargets,
        overrides: &JobOverrides,
    ) -> Result<WorkflowGraph, CoreError> {
        let mut job = self.clone();
        job.set_literal(&targets.positive_text, Value::from(overrides.prompt.as_str()))?;
        job.set_literal(&targets.negative_text, Value::from(overrides.negative.as_str()))?;
        job.set_literal(&targets.noise_seed, Value::from(overrides.seed))?;
        job.set_literal(
            &targets.filename_prefix,
            Value::from(overrides.filename_prefix.as_str()),
        )?;
        Ok(job)
    }

    /// Check that all four targets exist and hold literals.
    pub fn check_targets(&self, targets: &OverrideTargets) -> Result<(), CoreError> {
        for target in [
            &targets.positive_text,
            &targets.negative_text,
            &targets.noise_seed,
            &targets.filename_prefix,
        ] {
            self.literal_slot(target)?;
        }
        Ok(())
    }

    fn set_literal(&mut self, target: &InputRef, value: Value) -> Result<(), CoreError> {
        self.literal_slot(target)?;
        if let Some(slot) = self
            .nodes
            .get_mut(&target.node_id)
            .and_then(|node| node.inputs.get_mut(&target.input))
        {
            *slot = value;
        }
        Ok(())
    }

    fn literal_slot(&self, target: &InputRef) -> Result<&Value, CoreError> {
        let slot = self.input(target).ok_or_else(|| CoreError::MissingOverrideTarget {
            node_id: target.node_id.clone(),
            input: target.input.clone(),
        })?;
        if link_target(slot).is_some() {
            return Err(CoreError::LinkedOverrideTarget {
                node_id: target.node_id.clone(),
                input: target.input.clone(),
            });
        }
        Ok(slot)
    }
}

/// Interpret an input value as a link `[node_id, output_slot]`.
///
/// Node IDs may be encoded as strings or bare integers.
pub fn link_target(value: &Value) -> Option<(String, u64)> {
    let arr = value.as_array()?;
    if arr.len() != 2 {
        return None;
    }
    let from_node = match &arr[0] {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.as_u64()?.to_string(),
        _ => return None,
    };
    let from_output = arr[1].as_u64()?;
    Some((from_node, from_output))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::template::builtin_template;

    fn overrides() -> JobOverrides {
        JobOverrides {
            prompt: "a red fox in snow".to_string(),
            negative: "blurry".to_string(),
            seed: 42,
            filename_prefix: "video/test_42".to_string(),
        }
    }

    fn small_graph() -> WorkflowGraph {
        WorkflowGraph::from_value(json!({
            "1": { "inputs": { "text": "old", "clip": ["3", 0] }, "class_type": "CLIPTextEncode" },
            "2": { "inputs": { "text": "", "clip": ["3", 0] }, "class_type": "CLIPTextEncode" },
            "3": { "inputs": { "clip_name": "clip.safetensors" }, "class_type": "CLIPLoader" },
            "4": { "inputs": { "noise_seed": 1 }, "class_type": "RandomNoise" },
            "5": { "inputs": { "filename_prefix": "out", "video": ["1", 0] }, "class_type": "SaveVideo" }
        }))
        .unwrap()
    }

    fn small_targets() -> OverrideTargets {
        OverrideTargets {
            positive_text: InputRef::new("1", "text"),
            negative_text: InputRef::new("2", "text"),
            noise_seed: InputRef::new("4", "noise_seed"),
            filename_prefix: InputRef::new("5", "filename_prefix"),
        }
    }

    /// Collect every `(node, input)` whose value differs between two graphs.
    fn changed_inputs(a: &WorkflowGraph, b: &WorkflowGraph) -> Vec<String> {
        let mut changed = Vec::new();
        for (id, node) in a.nodes() {
            let other = b.node(id).expect("node missing from built graph");
            assert_eq!(node.class_type, other.class_type);
            assert_eq!(node.meta, other.meta);
            for (name, value) in &node.inputs {
                if other.inputs.get(name) != Some(value) {
                    changed.push(format!("{id}.{name}"));
                }
            }
            assert_eq!(node.inputs.len(), other.inputs.len());
        }
        changed.sort();
        changed
    }

    #[test]
    fn build_job_changes_exactly_four_fields() {
        let template = builtin_template().unwrap();
        let job = template
            .build_job(&OverrideTargets::default(), &overrides())
            .unwrap();

        assert_eq!(job.len(), template.len());
        assert_eq!(
            changed_inputs(&template, &job),
            vec![
                "102.filename_prefix",
                "129.noise_seed",
                "44.text",
                "93.text",
            ]
        );
        assert_eq!(job.links(), template.links());

        let targets = OverrideTargets::default();
        assert_eq!(job.input(&targets.positive_text), Some(&json!("a red fox in snow")));
        assert_eq!(job.input(&targets.negative_text), Some(&json!("blurry")));
        assert_eq!(job.input(&targets.noise_seed), Some(&json!(42)));
        assert_eq!(job.input(&targets.filename_prefix), Some(&json!("video/test_42")));
    }

    #[test]
    fn build_job_leaves_template_untouched() {
        let template = small_graph();
        let snapshot = template.clone();

        let mut first = template.build_job(&small_targets(), &overrides()).unwrap();
        first
            .nodes
            .get_mut("1")
            .unwrap()
            .inputs
            .insert("text".to_string(), json!("mutated after build"));

        assert_eq!(template, snapshot);

        let second = template
            .build_job(
                &small_targets(),
                &JobOverrides {
                    seed: 7,
                    ..overrides()
                },
            )
            .unwrap();
        assert_eq!(second.input(&InputRef::new("1", "text")), Some(&json!("a red fox in snow")));
        assert_eq!(second.input(&InputRef::new("4", "noise_seed")), Some(&json!(7)));
    }

    #[test]
    fn build_job_accepts_empty_and_unicode_text() {
        let job = small_graph()
            .build_job(
                &small_targets(),
                &JobOverrides {
                    prompt: "紙飛行機 \"quoted\"\n".to_string(),
                    negative: String::new(),
                    ..overrides()
                },
            )
            .unwrap();
        assert_eq!(
            job.input(&InputRef::new("1", "text")),
            Some(&json!("紙飛行機 \"quoted\"\n"))
        );
        assert_eq!(job.input(&InputRef::new("2", "text")), Some(&json!("")));
    }

    #[test]
    fn build_job_fails_on_missing_node() {
        let targets = OverrideTargets {
            noise_seed: InputRef::new("99", "noise_seed"),
            ..small_targets()
        };
        let err = small_graph().build_job(&targets, &overrides()).unwrap_err();
        assert_matches!(err, CoreError::MissingOverrideTarget { node_id, input } => {
            assert_eq!(node_id, "99");
            assert_eq!(input, "noise_seed");
        });
    }

    #[test]
    fn build_job_fails_on_missing_input() {
        let targets = OverrideTargets {
            filename_prefix: InputRef::new("5", "prefix"),
            ..small_targets()
        };
        let err = small_graph().build_job(&targets, &overrides()).unwrap_err();
        assert_matches!(err, CoreError::MissingOverrideTarget { .. });
    }

    #[test]
    fn build_job_refuses_to_overwrite_links() {
        let targets = OverrideTargets {
            positive_text: InputRef::new("1", "clip"),
            ..small_targets()
        };
        let err = small_graph().build_job(&targets, &overrides()).unwrap_err();
        assert_matches!(err, CoreError::LinkedOverrideTarget { .. });
    }

    #[test]
    fn links_are_extracted_in_order() {
        let links = small_graph().links();
        assert_eq!(links.len(), 3);
        assert_eq!(
            links[0],
            NodeLink {
                from_node: "3".to_string(),
                from_output: 0,
                to_node: "1".to_string(),
                to_input: "clip".to_string(),
            }
        );
        assert_eq!(links[2].from_node, "1");
        assert_eq!(links[2].to_node, "5");
    }

    #[test]
    fn link_target_accepts_numeric_node_ids() {
        assert_eq!(link_target(&json!([7, 1])), Some(("7".to_string(), 1)));
        assert_eq!(link_target(&json!(["7", 1])), Some(("7".to_string(), 1)));
        assert_eq!(link_target(&json!(["7", "a"])), None);
        assert_eq!(link_target(&json!([1, 2, 3])), None);
        assert_eq!(link_target(&json!("7")), None);
    }

    #[test]
    fn validate_accepts_builtin_template() {
        builtin_template().unwrap().validate().unwrap();
    }

    #[test]
    fn validate_rejects_dangling_link() {
        let graph = WorkflowGraph::from_value(json!({
            "1": { "inputs": { "samples": ["404", 0] }, "class_type": "VAEDecode" }
        }))
        .unwrap();
        assert_matches!(graph.validate(), Err(CoreError::DanglingLink { target, .. }) => {
            assert_eq!(target, "404");
        });
    }

    #[test]
    fn validate_rejects_cycle() {
        let graph = WorkflowGraph::from_value(json!({
            "1": { "inputs": { "a": ["2", 0] }, "class_type": "A" },
            "2": { "inputs": { "b": ["1", 0] }, "class_type": "B" },
            "3": { "inputs": {}, "class_type": "C" }
        }))
        .unwrap();
        assert_matches!(graph.validate(), Err(CoreError::Cycle(_)));
    }

    #[test]
    fn from_value_rejects_non_object_and_empty() {
        assert_matches!(
            WorkflowGraph::from_value(json!([1, 2])),
            Err(CoreError::Template(_))
        );
        assert_matches!(
            WorkflowGraph::from_value(json!({})),
            Err(CoreError::Template(_))
        );
        assert_matches!(
            WorkflowGraph::from_value(json!({ "1": { "inputs": {} } })),
            Err(CoreError::Template(_))
        );
    }

    #[test]
    fn serialization_preserves_node_order_and_meta() {
        let json = r#"{"10":{"inputs":{"b":1,"a":["2",0]},"class_type":"X","_meta":{"title":"t"}},"2":{"inputs":{},"class_type":"Y"}}"#;
        let graph = WorkflowGraph::from_json_str(json).unwrap();
        let ids: Vec<&str> = graph.nodes().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["10", "2"]);
        assert_eq!(serde_json::to_string(&graph).unwrap(), json);
    }
}
