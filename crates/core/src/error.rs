/// Errors raised while loading, validating, or instantiating a workflow
/// template.
///
/// Every variant is a configuration problem: the template or the batch
/// parameters are wrong, and retrying cannot help.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid workflow template: {0}")]
    Template(String),

    #[error("Workflow template has no input '{input}' on node '{node_id}'")]
    MissingOverrideTarget { node_id: String, input: String },

    #[error("Override target '{node_id}.{input}' is a node link, not a literal")]
    LinkedOverrideTarget { node_id: String, input: String },

    #[error("Node '{node_id}' input '{input}' links to missing node '{target}'")]
    DanglingLink {
        node_id: String,
        input: String,
        target: String,
    },

    #[error("Workflow graph contains a cycle through node '{0}'")]
    Cycle(String),

    #[error("Seed overflow: base seed {base} + {offset} does not fit in 64 bits")]
    SeedOverflow { base: u64, offset: u64 },
}
