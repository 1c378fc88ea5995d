use thiserror::Error;

/// Errors raised while reading or lowering a workflow definition.
///
/// Every variant aborts the whole compilation: callers never receive a
/// partially wired graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Failed to parse workflow definition: {0}")]
    Parse(String),

    #[error(
        "Conditional at rank {rank} declares {branches} branches but {conditions} branch conditions"
    )]
    BranchConditionMismatch {
        rank: usize,
        branches: usize,
        conditions: usize,
    },

    #[error("Subscriber graph '{key}' hangs off step '{step_id}', which is never emitted")]
    UnknownSubscriberSource { key: String, step_id: String },

    #[error("No nested workflow found at '{path}'")]
    NestedFlowNotFound { path: String },
}

pub type Result<T> = std::result::Result<T, Error>;
