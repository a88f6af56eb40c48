use thiserror::Error;

/// Ordering violations caught by the builder's self-check.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("action '{action}' reads artifact '{artifact}' before any earlier action has written it")]
    ConsumedBeforeProduced { action: String, artifact: String },

    #[error("artifact '{artifact}' is written by both '{first}' and '{second}'; each artifact has exactly one producer")]
    DuplicateProducer {
        artifact: String,
        first: String,
        second: String,
    },

    #[error("the terminal deploy must close the pipeline, but '{action}' comes after it")]
    ActionAfterTerminal { action: String },
}

/// Rendering failure; no partial document is ever emitted.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("action '{action}' references artifact '{artifact}', which the artifact registry does not associate with its kind")]
    UnknownArtifact { action: String, artifact: String },

    #[error("failed to serialize the pipeline document")]
    Json(#[from] serde_json::Error),
}
