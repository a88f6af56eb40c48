pub mod artifacts;
pub mod config;
pub mod error;
pub mod iam;
pub mod notifications;
pub mod pipeline;
pub mod report;
pub mod scaffold;
pub mod stages;
pub mod template;
pub mod validation;

pub use artifacts::{ArtifactId, ArtifactRegistry};
pub use pipeline::{Action, ActionKind, PipelineDefinition, PipelineSpec, build_definition};
pub use stages::{Stage, StagePlan};
