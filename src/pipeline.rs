use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::artifacts::{ArtifactId, ArtifactRegistry};
use crate::error::TopologyError;
use crate::iam::{self, IdentityBinding, PolicyGrant};
use crate::notifications::FailureHook;
use crate::stages::{DEFAULT_TERMINAL_STAGE, Stage, StagePlan};

pub const DEFAULT_STACK_NAME_TOKEN: &str = "${AWS::StackName}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Source,
    UnitTest,
    Build,
    Deploy,
    IntegrationTest,
    Notify,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Source => "Source",
            ActionKind::UnitTest => "UnitTest",
            ActionKind::Build => "Build",
            ActionKind::Deploy => "Deploy",
            ActionKind::IntegrationTest => "IntegrationTest",
            ActionKind::Notify => "Notify",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub name: String,
    pub kind: ActionKind,
    pub stage: Option<Stage>,
    pub reads: Vec<ArtifactId>,
    pub writes: Vec<ArtifactId>,
    pub identity: IdentityBinding,
    pub env: BTreeMap<String, String>,
    /// Non-terminal stages the build step emits template variants for.
    pub template_variants: Vec<String>,
    /// Failure-notification target, set by the wirer.
    pub on_failure: Option<String>,
}

/// Per-stage configuration from `config/<stage>/stage.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageOverrides {
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub grants: Vec<PolicyGrant>,
}

impl StageOverrides {
    pub fn is_empty(&self) -> bool {
        self.env.is_empty() && self.grants.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSpec {
    pub name: String,
    pub stages: Vec<String>,
    pub terminal_stage: String,
    pub stack_name_token: String,
    pub notification_email: Option<String>,
    pub overrides: BTreeMap<String, StageOverrides>,
}

impl PipelineSpec {
    pub fn new(name: impl Into<String>, stages: Vec<String>) -> Self {
        Self {
            name: name.into(),
            stages,
            terminal_stage: DEFAULT_TERMINAL_STAGE.to_string(),
            stack_name_token: DEFAULT_STACK_NAME_TOKEN.to_string(),
            notification_email: None,
            overrides: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactStore {
    pub logical_id: String,
    pub kind: String,
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self {
            logical_id: "ArtifactStoreS3Location".to_string(),
            kind: "S3".to_string(),
        }
    }
}

/// The completed pipeline, never mutated after notification wiring.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDefinition {
    pub name: String,
    pub stack_name_token: String,
    pub plan: StagePlan,
    pub actions: Vec<Action>,
    pub artifact_store: ArtifactStore,
    pub orchestrator: IdentityBinding,
    pub failure_hook: Option<FailureHook>,
}

impl PipelineDefinition {
    /// Orchestrator first, then each distinct per-action binding in order.
    pub fn distinct_bindings(&self) -> Vec<&IdentityBinding> {
        let mut bindings: Vec<&IdentityBinding> = vec![&self.orchestrator];
        for action in &self.actions {
            if !bindings
                .iter()
                .any(|known| known.logical_id == action.identity.logical_id)
            {
                bindings.push(&action.identity);
            }
        }
        bindings
    }

    pub fn terminal_stage(&self) -> &Stage {
        &self.plan.terminal
    }
}

/// Assembles the action sequence: Source, UnitTest, Build, a Deploy +
/// IntegrationTest pair per non-terminal stage, then the terminal Deploy.
pub fn build_definition(
    spec: &PipelineSpec,
    registry: &ArtifactRegistry,
) -> Result<PipelineDefinition, TopologyError> {
    let plan = StagePlan::normalize(&spec.stages, &spec.terminal_stage);
    let orchestrator = iam::orchestrator_binding();
    let stage_bindings = iam::stage_bindings(&plan);

    let mut actions = Vec::with_capacity(3 + plan.non_terminal.len() * 2 + 1);
    actions.push(pipeline_level_action(
        ActionKind::Source,
        &orchestrator,
        registry,
    ));
    actions.push(pipeline_level_action(
        ActionKind::UnitTest,
        &orchestrator,
        registry,
    ));

    let mut build = pipeline_level_action(ActionKind::Build, &orchestrator, registry);
    build.template_variants = plan
        .non_terminal
        .iter()
        .map(|stage| stage.name().to_string())
        .collect();
    actions.push(build);

    for stage in &plan.non_terminal {
        actions.push(stage_scoped_action(
            ActionKind::Deploy,
            stage,
            spec,
            registry,
            &stage_bindings,
        ));
        actions.push(stage_scoped_action(
            ActionKind::IntegrationTest,
            stage,
            spec,
            registry,
            &stage_bindings,
        ));
    }
    actions.push(stage_scoped_action(
        ActionKind::Deploy,
        &plan.terminal,
        spec,
        registry,
        &stage_bindings,
    ));

    verify_topology(&actions)?;

    Ok(PipelineDefinition {
        name: spec.name.clone(),
        stack_name_token: spec.stack_name_token.clone(),
        plan,
        actions,
        artifact_store: ArtifactStore::default(),
        orchestrator,
        failure_hook: None,
    })
}

fn pipeline_level_action(
    kind: ActionKind,
    orchestrator: &IdentityBinding,
    registry: &ArtifactRegistry,
) -> Action {
    let flow = registry.flow(kind);
    Action {
        name: kind.as_str().to_string(),
        kind,
        stage: None,
        reads: flow.reads.clone(),
        writes: flow.writes.clone(),
        identity: orchestrator.clone(),
        env: BTreeMap::new(),
        template_variants: Vec::new(),
        on_failure: None,
    }
}

fn stage_scoped_action(
    kind: ActionKind,
    stage: &Stage,
    spec: &PipelineSpec,
    registry: &ArtifactRegistry,
    bindings: &BTreeMap<String, IdentityBinding>,
) -> Action {
    let flow = registry.flow(kind);
    let overrides = spec.overrides.get(stage.name());
    let mut identity = bindings
        .get(stage.name())
        .cloned()
        .unwrap_or_else(|| iam::stage_binding(stage));
    if let Some(overrides) = overrides {
        identity.grants.extend(overrides.grants.iter().cloned());
    }

    Action {
        name: format!("{}-{}", kind.as_str(), stage.name()),
        kind,
        stage: Some(stage.clone()),
        reads: flow.reads.clone(),
        writes: flow.writes.clone(),
        identity,
        env: overrides.map(|o| o.env.clone()).unwrap_or_default(),
        template_variants: Vec::new(),
        on_failure: None,
    }
}

/// Every read artifact written strictly earlier, one producer per artifact,
/// nothing after the terminal deploy.
pub fn verify_topology(actions: &[Action]) -> Result<(), TopologyError> {
    let mut producers: BTreeMap<ArtifactId, String> = BTreeMap::new();
    let mut terminal_deployed = false;

    for action in actions {
        if terminal_deployed {
            return Err(TopologyError::ActionAfterTerminal {
                action: action.name.clone(),
            });
        }
        for read in &action.reads {
            if !producers.contains_key(read) {
                return Err(TopologyError::ConsumedBeforeProduced {
                    action: action.name.clone(),
                    artifact: read.reference_name().to_string(),
                });
            }
        }
        for write in &action.writes {
            if let Some(first) = producers.insert(*write, action.name.clone()) {
                return Err(TopologyError::DuplicateProducer {
                    artifact: write.reference_name().to_string(),
                    first,
                    second: action.name.clone(),
                });
            }
        }
        if action.kind == ActionKind::Deploy && action.stage.as_ref().is_some_and(Stage::is_terminal)
        {
            terminal_deployed = true;
        }
    }

    Ok(())
}
