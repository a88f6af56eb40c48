use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::pipeline::ActionKind;

/// The three artifacts threaded through every pipeline; names are fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactId {
    SourceBundle,
    DeployPackage,
    TemplateOutput,
}

impl ArtifactId {
    pub const ALL: [ArtifactId; 3] = [
        ArtifactId::SourceBundle,
        ArtifactId::DeployPackage,
        ArtifactId::TemplateOutput,
    ];

    pub fn reference_name(self) -> &'static str {
        match self {
            ArtifactId::SourceBundle => "SourceCode",
            ArtifactId::DeployPackage => "FunctionDeployPackage",
            ArtifactId::TemplateOutput => "CfOutputTemplate",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArtifactFlow {
    pub reads: Vec<ArtifactId>,
    pub writes: Vec<ArtifactId>,
}

/// Fixed producer/consumer metadata for every action kind.
#[derive(Debug, Clone)]
pub struct ArtifactRegistry {
    flows: BTreeMap<ActionKind, ArtifactFlow>,
}

impl ArtifactRegistry {
    /// The standard flows shared by every pipeline.
    pub fn standard() -> &'static ArtifactRegistry {
        static STANDARD: Lazy<ArtifactRegistry> = Lazy::new(ArtifactRegistry::build_standard);
        &STANDARD
    }

    fn build_standard() -> Self {
        let mut flows = BTreeMap::new();
        flows.insert(
            ActionKind::Source,
            ArtifactFlow {
                reads: vec![],
                writes: vec![ArtifactId::SourceBundle],
            },
        );
        flows.insert(
            ActionKind::UnitTest,
            ArtifactFlow {
                reads: vec![ArtifactId::SourceBundle],
                writes: vec![],
            },
        );
        flows.insert(
            ActionKind::Build,
            ArtifactFlow {
                reads: vec![ArtifactId::SourceBundle],
                writes: vec![ArtifactId::DeployPackage, ArtifactId::TemplateOutput],
            },
        );
        flows.insert(
            ActionKind::Deploy,
            ArtifactFlow {
                reads: vec![ArtifactId::DeployPackage, ArtifactId::TemplateOutput],
                writes: vec![],
            },
        );
        flows.insert(
            ActionKind::IntegrationTest,
            ArtifactFlow {
                reads: vec![ArtifactId::DeployPackage, ArtifactId::TemplateOutput],
                writes: vec![],
            },
        );
        flows.insert(ActionKind::Notify, ArtifactFlow::default());
        Self { flows }
    }

    pub fn flow(&self, kind: ActionKind) -> &ArtifactFlow {
        static EMPTY: Lazy<ArtifactFlow> = Lazy::new(ArtifactFlow::default);
        self.flows.get(&kind).unwrap_or(&EMPTY)
    }

    pub fn permits_read(&self, kind: ActionKind, artifact: ArtifactId) -> bool {
        self.flow(kind).reads.contains(&artifact)
    }

    pub fn permits_write(&self, kind: ActionKind, artifact: ArtifactId) -> bool {
        self.flow(kind).writes.contains(&artifact)
    }

    pub fn producer(&self, artifact: ArtifactId) -> Option<ActionKind> {
        self.flows
            .iter()
            .find(|(_, flow)| flow.writes.contains(&artifact))
            .map(|(kind, _)| *kind)
    }

    /// Consuming action kinds in pipeline order.
    pub fn consumers(&self, artifact: ArtifactId) -> Vec<ActionKind> {
        self.flows
            .iter()
            .filter(|(_, flow)| flow.reads.contains(&artifact))
            .map(|(kind, _)| *kind)
            .collect()
    }

    pub fn declared(&self) -> Vec<ArtifactId> {
        let mut ids: Vec<ArtifactId> = self
            .flows
            .values()
            .flat_map(|flow| flow.writes.iter().copied())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_declares_the_fixed_trio() {
        let registry = ArtifactRegistry::standard();
        assert_eq!(registry.declared(), ArtifactId::ALL);
    }

    #[test]
    fn every_artifact_has_exactly_one_producer() {
        let registry = ArtifactRegistry::standard();
        assert_eq!(
            registry.producer(ArtifactId::SourceBundle),
            Some(ActionKind::Source)
        );
        assert_eq!(
            registry.producer(ArtifactId::DeployPackage),
            Some(ActionKind::Build)
        );
        assert_eq!(
            registry.producer(ArtifactId::TemplateOutput),
            Some(ActionKind::Build)
        );
    }

    #[test]
    fn source_bundle_feeds_unit_test_then_build() {
        let registry = ArtifactRegistry::standard();
        assert_eq!(
            registry.consumers(ArtifactId::SourceBundle),
            [ActionKind::UnitTest, ActionKind::Build]
        );
    }

    #[test]
    fn build_outputs_feed_deploy_and_integration_test() {
        let registry = ArtifactRegistry::standard();
        for artifact in [ArtifactId::DeployPackage, ArtifactId::TemplateOutput] {
            assert_eq!(
                registry.consumers(artifact),
                [ActionKind::Deploy, ActionKind::IntegrationTest]
            );
        }
    }

    #[test]
    fn notify_kind_touches_no_artifacts() {
        let flow = ArtifactRegistry::standard().flow(ActionKind::Notify);
        assert!(flow.reads.is_empty());
        assert!(flow.writes.is_empty());
    }

    #[test]
    fn reference_names_are_stable() {
        assert_eq!(ArtifactId::SourceBundle.reference_name(), "SourceCode");
        assert_eq!(
            ArtifactId::DeployPackage.reference_name(),
            "FunctionDeployPackage"
        );
        assert_eq!(
            ArtifactId::TemplateOutput.reference_name(),
            "CfOutputTemplate"
        );
    }
}
