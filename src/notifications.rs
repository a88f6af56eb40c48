use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineDefinition;

/// Shared failure-notification target, one topic for the whole pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureHook {
    pub topic_id: String,
    pub email: Option<String>,
}

impl FailureHook {
    pub fn new(email: Option<String>) -> Self {
        Self {
            topic_id: "PipelineFailureTopic".to_string(),
            email,
        }
    }
}

/// Attaches `hook` to every action; rewiring replaces the previous target
/// wholesale.
pub fn wire_failure_notifications(
    mut definition: PipelineDefinition,
    hook: &FailureHook,
) -> PipelineDefinition {
    for action in &mut definition.actions {
        action.on_failure = Some(hook.topic_id.clone());
    }
    definition.failure_hook = Some(hook.clone());
    definition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ArtifactRegistry;
    use crate::pipeline::{PipelineSpec, build_definition};

    fn sample() -> PipelineDefinition {
        let spec = PipelineSpec::new("orders", vec!["Alpha".to_string(), "Beta".to_string()]);
        build_definition(&spec, ArtifactRegistry::standard()).unwrap()
    }

    #[test]
    fn every_action_points_at_the_shared_topic() {
        let hook = FailureHook::new(Some("ops@example.com".to_string()));
        let wired = wire_failure_notifications(sample(), &hook);

        assert!(wired
            .actions
            .iter()
            .all(|action| action.on_failure.as_deref() == Some("PipelineFailureTopic")));
        assert_eq!(wired.failure_hook, Some(hook));
    }

    #[test]
    fn wiring_twice_matches_wiring_once() {
        let hook = FailureHook::new(None);
        let once = wire_failure_notifications(sample(), &hook);
        let twice = wire_failure_notifications(once.clone(), &hook);
        assert_eq!(once, twice);
    }

    #[test]
    fn wiring_leaves_the_action_sequence_untouched() {
        let plain = sample();
        let wired = wire_failure_notifications(plain.clone(), &FailureHook::new(None));

        let names: Vec<&str> = plain.actions.iter().map(|a| a.name.as_str()).collect();
        let wired_names: Vec<&str> = wired.actions.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, wired_names);
        assert_eq!(plain.plan, wired.plan);
    }
}
