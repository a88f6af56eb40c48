use pipewright::artifacts::{ArtifactId, ArtifactRegistry};
use pipewright::error::RenderError;
use pipewright::notifications::{FailureHook, wire_failure_notifications};
use pipewright::pipeline::{PipelineDefinition, PipelineSpec, build_definition};
use pipewright::template::{PIPELINE_LOGICAL_ID, TemplateDocument, render_document};
use serde_json::Value;

fn definition_for(stages: &[&str]) -> PipelineDefinition {
    let spec = PipelineSpec::new("orders", stages.iter().map(|s| s.to_string()).collect());
    build_definition(&spec, ArtifactRegistry::standard()).unwrap()
}

fn document_for(stages: &[&str]) -> TemplateDocument {
    render_document(&definition_for(stages), ArtifactRegistry::standard()).unwrap()
}

fn stage_descriptors(document: &TemplateDocument) -> Vec<Value> {
    document.resources[PIPELINE_LOGICAL_ID].properties["Stages"]
        .as_array()
        .unwrap()
        .clone()
}

#[test]
fn serializing_the_same_definition_twice_is_byte_identical() {
    let definition = definition_for(&["dev", "qa"]);
    let first = render_document(&definition, ArtifactRegistry::standard()).unwrap();
    let second = render_document(&definition, ArtifactRegistry::standard()).unwrap();
    assert_eq!(
        first.to_json_pretty().unwrap(),
        second.to_json_pretty().unwrap()
    );
    assert_eq!(first.fingerprint().unwrap(), second.fingerprint().unwrap());
}

#[test]
fn single_stage_pipeline_has_the_expected_shape() {
    let document = document_for(&["staging"]);
    let descriptors = stage_descriptors(&document);

    let names: Vec<&str> = descriptors
        .iter()
        .map(|d| d["Name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "Source",
            "UnitTest",
            "Build",
            "Deploy-staging",
            "IntegrationTest-staging",
            "Deploy-PROD",
        ]
    );

    let mut artifacts: Vec<String> = descriptors
        .iter()
        .flat_map(|d| {
            d["InputArtifacts"]
                .as_array()
                .unwrap()
                .iter()
                .chain(d["OutputArtifacts"].as_array().unwrap())
                .map(|r| r["Name"].as_str().unwrap().to_string())
                .collect::<Vec<_>>()
        })
        .collect();
    artifacts.sort();
    artifacts.dedup();
    assert_eq!(
        artifacts,
        vec!["CfOutputTemplate", "FunctionDeployPackage", "SourceCode"]
    );

    let roles: Vec<&str> = document
        .resources
        .iter()
        .filter(|(_, resource)| resource.kind == "AWS::IAM::Role")
        .map(|(id, _)| id.as_str())
        .collect();
    assert_eq!(roles.len(), 3);
    assert!(roles.contains(&"PipelineRole"));
    assert!(roles.contains(&"stagingDeployRole"));
    assert!(roles.contains(&"PRODDeployRole"));
}

#[test]
fn zero_stage_pipeline_deploys_straight_to_production() {
    let document = document_for(&[]);
    let descriptors = stage_descriptors(&document);

    let names: Vec<&str> = descriptors
        .iter()
        .map(|d| d["Name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Source", "UnitTest", "Build", "Deploy-PROD"]);
    assert!(names.iter().all(|n| !n.starts_with("IntegrationTest")));
}

#[test]
fn stack_name_token_threads_through_verbatim() {
    let mut spec = PipelineSpec::new("orders", vec!["dev".to_string()]);
    spec.stack_name_token = "orders-prod-stack".to_string();
    let definition = build_definition(&spec, ArtifactRegistry::standard()).unwrap();
    let document = render_document(&definition, ArtifactRegistry::standard()).unwrap();

    let name = &document.resources[PIPELINE_LOGICAL_ID].properties["Name"];
    assert_eq!(name["Fn::Sub"], Value::String("orders-prod-stack-Pipeline".into()));

    let descriptors = stage_descriptors(&document);
    let deploy = descriptors
        .iter()
        .find(|d| d["Name"] == Value::String("Deploy-dev".into()))
        .unwrap();
    assert_eq!(
        deploy["Configuration"]["StackName"]["Fn::Sub"],
        Value::String("orders-prod-stack-dev".into())
    );
}

#[test]
fn wiring_notifications_adds_the_topic_and_hooks_without_reordering() {
    let definition = definition_for(&["dev"]);
    let plain = render_document(&definition, ArtifactRegistry::standard()).unwrap();
    let wired_definition = wire_failure_notifications(
        definition,
        &FailureHook::new(Some("ops@example.com".to_string())),
    );
    let wired = render_document(&wired_definition, ArtifactRegistry::standard()).unwrap();

    assert!(!plain.resources.contains_key("PipelineFailureTopic"));
    assert!(wired.resources.contains_key("PipelineFailureTopic"));

    let plain_names: Vec<String> = stage_descriptors(&plain)
        .iter()
        .map(|d| d["Name"].as_str().unwrap().to_string())
        .collect();
    let wired_names: Vec<String> = stage_descriptors(&wired)
        .iter()
        .map(|d| d["Name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(plain_names, wired_names);

    for descriptor in stage_descriptors(&wired) {
        assert_eq!(
            descriptor["OnFailure"]["Ref"],
            Value::String("PipelineFailureTopic".into())
        );
    }
}

#[test]
fn foreign_artifact_references_are_rejected() {
    let mut definition = definition_for(&[]);
    definition.actions[0].reads.push(ArtifactId::TemplateOutput);

    let err = render_document(&definition, ArtifactRegistry::standard()).unwrap_err();
    assert!(matches!(err, RenderError::UnknownArtifact { .. }));
}
