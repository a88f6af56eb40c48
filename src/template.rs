use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::artifacts::{ArtifactId, ArtifactRegistry};
use crate::error::RenderError;
use crate::iam::IdentityBinding;
use crate::notifications::FailureHook;
use crate::pipeline::{Action, ActionKind, PipelineDefinition};

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";
pub const PIPELINE_LOGICAL_ID: &str = "FunctionsPipeline";

/// The rendered delivery document; sorted maps keep the output byte-stable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateDocument {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, Resource>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Properties")]
    pub properties: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageDescriptor {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Kind")]
    pub kind: String,
    #[serde(rename = "Stage", skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(rename = "InputArtifacts")]
    pub input_artifacts: Vec<ArtifactReference>,
    #[serde(rename = "OutputArtifacts")]
    pub output_artifacts: Vec<ArtifactReference>,
    #[serde(rename = "RoleArn")]
    pub role_arn: Value,
    #[serde(rename = "Configuration", skip_serializing_if = "Option::is_none")]
    pub configuration: Option<Value>,
    #[serde(rename = "OnFailure", skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactReference {
    #[serde(rename = "Name")]
    pub name: &'static str,
}

impl From<ArtifactId> for ArtifactReference {
    fn from(artifact: ArtifactId) -> Self {
        Self {
            name: artifact.reference_name(),
        }
    }
}

impl TemplateDocument {
    pub fn to_json_pretty(&self) -> Result<String, RenderError> {
        let mut rendered = serde_json::to_string_pretty(self)?;
        rendered.push('\n');
        Ok(rendered)
    }

    /// Hex digest of the compact rendering; stable across pretty-printing.
    pub fn fingerprint(&self) -> Result<String, RenderError> {
        let compact = serde_json::to_vec(self)?;
        Ok(sha256_hex(&compact))
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Transcribes `definition` into the declarative document. Purely structural
/// apart from the artifact-reference check.
pub fn render_document(
    definition: &PipelineDefinition,
    registry: &ArtifactRegistry,
) -> Result<TemplateDocument, RenderError> {
    check_artifact_references(definition, registry)?;

    let mut resources = BTreeMap::new();
    resources.insert(
        definition.artifact_store.logical_id.clone(),
        Resource {
            kind: "AWS::S3::Bucket".to_string(),
            properties: json!({ "AccessControl": "Private" }),
        },
    );

    for binding in definition.distinct_bindings() {
        resources.insert(binding.logical_id.clone(), identity_resource(binding));
    }

    if let Some(hook) = &definition.failure_hook {
        resources.insert(
            hook.topic_id.clone(),
            topic_resource(hook, &definition.stack_name_token),
        );
    }

    resources.insert(
        PIPELINE_LOGICAL_ID.to_string(),
        pipeline_resource(definition),
    );

    Ok(TemplateDocument {
        format_version: TEMPLATE_FORMAT_VERSION.to_string(),
        description: format!("Delivery pipeline for {}", definition.name),
        resources,
    })
}

fn check_artifact_references(
    definition: &PipelineDefinition,
    registry: &ArtifactRegistry,
) -> Result<(), RenderError> {
    for action in &definition.actions {
        for read in &action.reads {
            if !registry.permits_read(action.kind, *read) {
                return Err(RenderError::UnknownArtifact {
                    action: action.name.clone(),
                    artifact: read.reference_name().to_string(),
                });
            }
        }
        for write in &action.writes {
            if !registry.permits_write(action.kind, *write) {
                return Err(RenderError::UnknownArtifact {
                    action: action.name.clone(),
                    artifact: write.reference_name().to_string(),
                });
            }
        }
    }
    Ok(())
}

fn identity_resource(binding: &IdentityBinding) -> Resource {
    let policies: Vec<Value> = binding
        .grants
        .iter()
        .map(|grant| {
            json!({
                "PolicyName": grant.name,
                "PolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Action": grant.actions,
                        "Resource": grant.resource,
                    }],
                },
            })
        })
        .collect();

    Resource {
        kind: "AWS::IAM::Role".to_string(),
        properties: json!({
            "AssumeRolePolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Action": ["sts:AssumeRole"],
                    "Principal": { "Service": [binding.service_principal] },
                }],
            },
            "Policies": policies,
        }),
    }
}

fn topic_resource(hook: &FailureHook, stack_name_token: &str) -> Resource {
    let subscription: Vec<Value> = hook
        .email
        .iter()
        .map(|email| json!({ "Endpoint": email, "Protocol": "email" }))
        .collect();

    Resource {
        kind: "AWS::SNS::Topic".to_string(),
        properties: json!({
            "TopicName": { "Fn::Sub": format!("{stack_name_token}-Failures") },
            "Subscription": subscription,
        }),
    }
}

fn pipeline_resource(definition: &PipelineDefinition) -> Resource {
    let stages: Vec<StageDescriptor> = definition
        .actions
        .iter()
        .map(|action| stage_descriptor(action, &definition.stack_name_token))
        .collect();

    Resource {
        kind: "AWS::CodePipeline::Pipeline".to_string(),
        properties: json!({
            "Name": { "Fn::Sub": format!("{}-Pipeline", definition.stack_name_token) },
            "RoleArn": role_arn(&definition.orchestrator.logical_id),
            "ArtifactStore": {
                "Type": definition.artifact_store.kind,
                "Location": { "Ref": definition.artifact_store.logical_id },
            },
            "Stages": stages,
        }),
    }
}

fn stage_descriptor(action: &Action, stack_name_token: &str) -> StageDescriptor {
    StageDescriptor {
        name: action.name.clone(),
        kind: action.kind.as_str().to_string(),
        stage: action.stage.as_ref().map(|s| s.name().to_string()),
        input_artifacts: action.reads.iter().copied().map(Into::into).collect(),
        output_artifacts: action.writes.iter().copied().map(Into::into).collect(),
        role_arn: role_arn(&action.identity.logical_id),
        configuration: action_configuration(action, stack_name_token),
        on_failure: action
            .on_failure
            .as_ref()
            .map(|topic| json!({ "Ref": topic })),
    }
}

fn action_configuration(action: &Action, stack_name_token: &str) -> Option<Value> {
    match action.kind {
        ActionKind::Build => Some(json!({
            "TemplateVariants": action.template_variants,
        })),
        ActionKind::Deploy => action.stage.as_ref().map(|stage| {
            let mut configuration = serde_json::Map::new();
            configuration.insert("ActionMode".to_string(), json!("CREATE_UPDATE"));
            configuration.insert("Capabilities".to_string(), json!("CAPABILITY_IAM"));
            configuration.insert(
                "StackName".to_string(),
                json!({ "Fn::Sub": format!("{stack_name_token}-{}", stage.logical_key()) }),
            );
            configuration.insert(
                "TemplatePath".to_string(),
                json!(format!(
                    "{}::{}.json",
                    ArtifactId::TemplateOutput.reference_name(),
                    stage.name()
                )),
            );
            if !action.env.is_empty() {
                configuration.insert("EnvironmentVariables".to_string(), json!(action.env));
            }
            Value::Object(configuration)
        }),
        ActionKind::IntegrationTest if !action.env.is_empty() => Some(json!({
            "EnvironmentVariables": action.env,
        })),
        _ => None,
    }
}

fn role_arn(logical_id: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, "Arn"] })
}
