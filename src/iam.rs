use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::stages::{Stage, StagePlan};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyGrant {
    pub name: String,
    pub actions: Vec<String>,
    pub resource: String,
}

impl PolicyGrant {
    /// The minimal log-writing grant every stage role starts from.
    pub fn create_logs() -> Self {
        Self {
            name: "CreateLogs".to_string(),
            actions: vec![
                "logs:CreateLogGroup".to_string(),
                "logs:CreateLogStream".to_string(),
                "logs:PutLogEvents".to_string(),
            ],
            resource: "arn:aws:logs:*:*:*".to_string(),
        }
    }
}

/// The identity an action executes under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityBinding {
    pub logical_id: String,
    pub service_principal: String,
    pub grants: Vec<PolicyGrant>,
}

pub fn orchestrator_binding() -> IdentityBinding {
    IdentityBinding {
        logical_id: "PipelineRole".to_string(),
        service_principal: "codepipeline.amazonaws.com".to_string(),
        grants: vec![
            PolicyGrant {
                name: "ArtifactStoreAccess".to_string(),
                actions: vec![
                    "s3:GetObject".to_string(),
                    "s3:PutObject".to_string(),
                    "s3:GetBucketVersioning".to_string(),
                ],
                resource: "*".to_string(),
            },
            PolicyGrant {
                name: "StageExecution".to_string(),
                actions: vec![
                    "codebuild:StartBuild".to_string(),
                    "codebuild:BatchGetBuilds".to_string(),
                    "cloudformation:CreateStack".to_string(),
                    "cloudformation:UpdateStack".to_string(),
                    "cloudformation:DescribeStacks".to_string(),
                    "iam:PassRole".to_string(),
                ],
                resource: "*".to_string(),
            },
        ],
    }
}

/// Assumable by the function runtime, allowed to write logs.
pub fn stage_binding(stage: &Stage) -> IdentityBinding {
    IdentityBinding {
        logical_id: format!("{}DeployRole", stage.logical_key()),
        service_principal: "lambda.amazonaws.com".to_string(),
        grants: vec![PolicyGrant::create_logs()],
    }
}

/// One binding per plan stage, keyed by stage name. Stages whose logical keys
/// collide get a positional suffix so no two stages share a binding.
pub fn stage_bindings(plan: &StagePlan) -> BTreeMap<String, IdentityBinding> {
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    let mut bindings = BTreeMap::new();
    for stage in plan.iter() {
        let count = seen.entry(stage.logical_key()).or_insert(0);
        *count += 1;
        let mut binding = stage_binding(stage);
        if *count > 1 {
            binding.logical_id = format!("{}DeployRole{}", stage.logical_key(), *count);
        }
        bindings.insert(stage.name().to_string(), binding);
    }
    bindings
}
