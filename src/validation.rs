use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::Project;
use crate::pipeline::PipelineSpec;
use crate::stages::StagePlan;

#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Checks a synthesis input before any pipeline is built. Everything
/// normalization silently smooths over is surfaced here as a warning.
pub fn validate_spec(spec: &PipelineSpec) -> ValidationReport {
    let mut report = ValidationReport::default();

    if spec.name.trim().is_empty() {
        report.errors.push("Pipeline name cannot be empty".into());
    } else if !spec
        .name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        report.errors.push(format!(
            "Pipeline name '{}' may only contain alphanumerics, '-' and '_'",
            spec.name
        ));
    }

    if spec.terminal_stage.trim().is_empty() {
        report
            .errors
            .push("Terminal stage name cannot be empty".into());
    }

    for (idx, stage) in spec.stages.iter().enumerate() {
        if stage.trim().is_empty() {
            report
                .errors
                .push(format!("Stage {} has an empty name", idx + 1));
        } else if !stage
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            report.errors.push(format!(
                "Stage name '{}' may only contain alphanumerics, '-' and '_'",
                stage
            ));
        }
    }
    if !report.is_ok() {
        return report;
    }

    let plan = StagePlan::normalize(&spec.stages, &spec.terminal_stage);

    if spec.stages.iter().any(|name| name == &spec.terminal_stage) {
        report.warnings.push(format!(
            "Stage list names the terminal stage '{}'; it is always deployed last exactly once",
            spec.terminal_stage
        ));
    }

    let terminal_mentions = spec
        .stages
        .iter()
        .filter(|name| *name == &spec.terminal_stage)
        .count();
    if plan.non_terminal.len() + terminal_mentions < spec.stages.len() {
        report
            .warnings
            .push("Duplicate stage names collapse to their first appearance".into());
    }

    let mut keys: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for stage in plan.iter() {
        keys.entry(stage.logical_key().to_string())
            .or_default()
            .push(stage.name().to_string());
        if stage.logical_key().is_empty() {
            report.errors.push(format!(
                "Stage '{}' has no alphanumeric characters to derive a resource key from",
                stage.name()
            ));
        }
    }
    for (key, names) in keys {
        if names.len() > 1 {
            report.errors.push(format!(
                "Stages {:?} collide on resource key '{}'",
                names, key
            ));
        }
    }

    for name in spec.overrides.keys() {
        let known = plan.iter().any(|stage| stage.name() == name);
        if !known {
            report.warnings.push(format!(
                "Overrides for '{}' match no deployed stage and will be ignored",
                name
            ));
        }
    }

    if let Some(email) = &spec.notification_email
        && !email.contains('@')
    {
        report
            .errors
            .push(format!("Notification email '{}' is not an address", email));
    }

    report
}

pub fn validate_project(project: &Project, spec: &PipelineSpec) -> ValidationReport {
    let mut report = validate_spec(spec);

    if project.config.handler.trim().is_empty() {
        report.errors.push("Function handler cannot be empty".into());
    }
    if project.config.memory_mb == 0 {
        report
            .errors
            .push("Function memory must be at least 1 MB".into());
    }
    if project.config.timeout_sec == 0 {
        report
            .errors
            .push("Function timeout must be at least 1 second".into());
    }

    let plan = StagePlan::normalize(&spec.stages, &spec.terminal_stage);
    for stage in plan.iter() {
        if !project.overrides.contains_key(stage.name()) {
            report.warnings.push(format!(
                "No stage config found for '{}'; defaults apply",
                stage.name()
            ));
        }
    }

    report
}
