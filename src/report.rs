use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::pipeline::PipelineDefinition;
use crate::template::TemplateDocument;

/// Companion summary for a synthesized document. The timestamp lives here so
/// the document itself stays byte-stable.
#[derive(Debug, Serialize)]
pub struct SynthesisReport {
    pub pipeline: String,
    pub generated_at: DateTime<Utc>,
    pub document_fingerprint: String,
    pub stage_count: usize,
    pub action_count: usize,
    pub binding_count: usize,
    pub artifact_count: usize,
    pub notifications_wired: bool,
}

pub fn build_report(
    definition: &PipelineDefinition,
    document: &TemplateDocument,
) -> Result<SynthesisReport> {
    let mut artifacts = BTreeSet::new();
    for action in &definition.actions {
        artifacts.extend(action.reads.iter().copied());
        artifacts.extend(action.writes.iter().copied());
    }

    Ok(SynthesisReport {
        pipeline: definition.name.clone(),
        generated_at: Utc::now(),
        document_fingerprint: document.fingerprint()?,
        stage_count: definition.plan.len(),
        action_count: definition.actions.len(),
        binding_count: definition.distinct_bindings().len(),
        artifact_count: artifacts.len(),
        notifications_wired: definition.failure_hook.is_some(),
    })
}

pub fn write_report(report: &SynthesisReport, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create report: {}", path.display()))?;
    serde_json::to_writer_pretty(file, report)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ArtifactRegistry;
    use crate::notifications::{FailureHook, wire_failure_notifications};
    use crate::pipeline::{PipelineSpec, build_definition};
    use crate::template::render_document;

    #[test]
    fn report_counts_match_a_single_stage_pipeline() {
        let spec = PipelineSpec::new("orders", vec!["staging".to_string()]);
        let definition = build_definition(&spec, ArtifactRegistry::standard()).unwrap();
        let document = render_document(&definition, ArtifactRegistry::standard()).unwrap();

        let report = build_report(&definition, &document).unwrap();
        assert_eq!(report.pipeline, "orders");
        assert_eq!(report.stage_count, 2);
        assert_eq!(report.action_count, 6);
        assert_eq!(report.binding_count, 3);
        assert_eq!(report.artifact_count, 3);
        assert!(!report.notifications_wired);
        assert_eq!(report.document_fingerprint.len(), 64);
    }

    #[test]
    fn wiring_flips_the_notification_flag() {
        let spec = PipelineSpec::new("orders", vec![]);
        let definition = build_definition(&spec, ArtifactRegistry::standard()).unwrap();
        let wired = wire_failure_notifications(definition, &FailureHook::new(None));
        let document = render_document(&wired, ArtifactRegistry::standard()).unwrap();

        let report = build_report(&wired, &document).unwrap();
        assert!(report.notifications_wired);
    }
}
