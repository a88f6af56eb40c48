use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::{Pattern, glob};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pipeline::{PipelineSpec, StageOverrides};
use crate::scaffold::ProjectLayout;
use crate::stages::StagePlan;

/// `config/function.yaml` of a scaffolded project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionConfig {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Handler")]
    pub handler: String,
    #[serde(rename = "Memory")]
    pub memory_mb: u32,
    #[serde(rename = "Timeout")]
    pub timeout_sec: u32,
    /// Non-terminal deployment order recorded at scaffold time.
    #[serde(rename = "Stages", default)]
    pub stages: Vec<String>,
    #[serde(rename = "Unittests")]
    pub unittests: PathBuf,
    #[serde(rename = "Integrationtests")]
    pub integrationtests: PathBuf,
}

impl FunctionConfig {
    pub fn for_function(name: &str, plan: &StagePlan, layout: &ProjectLayout) -> Self {
        Self {
            name: name.to_string(),
            handler: "function.handler".to_string(),
            memory_mb: 128,
            timeout_sec: 3,
            stages: plan
                .non_terminal
                .iter()
                .map(|stage| stage.name().to_string())
                .collect(),
            unittests: layout.unit_tests_dir.clone(),
            integrationtests: layout.integration_tests_dir.clone(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read function config: {}", path.display()))?;
        let config: FunctionConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse function config: {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let rendered = serde_yaml::to_string(self)
            .with_context(|| format!("Failed to serialize function config: {}", path.display()))?;
        fs::write(path, rendered)
            .with_context(|| format!("Failed to write function config: {}", path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub config: FunctionConfig,
    pub overrides: BTreeMap<String, StageOverrides>,
}

impl Project {
    /// Assembles the synthesis input. A non-empty caller stage list wins;
    /// an empty one falls back to the order recorded in the function config.
    pub fn pipeline_spec(
        &self,
        stages: Vec<String>,
        notification_email: Option<String>,
    ) -> PipelineSpec {
        let stages = if stages.is_empty() {
            self.config.stages.clone()
        } else {
            stages
        };
        let mut spec = PipelineSpec::new(self.config.name.clone(), stages);
        spec.notification_email = notification_email;
        spec.overrides = self.overrides.clone();
        spec
    }
}

pub fn load_project(root: &Path, layout: &ProjectLayout) -> Result<Project> {
    let config = FunctionConfig::load(&root.join(&layout.config_dir).join("function.yaml"))?;
    let overrides = discover_stage_overrides(root, layout)?;
    Ok(Project { config, overrides })
}

/// Scans `config/*/stage.yaml`; the directory name is the stage name.
pub fn discover_stage_overrides(
    root: &Path,
    layout: &ProjectLayout,
) -> Result<BTreeMap<String, StageOverrides>> {
    // the root is a literal path; only the stage segment is a wildcard
    let config_root = root.join(&layout.config_dir);
    let pattern = format!(
        "{}/*/stage.yaml",
        Pattern::escape(&config_root.to_string_lossy())
    );

    let mut overrides = BTreeMap::new();
    for entry in glob(&pattern)
        .with_context(|| format!("Invalid stage config pattern: {pattern}"))?
    {
        let path = entry.context("Failed to resolve stage config path")?;
        let Some(stage_name) = path
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
        else {
            continue;
        };
        debug!(stage = %stage_name, path = %path.display(), "Loading stage overrides");
        overrides.insert(stage_name, load_stage_overrides(&path)?);
    }
    Ok(overrides)
}

pub fn load_stage_overrides(path: &Path) -> Result<StageOverrides> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read stage config: {}", path.display()))?;
    let overrides: StageOverrides = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse stage config: {}", path.display()))?;
    Ok(overrides)
}
