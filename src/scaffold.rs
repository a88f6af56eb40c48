use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::pipeline::StageOverrides;
use crate::stages::StagePlan;

pub const FUNCTION_STUB: &str = "def handler(event, context):\n  return\n";

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectLayout {
    pub src_dir: PathBuf,
    pub config_dir: PathBuf,
    pub tests_dir: PathBuf,
    pub unit_tests_dir: PathBuf,
    pub integration_tests_dir: PathBuf,
}

impl Default for ProjectLayout {
    fn default() -> Self {
        let tests_dir = PathBuf::from("tests");
        Self {
            src_dir: PathBuf::from("src"),
            config_dir: PathBuf::from("config"),
            unit_tests_dir: tests_dir.join("unittests"),
            integration_tests_dir: tests_dir.join("integrationtests"),
            tests_dir,
        }
    }
}

impl ProjectLayout {
    pub fn stage_dir(&self, stage_name: &str) -> PathBuf {
        self.config_dir.join(stage_name)
    }

    pub fn stage_config_file(&self, stage_name: &str) -> PathBuf {
        self.stage_dir(stage_name).join("stage.yaml")
    }
}

/// Creates `<parent>/<name>` with the full project skeleton. Refuses to
/// touch an existing directory.
pub fn scaffold_project(
    parent: &Path,
    name: &str,
    plan: &StagePlan,
    layout: &ProjectLayout,
) -> Result<PathBuf> {
    let root = parent.join(name);
    fs::create_dir(&root)
        .with_context(|| format!("Failed to create project directory: {}", root.display()))?;

    for dir in [
        &layout.src_dir,
        &layout.tests_dir,
        &layout.config_dir,
        &layout.unit_tests_dir,
        &layout.integration_tests_dir,
    ] {
        let path = root.join(dir);
        fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    }

    fs::write(root.join(&layout.src_dir).join("function.py"), FUNCTION_STUB)
        .context("Failed to write function stub")?;

    let config = crate::config::FunctionConfig::for_function(name, plan, layout);
    config.save(&root.join(&layout.config_dir).join("function.yaml"))?;

    for stage in plan.iter() {
        let stage_dir = root.join(layout.stage_dir(stage.name()));
        fs::create_dir_all(&stage_dir)
            .with_context(|| format!("Failed to create stage directory: {}", stage_dir.display()))?;
        write_stage_config(
            &root.join(layout.stage_config_file(stage.name())),
            &StageOverrides::default(),
        )?;
    }

    for dir in [
        PathBuf::new(),
        layout.unit_tests_dir.clone(),
        layout.integration_tests_dir.clone(),
    ] {
        let manifest = root.join(dir).join("requirements.txt");
        fs::write(&manifest, "")
            .with_context(|| format!("Failed to write manifest: {}", manifest.display()))?;
    }

    info!(project = %root.display(), stages = plan.len(), "Scaffolded function project");
    Ok(root)
}

pub fn write_stage_config(path: &Path, overrides: &StageOverrides) -> Result<()> {
    let rendered = serde_yaml::to_string(overrides)
        .with_context(|| format!("Failed to serialize stage config: {}", path.display()))?;
    fs::write(path, rendered)
        .with_context(|| format!("Failed to write stage config: {}", path.display()))?;
    Ok(())
}
