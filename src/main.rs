use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use pipewright::artifacts::ArtifactRegistry;
use pipewright::config::load_project;
use pipewright::notifications::{FailureHook, wire_failure_notifications};
use pipewright::pipeline::{PipelineSpec, build_definition};
use pipewright::report::{build_report, write_report};
use pipewright::scaffold::{ProjectLayout, scaffold_project};
use pipewright::stages::StagePlan;
use pipewright::template::{render_document, sha256_hex};
use pipewright::validation::{ValidationReport, validate_project, validate_spec};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, prelude::*};

fn main() -> Result<()> {
    let cli = Cli::parse();
    configure_tracing()?;

    match cli.command {
        Commands::Init {
            name,
            stages,
            parent,
        } => init_project(name, stages, parent),
        Commands::Synth {
            name,
            stages,
            project,
            out,
            stack_name_token,
            notify_email,
            digest,
            report,
        } => synth(
            name,
            stages,
            project,
            out,
            stack_name_token,
            notify_email,
            digest,
            report,
        ),
        Commands::Validate {
            name,
            stages,
            project,
            notify_email,
        } => validate_input(name, stages, project, notify_email),
        Commands::Completions { shell } => {
            print_completions(shell);
            Ok(())
        }
    }
}

fn configure_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|err| anyhow!(err.to_string()))?;

    Ok(())
}

fn init_project(name: String, stages: Vec<String>, parent: PathBuf) -> Result<()> {
    let spec = PipelineSpec::new(name, stages);
    enforce_report(&validate_spec(&spec), "Init")?;

    let layout = ProjectLayout::default();
    let plan = StagePlan::normalize(&spec.stages, &spec.terminal_stage);
    let root = scaffold_project(&parent, &spec.name, &plan, &layout)?;

    println!("Created function project at {}", root.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn synth(
    name: Option<String>,
    stages: Vec<String>,
    project: Option<PathBuf>,
    out: PathBuf,
    stack_name_token: Option<String>,
    notify_email: Option<String>,
    digest: bool,
    report_path: Option<PathBuf>,
) -> Result<()> {
    let (mut spec, validation) = assemble_spec(name, stages, project.as_deref(), notify_email)?;
    if let Some(token) = stack_name_token {
        spec.stack_name_token = token;
    }
    enforce_report(&validation, "Synthesis")?;

    let registry = ArtifactRegistry::standard();
    let definition = build_definition(&spec, registry)?;
    let hook = FailureHook::new(spec.notification_email.clone());
    let definition = wire_failure_notifications(definition, &hook);
    let document = render_document(&definition, registry)?;
    let rendered = document.to_json_pretty()?;

    if out.as_os_str() == "-" {
        if digest {
            warn!("--digest is ignored when writing to stdout");
        }
        print!("{rendered}");
    } else {
        if let Some(parent) = out.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }
        fs::write(&out, &rendered)
            .with_context(|| format!("Failed to write pipeline document: {}", out.display()))?;
        info!(
            document = %out.display(),
            actions = definition.actions.len(),
            "Pipeline document written"
        );

        if digest {
            let checksum = sha256_hex(rendered.as_bytes());
            let digest_path = sidecar_path(&out);
            let mut file = File::create(&digest_path).with_context(|| {
                format!("Failed to create digest file: {}", digest_path.display())
            })?;
            writeln!(file, "{}  {}", checksum, out.display())
                .with_context(|| format!("Failed to write digest file: {}", digest_path.display()))?;
            println!("{}  {}", checksum, out.display());
        }
    }

    if let Some(path) = report_path {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create report directory: {}", parent.display())
            })?;
        }
        let report = build_report(&definition, &document)?;
        write_report(&report, &path)?;
        info!(report = %path.display(), "Synthesis report written");
    }

    Ok(())
}

fn validate_input(
    name: Option<String>,
    stages: Vec<String>,
    project: Option<PathBuf>,
    notify_email: Option<String>,
) -> Result<()> {
    let (spec, report) = assemble_spec(name, stages, project.as_deref(), notify_email)?;
    enforce_report(&report, "Validation")?;
    info!(pipeline = %spec.name, "Validation passed");
    Ok(())
}

fn assemble_spec(
    name: Option<String>,
    stages: Vec<String>,
    project: Option<&Path>,
    notify_email: Option<String>,
) -> Result<(PipelineSpec, ValidationReport)> {
    match project {
        Some(root) => {
            let layout = ProjectLayout::default();
            let loaded = load_project(root, &layout)?;
            let mut spec = loaded.pipeline_spec(stages, notify_email);
            if let Some(name) = name {
                spec.name = name;
            }
            let report = validate_project(&loaded, &spec);
            Ok((spec, report))
        }
        None => {
            let Some(name) = name else {
                bail!("--name is required when no --project is given");
            };
            let mut spec = PipelineSpec::new(name, stages);
            spec.notification_email = notify_email;
            let report = validate_spec(&spec);
            Ok((spec, report))
        }
    }
}

fn enforce_report(report: &ValidationReport, label: &str) -> Result<()> {
    for warning in &report.warnings {
        warn!("{warning}");
    }
    if report.is_ok() {
        return Ok(());
    }
    for error_msg in &report.errors {
        error!("{error_msg}");
    }
    Err(anyhow!(
        "{label} failed with {} validation error(s)",
        report.errors.len()
    ))
}

fn sidecar_path(out: &Path) -> PathBuf {
    let mut name = out.as_os_str().to_os_string();
    name.push(".sha256");
    PathBuf::from(name)
}

fn print_completions(shell: Shell) {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    clap_complete::generate(shell, &mut command, name, &mut io::stdout());
}

#[derive(Parser)]
#[command(
    name = "pipewright",
    version,
    about = "Scaffold serverless function projects and synthesize their delivery pipelines"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Init {
        name: String,
        #[arg(long, short, num_args = 1.., value_name = "STAGE")]
        stages: Vec<String>,
        #[arg(long, default_value = ".")]
        parent: PathBuf,
    },
    Synth {
        #[arg(long)]
        name: Option<String>,
        #[arg(long, short, num_args = 1.., value_name = "STAGE")]
        stages: Vec<String>,
        #[arg(long)]
        project: Option<PathBuf>,
        #[arg(long, default_value = "stack.json")]
        out: PathBuf,
        #[arg(long = "stack-name-token")]
        stack_name_token: Option<String>,
        #[arg(long = "notify-email")]
        notify_email: Option<String>,
        #[arg(long)]
        digest: bool,
        #[arg(long)]
        report: Option<PathBuf>,
    },
    Validate {
        #[arg(long)]
        name: Option<String>,
        #[arg(long, short, num_args = 1.., value_name = "STAGE")]
        stages: Vec<String>,
        #[arg(long)]
        project: Option<PathBuf>,
        #[arg(long = "notify-email")]
        notify_email: Option<String>,
    },
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}
