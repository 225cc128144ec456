//! `jha`: run job hazard analyses from the command line.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use jha_core::{load_document, Checklist, ReferenceData, Report, WeatherConditions};
use jha_runtime::agents::{
    IncidentPredictorAgent, IncidentPredictorProfile, RiskAssessorAgent, RiskAssessorProfile,
    ValidatorAgent, ValidatorProfile,
};
use jha_runtime::{
    CapabilityRouter, PipelineContext, PipelineInput, PipelineInputs, PipelineOrchestrator,
    PipelineResult, ProviderRegistry, RuntimeConfig, StageTask,
};

/// Exit code for a run that fell back to the conservative report.
const EXIT_FALLBACK: u8 = 2;

#[derive(Parser)]
#[command(name = "jha", version, about = "Job hazard analysis pipeline")]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline over a checklist and print the result
    Analyze {
        /// Checklist file (.json, .yaml or .yml)
        #[arg(long)]
        checklist: PathBuf,
        /// Weather conditions file
        #[arg(long)]
        weather: Option<PathBuf>,
        /// Industry injury reference data file
        #[arg(long)]
        reference: Option<PathBuf>,
        /// Runtime configuration file
        #[arg(long)]
        config: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
        /// Clock reading for the analysis, RFC 3339 (defaults to now)
        #[arg(long)]
        current_time: Option<DateTime<Utc>>,
    },
    /// Show which adapter each model-backed stage routes to, and why
    Routes {
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable summary
    Pretty,
    /// The full result as JSON
    Json,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    match cli.command {
        Commands::Analyze {
            checklist,
            weather,
            reference,
            config,
            format,
            current_time,
        } => {
            analyze(
                &checklist,
                weather.as_deref(),
                reference.as_deref(),
                &config,
                format,
                current_time,
            )
            .await
        }
        Commands::Routes { config } => routes(&config),
    }
}

fn load_config(path: &Path) -> Result<RuntimeConfig> {
    RuntimeConfig::from_file(path)
        .with_context(|| format!("failed to load config {}", path.display()))
}

fn load_optional<T: serde::de::DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    match path {
        Some(path) => load_document(path).with_context(|| format!("failed to read {}", path.display())),
        None => Ok(T::default()),
    }
}

async fn analyze(
    checklist: &Path,
    weather: Option<&Path>,
    reference: Option<&Path>,
    config: &Path,
    format: OutputFormat,
    current_time: Option<DateTime<Utc>>,
) -> Result<ExitCode> {
    let checklist: Checklist = load_document(checklist)
        .with_context(|| format!("failed to read checklist {}", checklist.display()))?;
    let weather: WeatherConditions = load_optional(weather)?;
    let reference: ReferenceData = load_optional(reference)?;

    let config = load_config(config)?;
    let orchestrator = PipelineOrchestrator::from_config(&config, &ProviderRegistry::with_defaults())
        .context("failed to build pipeline")?;

    let mut input = PipelineInput::new(checklist, weather, reference);
    input.current_time = current_time;
    let result = orchestrator.run(input).await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Pretty => print_summary(&result),
    }

    Ok(if result.fallback {
        ExitCode::from(EXIT_FALLBACK)
    } else {
        ExitCode::SUCCESS
    })
}

fn print_summary(result: &PipelineResult) {
    let summary = result.final_report.executive_summary();

    println!("Report:     {}", result.final_report.report_id());
    println!("Decision:   {}", summary.decision);
    println!("Risk level: {}", summary.overall_risk_level);
    if let Some(error) = &result.error {
        println!("Error:      {}", error);
    }

    println!();
    println!("Key findings:");
    for finding in &summary.key_findings {
        println!("  - {}", finding);
    }

    if let Report::Complete(report) = &result.final_report {
        if !report.hazard_analysis.top_threats.is_empty() {
            println!();
            println!("Top threats:");
            for threat in &report.hazard_analysis.top_threats {
                println!("  - {}", threat);
            }
        }
        if !report.action_items.is_empty() {
            println!();
            println!("Actions:");
            for item in &report.action_items {
                println!(
                    "  [{:?}] {} ({}, {})",
                    item.priority, item.action, item.timeframe, item.responsibility
                );
            }
        }
    }

    println!();
    println!(
        "{} stage(s), {} model call(s), {} tokens, ~${:.4}, {}ms",
        result.timing.stages.len(),
        result.timing.usage.model_calls,
        result.timing.usage.total_tokens,
        result.timing.usage.estimated_cost,
        result.timing.total_ms
    );
}

fn routes(config: &Path) -> Result<ExitCode> {
    let config = Arc::new(load_config(config)?);
    let router = Arc::new(
        config
            .build_router(&ProviderRegistry::with_defaults())
            .context("failed to build router")?,
    );

    let ctx = PipelineContext::new(PipelineInputs {
        checklist: Checklist::default(),
        weather: WeatherConditions::default(),
        reference: ReferenceData::default(),
        current_time: Utc::now(),
    });
    let tasks = [
        ValidatorAgent::new(ValidatorProfile, Arc::clone(&router))
            .with_overrides(config.clone())
            .task(&ctx),
        RiskAssessorAgent::new(RiskAssessorProfile, Arc::clone(&router))
            .with_overrides(config.clone())
            .task(&ctx),
        IncidentPredictorAgent::new(IncidentPredictorProfile, Arc::clone(&router))
            .with_overrides(config.clone())
            .task(&ctx),
    ];

    println!("routing mode: {:?}", router.mode());
    for (task, _) in &tasks {
        print_route(&router, task, config.stage_timeout(task.task_type));
    }
    Ok(ExitCode::SUCCESS)
}

fn print_route(router: &CapabilityRouter, task: &StageTask, timeout: Duration) {
    match router.explain(task) {
        Ok(decision) => {
            let adapter = &router.adapters()[decision.index];
            println!(
                "{:<20} -> {:<40} ({}, timeout {:?})",
                task.task_type.to_string(),
                adapter.label(),
                decision.reason,
                timeout
            );
        }
        Err(e) => println!("{:<20} -> error: {}", task.task_type.to_string(), e),
    }
}
