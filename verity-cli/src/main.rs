//! Command-line front end for claim verification
//!
//! Usage:
//!   verity presets                                   # List presets
//!   verity verify -c "Claim text"                    # Verify with "standard"
//!   verity verify -c "Claim" -p comprehensive --format json
//!   verity verify -c "Claim" --single-provider anthropic
//!
//! Provider keys come from the environment (a `.env` file is honoured):
//! OPENAI_API_KEY, ANTHROPIC_API_KEY, PERPLEXITY_API_KEY, GOOGLE_API_KEY,
//! XAI_API_KEY, DEEPSEEK_API_KEY. Logs go to stderr; set RUST_LOG to tune.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use verity_core::{
    load_catalog, JudgmentOutcome, Orchestrator, OrchestratorConfig, PresetCatalog, Provider,
    ProviderRouter, ProviderSettings, ProviderStrategy, VerificationResult,
};

#[derive(Parser)]
#[command(name = "verity")]
#[command(about = "Verify claims against a weighted panel of AI models")]
struct Args {
    /// Preset table (YAML or JSON) replacing the built-in presets
    #[arg(long, global = true, env = "VERITY_PRESETS_FILE")]
    presets_file: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify a claim
    Verify {
        /// Claim text to verify
        #[arg(short = 'c', long)]
        claim: String,

        /// Preset name
        #[arg(short = 'p', long, default_value = "standard")]
        preset: String,

        /// Global deadline in milliseconds (defaults to VERITY_DEADLINE_MS or 30000)
        #[arg(short = 'd', long)]
        deadline_ms: Option<u64>,

        /// Route every slot to one provider (openai, anthropic, perplexity, google, xai, deepseek)
        #[arg(long, value_parser = parse_provider)]
        single_provider: Option<Provider>,
    },

    /// List available presets
    Presets,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn parse_provider(s: &str) -> Result<Provider, String> {
    Provider::ALL
        .into_iter()
        .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| format!("unknown provider '{}'", s))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "verity_core=info,verity_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let catalog = match &args.presets_file {
        Some(path) => load_catalog(path)?,
        None => PresetCatalog::builtin(),
    };

    match args.command {
        Command::Presets => {
            print_presets(&catalog, args.format)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify {
            claim,
            preset,
            deadline_ms,
            single_provider,
        } => {
            let config = OrchestratorConfig::from_env();
            let settings = ProviderSettings::from_env();
            if settings.configured().is_empty() {
                tracing::warn!("No provider API keys configured; every slot will fail");
            }
            let router = ProviderRouter::from_settings(&settings, &config)
                .context("Failed to create provider clients")?;

            let deadline = deadline_ms
                .map(Duration::from_millis)
                .unwrap_or(config.default_deadline);
            let strategy = single_provider
                .map(ProviderStrategy::Single)
                .unwrap_or_default();

            let orchestrator =
                Orchestrator::new(Arc::new(catalog), Arc::new(router)).with_config(config);

            match orchestrator
                .verify_with(&claim, &preset, strategy, deadline)
                .await
            {
                Ok(result) => {
                    print_result(&result, args.format)?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("Verification failed: {}", e);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

fn print_presets(catalog: &PresetCatalog, format: OutputFormat) -> Result<()> {
    let presets = catalog.list();
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&presets)?);
        }
        OutputFormat::Text => {
            println!("Presets (catalog version {}):", catalog.version());
            for preset in presets {
                let roles: Vec<&str> = preset.roles.iter().map(|r| r.as_str()).collect();
                println!(
                    "  {:<14} {:?} cost, {} - {}",
                    preset.name, preset.cost_tier, preset.latency_estimate, preset.description
                );
                println!("  {:<14} roles: {}", "", roles.join(", "));
                if let Some(recommendation) = &preset.recommendation {
                    println!("  {:<14} {}", "", recommendation);
                }
                for warning in &preset.warnings {
                    println!("  {:<14} ! {}", "", warning);
                }
            }
        }
    }
    Ok(())
}

fn print_result(result: &VerificationResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        OutputFormat::Text => {
            println!("Claim:      {}", result.claim);
            println!("Preset:     {}", result.preset);
            println!(
                "Verdict:    {} (confidence {:.2})",
                result.verdict, result.confidence
            );
            if result.contradiction {
                println!("            contradiction detected, confidence capped");
            }
            if result.degraded {
                println!(
                    "Degraded:   {} of {} model(s) did not answer",
                    result.metadata.models_failed + result.metadata.models_timed_out,
                    result.judgments.len()
                );
            }
            println!("Elapsed:    {}ms", result.metadata.elapsed_ms);
            println!("\nModels:");
            for judgment in &result.judgments {
                let status = match &judgment.outcome {
                    JudgmentOutcome::Success(a) => {
                        format!("{} {:.2}", a.label, a.confidence)
                    }
                    JudgmentOutcome::Failed { error } => format!("FAILED: {}", error),
                    JudgmentOutcome::TimedOut { error } => format!("TIMED OUT: {}", error),
                };
                println!(
                    "  [{}] {:<40} w={:.2} {:>6}ms  {}",
                    judgment.slot_index,
                    judgment.slot.to_string(),
                    judgment.slot.weight,
                    judgment.latency_ms,
                    status
                );
            }
        }
    }
    Ok(())
}
