//! Prompt-variant benchmark CLI

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use flipbench::{
    analysis::{aggregate, discover_outputs},
    config::Config,
    dataset::{load_dataset_from_file, MMLU_TEST_SIZE},
    layout::Layout,
    merge::{combine_variant, merge_missing, reconcile, MissingManifest},
    prompts::PromptVariant,
    providers::ProviderRegistry,
    reporting::print_console_report,
    runner::{RunMode, RunnerConfig, ShardPaths, ShardRunner, TargetSet},
};

#[derive(Parser)]
#[command(name = "flipbench")]
#[command(about = "Prompt-variant evaluation of LLM providers on MMLU, with flip analysis")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one shard of a prompt variant against a provider
    Run {
        /// Prompt variant name
        #[arg(short, long, default_value = "standard")]
        prompt: String,

        /// Configured provider name (together, nvidia, openai, gemini, ...)
        #[arg(long)]
        provider: String,

        /// Model id (default: the provider's configured model)
        #[arg(short, long)]
        model: Option<String>,

        /// Shard id, used in the shard and log file names
        #[arg(long)]
        shard_id: u32,

        /// First dataset index of the range
        #[arg(long, default_value_t = 0)]
        start: usize,

        /// End of the range (exclusive, clamped to the dataset size)
        #[arg(long, default_value_t = MMLU_TEST_SIZE)]
        end: usize,

        /// Comma-separated index list (e.g. 100,102,105)
        #[arg(long, conflicts_with = "fill_missing")]
        indices: Option<String>,

        /// Run the indices listed in this prompt's missing manifest
        #[arg(long)]
        fill_missing: Option<String>,

        /// Run tag grouping shard and run logs (default: today's date)
        #[arg(long)]
        folder: Option<String>,

        /// Request a streamed response when the provider supports it
        #[arg(long)]
        stream: bool,

        /// `test` echoes the trace and does not persist results
        #[arg(long, value_enum, default_value = "run")]
        mode: RunMode,

        /// Environment variable holding the API key (overrides configuration)
        #[arg(long)]
        api_key_env: Option<String>,

        /// Attempts per index (default from configuration)
        #[arg(long)]
        max_retries: Option<u32>,

        /// Report failed attempts per cause
        #[arg(long)]
        diagnostics: bool,
    },

    /// Combine every shard of a variant into its canonical output
    Combine {
        #[arg(short, long)]
        prompt: String,

        /// Run tag the shards were written under
        #[arg(long)]
        folder: String,
    },

    /// Merge fill-missing shards into an existing canonical output
    MergeMissing {
        #[arg(short, long)]
        prompt: String,

        /// Run tag of the fill-missing shards
        #[arg(long)]
        folder: String,

        /// Shard ids to merge (default: 0)
        #[arg(long, num_args = 0..)]
        shards: Vec<u32>,
    },

    /// Recompute the missing manifest of a variant
    Reconcile {
        #[arg(short, long)]
        prompt: String,
    },

    /// Summarise variants and compute flip tables against the baseline
    Aggregate {
        /// Prompt variants to analyse
        #[arg(long, num_args = 1..)]
        prompts: Vec<String>,

        /// Analyse every canonical output in the output directory
        #[arg(long, conflicts_with = "prompts")]
        all: bool,
    },

    /// List available prompt variants
    ListPrompts,

    /// Generate sample configuration
    InitConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config/flipbench.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("flipbench=debug,info")
    } else {
        EnvFilter::new("flipbench=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load_or_default(),
    };

    match cli.command {
        Commands::Run {
            prompt,
            provider,
            model,
            shard_id,
            start,
            end,
            indices,
            fill_missing,
            folder,
            stream,
            mode,
            api_key_env,
            max_retries,
            diagnostics,
        } => {
            let targets = if let Some(list) = indices {
                TargetSet::parse_list(&list)?
            } else if let Some(source) = fill_missing {
                let layout = Layout::new(config.paths.clone());
                TargetSet::FillMissing(MissingManifest::load(&layout.missing_manifest(&source))?)
            } else {
                TargetSet::Range { start, end }
            };

            let runner_config = RunnerConfig {
                model: model.unwrap_or_default(),
                streaming: stream,
                max_retries: max_retries.unwrap_or(config.run.max_retries),
                mode,
                diagnostics: diagnostics || config.run.diagnostics,
            };
            let folder = folder.unwrap_or_else(|| chrono::Local::now().format("%Y%m%d").to_string());

            run_shard(
                &config,
                &prompt,
                &provider,
                api_key_env.as_deref(),
                shard_id,
                &folder,
                targets,
                runner_config,
            )
            .await?;
        }

        Commands::Combine { prompt, folder } => {
            let layout = Layout::new(config.paths.clone());
            let report = combine_variant(&layout, &folder, &prompt)?;
            println!(
                "Combined {} shard files ({} records) -> {}",
                report.sources.len(),
                report.records,
                report.output.display()
            );
        }

        Commands::MergeMissing {
            prompt,
            folder,
            shards,
        } => {
            let layout = Layout::new(config.paths.clone());
            let report = merge_missing(&layout, &prompt, &folder, &shards)?;
            println!(
                "Merged {} shard files. Total items: {} -> {}",
                report.sources.len(),
                report.records,
                report.output.display()
            );
        }

        Commands::Reconcile { prompt } => {
            let layout = Layout::new(config.paths.clone());
            let dataset = load_dataset_from_file(layout.dataset())?;
            let manifest = reconcile(&layout, &prompt, dataset.len())?;
            println!("Missing lists for {}:", prompt);
            println!("{:-<50}", "");
            println!("  index_missing:        {}", manifest.index_missing.len());
            println!("  response_ans_missing: {}", manifest.response_ans_missing.len());
            println!("  response_missing:     {}", manifest.response_missing.len());
            println!("  Manifest: {}", layout.missing_manifest(&prompt).display());
        }

        Commands::Aggregate { prompts, all } => {
            let layout = Layout::new(config.paths.clone());
            let prompts = if all {
                discover_outputs(&layout)?
            } else if !prompts.is_empty() {
                prompts
            } else {
                return Err("Please provide --prompts or --all".into());
            };

            let dataset = load_dataset_from_file(layout.dataset())?;
            let report = aggregate(&layout, &dataset, &prompts)?;
            print_console_report(&report);
        }

        Commands::ListPrompts => {
            list_prompts();
        }

        Commands::InitConfig { output } => {
            init_config(output)?;
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_shard(
    config: &Config,
    prompt: &str,
    provider_name: &str,
    api_key_env: Option<&str>,
    shard_id: u32,
    folder: &str,
    targets: TargetSet,
    runner_config: RunnerConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let variant = PromptVariant::from_str(prompt)?;
    let layout = Layout::new(config.paths.clone());
    let dataset = load_dataset_from_file(layout.dataset())?;
    let provider = ProviderRegistry::new().create(provider_name, config, api_key_env)?;

    println!("=== Shard Run ===");
    println!("Prompt:   {}", variant);
    println!("Provider: {}", provider.name());
    println!("Folder:   {} (shard {})", folder, shard_id);
    println!("Targets:  {}", targets.describe());
    println!();

    let paths = ShardPaths {
        shard_log: layout.shard_log(folder, variant.as_str(), shard_id),
        run_log: layout.run_log(folder, variant.as_str(), shard_id),
        error_log: layout.error_log(folder, variant.as_str(), shard_id),
    };
    let runner = ShardRunner::new(&dataset, variant, provider, runner_config, paths.clone());
    let outcome = runner.run(&targets).await?;

    println!("Attempted: {}", outcome.attempted);
    println!("Written:   {}", outcome.written.len());
    if outcome.error_indices.is_empty() {
        println!("No errors encountered.");
    } else {
        println!(
            "Errors:    {} (see {})",
            outcome.error_indices.len(),
            paths.error_log.display()
        );
    }
    if let Some(breakdown) = outcome.diagnostics {
        println!("\nFailed attempts by cause:");
        println!("{:-<50}", "");
        println!("  transport:         {}", breakdown.transport);
        println!("  empty_response:    {}", breakdown.empty_response);
        println!("  unparsable_answer: {}", breakdown.unparsable_answer);
        println!("  total:             {}", breakdown.total());
    }

    Ok(())
}

fn list_prompts() {
    println!("Available prompt variants:");
    println!("{:-<50}", "");
    for variant in PromptVariant::all() {
        let marker = if variant.is_baseline() { " (baseline)" } else { "" };
        let first_line = variant.instruction().lines().next().unwrap_or_default();
        println!("  {:<18}{} {}", variant.as_str(), marker, first_line);
    }
}

fn init_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();

    // Ensure parent directory exists
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    config.save_toml(&output)?;
    println!("Configuration written to: {}", output.display());
    Ok(())
}
