//! Knowgraph CLI - grow and consolidate knowledge graphs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use knowgraph_core::config::Config;
use knowgraph_core::domain::graph::{Graph, GraphBatch, GraphGenerator, GraphStore, similarity};
use knowgraph_core::llm::{LlmClient, ProviderContext};
use knowgraph_core::storage::JsonlGraphRepository;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "knowgraph")]
#[command(author, version, about = "Grow and consolidate knowledge graphs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory
    Init {
        /// Load the built-in seed graph
        #[arg(long)]
        seed: bool,
    },

    /// Show the current graph
    Show,

    /// Merge a batch file into the graph
    Merge {
        /// JSON file with `entities` and `relations`
        file: PathBuf,
    },

    /// Ask the AI service to expand the graph around a topic
    Expand {
        /// Topic to expand on
        prompt: String,
    },

    /// Score two strings with bigram similarity
    Similarity { a: String, b: String },

    /// Show the provider fallback order
    Providers,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show configuration file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("knowgraph=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { seed } => cmd_init(seed, cli.format, cli.quiet).await,
        Commands::Show => cmd_show(cli.format).await,
        Commands::Merge { file } => cmd_merge(&file, cli.format, cli.quiet).await,
        Commands::Expand { prompt } => cmd_expand(&prompt, cli.format, cli.quiet).await,
        Commands::Similarity { a, b } => cmd_similarity(&a, &b, cli.format),
        Commands::Providers => cmd_providers(cli.format),
        Commands::Config { action } => cmd_config(action, cli.quiet),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

fn open_repository(config: &Config) -> anyhow::Result<Arc<JsonlGraphRepository>> {
    let dir = config.data_dir()?;
    debug!(dir = %dir.display(), "Using data directory");
    Ok(Arc::new(JsonlGraphRepository::new(dir)))
}

async fn cmd_init(seed: bool, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let dir = config.data_dir()?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;

    let repo = open_repository(&config)?;
    let store = if seed {
        GraphStore::open_or_seed(repo).await?
    } else {
        GraphStore::open(repo).await?
    };
    let stats = store.graph().stats();

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "data_dir": dir,
                "entities": stats.entity_count,
                "relations": stats.relation_count,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            if !quiet {
                println!("Initialized graph at {}", dir.display());
                println!(
                    "  {} entities, {} relations",
                    stats.entity_count, stats.relation_count
                );
            }
        }
    }
    Ok(())
}

async fn cmd_show(format: OutputFormat) -> anyhow::Result<()> {
    let config = Config::load()?;
    let store = GraphStore::open(open_repository(&config)?).await?;
    let graph = store.graph();

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(graph)?);
        return Ok(());
    }

    if graph.is_empty() {
        println!("Graph is empty. Run `knowgraph init --seed` or `knowgraph merge <file>`.");
        return Ok(());
    }

    print_graph(graph);
    Ok(())
}

fn print_graph(graph: &Graph) {
    println!("Entities ({}):", graph.entities.len());
    for entity in &graph.entities {
        let category = if entity.category.is_empty() {
            String::new()
        } else {
            format!(" [{}]", entity.category)
        };
        println!(
            "  {:<24} {}{} (significance {})",
            entity.id, entity.label, category, entity.significance
        );
    }

    println!();
    println!("Relations ({}):", graph.relations.len());
    for relation in &graph.relations {
        println!(
            "  {} -[{}]-> {} ({:.2})",
            relation.source_id(),
            relation.relation,
            relation.target_id(),
            relation.weight
        );
    }
}

async fn cmd_merge(file: &Path, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read batch file: {}", file.display()))?;
    let batch = GraphBatch::from_json(&contents)
        .with_context(|| format!("Invalid batch file: {}", file.display()))?;

    let config = Config::load()?;
    let mut store = GraphStore::open(open_repository(&config)?).await?;
    let outcome = store.ingest(batch).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Text => {
            println!("{}", outcome.status_message());
            if !quiet {
                for merge in &outcome.merges {
                    println!(
                        "  merged {} into {} ({})",
                        merge.incoming_id, merge.canonical_id, merge.rule
                    );
                }
                for dropped in &outcome.dropped {
                    println!(
                        "  dropped {} -[{}]-> {} ({})",
                        dropped.source, dropped.relation, dropped.target, dropped.reason
                    );
                }
            }
        }
    }
    Ok(())
}

async fn cmd_expand(prompt: &str, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let client = LlmClient::from_config(&config.llm)?;
    let mut context = ProviderContext::from_config(&config.llm);
    let generator = GraphGenerator::from_config(&config.generation);

    let mut store = GraphStore::open_or_seed(open_repository(&config)?).await?;

    info!(prompt = %prompt, candidates = context.candidates().len(), "Expanding graph");
    let result = store.expand(&generator, &mut context, &client, prompt).await;

    if !quiet && format == OutputFormat::Text {
        for attempt in context.attempts() {
            let status = match &attempt.error {
                None => "ok".to_string(),
                Some(e) => format!("failed: {}", e),
            };
            eprintln!(
                "  {}/{} ({}) {}",
                attempt.provider, attempt.model, attempt.tier, status
            );
        }
    }

    let outcome = result?;
    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "outcome": outcome,
                "attempts": context.attempts(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => println!("{}", outcome.status_message()),
    }
    Ok(())
}

fn cmd_similarity(a: &str, b: &str, format: OutputFormat) -> anyhow::Result<()> {
    let score = similarity(a, b);
    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({ "a": a, "b": b, "score": score });
            println!("{}", serde_json::to_string(&out)?);
        }
        OutputFormat::Text => println!("{:.4}", score),
    }
    Ok(())
}

fn cmd_providers(format: OutputFormat) -> anyhow::Result<()> {
    let config = Config::load()?;
    let client = LlmClient::from_config(&config.llm)?;
    let context = ProviderContext::from_config(&config.llm);

    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = context
                .candidates()
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "provider": c.provider,
                        "model": c.model,
                        "tier": c.tier,
                        "remaining_quota": c.remaining_quota,
                        "available": client.is_available(&c.provider),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Text => {
            if context.candidates().is_empty() {
                println!("No providers configured. See `knowgraph config list`.");
                return Ok(());
            }
            for (idx, candidate) in context.candidates().iter().enumerate() {
                let quota = candidate
                    .remaining_quota
                    .map(|q| q.to_string())
                    .unwrap_or_else(|| "unlimited".to_string());
                let key = if client.is_available(&candidate.provider) {
                    "key set"
                } else {
                    "no key"
                };
                println!(
                    "{:>2}. {}/{} [{}] quota={} ({})",
                    idx + 1,
                    candidate.provider,
                    candidate.model,
                    candidate.tier,
                    quota,
                    key
                );
            }
        }
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "knowgraph", "similarity", "a", "b", "--format", "json", "-q",
        ])
        .unwrap();
        assert!(cli.quiet);
        assert!(cli.format == OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Similarity { .. }));
    }

    #[test]
    fn test_parse_init_seed() {
        let cli = Cli::try_parse_from(["knowgraph", "init", "--seed"]).unwrap();
        assert!(matches!(cli.command, Commands::Init { seed: true }));
    }
}
