//! CLI command definitions and handlers

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::analyzer::QueryAnalyzer;
use crate::audit::{AuditLog, TracingListener};
use crate::community::CommunityOptimizer;
use crate::config::{load_config, AnalyzerConfig};
use crate::graph::{Graph, GraphSpec};
use crate::policy::{build_policy, Mode, NullKnowledge, PolicyContext, PolicyKind};
use crate::verdict::EventType;

/// Exit code for an anomalous verdict
pub const EXIT_ANOMALY: u8 = 2;

/// querygraph - score SQL access graphs for anomalous structure
#[derive(Parser, Debug)]
#[command(name = "querygraph")]
#[command(
    version,
    about = "Classify SQL query access graphs as normal or anomalous",
    after_help = "\
Examples:
  querygraph analyze query.json                       Run the configured policy
  querygraph analyze query.json --policy density      Override the policy
  querygraph score query.json --membership            Louvain modularity and communities

Graph files are JSON edge lists: {\"nodes\": 3, \"edges\": [[0, 1, 1.0], [1, 2, 0.5]]}"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify a query graph with a decision policy
    Analyze {
        /// Graph file (JSON edge list)
        graph: PathBuf,

        /// Configuration file (default: discovered in the current directory)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the configured policy
        #[arg(long, value_enum)]
        policy: Option<PolicyKind>,

        /// Override the configured mode
        #[arg(long, value_enum)]
        mode: Option<Mode>,

        /// User the query is attributed to
        #[arg(long, default_value = "anonymous")]
        user: String,

        /// SQL text recorded in the audit event
        #[arg(long, default_value = "")]
        query: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print the Louvain modularity of a graph as-is
    Score {
        /// Graph file (JSON edge list)
        graph: PathBuf,

        /// Configuration file (default: discovered in the current directory)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Also print the community of every node
        #[arg(long)]
        membership: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Run the CLI
pub fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Analyze {
            graph,
            config,
            policy,
            mode,
            user,
            query,
            format,
        } => {
            let mut config = resolve_config(config.as_deref())?;
            if let Some(kind) = policy {
                config.policy.kind = kind;
            }
            if let Some(mode) = mode {
                config.policy.mode = mode;
            }
            let graph = read_graph(&graph)?;
            analyze(&config, &graph, &user, &query, format)
        }
        Commands::Score {
            graph,
            config,
            membership,
            format,
        } => {
            let config = resolve_config(config.as_deref())?;
            let graph = read_graph(&graph)?;
            score(&config, &graph, membership, format)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AnalyzerConfig> {
    match path {
        Some(path) => AnalyzerConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => {
            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            Ok(load_config(&cwd))
        }
    }
}

fn read_graph(path: &Path) -> Result<Graph> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read graph {}", path.display()))?;
    let spec: GraphSpec = serde_json::from_str(&content)
        .with_context(|| format!("Invalid graph file {}", path.display()))?;
    spec.into_graph()
        .with_context(|| format!("Malformed graph in {}", path.display()))
}

fn analyze(
    config: &AnalyzerConfig,
    graph: &Graph,
    user: &str,
    query: &str,
    format: OutputFormat,
) -> Result<ExitCode> {
    let audit = Arc::new(AuditLog::new());
    audit.register(Arc::new(TracingListener));
    let context = PolicyContext::new(Arc::new(NullKnowledge), audit, config.policy.mode);

    let policy = build_policy(config, context)?;
    let analyzer = QueryAnalyzer::new(policy);
    let verdict = analyzer.analyze(user, query, graph)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&verdict)?),
        OutputFormat::Text => {
            println!("{} ({})", verdict.classification(), analyzer.policy().name());
            for (key, value) in verdict.properties() {
                println!("  {}: {}", key, value);
            }
        }
    }

    if verdict.classification() == EventType::Anomaly {
        Ok(ExitCode::from(EXIT_ANOMALY))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn score(config: &AnalyzerConfig, graph: &Graph, membership: bool, format: OutputFormat) -> Result<()> {
    let optimizer = CommunityOptimizer::with_limits(config.optimizer.limits())?;
    let report = optimizer.detect(graph);

    match format {
        OutputFormat::Json => {
            let mut value = serde_json::to_value(&report)?;
            if !membership {
                if let Some(object) = value.as_object_mut() {
                    object.remove("membership");
                }
            }
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            println!("modularity: {:?}", report.modularity);
            println!("communities: {}", report.community_count());
            println!("levels: {}", report.levels);
            if membership {
                for (node, community) in report.membership.iter().enumerate() {
                    println!("  {} -> {}", node, community);
                }
            }
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
    fn test_parse_analyze_overrides() {
        let cli = Cli::try_parse_from([
            "querygraph",
            "analyze",
            "g.json",
            "--policy",
            "density",
            "--mode",
            "training",
            "--format",
            "json",
        ])
        .unwrap();

        match cli.command {
            Commands::Analyze {
                policy,
                mode,
                format,
                user,
                ..
            } => {
                assert_eq!(policy, Some(PolicyKind::Density));
                assert_eq!(mode, Some(Mode::Training));
                assert_eq!(format, OutputFormat::Json);
                assert_eq!(user, "anonymous");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
