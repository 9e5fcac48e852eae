//! rgl - command-line front end for the RGL engine.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rgl_engine::{ArrowExtractor, Engine, EngineConfig, QueryOutcome, TeachStatus};

#[derive(Parser)]
#[command(name = "rgl")]
#[command(author, version, about = "RGL - probability-weighted semantic graph", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// State document path (overrides the config file)
    #[arg(short, long, global = true)]
    state: Option<PathBuf>,

    /// Verbose output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract relations from text and add them to the graph
    Teach {
        /// Arrow-notation clauses or a JSON array of relations
        text: String,
    },

    /// Ask for a recommendation
    Query {
        /// Term the recommendation is about
        query: String,

        /// Situation the recommendation applies to
        context: String,

        /// Show up to this many ranked answers
        #[arg(short, long, default_value = "1")]
        limit: usize,
    },

    /// Print the stored rules
    Rules {
        /// Show terms instead of token ids
        #[arg(short, long)]
        resolved: bool,
    },

    /// Validate the stored graph and report fan-out violations
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(state) = cli.state {
        config = config.with_state_path(state);
    }

    let extractor = ArrowExtractor::from_config(&config.extraction);
    let engine = Engine::open(config, extractor).await.context("opening engine")?;

    match cli.command {
        Commands::Teach { text } => {
            let outcome = engine.teach(&text).await?;
            println!("old: {}", outcome.old_graph);
            println!("new: {}", outcome.new_graph);
            match outcome.status {
                TeachStatus::Learned => println!(
                    "learned: {} appended, {} merged, {} pruned",
                    outcome.report.appended, outcome.report.merged, outcome.report.pruned
                ),
                TeachStatus::NothingExtracted | TeachStatus::Rejected | TeachStatus::Unsaved => {
                    println!("unchanged: {}", outcome.diagnostic.unwrap_or_default());
                }
            }
        }
        Commands::Query { query, context, limit } if limit > 1 => {
            let answers = engine.rank(&query, &context, limit)?;
            if answers.is_empty() {
                println!("no match");
            }
            for (i, answer) in answers.iter().enumerate() {
                println!("{}. {} ({})", i + 1, answer.result, answer.explanation);
            }
        }
        Commands::Query { query, context, .. } => match engine.query(&query, &context)? {
            QueryOutcome::Match(answer) => {
                println!("{}", answer.result);
                println!("{}", answer.explanation);
            }
            QueryOutcome::NoMatch => println!("no match"),
        },
        Commands::Rules { resolved } => {
            let rules = if resolved { engine.resolved_rules() } else { engine.rules() };
            for rule in rules {
                println!("{rule}");
            }
        }
        Commands::Check => {
            let report = engine.validate()?;
            println!("{} statements", report.statements);
            for v in &report.violations {
                println!("node {} has {} edges (limit {})", v.node, v.fanout, v.limit);
            }
            if !report.violations.is_empty() {
                anyhow::bail!("{} fan-out violations", report.violations.len());
            }
        }
    }

    Ok(())
}
