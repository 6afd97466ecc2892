//! CLI entry point for the network organizer.

use std::sync::Arc;

use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::{fmt, EnvFilter};

use organizer_core::config::{load_organizer_config, load_section};
use organizer_graph::{GraphClient, GraphConfig, GraphExecutor, MemoryGraph};

use organizer_browse::{Command, Session, ViewContext};

#[derive(Parser)]
#[command(name = "organizer")]
#[command(about = "Browse and edit a people/organization graph stored in Neo4j")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Use an empty in-process graph instead of Neo4j.
    #[arg(long)]
    memory: bool,

    /// Config file prefix (default: organizer).
    #[arg(short, long, default_value = "organizer")]
    config: String,

    /// Emit logs as JSON.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries command output.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let organizer_config = load_organizer_config(&cli.config)?;

    let executor: Arc<dyn GraphExecutor> = if cli.memory {
        tracing::info!("Using in-process graph");
        Arc::new(MemoryGraph::unlogged())
    } else {
        let graph_config: GraphConfig = load_section(&cli.config, "neo4j")?;
        Arc::new(GraphClient::connect(&graph_config).await?)
    };

    let ctx = ViewContext::from_config(executor, &organizer_config)?;
    let session = Session::new(ctx);

    match cli.command {
        Command::Shell => {
            let stdin = BufReader::new(tokio::io::stdin());
            session.run_shell(stdin, tokio::io::stdout()).await?;
        }
        command => match session.execute(&command).await {
            Ok(text) => print!("{text}"),
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
