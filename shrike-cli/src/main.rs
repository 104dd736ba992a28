//! Shrike CLI - Command line interface for Shrike
//!
//! Evidence-grounded code review for pull requests and local changes.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shrike_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{ConfigArgs, ReviewArgs};

/// Shrike: evidence-grounded code review
#[derive(Parser, Debug)]
#[command(name = "shrike")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Generation model to use (overrides config and env)
    #[arg(long, global = true, env = "SHRIKE_MODEL")]
    model: Option<String>,

    /// Directory audit records are written into
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Review a pull request or a local revision range
    #[command(visible_alias = "r")]
    Review(ReviewArgs),

    /// Inspect or initialize configuration
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    // Load configuration with overrides
    let config = Config::load_with_overrides(cli.model.clone(), cli.data_dir.clone())?;

    if cli.verbose {
        tracing::info!(
            model = %config.llm.model,
            data_dir = %config.persist.data_dir.display(),
            "Configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("shrike {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Review(args)) => {
            args.execute(cli.verbose, &config).await?;
        }
        Some(Commands::Config(args)) => {
            args.execute(&config)?;
        }
        None => {
            println!("Shrike - evidence-grounded code review");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
