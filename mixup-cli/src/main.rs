use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod input;
mod settings;

use settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "mixup")]
#[command(about = "Mixup CLI - group-aware re-ranking of search hits")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "mixup.toml", env = "MIXUP_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Re-rank one hit list (JSON or YAML)
    Rerank {
        /// Hit list file
        #[arg(long)]
        hits: PathBuf,

        /// Request file with the grouping_mixup section
        #[arg(short, long)]
        request: PathBuf,

        /// Page offset, overrides the request file
        #[arg(long)]
        from: Option<usize>,

        /// Page size, overrides the request file
        #[arg(long)]
        size: Option<usize>,

        /// Write the response here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Treat each hit list file as a partition, merge and re-rank
    Federate {
        /// Partition hit list file (repeatable)
        #[arg(short, long = "partition", required = true)]
        partitions: Vec<PathBuf>,

        /// Request file with the grouping_mixup section
        #[arg(short, long)]
        request: PathBuf,

        /// Page offset, overrides the request file
        #[arg(long)]
        from: Option<usize>,

        /// Page size, overrides the request file
        #[arg(long)]
        size: Option<usize>,

        /// Write the response here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(settings: &Settings) {
    let filter = tracing_subscriber::EnvFilter::new(settings.mixup.log_level());
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays valid JSON
    if settings.mixup.log_format() == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(&cli.config)?;
    init_tracing(&settings);
    tracing::debug!("Config file: {}", cli.config.display());

    match cli.command {
        Commands::Rerank {
            hits,
            request,
            from,
            size,
            output,
        } => {
            commands::rerank::run_rerank(
                &settings,
                &hits,
                &request,
                from,
                size,
                output.as_deref(),
            )?;
        }
        Commands::Federate {
            partitions,
            request,
            from,
            size,
            output,
        } => {
            commands::federate::run_federate(
                &settings,
                &partitions,
                &request,
                from,
                size,
                output.as_deref(),
            )
            .await?;
        }
    }

    Ok(())
}
