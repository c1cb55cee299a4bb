//! ec2-bootstrap - first-boot provisioning for EC2 instances
//!
//! Provides:
//! - A status page built from instance metadata
//! - A WordPress stack on Apache and PHP-FPM

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use ec2_bootstrap::config::{BootstrapConfig, ConfigLoader};
use ec2_bootstrap::metadata::imds::Imds;
use ec2_bootstrap::metadata::{FetchPolicy, fetch_metadata};
use ec2_bootstrap::{Component, run_component};

#[derive(Parser)]
#[command(name = "ec2-bootstrap")]
#[command(author, version, about = "First-boot provisioning for EC2 instances", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (skips the default locations and drop-ins)
    #[arg(short, long, env = "EC2_BOOTSTRAP_CONFIG")]
    config: Option<PathBuf>,

    /// Fail when the metadata service cannot be read
    #[arg(long)]
    strict_metadata: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the web server and publish the instance status page
    StatusPage,
    /// Install and configure WordPress on Apache and PHP-FPM
    Wordpress,
    /// Print instance metadata facts as JSON
    Metadata,
    /// Print the effective configuration as YAML
    ShowConfig,
}

fn init_logging(verbosity: u8) -> anyhow::Result<()> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // RUST_LOG directives take precedence over -v
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

async fn load_config(cli: &Cli) -> anyhow::Result<BootstrapConfig> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::from_file(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load().await.context("Failed to load configuration")?;

    if cli.strict_metadata {
        config.metadata.on_failure = FetchPolicy::Fail;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config = load_config(&cli).await?;

    match cli.command {
        Commands::StatusPage => {
            info!("Publishing instance status page");
            run_component(Component::StatusPage, &config)
                .await
                .context("Status page provisioning failed")?;
        }
        Commands::Wordpress => {
            info!("Provisioning WordPress");
            run_component(Component::WordPress, &config)
                .await
                .context("WordPress provisioning failed")?;
        }
        Commands::Metadata => {
            let imds = Imds::new(&config.metadata)?;
            let metadata = fetch_metadata(&imds, config.metadata.on_failure)
                .await
                .context("Failed to read instance metadata")?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
        Commands::ShowConfig => {
            let mut shown = config.clone();
            shown.wordpress.database.password = "<redacted>".to_string();
            print!("{}", serde_yaml::to_string(&shown)?);
        }
    }

    Ok(())
}
