//! # DateKeeper — document expiry reminders
//!
//! Usage:
//!   datekeeper serve                     # API server + daily reminder scheduler
//!   datekeeper run-now                   # One reminder pass over every document
//!   datekeeper run-now --owner alice     # Only alice's documents
//!   datekeeper stats --owner alice       # Status breakdown for alice
//!   datekeeper init-config               # Write a default config file

use anyhow::Result;
use clap::{Parser, Subcommand};
use datekeeper_core::DateKeeperConfig;
use datekeeper_gateway::AppState;
use datekeeper_scheduler::{RunScope, Trigger};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "datekeeper",
    version,
    about = "📅 DateKeeper — document expiry tracking with email and SMS reminders"
)]
struct Cli {
    /// Config file (default: $DATEKEEPER_CONFIG or ~/.datekeeper/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API and the reminder scheduler
    Serve {
        /// Override gateway.host
        #[arg(long)]
        host: Option<String>,
        /// Override gateway.port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one reminder pass now and print the summary
    RunNow {
        /// Only this user's documents
        #[arg(long)]
        owner: Option<String>,
    },
    /// Print a user's document status breakdown
    Stats {
        #[arg(long)]
        owner: String,
    },
    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn config_path(cli: &Cli) -> PathBuf {
    match &cli.config {
        Some(p) => PathBuf::from(shellexpand::tilde(p).as_ref()),
        None => DateKeeperConfig::resolve_path(),
    }
}

fn load_config(path: &Path) -> Result<DateKeeperConfig> {
    if path.exists() {
        Ok(DateKeeperConfig::load_from(path)?)
    } else {
        tracing::warn!("⚠️ No config at {}, using defaults", path.display());
        Ok(DateKeeperConfig::default())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "datekeeper=debug,datekeeper_scheduler=debug,datekeeper_channels=debug,datekeeper_gateway=debug,tower_http=debug"
    } else {
        "datekeeper=info,datekeeper_scheduler=info,datekeeper_channels=info,datekeeper_gateway=info,datekeeper_core=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let path = config_path(&cli);

    match cli.command {
        Command::InitConfig { force } => {
            if path.exists() && !force {
                println!("⚠️  Config already exists at {} (use --force to overwrite)", path.display());
                return Ok(());
            }
            DateKeeperConfig::default().save_to(&path)?;
            println!("✅ Wrote default config to {}", path.display());
        }
        Command::Serve { host, port } => {
            let mut config = load_config(&path)?;
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            println!("📅 DateKeeper v{}", env!("CARGO_PKG_VERSION"));
            println!("   🌐 API:       http://{}:{}", config.gateway.host, config.gateway.port);
            println!("   ⏰ Schedule:  {}", config.scheduler.cron);
            println!("   🗄️  Database:  {}", config.database.path);
            println!();
            datekeeper_gateway::start(config).await?;
        }
        Command::RunNow { owner } => {
            let state = AppState::from_config(load_config(&path)?)?;
            let scope = match owner {
                Some(id) => RunScope::Owner(id),
                None => RunScope::All,
            };
            // Runs to completion: a CLI pass has no request to answer early.
            let summary = state.engine.runner().run(scope, Trigger::Manual).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Stats { owner } => {
            let state = AppState::from_config(load_config(&path)?)?;
            let stats = state.engine.runner().stats(&owner)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}
