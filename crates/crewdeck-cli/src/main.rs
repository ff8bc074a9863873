//! The `crewdeck` binary: config loading and the gateway serve loop.

use clap::{Parser, Subcommand};
use crewdeck_bus::EventBus;
use crewdeck_core::Registry;
use crewdeck_gateway::{GatewayConfig, GatewayServer, NullLauncher};
use crewdeck_state::StateStore;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crewdeck", about = "Crewdeck — agent orchestration core")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "crewdeck.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the dashboard gateway server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the agent roster
    Roster,
}

#[derive(Deserialize, Default)]
struct CrewdeckConfig {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    stream: StreamConfig,
    #[serde(default)]
    sessions: SessionsConfig,
}

#[derive(Deserialize)]
struct ServerConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Deserialize)]
struct StreamConfig {
    #[serde(default = "default_replay_limit")]
    replay_limit: usize,
    #[serde(default = "default_keepalive_secs")]
    keepalive_secs: u64,
    #[serde(default = "default_queue_capacity")]
    queue_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            replay_limit: default_replay_limit(),
            keepalive_secs: default_keepalive_secs(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

#[derive(Deserialize)]
struct SessionsConfig {
    #[serde(default = "default_eviction_age_hours")]
    eviction_age_hours: i64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            eviction_age_hours: default_eviction_age_hours(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_replay_limit() -> usize {
    50
}
fn default_keepalive_secs() -> u64 {
    15
}
fn default_queue_capacity() -> usize {
    256
}
fn default_eviction_age_hours() -> i64 {
    24
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;

    match cli.command {
        Commands::Roster => {
            for agent in Registry::new().all() {
                println!(
                    "{} {:<12} {} — {} [{}]",
                    agent.emoji,
                    agent.id.to_string(),
                    agent.name,
                    agent.role,
                    agent.capabilities.join(", ")
                );
            }
        }
        Commands::Serve { host, port } => serve(config, host, port).await?,
    }

    Ok(())
}

async fn load_config(path: &Path) -> anyhow::Result<CrewdeckConfig> {
    if !path.exists() {
        info!(path = %path.display(), "No config file, using defaults");
        return Ok(CrewdeckConfig::default());
    }
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {e}", path.display()))?;
    toml::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("Failed to parse config file {}: {e}", path.display()))
}

async fn serve(
    config: CrewdeckConfig,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let bus = Arc::new(EventBus::new());
    let store = Arc::new(StateStore::new(Registry::new(), Arc::clone(&bus)));

    let gateway_config = GatewayConfig {
        replay_limit: config.stream.replay_limit,
        keepalive_interval: Duration::from_secs(config.stream.keepalive_secs),
        queue_capacity: config.stream.queue_capacity,
        eviction_age: chrono::Duration::hours(config.sessions.eviction_age_hours),
    };

    // Hourly maintenance sweep for aged sessions.
    let sweeper = Arc::clone(&store);
    let eviction_age = gateway_config.eviction_age;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = sweeper.evict_older_than(eviction_age).await;
            if removed > 0 {
                info!(removed, "Maintenance sweep removed aged sessions");
            }
        }
    });

    // The real worker-process spawner plugs in here; the core only talks
    // through the Launcher seam.
    let app = GatewayServer::build_with_config(store, bus, Arc::new(NullLauncher), gateway_config);

    let host = host.unwrap_or(config.server.host);
    let port = port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Crewdeck gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}
