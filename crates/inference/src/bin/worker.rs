use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use orion_bus::{BusConfig, EventBus};
use orion_contracts::ContractValidator;
use orion_core::NodeHealth;
use orion_inference::{InferenceWorker, OllamaBackend, RegistryConfig, WorkerHealthRegistry};

/// Runs one inference node: publishes periodic health to the registry and
/// serves turns against a local Ollama-compatible backend.
#[derive(Parser, Debug)]
#[command(name = "orion-worker", about = "ORION inference worker node")]
struct Cli {
    #[arg(long, default_value = "worker.toml")]
    config: String,
    #[arg(long)]
    node_id: String,
    #[arg(long)]
    bus_address: Option<String>,
    #[arg(long)]
    contracts_dir: Option<String>,
    #[arg(long)]
    stream_prefix: Option<String>,
    #[arg(long)]
    backend_url: Option<String>,
    #[arg(long)]
    heartbeat_interval_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    bus_address: Option<String>,
    #[serde(default)]
    contracts_dir: Option<String>,
    #[serde(default)]
    stream_prefix: Option<String>,
    #[serde(default)]
    backend_url: Option<String>,
    #[serde(default)]
    heartbeat_interval_seconds: Option<u64>,
}

struct WorkerConfig {
    node_id: String,
    bus_address: String,
    contracts_dir: String,
    stream_prefix: String,
    backend_url: String,
    heartbeat_interval: Duration,
}

#[derive(Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaTagEntry>,
}

#[derive(Deserialize)]
struct OllamaTagEntry {
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let file_config: FileConfig = if Path::new(&cli.config).exists() {
        toml::from_str(&std::fs::read_to_string(&cli.config)?)?
    } else {
        FileConfig::default()
    };

    let config = WorkerConfig {
        node_id: cli.node_id,
        bus_address: cli.bus_address.or(file_config.bus_address).unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
        contracts_dir: cli.contracts_dir.or(file_config.contracts_dir).unwrap_or_else(|| "contracts".to_string()),
        stream_prefix: cli.stream_prefix.or(file_config.stream_prefix).unwrap_or_else(|| "orion".to_string()),
        backend_url: cli.backend_url.or(file_config.backend_url).unwrap_or_else(|| "http://127.0.0.1:11434".to_string()),
        heartbeat_interval: Duration::from_secs(
            cli.heartbeat_interval_seconds.or(file_config.heartbeat_interval_seconds).unwrap_or(10),
        ),
    };

    let validator = Arc::new(ContractValidator::load_directory(Path::new(&config.contracts_dir))?);
    let bus_config = BusConfig { url: config.bus_address.clone(), stream_prefix: config.stream_prefix.clone(), ..BusConfig::default() };
    let bus = EventBus::connect(bus_config, validator).await?;

    let registry = Arc::new(WorkerHealthRegistry::connect(&config.bus_address, RegistryConfig::default()).await?);
    let backend = Arc::new(OllamaBackend::new(config.backend_url.clone()));
    let worker = InferenceWorker::new(config.node_id.clone(), bus, registry.clone(), backend);

    let cancel = CancellationToken::new();

    let heartbeat_task = {
        let registry = registry.clone();
        let node_id = config.node_id.clone();
        let backend_url = config.backend_url.clone();
        let interval = config.heartbeat_interval;
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let client = reqwest::Client::new();
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let health = probe(&client, &backend_url, &node_id).await;
                if let Err(e) = registry.publish(&health).await {
                    warn!(error = %e, "failed to publish node health");
                }
            }
        })
    };

    let run_result = tokio::select! {
        result = worker.run(cancel.clone()) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT, shutting down");
            cancel.cancel();
            Ok(())
        }
    };

    heartbeat_task.abort();
    if let Err(e) = run_result {
        warn!(error = %e, "worker run loop ended with an error");
    }
    Ok(())
}

/// Queries the local Ollama runtime's `/api/tags` for resident models and
/// system load. Treated as advisory: a failed probe still reports the node
/// as unavailable rather than stalling the heartbeat.
async fn probe(client: &reqwest::Client, backend_url: &str, node_id: &str) -> NodeHealth {
    let now = Utc::now();
    let models = match client.get(format!("{backend_url}/api/tags")).send().await {
        Ok(response) => match response.json::<OllamaTagsResponse>().await {
            Ok(tags) => tags.models.into_iter().map(|m| m.name).collect(),
            Err(_) => Vec::new(),
        },
        Err(_) => Vec::new(),
    };
    let available = !models.is_empty() || reachable(client, backend_url).await;

    NodeHealth {
        node_id: node_id.to_string(),
        cpu_percent: 0.0,
        ram_percent: 0.0,
        ram_used_mb: 0,
        ram_total_mb: 0,
        temp_celsius: 0.0,
        models,
        available,
        last_seen: now,
    }
}

async fn reachable(client: &reqwest::Client, backend_url: &str) -> bool {
    client.get(backend_url).send().await.is_ok()
}
