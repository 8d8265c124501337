use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router as AxumRouter};
use chrono::Utc;
use clap::Parser;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use orion_bus::{BusConfig, EventBus};
use orion_contracts::ContractValidator;
use orion_core::InferenceRequest;
use orion_inference::{AvailabilityThresholds, RegistryConfig, Router, WorkerHealthRegistry};

/// Sticky-then-fallback dispatcher for inference turns.
#[derive(Parser, Debug)]
#[command(name = "orion-router", about = "ORION distributed inference router")]
struct Cli {
    #[arg(long, default_value = "router.toml")]
    config: String,
    #[arg(long)]
    bus_address: Option<String>,
    #[arg(long)]
    contracts_dir: Option<String>,
    #[arg(long)]
    stream_prefix: Option<String>,
    #[arg(long)]
    http_port: Option<u16>,
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
    http_port: Option<u16>,
}

struct AppState {
    registry: Arc<WorkerHealthRegistry>,
    router: Arc<Router>,
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

    let bus_address = cli.bus_address.or(file_config.bus_address).unwrap_or_else(|| "redis://127.0.0.1:6379".to_string());
    let contracts_dir = cli.contracts_dir.or(file_config.contracts_dir).unwrap_or_else(|| "contracts".to_string());
    let stream_prefix = cli.stream_prefix.or(file_config.stream_prefix).unwrap_or_else(|| "orion".to_string());
    let http_port = cli.http_port.or(file_config.http_port).unwrap_or(8090);

    let validator = Arc::new(ContractValidator::load_directory(Path::new(&contracts_dir))?);
    let bus_config = BusConfig { url: bus_address.clone(), stream_prefix, ..BusConfig::default() };
    let bus = EventBus::connect(bus_config.clone(), validator).await?;
    let registry = Arc::new(WorkerHealthRegistry::connect(&bus_address, RegistryConfig::default()).await?);
    let router = Arc::new(Router::new(AvailabilityThresholds::default()));

    let request_stream = bus_config.stream_for("inference_request");
    let cancel = CancellationToken::new();

    let dispatch_task = {
        let bus = bus.clone();
        let registry = registry.clone();
        let router = router.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let result = bus
                .subscribe(&request_stream, "inference-router", "router-0", "inference_request", None, cancel, move |value| {
                    let bus = bus.clone();
                    let registry = registry.clone();
                    let router = router.clone();
                    async move { dispatch(&bus, &registry, &router, value).await }
                })
                .await;
            if let Err(e) = result {
                error!(error = %e, "router dispatch loop ended with an error");
            }
        })
    };

    let app = AxumRouter::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/nodes", get(nodes))
        .with_state(Arc::new(AppState { registry, router }));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{http_port}")).await?;
    info!(port = http_port, "orion-router http surface listening");

    tokio::select! {
        result = axum::serve(listener, app) => { result?; }
        _ = tokio::signal::ctrl_c() => { info!("received SIGINT, shutting down"); }
    }

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(25), dispatch_task).await;
    Ok(())
}

async fn dispatch(
    bus: &EventBus,
    registry: &WorkerHealthRegistry,
    router: &Router,
    value: serde_json::Value,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let request: InferenceRequest = serde_json::from_value(value)?;
    let nodes = registry.fresh_nodes(Utc::now()).await?;

    let selection = match router.select(&nodes, &request.model) {
        Ok(selection) => selection,
        Err(e) => {
            warn!(request_id = %request.request_id, error = %e, "no node available for request, leaving unacked for redelivery");
            return Err(Box::from(e.to_string()));
        }
    };

    let per_node_stream = format!("inference:requests:{}", selection.node_id);
    let payload = serde_json::to_value(&request)?;
    bus.publish_to_stream(&per_node_stream, &payload, "inference_request").await?;
    info!(request_id = %request.request_id, node_id = %selection.node_id, kind = ?selection.kind, "routed inference request");
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "service": "orion-router" }))
}

async fn stats(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let counters = state.router.counters();
    Json(serde_json::json!({
        "total_routed": counters.total_routed,
        "sticky_hits": counters.sticky_hits,
        "fallbacks": counters.fallbacks,
        "errors": counters.errors,
    }))
}

async fn nodes(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    match state.registry.fresh_nodes(Utc::now()).await {
        Ok(nodes) => Json(serde_json::json!({ "nodes": nodes })),
        Err(e) => Json(serde_json::json!({ "error": e.to_string() })),
    }
}
