use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use clap::Parser;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use orion_bus::{BusConfig, EventBus};
use orion_contracts::ContractValidator;
use orion_core::{ConnectionStatus, EdgeCommand, EdgeHealth, EdgeSafetyStatus, EdgeState};
use orion_edge::{DeadMansSwitch, SafeStateManager, apply_resume, filter_command, health_topic};

/// Standalone edge actuator agent: watchdog and safe-state kernel for one
/// device, reading commands off the central bus and publishing telemetry
/// and health over MQTT.
#[derive(Parser, Debug)]
#[command(name = "orion-edge-agent", about = "ORION edge safety kernel agent")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "edge_agent.toml")]
    config: String,

    /// This device's identifier. Mandatory; no default.
    #[arg(long)]
    device_id: String,

    /// Central bus (Redis) connection URL.
    #[arg(long)]
    bus_address: Option<String>,

    /// Directory of compiled JSON Schema contract documents.
    #[arg(long)]
    contracts_dir: Option<String>,

    /// Prefix for bus stream names.
    #[arg(long)]
    stream_prefix: Option<String>,

    /// MQTT broker host.
    #[arg(long)]
    mqtt_host: Option<String>,

    /// MQTT broker port.
    #[arg(long)]
    mqtt_port: Option<u16>,

    /// Watchdog timeout in milliseconds.
    #[arg(long)]
    watchdog_timeout_ms: Option<u64>,

    /// Health heartbeat interval in seconds.
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
    mqtt_host: Option<String>,
    #[serde(default)]
    mqtt_port: Option<u16>,
    #[serde(default)]
    watchdog_timeout_ms: Option<u64>,
    #[serde(default)]
    heartbeat_interval_seconds: Option<u64>,
}

struct AgentConfig {
    device_id: String,
    bus_address: String,
    contracts_dir: String,
    stream_prefix: String,
    mqtt_host: String,
    mqtt_port: u16,
    watchdog_timeout: Duration,
    heartbeat_interval: Duration,
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

    let config = AgentConfig {
        device_id: cli.device_id,
        bus_address: cli.bus_address.or(file_config.bus_address).unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
        contracts_dir: cli.contracts_dir.or(file_config.contracts_dir).unwrap_or_else(|| "contracts".to_string()),
        stream_prefix: cli.stream_prefix.or(file_config.stream_prefix).unwrap_or_else(|| "orion".to_string()),
        mqtt_host: cli.mqtt_host.or(file_config.mqtt_host).unwrap_or_else(|| "127.0.0.1".to_string()),
        mqtt_port: cli.mqtt_port.or(file_config.mqtt_port).unwrap_or(1883),
        watchdog_timeout: Duration::from_millis(cli.watchdog_timeout_ms.or(file_config.watchdog_timeout_ms).unwrap_or(2_000)),
        heartbeat_interval: Duration::from_secs(cli.heartbeat_interval_seconds.or(file_config.heartbeat_interval_seconds).unwrap_or(5)),
    };

    let safe_state = Arc::new(SafeStateManager::new(
        {
            let device_id = config.device_id.clone();
            move || warn!(device_id = %device_id, "entered safe mode")
        },
        {
            let device_id = config.device_id.clone();
            move || info!(device_id = %device_id, "exited safe mode")
        },
    ));

    let watchdog_remaining = Arc::new(AtomicU64::new(config.watchdog_timeout.as_millis() as u64));

    let watchdog = {
        let safe_state = safe_state.clone();
        DeadMansSwitch::new(config.watchdog_timeout, move || safe_state.enter_safe_mode())
    };

    let cancel = CancellationToken::new();
    let _watchdog_task = watchdog.spawn(cancel.clone());

    let validator = Arc::new(ContractValidator::load_directory(Path::new(&config.contracts_dir))?);
    let bus_config = BusConfig { url: config.bus_address.clone(), stream_prefix: config.stream_prefix.clone(), ..BusConfig::default() };
    let bus = EventBus::connect(bus_config.clone(), validator).await?;
    let command_stream = bus_config.sub_stream("edge:commands", &config.device_id);

    let mut mqtt_options = MqttOptions::new(format!("orion-edge-{}", config.device_id), config.mqtt_host.clone(), config.mqtt_port);
    mqtt_options.set_keep_alive(Duration::from_secs(10));
    let (mqtt_client, mut mqtt_event_loop) = AsyncClient::new(mqtt_options, 16);
    tokio::spawn(async move {
        loop {
            if mqtt_event_loop.poll().await.is_err() {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    });

    let command_task = {
        let safe_state = safe_state.clone();
        let watchdog = watchdog.clone();
        let bus = bus.clone();
        let cancel = cancel.clone();
        let device_id = config.device_id.clone();
        tokio::spawn(async move {
            let result = bus
                .subscribe(&command_stream, "edge-agent", &device_id, "edge_command", None, cancel, move |value| {
                    let safe_state = safe_state.clone();
                    let watchdog = watchdog.clone();
                    async move {
                        let command: EdgeCommand = serde_json::from_value(value)
                            .map_err(|e| Box::<dyn std::error::Error + Send + Sync>::from(e.to_string()))?;
                        handle_command(&safe_state, &watchdog, &command);
                        Ok(())
                    }
                })
                .await;
            if let Err(e) = result {
                error!(error = %e, "command subscription loop ended with an error");
            }
        })
    };

    let heartbeat_task = {
        let mqtt_client = mqtt_client.clone();
        let safe_state = safe_state.clone();
        let watchdog_remaining = watchdog_remaining.clone();
        let device_id = config.device_id.clone();
        let interval = config.heartbeat_interval;
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let state = if safe_state.is_in_safe_mode() { EdgeState::SafeMode } else { EdgeState::Running };
                let health = EdgeHealth::new(
                    format!("orion-edge-{device_id}"),
                    device_id.clone(),
                    state,
                    ConnectionStatus::Connected,
                    EdgeSafetyStatus {
                        dead_man_switch_active: true,
                        watchdog_remaining_ms: watchdog_remaining.load(Ordering::Relaxed),
                        in_safe_position: safe_state.is_in_safe_mode(),
                    },
                );
                let Ok(payload) = serde_json::to_vec(&health) else { continue };
                if let Err(e) = mqtt_client.publish(health_topic(&device_id), QoS::AtLeastOnce, false, payload).await {
                    error!(error = %e, "failed to publish health heartbeat");
                }
            }
        })
    };

    info!(device_id = %config.device_id, "orion-edge-agent started");
    tokio::signal::ctrl_c().await?;
    info!("received SIGINT, shutting down");

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(25), command_task).await;
    heartbeat_task.abort();
    Ok(())
}

fn handle_command(safe_state: &Arc<SafeStateManager>, watchdog: &Arc<DeadMansSwitch>, command: &EdgeCommand) {
    if let Err(e) = filter_command(safe_state, command) {
        warn!(command_id = %command.command_id, error = %e, "command rejected");
        return;
    }

    if command.command_type == orion_core::CommandType::Resume {
        apply_resume(safe_state, watchdog);
        return;
    }

    watchdog.reset();
    info!(command_id = %command.command_id, command_type = ?command.command_type, "command accepted");
}
