use std::path::Path;

use clap::Parser;
use orion_core::AutonomyLevel;
use serde::Deserialize;

use crate::error::ServerError;

/// Process composition and pipeline flags.
#[derive(Parser, Debug)]
#[command(name = "orion-server", about = "ORION control-plane pipeline")]
pub struct Cli {
    /// Path to the TOML configuration file. Loaded if present, otherwise
    /// every setting falls back to its CLI flag or built-in default.
    #[arg(long, default_value = "server.toml")]
    pub config: String,

    #[arg(long)]
    pub bus_address: Option<String>,
    #[arg(long)]
    pub stream_prefix: Option<String>,
    #[arg(long)]
    pub contracts_dir: Option<String>,
    #[arg(long)]
    pub policy_dir: Option<String>,
    #[arg(long)]
    pub action_map_file: Option<String>,
    #[arg(long)]
    pub action_commands_file: Option<String>,
    #[arg(long)]
    pub admins_file: Option<String>,
    #[arg(long)]
    pub data_root: Option<String>,
    /// One of N0, N2, N3.
    #[arg(long)]
    pub autonomy_level: Option<String>,
    #[arg(long)]
    pub http_port: Option<u16>,
    #[arg(long)]
    pub sweep_interval_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    bus_address: Option<String>,
    #[serde(default)]
    stream_prefix: Option<String>,
    #[serde(default)]
    contracts_dir: Option<String>,
    #[serde(default)]
    policy_dir: Option<String>,
    #[serde(default)]
    action_map_file: Option<String>,
    #[serde(default)]
    action_commands_file: Option<String>,
    #[serde(default)]
    admins_file: Option<String>,
    #[serde(default)]
    data_root: Option<String>,
    #[serde(default)]
    autonomy_level: Option<String>,
    #[serde(default)]
    http_port: Option<u16>,
    #[serde(default)]
    sweep_interval_seconds: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct AdminKeyEntry {
    approver_id: String,
    public_key_hex: String,
}

#[derive(Debug, Default, Deserialize)]
struct AdminsFile {
    #[serde(default)]
    admins: Vec<AdminKeyEntry>,
}

/// Fully resolved server configuration: CLI flag, then config file, then
/// built-in default, in that order of precedence.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bus_address: String,
    pub stream_prefix: String,
    pub contracts_dir: String,
    pub policy_dir: String,
    pub action_map_file: String,
    pub action_commands_file: String,
    pub admins_file: Option<String>,
    pub data_root: String,
    pub autonomy_level: AutonomyLevel,
    pub http_port: u16,
    pub sweep_interval_seconds: u64,
}

impl ServerConfig {
    pub fn load(cli: Cli) -> Result<Self, ServerError> {
        let file_config: FileConfig = if Path::new(&cli.config).exists() {
            toml::from_str(&std::fs::read_to_string(&cli.config)?)?
        } else {
            FileConfig::default()
        };

        Ok(Self {
            bus_address: cli.bus_address.or(file_config.bus_address).unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            stream_prefix: cli.stream_prefix.or(file_config.stream_prefix).unwrap_or_else(|| "orion".to_string()),
            contracts_dir: cli.contracts_dir.or(file_config.contracts_dir).unwrap_or_else(|| "contracts".to_string()),
            policy_dir: cli.policy_dir.or(file_config.policy_dir).unwrap_or_else(|| "config/policy".to_string()),
            action_map_file: cli
                .action_map_file
                .or(file_config.action_map_file)
                .unwrap_or_else(|| "config/incident_actions.yaml".to_string()),
            action_commands_file: cli
                .action_commands_file
                .or(file_config.action_commands_file)
                .unwrap_or_else(|| "config/action_commands.yaml".to_string()),
            admins_file: cli.admins_file.or(file_config.admins_file),
            data_root: cli.data_root.or(file_config.data_root).unwrap_or_else(|| "data".to_string()),
            autonomy_level: match cli.autonomy_level.or(file_config.autonomy_level) {
                Some(raw) => parse_autonomy_level(&raw)?,
                None => AutonomyLevel::N0,
            },
            http_port: cli.http_port.or(file_config.http_port).unwrap_or(8080),
            sweep_interval_seconds: cli.sweep_interval_seconds.or(file_config.sweep_interval_seconds).unwrap_or(5),
        })
    }
}

fn parse_autonomy_level(raw: &str) -> Result<AutonomyLevel, ServerError> {
    match raw.to_uppercase().as_str() {
        "N0" => Ok(AutonomyLevel::N0),
        "N2" => Ok(AutonomyLevel::N2),
        "N3" => Ok(AutonomyLevel::N3),
        other => Err(ServerError::InvalidAutonomyLevel(other.to_string())),
    }
}

/// Loads admin ed25519 public keys from the (optional) admins file. A
/// missing path yields an empty registry: N3 deployments that never expect
/// an approval to resolve would otherwise have no way to start without one.
pub fn load_admin_registry(path: Option<&str>) -> Result<orion_crypto::AdminRegistry, ServerError> {
    let mut registry = orion_crypto::AdminRegistry::new();
    let Some(path) = path else { return Ok(registry) };
    if !Path::new(path).exists() {
        return Ok(registry);
    }
    let contents = std::fs::read_to_string(path)?;
    let admins_file: AdminsFile = serde_yaml_ng::from_str(&contents)?;
    for admin in admins_file.admins {
        registry.register_hex(admin.approver_id, &admin.public_key_hex)?;
    }
    Ok(registry)
}

/// The host command behind one `action_type`, loaded from
/// `action_commands.yaml`: the executor's real `ActionHandler` provider for
/// actions whose side effect is a host command.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub rollback_program: Option<String>,
    #[serde(default)]
    pub rollback_args: Vec<String>,
}

/// Loads the `action_type -> host command` map used to build
/// [`orion_executor::ShellCommandHandler`]s. An action with no entry here
/// simply gets no handler registered, which the executor reports as
/// `UnknownActionType` rather than silently no-opping.
pub fn load_action_commands(path: &str) -> Result<std::collections::HashMap<String, CommandSpec>, ServerError> {
    if !Path::new(path).exists() {
        return Ok(std::collections::HashMap::new());
    }
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_yaml_ng::from_str(&contents)?)
}
