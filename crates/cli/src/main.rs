//! Operator-facing inspection and admin-approval tool. Reads the audit
//! chain and policy store without ever standing up a pipeline of its own,
//! and signs approval decisions for publish onto the bus.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ed25519_dalek::{Signer, SigningKey};
use orion_bus::{BusConfig, EventBus};
use orion_contracts::ContractValidator;
use orion_core::ApprovalDecision;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "orion-cli", about = "ORION operator inspection and approval tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect the append-only audit store.
    Audit {
        #[command(subcommand)]
        command: AuditCommand,
    },
    /// Inspect the SAFE/RISKY policy store.
    Policy {
        /// Directory holding `safe_actions.yaml`, `risky_actions.yaml`,
        /// `approval_policy.yaml`.
        #[arg(long, default_value = "config/policy")]
        policy_dir: String,
    },
    /// Sign and publish an approval decision for a pending request.
    Approve {
        #[arg(long, default_value = "redis://127.0.0.1:6379")]
        bus_address: String,
        #[arg(long, default_value = "orion")]
        stream_prefix: String,
        #[arg(long, default_value = "contracts")]
        contracts_dir: String,
        /// `request_id` from the `approval_request` being answered.
        #[arg(long)]
        request_id: Uuid,
        /// Approver identity, must match a key the running server trusts.
        #[arg(long)]
        approver_id: String,
        /// Hex-encoded ed25519 signing key seed (32 bytes) for `approver_id`.
        #[arg(long)]
        signing_key_hex: String,
        #[arg(long, action = clap::ArgAction::Set)]
        approved: bool,
        #[arg(long, default_value = "reviewed via orion-cli")]
        reason: String,
    },
}

#[derive(Subcommand, Debug)]
enum AuditCommand {
    /// Walk a stream's hash chain end to end and confirm it is intact.
    Verify {
        #[arg(long, default_value = "data")]
        data_root: String,
        /// Stream name, e.g. `events`, `incidents`, `decisions`.
        stream: String,
    },
    /// Print the last `limit` records recorded for a stream.
    Tail {
        #[arg(long, default_value = "data")]
        data_root: String,
        stream: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Audit { command } => run_audit(command).await,
        Command::Policy { policy_dir } => run_policy(&policy_dir),
        Command::Approve { bus_address, stream_prefix, contracts_dir, request_id, approver_id, signing_key_hex, approved, reason } => {
            run_approve(&bus_address, &stream_prefix, &contracts_dir, request_id, &approver_id, &signing_key_hex, approved, &reason).await
        }
    }
}

async fn run_audit(command: AuditCommand) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        AuditCommand::Verify { data_root, stream } => {
            let store = orion_audit::AuditStore::new(PathBuf::from(data_root));
            store.verify_chain(&stream).await?;
            println!("chain intact: {stream}");
        }
        AuditCommand::Tail { data_root, stream, limit } => {
            let path = Path::new(&data_root).join("memory").join(format!("{stream}.jsonl"));
            let lines = orion_audit::read_lines(&path).await?;
            for line in lines.iter().rev().take(limit).rev() {
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn run_policy(policy_dir: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = orion_policy::PolicyStore::load_directory(Path::new(policy_dir))?;

    println!("SAFE actions:");
    for action_type in store.known_safe_actions() {
        println!("  {action_type} (cooldown {}s)", store.cooldown_seconds(action_type));
    }

    println!("RISKY actions:");
    for action_type in store.known_risky_actions() {
        let policy = store.approval_policy(action_type);
        match policy {
            Some(p) => println!(
                "  {action_type} (cooldown {}s, approval timeout {}s, {} approver(s), override_allowed={})",
                store.cooldown_seconds(action_type),
                p.timeout_seconds,
                p.required_approvers,
                p.override_allowed
            ),
            None => println!("  {action_type} (no approval policy on file, this would fail to load in the pipeline)"),
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_approve(
    bus_address: &str,
    stream_prefix: &str,
    contracts_dir: &str,
    request_id: Uuid,
    approver_id: &str,
    signing_key_hex: &str,
    approved: bool,
    reason: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let seed_bytes = hex::decode(signing_key_hex)?;
    let seed: [u8; 32] = seed_bytes.as_slice().try_into().map_err(|_| "signing key must be 32 bytes hex-encoded")?;
    let signing_key = SigningKey::from_bytes(&seed);

    let decision = ApprovalDecision::new("orion-admin-cli", request_id, approver_id, approved, reason);
    let signature = signing_key.sign(&decision.signing_payload());
    let decision = decision.with_signature(hex::encode(signature.to_bytes()));

    let validator = Arc::new(ContractValidator::load_directory(Path::new(contracts_dir))?);
    let bus_config = BusConfig { url: bus_address.to_string(), stream_prefix: stream_prefix.to_string(), ..BusConfig::default() };
    let bus = EventBus::connect(bus_config, validator).await?;

    let payload = serde_json::to_value(&decision)?;
    bus.publish(&payload, "approval_decision").await?;
    println!("published approval_decision for request {request_id} (approved={approved})");
    Ok(())
}
