mod config;
mod error;
mod handlers;
mod health;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use orion_approval::{ApprovalCoordinator, ResolveOutcome};
use orion_audit::AuditStore;
use orion_bus::{BusConfig, EventBus};
use orion_contracts::ContractValidator;
use orion_core::{ApprovalDecision, Decision, DecisionType, Event, Incident};
use orion_correlator::{Correlator, CorrelatorConfig};
use orion_crypto::AdminRegistry;
use orion_decider::{Decider, DeciderConfig, IncidentActionMap};
use orion_executor::{ApprovalCheck, DeadLetterQueue, Executor};
use orion_policy::PolicyStore;
use orion_ratelimit::{CircuitBreakerConfig, CircuitBreakerRegistry, CooldownTracker};

use crate::config::{Cli, ServerConfig, load_action_commands, load_admin_registry};
use crate::health::PipelineMetrics;

/// Wires correlator, decider, approval coordinator and executor together
/// over the event bus, then serves `/health` and `/stats` until signalled
/// to stop.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::load(cli)?;

    let validator = Arc::new(ContractValidator::load_directory(Path::new(&config.contracts_dir))?);
    let bus_config = BusConfig { url: config.bus_address.clone(), stream_prefix: config.stream_prefix.clone(), ..BusConfig::default() };
    let bus = EventBus::connect(bus_config.clone(), validator).await?;

    let policy = Arc::new(PolicyStore::load_directory(Path::new(&config.policy_dir))?);
    let action_map = Arc::new(IncidentActionMap::load_file(Path::new(&config.action_map_file))?);
    let admins: Arc<AdminRegistry> = Arc::new(load_admin_registry(config.admins_file.as_deref())?);
    let audit = Arc::new(AuditStore::new(&config.data_root));
    let cooldown = Arc::new(CooldownTracker::new());
    let breaker = Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig::default()));
    let approval = Arc::new(ApprovalCoordinator::new(admins, audit.clone()));
    let decider = Arc::new(Decider::new(
        "orion-decider",
        config.autonomy_level,
        policy.clone(),
        cooldown,
        breaker,
        action_map,
        None,
        DeciderConfig::default(),
    ));

    let commands = load_action_commands(&config.action_commands_file)?;
    let mut executor = Executor::new("orion-executor", policy, Arc::new(DeadLetterQueue::new()));
    handlers::register_shell_handlers(&mut executor, &commands);
    let executor = Arc::new(executor);

    let metrics = Arc::new(PipelineMetrics::default());
    let correlator = Arc::new(tokio::sync::Mutex::new(Correlator::new(CorrelatorConfig::default())));
    let pending_decisions: Arc<DashMap<Uuid, Decision>> = Arc::new(DashMap::new());
    let cancel = CancellationToken::new();

    let mut tasks = Vec::new();

    tasks.push(spawn_correlator_ingest(&bus, &bus_config, &audit, &correlator, &metrics, &cancel));
    tasks.push(spawn_correlator_sweep(&bus, &audit, &correlator, &metrics, &cancel, config.sweep_interval_seconds));
    tasks.push(spawn_decider(&bus, &bus_config, &audit, &decider, &approval, &metrics, &pending_decisions, &cancel));
    tasks.push(spawn_executor(&bus, &bus_config, &audit, &executor, &metrics, &cancel));
    tasks.push(spawn_approval_resolution(&bus, &bus_config, &audit, &approval, &executor, &metrics, &pending_decisions, &cancel));
    tasks.push(spawn_approval_sweep(&approval, &metrics, &executor, &cancel));

    let app = health::router(metrics.clone());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port)).await?;
    info!(port = config.http_port, autonomy_level = ?config.autonomy_level, "orion-server listening");

    tokio::select! {
        result = axum::serve(listener, app) => { result?; }
        _ = tokio::signal::ctrl_c() => { info!("received SIGINT, shutting down"); }
    }

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(25), futures::future::join_all(tasks)).await;
    Ok(())
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

async fn publish_and_audit<T: serde::Serialize>(
    bus: &EventBus,
    audit: &AuditStore,
    message_type: &str,
    message: &T,
) -> Result<(), BoxError> {
    let value = serde_json::to_value(message)?;
    bus.publish(&value, message_type).await?;
    audit.record(&format!("{message_type}s"), value).await?;
    Ok(())
}

fn spawn_correlator_ingest(
    bus: &EventBus,
    bus_config: &BusConfig,
    audit: &Arc<AuditStore>,
    correlator: &Arc<tokio::sync::Mutex<Correlator>>,
    metrics: &Arc<PipelineMetrics>,
    cancel: &CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let bus = bus.clone();
    let audit = audit.clone();
    let correlator = correlator.clone();
    let metrics = metrics.clone();
    let cancel = cancel.clone();
    let stream = bus_config.stream_for("event");
    tokio::spawn(async move {
        let result = bus
            .subscribe(&stream, "correlator-group", "correlator-0", "event", Some(audit.clone()), cancel, move |value| {
                let audit = audit.clone();
                let correlator = correlator.clone();
                let metrics = metrics.clone();
                async move { ingest_event(&audit, &correlator, &metrics, value).await }
            })
            .await;
        if let Err(e) = result {
            error!(error = %e, "correlator ingest loop ended with an error");
        }
    })
}

async fn ingest_event(
    audit: &AuditStore,
    correlator: &tokio::sync::Mutex<Correlator>,
    metrics: &PipelineMetrics,
    value: serde_json::Value,
) -> Result<(), BoxError> {
    let event: Event = serde_json::from_value(value.clone())?;
    audit.record("events", value).await?;
    correlator.lock().await.ingest(Utc::now(), &event);
    metrics.events_ingested.fetch_add(1, Ordering::Relaxed);
    Ok(())
}

fn spawn_correlator_sweep(
    bus: &EventBus,
    audit: &Arc<AuditStore>,
    correlator: &Arc<tokio::sync::Mutex<Correlator>>,
    metrics: &Arc<PipelineMetrics>,
    cancel: &CancellationToken,
    interval_seconds: u64,
) -> tokio::task::JoinHandle<()> {
    let bus = bus.clone();
    let audit = audit.clone();
    let correlator = correlator.clone();
    let metrics = metrics.clone();
    let cancel = cancel.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let closed = correlator.lock().await.sweep(Utc::now(), "orion-correlator");
                    for incident in closed {
                        if let Err(e) = publish_and_audit(&bus, &audit, "incident", &incident).await {
                            error!(error = %e, "failed to publish closed incident");
                            continue;
                        }
                        metrics.incidents_opened.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }
    })
}

#[allow(clippy::too_many_arguments)]
fn spawn_decider(
    bus: &EventBus,
    bus_config: &BusConfig,
    audit: &Arc<AuditStore>,
    decider: &Arc<Decider>,
    approval: &Arc<ApprovalCoordinator>,
    metrics: &Arc<PipelineMetrics>,
    pending_decisions: &Arc<DashMap<Uuid, Decision>>,
    cancel: &CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let bus = bus.clone();
    let audit = audit.clone();
    let decider = decider.clone();
    let approval = approval.clone();
    let metrics = metrics.clone();
    let pending_decisions = pending_decisions.clone();
    let cancel = cancel.clone();
    let stream = bus_config.stream_for("incident");
    tokio::spawn(async move {
        let result = bus
            .subscribe(&stream, "decider-group", "decider-0", "incident", Some(audit.clone()), cancel, move |value| {
                let bus = bus.clone();
                let audit = audit.clone();
                let decider = decider.clone();
                let approval = approval.clone();
                let metrics = metrics.clone();
                let pending_decisions = pending_decisions.clone();
                async move { handle_incident(&bus, &audit, &decider, &approval, &metrics, &pending_decisions, value).await }
            })
            .await;
        if let Err(e) = result {
            error!(error = %e, "decider loop ended with an error");
        }
    })
}

async fn handle_incident(
    bus: &EventBus,
    audit: &AuditStore,
    decider: &Decider,
    approval: &ApprovalCoordinator,
    metrics: &PipelineMetrics,
    pending_decisions: &DashMap<Uuid, Decision>,
    value: serde_json::Value,
) -> Result<(), BoxError> {
    let incident: Incident = serde_json::from_value(value)?;
    let now = Utc::now();
    let decision = decider.decide(&incident, now);
    let decision = decider.apply_validation_overlay(&incident, decision).await;

    publish_and_audit(bus, audit, "decision", &decision).await?;
    metrics.decisions_emitted.fetch_add(1, Ordering::Relaxed);

    if decision.decision_type == DecisionType::RequestApproval {
        let request = decider.build_approval_request(&decision);
        publish_and_audit(bus, audit, "approval_request", &request).await?;
        pending_decisions.insert(decision.decision_id, decision.clone());
        approval.submit(request);
        metrics.approvals_pending.fetch_add(1, Ordering::Relaxed);
    }
    Ok(())
}

fn spawn_executor(
    bus: &EventBus,
    bus_config: &BusConfig,
    audit: &Arc<AuditStore>,
    executor: &Arc<Executor>,
    metrics: &Arc<PipelineMetrics>,
    cancel: &CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let bus = bus.clone();
    let audit = audit.clone();
    let executor = executor.clone();
    let metrics = metrics.clone();
    let cancel = cancel.clone();
    let stream = bus_config.stream_for("decision");
    tokio::spawn(async move {
        let result = bus
            .subscribe(&stream, "executor-group", "executor-0", "decision", Some(audit.clone()), cancel, move |value| {
                let bus = bus.clone();
                let audit = audit.clone();
                let executor = executor.clone();
                let metrics = metrics.clone();
                async move { handle_decision(&bus, &audit, &executor, &metrics, value).await }
            })
            .await;
        if let Err(e) = result {
            error!(error = %e, "executor decision loop ended with an error");
        }
    })
}

async fn handle_decision(
    bus: &EventBus,
    audit: &AuditStore,
    executor: &Executor,
    metrics: &PipelineMetrics,
    value: serde_json::Value,
) -> Result<(), BoxError> {
    let decision: Decision = serde_json::from_value(value)?;
    if decision.decision_type != DecisionType::ExecuteSafeAction {
        return Ok(());
    }
    let now = Utc::now();
    let parameters = serde_json::json!({ "incident_id": decision.incident_id });
    let outcome = executor.execute_safe_action(&decision, parameters, now).await;
    publish_and_audit(bus, audit, "outcome", &outcome).await?;
    metrics.actions_executed.fetch_add(1, Ordering::Relaxed);
    metrics.dlq_depth.store(executor.dlq_len() as u64, Ordering::Relaxed);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn spawn_approval_resolution(
    bus: &EventBus,
    bus_config: &BusConfig,
    audit: &Arc<AuditStore>,
    approval: &Arc<ApprovalCoordinator>,
    executor: &Arc<Executor>,
    metrics: &Arc<PipelineMetrics>,
    pending_decisions: &Arc<DashMap<Uuid, Decision>>,
    cancel: &CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let bus = bus.clone();
    let audit = audit.clone();
    let approval = approval.clone();
    let executor = executor.clone();
    let metrics = metrics.clone();
    let pending_decisions = pending_decisions.clone();
    let cancel = cancel.clone();
    let stream = bus_config.stream_for("approval_decision");
    tokio::spawn(async move {
        let result = bus
            .subscribe(&stream, "approval-group", "approval-0", "approval_decision", Some(audit.clone()), cancel, move |value| {
                let bus = bus.clone();
                let audit = audit.clone();
                let approval = approval.clone();
                let executor = executor.clone();
                let metrics = metrics.clone();
                let pending_decisions = pending_decisions.clone();
                async move { handle_approval_decision(&bus, &audit, &approval, &executor, &metrics, &pending_decisions, value).await }
            })
            .await;
        if let Err(e) = result {
            error!(error = %e, "approval decision loop ended with an error");
        }
    })
}

#[allow(clippy::too_many_arguments)]
async fn handle_approval_decision(
    bus: &EventBus,
    audit: &AuditStore,
    approval: &ApprovalCoordinator,
    executor: &Executor,
    metrics: &PipelineMetrics,
    pending_decisions: &DashMap<Uuid, Decision>,
    value: serde_json::Value,
) -> Result<(), BoxError> {
    let decision: ApprovalDecision = serde_json::from_value(value)?;
    let now = Utc::now();
    let request_id = decision.request_id;
    let decision_id = approval.decision_id_for(request_id);
    let expires_at = approval.expires_at(request_id);

    let outcome = approval.resolve(&decision, now).await?;

    if outcome == ResolveOutcome::Approved {
        let (Some(decision_id), Some(expires_at)) = (decision_id, expires_at) else {
            warn!(%request_id, "approved decision carried no recoverable decision_id, nothing to execute");
            return Ok(());
        };
        let Some((_, original)) = pending_decisions.remove(&decision_id) else {
            warn!(%decision_id, "approved decision had no matching pending decision, nothing to execute");
            return Ok(());
        };

        let check = ApprovalCheck { decision_id, approved: true, expires_at };
        let parameters = serde_json::json!({ "incident_id": original.incident_id });
        let outcome = executor.execute_approved_action(&original, &check, parameters, now).await;
        publish_and_audit(bus, audit, "outcome", &outcome).await?;
        metrics.actions_executed.fetch_add(1, Ordering::Relaxed);
        metrics.dlq_depth.store(executor.dlq_len() as u64, Ordering::Relaxed);
    }
    Ok(())
}

fn spawn_approval_sweep(
    approval: &Arc<ApprovalCoordinator>,
    metrics: &Arc<PipelineMetrics>,
    executor: &Arc<Executor>,
    cancel: &CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let approval = approval.clone();
    let metrics = metrics.clone();
    let executor = executor.clone();
    let cancel = cancel.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match approval.sweep_expired(Utc::now()).await {
                        Ok(expired) if !expired.is_empty() => {
                            warn!(count = expired.len(), "approval requests escalated on expiry");
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "approval expiry sweep failed"),
                    }
                    metrics.approvals_pending.store(approval.pending_count() as u64, Ordering::Relaxed);
                    metrics.dlq_depth.store(executor.dlq_len() as u64, Ordering::Relaxed);
                }
            }
        }
    })
}
