use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

/// Running counters surfaced on `/health` and `/stats`. Every pipeline
/// stage bumps its own counter; nothing here gates behavior.
#[derive(Default)]
pub struct PipelineMetrics {
    pub events_ingested: AtomicU64,
    pub incidents_opened: AtomicU64,
    pub decisions_emitted: AtomicU64,
    pub actions_executed: AtomicU64,
    pub approvals_pending: AtomicU64,
    pub dlq_depth: AtomicU64,
}

pub struct MetricsSnapshot {
    pub events_ingested: u64,
    pub incidents_opened: u64,
    pub decisions_emitted: u64,
    pub actions_executed: u64,
    pub approvals_pending: u64,
    pub dlq_depth: u64,
}

impl PipelineMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_ingested: self.events_ingested.load(Ordering::Relaxed),
            incidents_opened: self.incidents_opened.load(Ordering::Relaxed),
            decisions_emitted: self.decisions_emitted.load(Ordering::Relaxed),
            actions_executed: self.actions_executed.load(Ordering::Relaxed),
            approvals_pending: self.approvals_pending.load(Ordering::Relaxed),
            dlq_depth: self.dlq_depth.load(Ordering::Relaxed),
        }
    }
}

/// `GET /health` -- liveness plus a metrics snapshot, outside the control loop.
async fn health(State(metrics): State<Arc<PipelineMetrics>>) -> impl IntoResponse {
    let snap = metrics.snapshot();
    let body = serde_json::json!({
        "status": "ok",
        "metrics": {
            "events_ingested": snap.events_ingested,
            "incidents_opened": snap.incidents_opened,
            "decisions_emitted": snap.decisions_emitted,
            "actions_executed": snap.actions_executed,
            "approvals_pending": snap.approvals_pending,
            "dlq_depth": snap.dlq_depth,
        }
    });
    (StatusCode::OK, Json(body))
}

/// `GET /stats` -- the same counters without the liveness envelope, for
/// dashboards that only want numbers.
async fn stats(State(metrics): State<Arc<PipelineMetrics>>) -> impl IntoResponse {
    let snap = metrics.snapshot();
    Json(serde_json::json!({
        "events_ingested": snap.events_ingested,
        "incidents_opened": snap.incidents_opened,
        "decisions_emitted": snap.decisions_emitted,
        "actions_executed": snap.actions_executed,
        "approvals_pending": snap.approvals_pending,
        "dlq_depth": snap.dlq_depth,
    }))
}

pub fn router(metrics: Arc<PipelineMetrics>) -> Router {
    Router::new().route("/health", get(health)).route("/stats", get(stats)).with_state(metrics)
}
