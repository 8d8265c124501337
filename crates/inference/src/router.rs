use std::sync::atomic::{AtomicU64, Ordering};

use orion_core::NodeHealth;

use crate::error::InferenceError;

/// Availability thresholds; configuration, not magic numbers, consulted on
/// every read.
#[derive(Debug, Clone, Copy)]
pub struct AvailabilityThresholds {
    pub max_temp_celsius: f64,
    pub max_ram_percent: f64,
}

impl Default for AvailabilityThresholds {
    fn default() -> Self {
        Self { max_temp_celsius: 75.0, max_ram_percent: 90.0 }
    }
}

impl AvailabilityThresholds {
    pub fn is_available(&self, health: &NodeHealth) -> bool {
        health.available && health.temp_celsius <= self.max_temp_celsius && health.ram_percent <= self.max_ram_percent
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RouterCountersSnapshot {
    pub total_routed: u64,
    pub sticky_hits: u64,
    pub fallbacks: u64,
    pub errors: u64,
}

#[derive(Default)]
struct RouterCounters {
    total_routed: AtomicU64,
    sticky_hits: AtomicU64,
    fallbacks: AtomicU64,
    errors: AtomicU64,
}

/// Which pass selected a node, for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    Sticky,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub node_id: String,
    pub kind: SelectionKind,
}

/// Sticky-then-fallback dispatch over the already-filtered set of available
/// nodes. Availability filtering (freshness, thresholds) is the health
/// registry's job; this only ranks and picks.
pub struct Router {
    thresholds: AvailabilityThresholds,
    counters: RouterCounters,
}

impl Router {
    pub fn new(thresholds: AvailabilityThresholds) -> Self {
        Self { thresholds, counters: RouterCounters::default() }
    }

    /// `nodes` must already be freshness-filtered by the caller (the health
    /// registry). Availability thresholds are re-applied here.
    pub fn select(&self, nodes: &[NodeHealth], model: &str) -> Result<Selection, InferenceError> {
        let mut available: Vec<&NodeHealth> =
            nodes.iter().filter(|n| self.thresholds.is_available(n)).collect();
        available.sort_by(|a, b| a.ram_percent.partial_cmp(&b.ram_percent).unwrap_or(std::cmp::Ordering::Equal));

        if available.is_empty() {
            self.counters.errors.fetch_add(1, Ordering::Relaxed);
            return Err(InferenceError::NoAvailableNodes);
        }

        if let Some(node) = available.iter().find(|n| n.models.iter().any(|m| m == model)) {
            self.counters.total_routed.fetch_add(1, Ordering::Relaxed);
            self.counters.sticky_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Selection { node_id: node.node_id.clone(), kind: SelectionKind::Sticky });
        }

        let node = available[0];
        self.counters.total_routed.fetch_add(1, Ordering::Relaxed);
        self.counters.fallbacks.fetch_add(1, Ordering::Relaxed);
        Ok(Selection { node_id: node.node_id.clone(), kind: SelectionKind::Fallback })
    }

    pub fn counters(&self) -> RouterCountersSnapshot {
        RouterCountersSnapshot {
            total_routed: self.counters.total_routed.load(Ordering::Relaxed),
            sticky_hits: self.counters.sticky_hits.load(Ordering::Relaxed),
            fallbacks: self.counters.fallbacks.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
        }
    }
}
