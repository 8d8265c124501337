//! Distributed inference worker health registry and sticky router.

pub mod error;
pub mod registry;
pub mod router;
pub mod worker;

pub use error::InferenceError;
pub use registry::{RegistryConfig, WorkerHealthRegistry};
pub use router::{AvailabilityThresholds, Router, RouterCountersSnapshot, Selection, SelectionKind};
pub use worker::{BackendCompletion, InferenceBackend, InferenceWorker, OllamaBackend};
