//! Event deduplication and fixed-window incident correlation.

pub mod correlator;
pub mod fingerprint;

pub use correlator::{Correlator, CorrelatorConfig};
pub use fingerprint::fingerprint;
