//! Incident-to-decision policy engine.

pub mod action_map;
pub mod decider;
pub mod reasoning;
pub mod validator;

pub use action_map::{ActionMapError, IncidentActionMap};
pub use decider::{Decider, DeciderConfig};
pub use validator::{DecisionValidator, ValidatorError};
