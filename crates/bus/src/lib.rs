//! Contract-validated Redis Streams event bus.

pub mod bus;
pub mod config;
pub mod error;

pub use bus::EventBus;
pub use config::BusConfig;
pub use error::BusError;
