use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid autonomy level {0:?}, expected one of N0, N2, N3")]
    InvalidAutonomyLevel(String),

    #[error("config or http I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("admins file YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("event bus error: {0}")]
    Bus(#[from] orion_bus::BusError),

    #[error("contract validator error: {0}")]
    Contract(#[from] orion_contracts::ContractError),

    #[error("policy store error: {0}")]
    Policy(#[from] orion_policy::PolicyError),

    #[error("incident action map error: {0}")]
    ActionMap(#[from] orion_decider::ActionMapError),

    #[error("admin key registration error: {0}")]
    Crypto(#[from] orion_crypto::CryptoError),

    #[error("audit store error: {0}")]
    Audit(#[from] orion_audit::AuditError),
}
