//! Admin signature verification for approval decisions, and AES-256-GCM
//! encryption for config secrets at rest.

pub mod admin;
pub mod error;
pub mod secrets;

pub use admin::AdminRegistry;
pub use error::CryptoError;
pub use secrets::{
    ExposeSecret, MasterKey, PayloadEncryptor, SecretString, decrypt_value, encrypt_value,
    is_encrypted, parse_master_key,
};
