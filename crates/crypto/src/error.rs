use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid master key: {0}")]
    InvalidKey(String),

    #[error("invalid encrypted value: {0}")]
    InvalidFormat(String),

    #[error("decryption failed (wrong key or corrupted data)")]
    DecryptionFailed,

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("approver {approver_id:?} is not on the admin list")]
    UnknownApprover { approver_id: String },

    #[error("approval decision from {approver_id:?} carries no signature")]
    MissingSignature { approver_id: String },

    #[error("signature from {approver_id:?} does not match the signed payload")]
    SignatureMismatch { approver_id: String },

    #[error("malformed signature for {approver_id:?}: {detail}")]
    MalformedSignature { approver_id: String, detail: String },

    #[error("malformed public key for approver {approver_id:?}: {detail}")]
    MalformedPublicKey { approver_id: String, detail: String },
}
