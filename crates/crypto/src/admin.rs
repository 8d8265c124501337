use std::collections::HashMap;

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use orion_core::ApprovalDecision;

use crate::error::CryptoError;

/// Known administrators, keyed by `approver_id`, each holding the ed25519
/// public key that must back every `ApprovalDecision` they claim to have made.
#[derive(Debug, Default, Clone)]
pub struct AdminRegistry {
    keys: HashMap<String, VerifyingKey>,
}

impl AdminRegistry {
    pub fn new() -> Self {
        Self { keys: HashMap::new() }
    }

    /// Registers an admin's public key, given as 32 raw bytes.
    pub fn register(
        &mut self,
        approver_id: impl Into<String>,
        public_key: &[u8],
    ) -> Result<(), CryptoError> {
        let approver_id = approver_id.into();
        let bytes: [u8; 32] = public_key.try_into().map_err(|_| CryptoError::MalformedPublicKey {
            approver_id: approver_id.clone(),
            detail: format!("expected 32 bytes, got {}", public_key.len()),
        })?;
        let key = VerifyingKey::from_bytes(&bytes).map_err(|e| CryptoError::MalformedPublicKey {
            approver_id: approver_id.clone(),
            detail: e.to_string(),
        })?;
        self.keys.insert(approver_id, key);
        Ok(())
    }

    /// Registers an admin's public key from a hex-encoded string.
    pub fn register_hex(
        &mut self,
        approver_id: impl Into<String>,
        public_key_hex: &str,
    ) -> Result<(), CryptoError> {
        let approver_id = approver_id.into();
        let bytes = hex::decode(public_key_hex).map_err(|e| CryptoError::MalformedPublicKey {
            approver_id: approver_id.clone(),
            detail: e.to_string(),
        })?;
        self.register(approver_id, &bytes)
    }

    pub fn known_approvers(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    /// Verifies that `decision` carries a valid ed25519 signature over its
    /// signing payload, produced by the public key on file for its
    /// `approver_id`. A missing signature, an unknown approver, or a
    /// mismatched signature are all rejected identically: the decision must
    /// not be trusted.
    pub fn verify_approval(&self, decision: &ApprovalDecision) -> Result<(), CryptoError> {
        let approver_id = decision.approver_id.clone();
        let key = self
            .keys
            .get(&approver_id)
            .ok_or_else(|| CryptoError::UnknownApprover { approver_id: approver_id.clone() })?;

        let signature_hex =
            decision.signature.as_deref().ok_or_else(|| CryptoError::MissingSignature {
                approver_id: approver_id.clone(),
            })?;

        let signature_bytes =
            hex::decode(signature_hex).map_err(|e| CryptoError::MalformedSignature {
                approver_id: approver_id.clone(),
                detail: e.to_string(),
            })?;
        let signature_bytes: [u8; 64] =
            signature_bytes.try_into().map_err(|v: Vec<u8>| CryptoError::MalformedSignature {
                approver_id: approver_id.clone(),
                detail: format!("expected 64 bytes, got {}", v.len()),
            })?;
        let signature = Signature::from_bytes(&signature_bytes);

        key.verify(&decision.signing_payload(), &signature)
            .map_err(|_| CryptoError::SignatureMismatch { approver_id })
    }
}
