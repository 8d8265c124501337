use std::collections::{HashMap, HashSet};
use std::path::Path;

use orion_core::SafetyClassification;
use tracing::instrument;

use crate::error::PolicyError;
use crate::model::{ActionList, ApprovalPolicy};

const MAX_APPROVAL_TIMEOUT_SECONDS: u64 = 3600;

/// Fail-closed lookup table over SAFE/RISKY classification, cooldowns, and
/// approval policy. Built once at startup; read-only afterward — there is
/// no runtime mutation path.
#[derive(Debug)]
pub struct PolicyStore {
    safe: HashMap<String, u64>,
    risky: HashMap<String, u64>,
    approvals: HashMap<String, ApprovalPolicy>,
}

impl PolicyStore {
    /// Load `safe_actions.yaml`, `risky_actions.yaml`, and
    /// `approval_policy.yaml` from `dir`, validating the fail-closed
    /// invariants before returning.
    pub fn load_directory(dir: &Path) -> Result<Self, PolicyError> {
        let safe_list = read_action_list(&dir.join("safe_actions.yaml"))?;
        let risky_list = read_action_list(&dir.join("risky_actions.yaml"))?;
        let approvals = read_approval_policy(&dir.join("approval_policy.yaml"))?;

        Self::from_parts(safe_list, risky_list, approvals)
    }

    pub fn from_parts(
        safe_list: ActionList,
        risky_list: ActionList,
        approvals: HashMap<String, ApprovalPolicy>,
    ) -> Result<Self, PolicyError> {
        let safe: HashMap<String, u64> =
            safe_list.actions.into_iter().map(|e| (e.action_type, e.cooldown_seconds)).collect();
        let risky: HashMap<String, u64> =
            risky_list.actions.into_iter().map(|e| (e.action_type, e.cooldown_seconds)).collect();

        let safe_keys: HashSet<&String> = safe.keys().collect();
        for action_type in risky.keys() {
            if safe_keys.contains(action_type) {
                return Err(PolicyError::OverlappingClassification { action_type: action_type.clone() });
            }
        }

        for action_type in risky.keys() {
            let Some(policy) = approvals.get(action_type) else {
                return Err(PolicyError::MissingApprovalPolicy { action_type: action_type.clone() });
            };
            if policy.timeout_seconds > MAX_APPROVAL_TIMEOUT_SECONDS {
                return Err(PolicyError::ApprovalTimeoutTooLarge {
                    action_type: action_type.clone(),
                    timeout_seconds: policy.timeout_seconds,
                });
            }
        }

        Ok(Self { safe, risky, approvals })
    }

    #[instrument(skip(self))]
    pub fn classify(&self, action_type: &str) -> SafetyClassification {
        if self.safe.contains_key(action_type) {
            SafetyClassification::Safe
        } else if self.risky.contains_key(action_type) {
            SafetyClassification::Risky
        } else {
            SafetyClassification::Unknown
        }
    }

    /// 0 if `action_type` is not registered in either list.
    pub fn cooldown_seconds(&self, action_type: &str) -> u64 {
        self.safe
            .get(action_type)
            .or_else(|| self.risky.get(action_type))
            .copied()
            .unwrap_or(0)
    }

    pub fn approval_policy(&self, action_type: &str) -> Option<ApprovalPolicy> {
        self.approvals.get(action_type).copied()
    }

    pub fn known_safe_actions(&self) -> impl Iterator<Item = &str> {
        self.safe.keys().map(String::as_str)
    }

    pub fn known_risky_actions(&self) -> impl Iterator<Item = &str> {
        self.risky.keys().map(String::as_str)
    }
}

fn read_action_list(path: &Path) -> Result<ActionList, PolicyError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| PolicyError::Io { path: path.display().to_string(), source: e })?;
    serde_yaml_ng::from_str(&contents)
        .map_err(|e| PolicyError::Parse { path: path.display().to_string(), source: e })
}

fn read_approval_policy(path: &Path) -> Result<HashMap<String, ApprovalPolicy>, PolicyError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| PolicyError::Io { path: path.display().to_string(), source: e })?;
    serde_yaml_ng::from_str(&contents)
        .map_err(|e| PolicyError::Parse { path: path.display().to_string(), source: e })
}
