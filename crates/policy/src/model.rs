use serde::Deserialize;

/// One entry of `safe_actions.yaml` or `risky_actions.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionEntry {
    pub action_type: String,
    #[serde(default)]
    pub cooldown_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionList {
    #[serde(default)]
    pub actions: Vec<ActionEntry>,
}

/// Approval terms for one RISKY action type.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ApprovalPolicy {
    pub timeout_seconds: u64,
    pub required_approvers: u32,
    #[serde(default)]
    pub override_allowed: bool,
}
