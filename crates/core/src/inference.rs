use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::envelope::{Envelope, new_id};

/// One turn of a chat-style inference request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// A request fanned out by the router to a worker node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct InferenceRequest {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub request_id: Uuid,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_keep_alive_seconds")]
    pub keep_alive_seconds: u64,
    /// Name of the response stream the issuing caller is reading.
    pub callback: String,
}

fn default_keep_alive_seconds() -> u64 {
    600
}

impl InferenceRequest {
    pub fn new(
        source: impl Into<String>,
        model: impl Into<String>,
        messages: Vec<ChatMessage>,
        callback: impl Into<String>,
    ) -> Self {
        Self {
            envelope: Envelope::new(source),
            request_id: new_id(),
            model: model.into(),
            messages,
            keep_alive_seconds: default_keep_alive_seconds(),
            callback: callback.into(),
        }
    }
}

/// The worker's answer to an [`InferenceRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct InferenceResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub response_id: Uuid,
    pub request_id: Uuid,
    pub response: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub load_duration_ms: u64,
    pub total_duration_ms: u64,
    /// Empty on success; populated (and `response` left empty) on runtime
    /// failure. A failed turn is never retried by the worker itself.
    #[serde(default)]
    pub error: String,
}

impl InferenceResponse {
    pub fn success(
        source: impl Into<String>,
        request_id: Uuid,
        response: impl Into<String>,
        prompt_tokens: u64,
        completion_tokens: u64,
        load_duration_ms: u64,
        total_duration_ms: u64,
    ) -> Self {
        Self {
            envelope: Envelope::new(source),
            response_id: new_id(),
            request_id,
            response: response.into(),
            prompt_tokens,
            completion_tokens,
            load_duration_ms,
            total_duration_ms,
            error: String::new(),
        }
    }

    pub fn failure(source: impl Into<String>, request_id: Uuid, error: impl Into<String>) -> Self {
        Self {
            envelope: Envelope::new(source),
            response_id: new_id(),
            request_id,
            response: String::new(),
            prompt_tokens: 0,
            completion_tokens: 0,
            load_duration_ms: 0,
            total_duration_ms: 0,
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_keep_alive_is_600_seconds() {
        let request = InferenceRequest::new("orion-brain", "llama3", vec![], "inference:responses:req-1");
        assert_eq!(request.keep_alive_seconds, 600);
    }

    #[test]
    fn failure_response_has_empty_body_and_populated_error() {
        let response = InferenceResponse::failure("orion-worker-2", new_id(), "runtime unreachable");
        assert!(!response.is_success());
        assert!(response.response.is_empty());
    }
}
