use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use orion_bus::EventBus;
use orion_core::{InferenceRequest, InferenceResponse};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::error::InferenceError;
use crate::registry::WorkerHealthRegistry;

/// A single completion turn as handed to the local inference runtime.
/// Abstracted behind a trait so routing and error-path behavior are
/// testable without a live model server.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn generate(&self, request: &InferenceRequest) -> Result<BackendCompletion, String>;
}

pub struct BackendCompletion {
    pub response: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub load_duration_ms: u64,
}

/// Talks to a local Ollama-compatible runtime over HTTP, honoring the
/// request's `keep_alive_seconds` so the model is not evicted between
/// back-to-back turns.
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into() }
    }
}

#[derive(serde::Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [orion_core::ChatMessage],
    stream: bool,
    keep_alive: u64,
}

#[derive(serde::Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
    #[serde(default)]
    load_duration: u64,
}

#[derive(serde::Deserialize)]
struct OllamaMessage {
    content: String,
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    async fn generate(&self, request: &InferenceRequest) -> Result<BackendCompletion, String> {
        let body = OllamaChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream: false,
            keep_alive: request.keep_alive_seconds,
        };
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?
            .json::<OllamaChatResponse>()
            .await
            .map_err(|e| e.to_string())?;

        Ok(BackendCompletion {
            response: response.message.content,
            prompt_tokens: response.prompt_eval_count,
            completion_tokens: response.eval_count,
            load_duration_ms: response.load_duration / 1_000_000,
        })
    }
}

/// Runs on one inference node: subscribes to the node's own request
/// sub-stream, executes each turn against the local backend, and emits the
/// result to the caller's callback stream. Never retries a failed turn —
/// that decision belongs to whoever issued the request.
pub struct InferenceWorker {
    node_id: String,
    bus: EventBus,
    registry: Arc<WorkerHealthRegistry>,
    backend: Arc<dyn InferenceBackend>,
}

impl InferenceWorker {
    pub fn new(
        node_id: impl Into<String>,
        bus: EventBus,
        registry: Arc<WorkerHealthRegistry>,
        backend: Arc<dyn InferenceBackend>,
    ) -> Self {
        Self { node_id: node_id.into(), bus, registry, backend }
    }

    pub fn request_stream(node_id: &str) -> String {
        format!("inference:requests:{node_id}")
    }

    /// Consumer group and loop. Returns once `cancel` fires, after removing
    /// this node's health entry so the router stops routing to it.
    #[instrument(skip(self, cancel), fields(node_id = %self.node_id))]
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), InferenceError> {
        let stream = Self::request_stream(&self.node_id);
        let group = "inference-workers";
        let node_id = self.node_id.clone();
        let backend = self.backend.clone();
        let bus = self.bus.clone();

        let result = bus
            .subscribe(&stream, group, &node_id, "inference_request", None, cancel.clone(), move |value| {
                let backend = backend.clone();
                let bus = bus.clone();
                let node_id = node_id.clone();
                async move {
                    let request: InferenceRequest = serde_json::from_value(value)
                        .map_err(|e| Box::<dyn std::error::Error + Send + Sync>::from(e.to_string()))?;
                    handle_request(&node_id, &bus, backend.as_ref(), request).await;
                    Ok(())
                }
            })
            .await;

        if let Err(e) = self.registry.remove(&self.node_id).await {
            warn!(error = %e, "failed to clear health entry on shutdown");
        }

        result.map_err(InferenceError::from)
    }
}

async fn handle_request(node_id: &str, bus: &EventBus, backend: &dyn InferenceBackend, request: InferenceRequest) {
    let started = Instant::now();
    let response = match backend.generate(&request).await {
        Ok(completion) => InferenceResponse::success(
            node_id,
            request.request_id,
            completion.response,
            completion.prompt_tokens,
            completion.completion_tokens,
            completion.load_duration_ms,
            started.elapsed().as_millis() as u64,
        ),
        Err(err) => {
            error!(request_id = %request.request_id, error = %err, "inference turn failed");
            InferenceResponse::failure(node_id, request.request_id, err)
        }
    };

    let payload = match serde_json::to_value(&response) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "failed to serialize inference response");
            return;
        }
    };

    if let Err(e) = bus.publish_to_stream(&request.callback, &payload, "inference_response").await {
        error!(error = %e, callback = %request.callback, "failed to publish inference response");
    } else {
        info!(request_id = %request.request_id, "inference turn complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orion_core::ChatMessage;

    struct FailingBackend;

    #[async_trait]
    impl InferenceBackend for FailingBackend {
        async fn generate(&self, _request: &InferenceRequest) -> Result<BackendCompletion, String> {
            Err("model runtime unreachable".to_string())
        }
    }

    struct EchoBackend;

    #[async_trait]
    impl InferenceBackend for EchoBackend {
        async fn generate(&self, request: &InferenceRequest) -> Result<BackendCompletion, String> {
            Ok(BackendCompletion {
                response: format!("echo: {}", request.messages.last().map(|m| m.content.clone()).unwrap_or_default()),
                prompt_tokens: 4,
                completion_tokens: 2,
                load_duration_ms: 0,
            })
        }
    }

    #[test]
    fn request_stream_is_namespaced_per_node() {
        assert_eq!(InferenceWorker::request_stream("worker-a"), "inference:requests:worker-a");
    }

    #[tokio::test]
    async fn failing_backend_produces_error_populated_response_not_success() {
        let backend = FailingBackend;
        let request = InferenceRequest::new("orion-router", "llama3", vec![], "inference:responses:req-1");
        let result = backend.generate(&request).await;
        assert_eq!(result.unwrap_err(), "model runtime unreachable");
    }

    #[tokio::test]
    async fn successful_backend_echoes_last_message() {
        let backend = EchoBackend;
        let request = InferenceRequest::new(
            "orion-router",
            "llama3",
            vec![ChatMessage { role: "user".to_string(), content: "hello".to_string() }],
            "inference:responses:req-1",
        );
        let completion = backend.generate(&request).await.unwrap();
        assert_eq!(completion.response, "echo: hello");
    }
}
