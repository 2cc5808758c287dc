//! A deterministic, in-process provider used by tests, the admin CLI demo,
//! and as a default when no real provider is wired up. A single scriptable
//! stand-in rather than a real wire client, since real provider protocols
//! are out of this crate's scope.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream;
use std::time::Duration;

use super::{categorize_error, ChunkStream, ProviderAdapter, ProviderError, ProviderResult, StreamChunk};
use crate::models::{ChatMessage, FinishReason, ModelParams, ModelRef, Response, TokenUsage};
use tokio_util::sync::CancellationToken;

/// The scripted outcome for a given model id.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    Succeed {
        content: String,
        latency: Duration,
    },
    Fail {
        message: String,
        latency: Duration,
    },
}

impl MockBehavior {
    pub fn succeed(content: impl Into<String>, latency_ms: u64) -> Self {
        MockBehavior::Succeed {
            content: content.into(),
            latency: Duration::from_millis(latency_ms),
        }
    }

    pub fn fail(message: impl Into<String>, latency_ms: u64) -> Self {
        MockBehavior::Fail {
            message: message.into(),
            latency: Duration::from_millis(latency_ms),
        }
    }
}

/// A provider whose behavior per model id is configured up front. Unknown
/// model ids default to a near-instant `"pong"` success, which is enough
/// for the single-shot happy-path scenario.
pub struct MockProvider {
    provider_id: String,
    behaviors: DashMap<String, MockBehavior>,
}

impl MockProvider {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            behaviors: DashMap::new(),
        }
    }

    pub fn with_behavior(self, model_id: impl Into<String>, behavior: MockBehavior) -> Self {
        self.behaviors.insert(model_id.into(), behavior);
        self
    }

    fn behavior_for(&self, model_id: &str) -> MockBehavior {
        self.behaviors
            .get(model_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| MockBehavior::succeed("pong", 0))
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    async fn complete(
        &self,
        model: &ModelRef,
        _history: &[ChatMessage],
        _params: &ModelParams,
        cancel: CancellationToken,
    ) -> ProviderResult<Response> {
        let behavior = self.behavior_for(&model.model_id);
        let (latency, outcome) = match behavior {
            MockBehavior::Succeed { content, latency } => (latency, Ok(content)),
            MockBehavior::Fail { message, latency } => (latency, Err(message)),
        };

        tokio::select! {
            _ = tokio::time::sleep(latency) => {}
            _ = cancel.cancelled() => {
                return Err(ProviderError::new(
                    crate::models::fallback::ProviderErrorKind::Unknown,
                    "cancelled",
                ));
            }
        }

        match outcome {
            Ok(content) if content.is_empty() => Err(ProviderError::new(
                crate::models::fallback::ProviderErrorKind::EmptyResponse,
                "empty response",
            )),
            Ok(content) => {
                let mut response = Response::new(uuid::Uuid::new_v4(), model.clone(), content);
                response.usage = TokenUsage::new(10, 10);
                response.finish_reason = FinishReason::Stop;
                Ok(response)
            }
            Err(message) => Err(ProviderError::new(categorize_error(&message), message)),
        }
    }

    async fn stream(
        &self,
        model: &ModelRef,
        history: &[ChatMessage],
        params: &ModelParams,
        cancel: CancellationToken,
    ) -> ProviderResult<ChunkStream> {
        let response = self.complete(model, history, params, cancel).await?;
        let chunk = StreamChunk {
            delta: response.content,
            finish_reason: Some(response.finish_reason),
            usage: Some(response.usage),
        };
        Ok(Box::pin(stream::once(async move { Ok(chunk) })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_behavior_returns_pong() {
        let provider = MockProvider::new("a");
        let model = ModelRef::new("a", "a1");
        let response = provider
            .complete(
                &model,
                &[],
                &ModelParams::default(),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(response.content, "pong");
    }

    #[tokio::test]
    async fn configured_failure_is_categorized() {
        let provider = MockProvider::new("a").with_behavior(
            "a1",
            MockBehavior::fail("429 rate limit exceeded", 0),
        );
        let model = ModelRef::new("a", "a1");
        let err = provider
            .complete(
                &model,
                &[],
                &ModelParams::default(),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::models::fallback::ProviderErrorKind::RateLimit);
    }
}
