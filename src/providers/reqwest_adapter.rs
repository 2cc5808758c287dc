//! A single, generic OpenAI-compatible HTTP adapter, usable against any
//! backend that speaks the `/chat/completions` wire shape (vLLM, Ollama's
//! OpenAI-compat endpoint, a self-hosted gateway, ...). This is the one
//! concrete `ProviderAdapter` this crate ships; bespoke per-vendor wire
//! protocols stay the caller's responsibility.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{categorize_error, ChunkStream, ProviderAdapter, ProviderError, ProviderResult};
use crate::models::fallback::ProviderErrorKind;
use crate::models::{ChatMessage, FinishReason, MessageRole, ModelParams, ModelRef, Response, TokenUsage};

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

fn role_str(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

fn map_finish_reason(raw: Option<&str>) -> FinishReason {
    match raw {
        Some("length") => FinishReason::Length,
        Some("content_filter") => FinishReason::ContentFilter,
        Some("tool_calls") => FinishReason::ToolCalls,
        Some("function_call") => FinishReason::FunctionCall,
        Some("stop") | None => FinishReason::Stop,
        Some(_) => FinishReason::Stop,
    }
}

/// A generic OpenAI-compatible adapter. One instance per provider
/// registration; `base_url` and an optional bearer token are the only
/// per-backend configuration it needs.
pub struct HttpProviderAdapter {
    provider_id: String,
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpProviderAdapter {
    pub fn new(provider_id: impl Into<String>, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            provider_id: provider_id.into(),
            base_url: base_url.into(),
            api_key,
            client,
        }
    }

    async fn send(
        &self,
        model: &ModelRef,
        history: &[ChatMessage],
        params: &ModelParams,
        cancel: CancellationToken,
    ) -> ProviderResult<WireResponse> {
        let messages: Vec<WireMessage> = history
            .iter()
            .map(|m| WireMessage {
                role: role_str(m.role),
                content: &m.content,
            })
            .collect();

        let body = json!({
            "model": model.model_id,
            "messages": messages,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
            "top_p": params.top_p,
            "stop": params.stop,
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let timeout = params
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(60));

        let send_fut = request.send();
        let outcome = tokio::select! {
            result = tokio::time::timeout(timeout, send_fut) => result,
            _ = cancel.cancelled() => {
                return Err(ProviderError::new(ProviderErrorKind::Unknown, "cancelled"));
            }
        };

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return Err(ProviderError::from_message(err.to_string())),
            Err(_) => return Err(ProviderError::new(ProviderErrorKind::Timeout, "request timed out")),
        };

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_message(format!("{status} {text}")));
        }

        response
            .json::<WireResponse>()
            .await
            .map_err(|e| ProviderError::from_message(format!("invalid response body: {e}")))
    }
}

#[async_trait]
impl ProviderAdapter for HttpProviderAdapter {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    async fn complete(
        &self,
        model: &ModelRef,
        history: &[ChatMessage],
        params: &ModelParams,
        cancel: CancellationToken,
    ) -> ProviderResult<Response> {
        let wire = self.send(model, history, params, cancel).await?;
        let choice = wire
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::new(ProviderErrorKind::EmptyResponse, "no choices in response"))?;

        let content = choice.message.content.unwrap_or_default();
        if content.is_empty() {
            return Err(ProviderError::new(ProviderErrorKind::EmptyResponse, "empty completion"));
        }

        let mut response = Response::new(uuid::Uuid::new_v4(), model.clone(), content);
        response.finish_reason = map_finish_reason(choice.finish_reason.as_deref());
        if let Some(usage) = wire.usage {
            response.usage = TokenUsage::new(usage.prompt_tokens, usage.completion_tokens);
        }
        Ok(response)
    }

    async fn stream(
        &self,
        model: &ModelRef,
        history: &[ChatMessage],
        params: &ModelParams,
        cancel: CancellationToken,
    ) -> ProviderResult<ChunkStream> {
        // The generic adapter does not speak SSE itself; it degrades to a
        // single terminal chunk carrying the whole completion. A real
        // streaming backend would parse `text/event-stream` here the way
        // a dedicated SSE parser would.
        use futures::stream;
        let response = self.complete(model, history, params, cancel).await?;
        let chunk = super::StreamChunk {
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

    #[test]
    fn finish_reason_mapping_defaults_to_stop() {
        assert_eq!(map_finish_reason(None), FinishReason::Stop);
        assert_eq!(map_finish_reason(Some("length")), FinishReason::Length);
        assert_eq!(map_finish_reason(Some("tool_calls")), FinishReason::ToolCalls);
    }
}
