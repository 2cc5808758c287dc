//! Fallback Executor (C3).
//!
//! Walks one `RoleSlot`'s `[primary] ++ fallbacks` attempt list against the
//! Health Monitor and the Provider Adapter Contract, emitting events at each
//! step. Generalizes "try next provider on error" into a full
//! breaker-aware skip/retry/short-circuit policy.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::EnsembleError;
use crate::events::{Event, EventBus};
use crate::health::HealthMonitor;
use crate::models::fallback::{FallbackAttempt, FallbackChain, ProviderErrorKind};
use crate::models::{ChatMessage, ModelParams, ModelRef, Response, RoleSlot, RoleTag};
use crate::providers::{ProviderAdapter, ProviderError};

/// The outcome of executing one slot. The chain built so far is always
/// returned, even on cancellation or failure, so the caller can render a
/// chain summary.
pub enum FallbackOutcome {
    Success(Response, FallbackChain),
    Failed(EnsembleError, FallbackChain),
    Cancelled(FallbackChain),
}

/// Looks up a configured adapter by provider id. Kept separate from
/// `HealthMonitor` so registering a provider's wiring and tracking its
/// health remain independent concerns, keeping each as a separate concern
/// between `ProviderRegistry` and health bookkeeping in `src/llm/router.rs`.
pub struct ProviderRegistry {
    adapters: dashmap::DashMap<String, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            adapters: dashmap::DashMap::new(),
        }
    }

    pub fn register(&self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters
            .insert(adapter.provider_id().to_string(), adapter);
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(provider_id).map(|e| e.value().clone())
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns `Arc` handles rather than borrows so a coordinator can hand a clone
/// to each `tokio::spawn`ed slot task.
#[derive(Clone)]
pub struct FallbackExecutor {
    pub health: Arc<HealthMonitor>,
    pub providers: Arc<ProviderRegistry>,
    pub events: Arc<EventBus>,
}

impl FallbackExecutor {
    pub fn new(health: Arc<HealthMonitor>, providers: Arc<ProviderRegistry>, events: Arc<EventBus>) -> Self {
        Self {
            health,
            providers,
            events,
        }
    }

    /// Executes `slot`'s attempt chain. `debate_id` is `None` for a
    /// single-shot request outside any debate.
    pub async fn execute(
        &self,
        slot: &RoleSlot,
        prompt: &str,
        history: &[ChatMessage],
        params: &ModelParams,
        cancel: CancellationToken,
        debate_id: Option<Uuid>,
    ) -> FallbackOutcome {
        let attempt_list = slot.attempt_chain();
        let total = attempt_list.len() as u32;
        let mut chain = FallbackChain::new();
        let role = slot.role.as_str().to_string();

        let mut turn_history = history.to_vec();
        turn_history.push(ChatMessage::user(prompt));

        for (idx, model) in attempt_list.iter().enumerate() {
            let attempt_num = idx as u32 + 1;
            let is_last = attempt_num == total;

            self.health.register(&model.provider_id);
            if !self.health.is_available(&model.provider_id) && !is_last {
                chain.push(FallbackAttempt::failure(
                    model.provider_id.clone(),
                    model.clone(),
                    attempt_num,
                    Duration::ZERO,
                    ProviderErrorKind::Unavailable,
                    "breaker open, skipped",
                ));
                self.events.publish(Event::FallbackTriggered {
                    debate_id,
                    role: role.clone(),
                    from: model.clone(),
                    to: attempt_list.get(idx + 1).cloned(),
                    error_kind: ProviderErrorKind::Unavailable,
                    timestamp: chrono::Utc::now(),
                });
                continue;
            }

            if cancel.is_cancelled() {
                self.events.publish(Event::cancelled(debate_id, Some(role.clone())));
                return FallbackOutcome::Cancelled(chain);
            }

            self.events.publish(Event::RoleRequest {
                debate_id,
                role: role.clone(),
                model: model.clone(),
                attempt_num,
                timestamp: chrono::Utc::now(),
            });

            let Some(adapter) = self.providers.get(&model.provider_id) else {
                chain.push(FallbackAttempt::failure(
                    model.provider_id.clone(),
                    model.clone(),
                    attempt_num,
                    Duration::ZERO,
                    ProviderErrorKind::Unknown,
                    "no adapter registered for provider",
                ));
                continue;
            };

            let deadline = params
                .timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(60));

            let start = Instant::now();
            let call = adapter.complete(model, &turn_history, params, cancel.child_token());
            let outcome = tokio::select! {
                result = tokio::time::timeout(deadline, call) => result,
                _ = cancel.cancelled() => {
                    self.events.publish(Event::cancelled(debate_id, Some(role.clone())));
                    return FallbackOutcome::Cancelled(chain);
                }
            };
            let duration = start.elapsed();

            match outcome {
                Ok(Ok(response)) => {
                    self.health.record_success(&model.provider_id, duration);
                    chain.push(FallbackAttempt::success(
                        model.provider_id.clone(),
                        model.clone(),
                        attempt_num,
                        duration,
                    ));
                    self.events.publish(Event::RoleResponse {
                        debate_id,
                        role: role.clone(),
                        model: model.clone(),
                        attempt_num,
                        duration_ms: duration.as_millis() as u64,
                        timestamp: chrono::Utc::now(),
                    });
                    if attempt_num > 1 {
                        self.events.publish(Event::FallbackSuccess {
                            debate_id,
                            role: role.clone(),
                            model: model.clone(),
                            attempt_num,
                            timestamp: chrono::Utc::now(),
                        });
                    }
                    return FallbackOutcome::Success(response, chain);
                }
                Ok(Err(provider_err)) => {
                    self.health.record_failure(&model.provider_id, duration);
                    let kind = provider_err.kind;
                    chain.push(FallbackAttempt::failure(
                        model.provider_id.clone(),
                        model.clone(),
                        attempt_num,
                        duration,
                        kind,
                        provider_err.message.clone(),
                    ));

                    if kind == ProviderErrorKind::InvalidRequest {
                        // Not retried against the next fallback.
                        return FallbackOutcome::Failed(
                            EnsembleError::InvalidRequest(provider_err.message),
                            chain,
                        );
                    }

                    self.events.publish(Event::FallbackFailed {
                        debate_id,
                        role: role.clone(),
                        model: model.clone(),
                        attempt_num,
                        error_kind: kind,
                        timestamp: chrono::Utc::now(),
                    });
                    self.events.publish(Event::FallbackTriggered {
                        debate_id,
                        role: role.clone(),
                        from: model.clone(),
                        to: attempt_list.get(idx + 1).cloned(),
                        error_kind: kind,
                        timestamp: chrono::Utc::now(),
                    });
                }
                Err(_) => {
                    self.health.record_failure(&model.provider_id, duration);
                    chain.push(FallbackAttempt::failure(
                        model.provider_id.clone(),
                        model.clone(),
                        attempt_num,
                        duration,
                        ProviderErrorKind::Timeout,
                        "per-attempt deadline exceeded",
                    ));
                    self.events.publish(Event::FallbackFailed {
                        debate_id,
                        role: role.clone(),
                        model: model.clone(),
                        attempt_num,
                        error_kind: ProviderErrorKind::Timeout,
                        timestamp: chrono::Utc::now(),
                    });
                    self.events.publish(Event::FallbackTriggered {
                        debate_id,
                        role: role.clone(),
                        from: model.clone(),
                        to: attempt_list.get(idx + 1).cloned(),
                        error_kind: ProviderErrorKind::Timeout,
                        timestamp: chrono::Utc::now(),
                    });
                }
            }
        }

        self.events.publish(Event::FallbackExhausted {
            debate_id,
            role,
            attempts: total,
            timestamp: chrono::Utc::now(),
        });
        FallbackOutcome::Failed(EnsembleError::all_providers_failed(), chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::{MockBehavior, MockProvider};

    fn slot(primary: ModelRef, fallbacks: Vec<ModelRef>) -> RoleSlot {
        RoleSlot::new(RoleTag::Analyst, primary, fallbacks)
    }

    #[tokio::test]
    async fn single_shot_primary_success() {
        let health = HealthMonitor::default();
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(MockProvider::new("A").with_behavior(
            "a",
            MockBehavior::succeed("pong", 5),
        )));
        let events = EventBus::default();
        let executor = FallbackExecutor::new(Arc::new(health), Arc::new(providers), Arc::new(events));

        let slot = slot(ModelRef::new("A", "a"), vec![]);
        let outcome = executor
            .execute(&slot, "ping", &[], &ModelParams::default(), CancellationToken::new(), None)
            .await;

        match outcome {
            FallbackOutcome::Success(response, chain) => {
                assert_eq!(response.content, "pong");
                assert_eq!(chain.attempts().len(), 1);
                assert!(chain.is_success());
            }
            _ => panic!("expected success"),
        }
        assert_eq!(health.snapshot("A").unwrap().success_count, 1);
    }

    #[tokio::test]
    async fn primary_rate_limited_first_fallback_succeeds() {
        let health = HealthMonitor::default();
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(
            MockProvider::new("A").with_behavior("a", MockBehavior::fail("429 rate limit", 1)),
        ));
        providers.register(Arc::new(
            MockProvider::new("B").with_behavior("b", MockBehavior::succeed("ok", 1)),
        ));
        let events = EventBus::default();
        let executor = FallbackExecutor::new(Arc::new(health), Arc::new(providers), Arc::new(events));

        let slot = slot(ModelRef::new("A", "a"), vec![ModelRef::new("B", "b")]);
        let outcome = executor
            .execute(&slot, "ping", &[], &ModelParams::default(), CancellationToken::new(), None)
            .await;

        match outcome {
            FallbackOutcome::Success(response, chain) => {
                assert_eq!(response.content, "ok");
                assert_eq!(chain.attempts().len(), 2);
                assert!(chain.is_success());
                assert_eq!(
                    chain.attempts()[0].error_kind,
                    Some(ProviderErrorKind::RateLimit)
                );
            }
            _ => panic!("expected success via fallback"),
        }
    }

    #[tokio::test]
    async fn invalid_request_short_circuits_without_retry() {
        let health = HealthMonitor::default();
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(
            MockProvider::new("A").with_behavior("a", MockBehavior::fail("400 bad request", 1)),
        ));
        providers.register(Arc::new(
            MockProvider::new("B").with_behavior("b", MockBehavior::succeed("ok", 1)),
        ));
        let events = EventBus::default();
        let executor = FallbackExecutor::new(Arc::new(health), Arc::new(providers), Arc::new(events));

        let slot = slot(ModelRef::new("A", "a"), vec![ModelRef::new("B", "b")]);
        let outcome = executor
            .execute(&slot, "ping", &[], &ModelParams::default(), CancellationToken::new(), None)
            .await;

        match outcome {
            FallbackOutcome::Failed(EnsembleError::InvalidRequest(_), chain) => {
                assert_eq!(chain.attempts().len(), 1);
            }
            _ => panic!("expected invalid_request short-circuit"),
        }
    }

    #[tokio::test]
    async fn all_attempts_exhaust() {
        let health = HealthMonitor::default();
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(
            MockProvider::new("A").with_behavior("a", MockBehavior::fail("timeout", 1)),
        ));
        providers.register(Arc::new(
            MockProvider::new("B").with_behavior("b", MockBehavior::fail("timeout", 1)),
        ));
        let events = EventBus::default();
        let executor = FallbackExecutor::new(Arc::new(health), Arc::new(providers), Arc::new(events));

        let slot = slot(ModelRef::new("A", "a"), vec![ModelRef::new("B", "b")]);
        let outcome = executor
            .execute(&slot, "ping", &[], &ModelParams::default(), CancellationToken::new(), None)
            .await;

        match outcome {
            FallbackOutcome::Failed(_, chain) => {
                assert_eq!(chain.attempts().len(), 2);
                assert!(!chain.is_success());
            }
            _ => panic!("expected exhaustion"),
        }
    }
}
