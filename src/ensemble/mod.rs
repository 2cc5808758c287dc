//! Ensemble Coordinator (C4).
//!
//! Fans a request out over N role slots as independent concurrent tasks,
//! waits for the whole round regardless of partial failure, and fuses
//! surviving responses by weighted voting. Generalizes multi-provider
//! fan-out from "race N providers, take the first" to "run all N roles,
//! vote."

use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::EnsembleError;
use crate::fallback::{FallbackExecutor, FallbackOutcome};
use crate::models::fallback::FallbackChain;
use crate::models::{ChatMessage, EnsembleConfig, ModelParams, ModelRef, Response, RoleSlot, VotingStrategy};

/// One slot's outcome, kept around after the round for the chain summary
/// and for phase transcripts.
pub struct SlotOutcome {
    pub role: String,
    pub weight: f64,
    pub chain: FallbackChain,
    pub response: Option<Response>,
}

pub struct RoundResult {
    pub slots: Vec<SlotOutcome>,
    pub aggregated: Response,
    pub degraded: bool,
}

/// Normalizes content for majority-vote grouping: lowercased,
/// whitespace-collapsed, trimmed.
fn normalize_content(content: &str) -> String {
    content.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

pub struct EnsembleCoordinator {
    pub executor: FallbackExecutor,
}

impl EnsembleCoordinator {
    pub fn new(executor: FallbackExecutor) -> Self {
        Self { executor }
    }

    /// Runs one round over `slots`, each paired positionally with its own
    /// already-rendered prompt in `prompts` (a debate's roles each carry a
    /// distinct per-phase instruction, so one shared prompt string would
    /// silently flatten that; a single-shot caller simply passes a
    /// one-element slice). `debate_id` is `None` for a single-shot request.
    pub async fn run_round(
        &self,
        slots: &[RoleSlot],
        prompts: &[String],
        history: &[ChatMessage],
        params: &ModelParams,
        config: &EnsembleConfig,
        cancel: CancellationToken,
        debate_id: Option<Uuid>,
    ) -> Result<RoundResult, EnsembleError> {
        assert_eq!(
            slots.len(),
            prompts.len(),
            "run_round requires one prompt per slot"
        );
        let mut handles = Vec::with_capacity(slots.len());
        for (slot, prompt) in slots.iter().zip(prompts.iter()) {
            let executor = self.executor.clone();
            let slot = slot.clone();
            let prompt = prompt.clone();
            let history = history.to_vec();
            let params = params.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                let outcome = executor
                    .execute(&slot, &prompt, &history, &params, cancel, debate_id)
                    .await;
                (slot.role.as_str().to_string(), slot.weight, outcome)
            }));
        }

        // No round terminates early on first failure: await
        // every task regardless of outcome.
        let mut slot_outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok((role, weight, FallbackOutcome::Success(response, chain))) => {
                    slot_outcomes.push(SlotOutcome {
                        role,
                        weight,
                        chain,
                        response: Some(response),
                    });
                }
                Ok((role, weight, FallbackOutcome::Failed(_, chain))) => {
                    slot_outcomes.push(SlotOutcome {
                        role,
                        weight,
                        chain,
                        response: None,
                    });
                }
                Ok((role, weight, FallbackOutcome::Cancelled(chain))) => {
                    slot_outcomes.push(SlotOutcome {
                        role,
                        weight,
                        chain,
                        response: None,
                    });
                }
                Err(_join_err) => {
                    // A task panicked; treat as a failed slot rather than
                    // propagating, consistent with "no round terminates early."
                }
            }
        }

        self.aggregate(slot_outcomes, config)
    }

    fn aggregate(
        &self,
        slots: Vec<SlotOutcome>,
        config: &EnsembleConfig,
    ) -> Result<RoundResult, EnsembleError> {
        let successes: Vec<&SlotOutcome> = slots.iter().filter(|s| s.response.is_some()).collect();
        // A completion that excluded any configured slot fell below full
        // redundancy even if it still cleared `min_providers` - e.g. one
        // role out of five exhausting its chain while the rest succeed.
        let any_excluded = successes.len() < slots.len();

        if successes.len() < config.min_providers {
            if config.fallback_to_best && !successes.is_empty() {
                let best = successes
                    .iter()
                    .max_by(|a, b| {
                        a.response.as_ref().unwrap().confidence.total_cmp(
                            &b.response.as_ref().unwrap().confidence,
                        )
                    })
                    .unwrap();
                let mut aggregated = best.response.clone().unwrap();
                aggregated
                    .metadata
                    .insert("degraded".to_string(), serde_json::Value::Bool(true));
                return Ok(RoundResult {
                    aggregated,
                    slots,
                    degraded: true,
                });
            }
            return Err(EnsembleError::insufficient_providers());
        }

        let aggregated = match config.strategy {
            VotingStrategy::ConfidenceWeighted => self.vote_confidence_weighted(&successes),
            VotingStrategy::MajorityVote => self.vote_majority(&successes),
            VotingStrategy::BestOfN => self.vote_best_of_n(&successes),
        };

        Ok(RoundResult {
            aggregated,
            slots,
            degraded: any_excluded,
        })
    }

    /// Chosen content is the slot maximizing `confidence * weight`; final
    /// confidence is the weight-normalized mean over successful slots
    ///. Scale-invariant under uniform weight scaling
    /// since both numerator and denominator scale together.
    fn vote_confidence_weighted(&self, successes: &[&SlotOutcome]) -> Response {
        let winner = successes
            .iter()
            .max_by(|a, b| {
                let score_a = a.response.as_ref().unwrap().confidence * a.weight;
                let score_b = b.response.as_ref().unwrap().confidence * b.weight;
                score_a.total_cmp(&score_b)
            })
            .expect("successes is non-empty");

        let weighted_sum: f64 = successes
            .iter()
            .map(|s| s.response.as_ref().unwrap().confidence * s.weight)
            .sum();
        let weight_sum: f64 = successes.iter().map(|s| s.weight).sum();
        let final_confidence = if weight_sum > 0.0 {
            weighted_sum / weight_sum
        } else {
            0.0
        };

        let mut aggregated = winner.response.clone().unwrap();
        aggregated.confidence = final_confidence;
        aggregated
    }

    /// Groups by normalized content; picks the group with maximum total
    /// weight, ties by highest mean confidence, then by slot insertion
    /// order.
    fn vote_majority(&self, successes: &[&SlotOutcome]) -> Response {
        struct Group {
            total_weight: f64,
            confidences: Vec<f64>,
            first_index: usize,
            representative: Response,
        }

        let mut groups: HashMap<String, Group> = HashMap::new();
        for (idx, slot) in successes.iter().enumerate() {
            let response = slot.response.as_ref().unwrap();
            let key = normalize_content(&response.content);
            groups
                .entry(key)
                .and_modify(|g| {
                    g.total_weight += slot.weight;
                    g.confidences.push(response.confidence);
                })
                .or_insert_with(|| Group {
                    total_weight: slot.weight,
                    confidences: vec![response.confidence],
                    first_index: idx,
                    representative: response.clone(),
                });
        }

        let winner = groups
            .into_values()
            .max_by(|a, b| {
                a.total_weight
                    .total_cmp(&b.total_weight)
                    .then_with(|| mean(&a.confidences).total_cmp(&mean(&b.confidences)))
                    .then_with(|| b.first_index.cmp(&a.first_index))
            })
            .expect("successes is non-empty");

        let mut aggregated = winner.representative;
        aggregated.confidence = mean(&winner.confidences);
        aggregated
    }

    /// Picks the single highest-confidence slot.
    fn vote_best_of_n(&self, successes: &[&SlotOutcome]) -> Response {
        successes
            .iter()
            .max_by(|a, b| {
                a.response
                    .as_ref()
                    .unwrap()
                    .confidence
                    .total_cmp(&b.response.as_ref().unwrap().confidence)
            })
            .expect("successes is non-empty")
            .response
            .clone()
            .unwrap()
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// A single-shot (degenerate `best_of_1`) request: one slot, no voting
/// needed beyond passing its confidence through.
pub fn single_shot_slot(primary: ModelRef, fallbacks: Vec<ModelRef>) -> RoleSlot {
    RoleSlot::new(crate::models::RoleTag::Proposer, primary, fallbacks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::fallback::ProviderRegistry;
    use crate::health::HealthMonitor;
    use crate::models::RoleTag;
    use crate::providers::mock::{MockBehavior, MockProvider};
    use std::sync::Arc;

    fn coordinator(providers: ProviderRegistry) -> EnsembleCoordinator {
        let executor = FallbackExecutor::new(
            Arc::new(HealthMonitor::default()),
            Arc::new(providers),
            Arc::new(EventBus::default()),
        );
        EnsembleCoordinator::new(executor)
    }

    fn same_prompt_for_each(slots: &[RoleSlot], prompt: &str) -> Vec<String> {
        slots.iter().map(|_| prompt.to_string()).collect()
    }

    #[tokio::test]
    async fn confidence_weighted_picks_highest_score_and_averages_confidence() {
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(
            MockProvider::new("A").with_behavior("a", MockBehavior::succeed("alpha", 1)),
        ));
        providers.register(Arc::new(
            MockProvider::new("B").with_behavior("b", MockBehavior::succeed("beta", 1)),
        ));
        let coordinator = coordinator(providers);

        let slots = vec![
            RoleSlot::new(RoleTag::Analyst, ModelRef::new("A", "a"), vec![]),
            RoleSlot::new(RoleTag::Proposer, ModelRef::new("B", "b"), vec![]),
        ];
        let config = EnsembleConfig {
            min_providers: 1,
            ..EnsembleConfig::default()
        };
        let prompts = same_prompt_for_each(&slots, "topic");
        let result = coordinator
            .run_round(
                &slots,
                &prompts,
                &[],
                &ModelParams::default(),
                &config,
                CancellationToken::new(),
                None,
            )
            .await
            .unwrap();

        assert!(!result.degraded);
        assert_eq!(result.slots.len(), 2);
        // Both mock responses have confidence 1.0, so the tie is broken by
        // weight: Proposer (1.0) vs Analyst (1.0) - either is a valid winner.
        assert!(result.aggregated.confidence > 0.0);
    }

    #[tokio::test]
    async fn insufficient_providers_without_fallback_to_best_fails() {
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(
            MockProvider::new("A").with_behavior("a", MockBehavior::fail("timeout", 1)),
        ));
        let coordinator = coordinator(providers);

        let slots = vec![RoleSlot::new(RoleTag::Analyst, ModelRef::new("A", "a"), vec![])];
        let config = EnsembleConfig {
            min_providers: 1,
            fallback_to_best: false,
            ..EnsembleConfig::default()
        };
        let prompts = same_prompt_for_each(&slots, "topic");
        let result = coordinator
            .run_round(
                &slots,
                &prompts,
                &[],
                &ModelParams::default(),
                &config,
                CancellationToken::new(),
                None,
            )
            .await;

        assert!(matches!(result, Err(EnsembleError::ServiceUnavailable(_))));
    }

    #[tokio::test]
    async fn degraded_result_when_fallback_to_best_and_below_min_providers() {
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(
            MockProvider::new("A").with_behavior("a", MockBehavior::succeed("ok", 1)),
        ));
        providers.register(Arc::new(
            MockProvider::new("B").with_behavior("b", MockBehavior::fail("timeout", 1)),
        ));
        let coordinator = coordinator(providers);

        let slots = vec![
            RoleSlot::new(RoleTag::Analyst, ModelRef::new("A", "a"), vec![]),
            RoleSlot::new(RoleTag::Critic, ModelRef::new("B", "b"), vec![]),
        ];
        let config = EnsembleConfig {
            min_providers: 2,
            fallback_to_best: true,
            ..EnsembleConfig::default()
        };
        let prompts = same_prompt_for_each(&slots, "topic");
        let result = coordinator
            .run_round(
                &slots,
                &prompts,
                &[],
                &ModelParams::default(),
                &config,
                CancellationToken::new(),
                None,
            )
            .await
            .unwrap();

        assert!(result.degraded);
        assert_eq!(result.aggregated.content, "ok");
    }

    #[test]
    fn majority_vote_is_scale_invariant_under_uniform_weight_scaling() {
        // Weighted voting scale-invariance is exercised as a
        // pure function test independent of async execution.
        fn score(weight_a: f64, weight_b: f64, conf_a: f64, conf_b: f64) -> bool {
            // returns true if A wins under confidence_weighted scoring
            conf_a * weight_a > conf_b * weight_b
        }
        let a_wins_before = score(1.0, 1.2, 0.8, 0.7);
        let a_wins_after = score(10.0, 12.0, 0.8, 0.7);
        assert_eq!(a_wins_before, a_wins_after);
    }
}
