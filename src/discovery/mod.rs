//! Discovery & Scoring (C7).
//!
//! Periodic, out-of-band probing of provider/model candidates: existence,
//! code-visibility, and latency, combined into an `overall_score` and
//! normalized into `vote_weight`. Publishes a read-only snapshot C4 can read
//! when composing a round. Built on a periodic background-refresh task
//! pattern, generalized from a binary up/down probe into the scored,
//! weighted snapshot here.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::fallback::ProviderRegistry;
use crate::models::{ChatMessage, ModelParams, ModelRef};

/// Configurable weights for the linear combination behind `overall_score`
///.
#[derive(Debug, Clone, Copy)]
pub struct ScoringWeights {
    pub existence_weight: f64,
    pub code_visibility_weight: f64,
    pub latency_weight: f64,
    /// Latencies at or above this are scored 0 on the latency axis.
    pub latency_ceiling_ms: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            existence_weight: 4.0,
            code_visibility_weight: 3.0,
            latency_weight: 3.0,
            latency_ceiling_ms: 5000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub model: ModelRef,
    pub exists: bool,
    pub code_visible: bool,
    pub latency_ms: f64,
    pub overall_score: f64,
    pub vote_weight: f64,
}

const CODE_SNIPPET: &str = "fn probe_marker() -> u32 { 42 }";
const AFFIRMATIVE_MARKERS: &[&str] = &["yes", "i can see", "42", "probe_marker", "acknowledged"];

fn code_visible_in(answer: &str) -> bool {
    let lower = answer.to_lowercase();
    lower.contains(&CODE_SNIPPET.to_lowercase()) || AFFIRMATIVE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Read-only snapshot published for C4. A plain map, replaceable behind the
/// same store seam as the rest of the crate's process-local state.
pub struct DiscoverySnapshot {
    scores: DashMap<ModelRef, ProbeResult>,
}

impl DiscoverySnapshot {
    pub fn new() -> Self {
        Self {
            scores: DashMap::new(),
        }
    }

    pub fn get(&self, model: &ModelRef) -> Option<ProbeResult> {
        self.scores.get(model).map(|e| e.value().clone())
    }

    pub fn all(&self) -> Vec<ProbeResult> {
        self.scores.iter().map(|e| e.value().clone()).collect()
    }

    fn set(&self, result: ProbeResult) {
        self.scores.insert(result.model.clone(), result);
    }
}

impl Default for DiscoverySnapshot {
    fn default() -> Self {
        Self::new()
    }
}

pub struct DiscoveryService {
    providers: Arc<ProviderRegistry>,
    snapshot: Arc<DiscoverySnapshot>,
    weights: ScoringWeights,
}

impl DiscoveryService {
    pub fn new(providers: Arc<ProviderRegistry>, snapshot: Arc<DiscoverySnapshot>, weights: ScoringWeights) -> Self {
        Self {
            providers,
            snapshot,
            weights,
        }
    }

    /// Probes one candidate model: existence (minimal completion),
    /// code-visibility (injected snippet, parsed for an echo or
    /// affirmative marker), and latency.
    pub async fn probe(&self, model: &ModelRef) -> ProbeResult {
        let Some(adapter) = self.providers.get(&model.provider_id) else {
            return ProbeResult {
                model: model.clone(),
                exists: false,
                code_visible: false,
                latency_ms: 0.0,
                overall_score: 0.0,
                vote_weight: 0.0,
            };
        };

        let start = std::time::Instant::now();
        let existence = adapter
            .complete(
                model,
                &[ChatMessage::user("ping")],
                &ModelParams::default(),
                tokio_util::sync::CancellationToken::new(),
            )
            .await;
        let existence_latency = start.elapsed();
        let exists = existence.is_ok();

        let code_visible = if exists {
            let answer = adapter
                .complete(
                    model,
                    &[ChatMessage::user(format!(
                        "Here is a code snippet: ```rust\n{CODE_SNIPPET}\n```\nAcknowledge that you can see it."
                    ))],
                    &ModelParams::default(),
                    tokio_util::sync::CancellationToken::new(),
                )
                .await
                .map(|r| code_visible_in(&r.content))
                .unwrap_or(false);
            answer
        } else {
            false
        };

        let latency_ms = existence_latency.as_secs_f64() * 1000.0;
        let overall_score = self.score(exists, code_visible, latency_ms);

        let result = ProbeResult {
            model: model.clone(),
            exists,
            code_visible,
            latency_ms,
            overall_score,
            // Normalized against peers by `refresh_vote_weights` after a
            // full sweep; a single probe reports an un-normalized raw score.
            vote_weight: overall_score / 10.0,
        };
        self.snapshot.set(result.clone());
        result
    }

    fn score(&self, exists: bool, code_visible: bool, latency_ms: f64) -> f64 {
        let existence_component = if exists { self.weights.existence_weight } else { 0.0 };
        let code_component = if code_visible { self.weights.code_visibility_weight } else { 0.0 };
        let latency_ratio = (1.0 - (latency_ms / self.weights.latency_ceiling_ms).min(1.0)).max(0.0);
        let latency_component = latency_ratio * self.weights.latency_weight;
        (existence_component + code_component + latency_component).min(10.0)
    }

    /// Probes every candidate, then normalizes `vote_weight` across the
    /// whole set so weights sum to the number of candidates scoring above
    /// zero.
    pub async fn refresh(&self, candidates: &[ModelRef]) -> Vec<ProbeResult> {
        let mut results = Vec::with_capacity(candidates.len());
        for model in candidates {
            results.push(self.probe(model).await);
        }
        let total_score: f64 = results.iter().map(|r| r.overall_score).sum();
        if total_score > 0.0 {
            for result in &mut results {
                let normalized = result.overall_score / total_score * results.len() as f64;
                let mut updated = result.clone();
                updated.vote_weight = normalized;
                self.snapshot.set(updated.clone());
                *result = updated;
            }
        }
        results
    }

    /// Top-K by `overall_score` form the active ensemble.
    pub fn top_k(&self, k: usize) -> Vec<ProbeResult> {
        let mut all = self.snapshot.all();
        all.sort_by(|a, b| b.overall_score.total_cmp(&a.overall_score));
        all.truncate(k);
        all
    }
}

/// Runs `refresh` on a fixed interval until `cancel` fires.
pub async fn run_periodic(
    service: Arc<DiscoveryService>,
    candidates: Vec<ModelRef>,
    interval: Duration,
    cancel: tokio_util::sync::CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                service.refresh(&candidates).await;
            }
            _ = cancel.cancelled() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::{MockBehavior, MockProvider};

    #[tokio::test]
    async fn probe_scores_existing_code_visible_model_highly() {
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(
            MockProvider::new("A").with_behavior("a", MockBehavior::succeed("yes, acknowledged", 1)),
        ));
        let service = DiscoveryService::new(
            Arc::new(providers),
            Arc::new(DiscoverySnapshot::new()),
            ScoringWeights::default(),
        );
        let result = service.probe(&ModelRef::new("A", "a")).await;
        assert!(result.exists);
        assert!(result.code_visible);
        assert!(result.overall_score > 0.0);
    }

    #[tokio::test]
    async fn nonexistent_provider_scores_zero() {
        let providers = ProviderRegistry::new();
        let service = DiscoveryService::new(
            Arc::new(providers),
            Arc::new(DiscoverySnapshot::new()),
            ScoringWeights::default(),
        );
        let result = service.probe(&ModelRef::new("ghost", "x")).await;
        assert!(!result.exists);
        assert_eq!(result.overall_score, 0.0);
    }

    #[tokio::test]
    async fn refresh_normalizes_vote_weight_across_candidates() {
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(
            MockProvider::new("A").with_behavior("a", MockBehavior::succeed("yes", 1)),
        ));
        providers.register(Arc::new(
            MockProvider::new("B").with_behavior("b", MockBehavior::succeed("yes", 1)),
        ));
        let service = DiscoveryService::new(
            Arc::new(providers),
            Arc::new(DiscoverySnapshot::new()),
            ScoringWeights::default(),
        );
        let results = service
            .refresh(&[ModelRef::new("A", "a"), ModelRef::new("B", "b")])
            .await;
        let total_weight: f64 = results.iter().map(|r| r.vote_weight).sum();
        assert!((total_weight - 2.0).abs() < 0.01);
    }
}
