//! Debate Orchestrator (C5).
//!
//! Drives the 4-phase state machine — InitialResponse, Validation,
//! PolishImprove, FinalConclusion — feeding each phase's fan-out to the
//! Ensemble Coordinator and propagating cross-role context between phases.
//! Built around a staged multi-call negotiation loop with confidence-based
//! early exit and idempotent debate registration.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::EnsembleError;
use crate::events::{Event, EventBus};
use crate::ensemble::{EnsembleCoordinator, RoundResult};
use crate::models::{
    ChatMessage, DebateConfig, DebateResult, DebateState, DebateStatus, Phase, PhaseTranscript,
    RoleTurn,
};

/// Active-debates registry: reader-writer discipline via `DashMap`, writes
/// on create/complete/delete, reads on status queries.
pub struct DebateRegistry {
    debates: DashMap<Uuid, DebateState>,
}

impl DebateRegistry {
    pub fn new() -> Self {
        Self {
            debates: DashMap::new(),
        }
    }

    /// A debate_id is immutable; creating one twice is rejected with
    /// `already_exists`.
    pub fn create(&self, state: DebateState) -> Result<(), EnsembleError> {
        let debate_id = state.debate_id;
        match self.debates.entry(debate_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(EnsembleError::already_exists(debate_id))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(state);
                Ok(())
            }
        }
    }

    pub fn get(&self, debate_id: Uuid) -> Option<DebateState> {
        self.debates.get(&debate_id).map(|e| e.value().clone())
    }

    pub fn update<F: FnOnce(&mut DebateState)>(&self, debate_id: Uuid, f: F) {
        if let Some(mut entry) = self.debates.get_mut(&debate_id) {
            f(&mut entry);
        }
    }

    /// Deleting during a run only requests cancellation; the record is
    /// removed once terminal.
    pub fn remove_if_terminal(&self, debate_id: Uuid) -> bool {
        if let Some(entry) = self.debates.get(&debate_id) {
            if matches!(entry.status, DebateStatus::Completed | DebateStatus::Failed) {
                drop(entry);
                self.debates.remove(&debate_id);
                return true;
            }
        }
        false
    }

    pub fn list(&self, status_filter: Option<DebateStatus>) -> Vec<DebateState> {
        self.debates
            .iter()
            .map(|e| e.value().clone())
            .filter(|d| status_filter.map(|s| d.status == s).unwrap_or(true))
            .collect()
    }
}

impl Default for DebateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub struct DebateOrchestrator {
    pub coordinator: Arc<EnsembleCoordinator>,
    pub registry: Arc<DebateRegistry>,
    pub events: Arc<EventBus>,
}

impl DebateOrchestrator {
    pub fn new(
        coordinator: Arc<EnsembleCoordinator>,
        registry: Arc<DebateRegistry>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            coordinator,
            registry,
            events,
        }
    }

    /// Registers a new debate and rejects duplicates.
    pub fn create_debate(&self, debate_id: Uuid, config: DebateConfig) -> Result<(), EnsembleError> {
        self.registry.create(DebateState::new(debate_id, config))
    }

    /// Drives the full phase sequence for a previously created debate.
    pub async fn run(&self, debate_id: Uuid, cancel: CancellationToken) -> Result<(), EnsembleError> {
        let Some(state) = self.registry.get(debate_id) else {
            return Err(EnsembleError::NotFound(format!("debate {debate_id}")));
        };
        let config = state.config.clone();

        self.registry.update(debate_id, |d| d.status = DebateStatus::Running);
        self.events.publish(Event::DebateStarted {
            debate_id,
            timestamp: Utc::now(),
        });

        let remaining_phases = Phase::SEQUENCE.len() as u64;
        let per_phase_default = Duration::from_secs(config.timeout_seconds / remaining_phases.max(1));

        let mut context = String::new();
        let mut initial_confidence: Option<f64> = None;
        let mut phase = Phase::InitialResponse;

        let enable_validation = config.validation.as_ref().map(|v| v.enable_validation).unwrap_or(true);
        let enable_polish = config.validation.as_ref().map(|v| v.enable_polish).unwrap_or(true);
        let max_validation_rounds = config
            .validation
            .as_ref()
            .map(|v| v.max_validation_rounds.max(1))
            .unwrap_or(1);
        let mut validation_round: u32 = 1;
        let mut pending_validation_confidence: Option<f64> = None;
        let mut round_summaries: Vec<crate::models::ValidationRoundSummary> = Vec::new();

        loop {
            if cancel.is_cancelled() {
                self.registry.update(debate_id, |d| d.status = DebateStatus::Failed);
                self.events.publish(Event::cancelled(Some(debate_id), None));
                return Err(EnsembleError::Timeout("debate cancelled".to_string()));
            }

            self.events.publish(Event::PhaseStarted {
                debate_id,
                phase,
                timestamp: Utc::now(),
            });

            let phase_timeout = match phase {
                Phase::Validation => config
                    .validation
                    .as_ref()
                    .and_then(|v| v.validation_timeout_seconds)
                    .map(Duration::from_secs)
                    .unwrap_or(per_phase_default),
                Phase::PolishImprove => config
                    .validation
                    .as_ref()
                    .and_then(|v| v.polish_timeout_seconds)
                    .map(Duration::from_secs)
                    .unwrap_or(per_phase_default),
                _ => per_phase_default,
            };

            let phase_outcome = tokio::time::timeout(
                phase_timeout,
                self.run_phase(&config, phase, &context, cancel.clone(), debate_id),
            )
            .await;

            let (mut transcript, round_result) = match phase_outcome {
                Ok(Ok((t, r))) => (t, Some(r)),
                Ok(Err(e)) => {
                    self.registry.update(debate_id, |d| d.status = DebateStatus::Failed);
                    return Err(e);
                }
                Err(_) => {
                    // Phase timeout: record a partial transcript and
                    // proceed with degraded confidence unless it falls
                    // below the floor.
                    let mut partial = PhaseTranscript::new(phase);
                    partial.ended_at = Some(Utc::now());
                    partial.confidence = 0.0;
                    (partial, None)
                }
            };
            transcript.recompute_confidence();
            transcript.ended_at = Some(Utc::now());

            self.events.publish(Event::PhaseEnded {
                debate_id,
                phase,
                confidence: transcript.confidence,
                timestamp: Utc::now(),
            });

            if phase == Phase::InitialResponse {
                initial_confidence = Some(transcript.confidence);
            }

            const CONFIDENCE_FLOOR: f64 = 0.05;
            if transcript.confidence < CONFIDENCE_FLOOR && phase != Phase::InitialResponse {
                self.registry.update(debate_id, |d| d.status = DebateStatus::Failed);
                self.events.publish(Event::DebateEnded {
                    debate_id,
                    success: false,
                    timestamp: Utc::now(),
                });
                return Err(EnsembleError::Timeout(format!(
                    "phase {phase:?} confidence below floor after timeout"
                )));
            }

            context.push_str(&render_transcript(&transcript));

            let min_confidence_to_skip = config
                .validation
                .as_ref()
                .map(|v| v.min_confidence_to_skip)
                .unwrap_or(0.9);

            let should_skip_polish =
                phase == Phase::Validation && transcript.confidence >= min_confidence_to_skip;

            self.registry.update(debate_id, |d| {
                d.phases.push(transcript.clone());
                d.current_phase = phase;
            });

            if phase == Phase::FinalConclusion {
                // FinalConclusion aggregates across all participant roles
                // through C4's configured voting strategy rather than
                // taking an arbitrary role's own turn; `degraded` reflects
                // whether any configured role was excluded from that vote.
                let round = round_result.ok_or_else(EnsembleError::all_providers_failed)?;
                let mut final_response = round.aggregated;
                final_response.confidence = transcript.confidence;
                let degraded = round.degraded;

                let overall_confidence = transcript.confidence;
                let quality_improvement = overall_confidence - initial_confidence.unwrap_or(0.0);
                let result = DebateResult {
                    final_response,
                    overall_confidence,
                    quality_improvement,
                    degraded,
                };
                let multi_pass_result = if round_summaries.len() > 1 {
                    Some(crate::models::MultiPassResult {
                        rounds: round_summaries.clone(),
                    })
                } else {
                    None
                };
                self.registry.update(debate_id, |d| {
                    d.status = DebateStatus::Completed;
                    d.result = Some(result);
                    d.multi_pass_result = multi_pass_result;
                    d.end_time = Some(Utc::now());
                });
                self.events.publish(Event::DebateEnded {
                    debate_id,
                    success: true,
                    timestamp: Utc::now(),
                });
                return Ok(());
            }

            phase = match phase {
                Phase::InitialResponse => {
                    if enable_validation {
                        Phase::Validation
                    } else {
                        Phase::FinalConclusion
                    }
                }
                Phase::Validation => {
                    pending_validation_confidence = Some(transcript.confidence);
                    if should_skip_polish || !enable_polish {
                        // Validation -> FinalConclusion, skipping
                        // PolishImprove entirely for this round.
                        Phase::FinalConclusion
                    } else {
                        Phase::PolishImprove
                    }
                }
                Phase::PolishImprove => {
                    round_summaries.push(crate::models::ValidationRoundSummary {
                        round: validation_round,
                        validation_confidence: pending_validation_confidence.unwrap_or(0.0),
                        polish_confidence: Some(transcript.confidence),
                    });
                    if validation_round < max_validation_rounds {
                        validation_round += 1;
                        Phase::Validation
                    } else {
                        Phase::FinalConclusion
                    }
                }
                Phase::FinalConclusion => Phase::FinalConclusion,
            };
        }
    }

    /// Runs one phase's fan-out over the debate's participants as a single
    /// round through the coordinator, so the round's `min_providers` and
    /// weighted voting apply across all N roles (not one role at a time).
    /// Each role gets its own phase-specific rendered prompt; the round's
    /// `aggregated`/`degraded` fields are handed back alongside the
    /// transcript so `FinalConclusion` can use the actual voted answer.
    async fn run_phase(
        &self,
        config: &DebateConfig,
        phase: Phase,
        context: &str,
        cancel: CancellationToken,
        debate_id: Uuid,
    ) -> Result<(PhaseTranscript, RoundResult), EnsembleError> {
        let mut transcript = PhaseTranscript::new(phase);
        let history: Vec<ChatMessage> = Vec::new();

        let prompts: Vec<String> = config
            .participants
            .iter()
            .map(|slot| slot.render_prompt(phase, &config.topic, context))
            .collect();

        let round = self
            .coordinator
            .run_round(
                &config.participants,
                &prompts,
                &history,
                &crate::models::ModelParams::default(),
                &config.ensemble,
                cancel,
                Some(debate_id),
            )
            .await?;

        for outcome in &round.slots {
            if let Some(response) = &outcome.response {
                transcript.turns.push(RoleTurn {
                    model: response.model.clone(),
                    content: response.content.clone(),
                    confidence: response.confidence,
                    chain: outcome.chain.clone(),
                    duration: std::time::Duration::from_millis(0),
                });
            }
        }

        Ok((transcript, round))
    }
}

fn render_transcript(transcript: &PhaseTranscript) -> String {
    let mut out = format!("\n--- {:?} ---\n", transcript.phase);
    for turn in &transcript.turns {
        out.push_str(&format!("[{}] {}\n", turn.model, turn.content));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_debate_id_is_rejected() {
        let registry = DebateRegistry::new();
        let id = Uuid::new_v4();
        let config = sample_config();
        registry.create(DebateState::new(id, config.clone())).unwrap();
        let err = registry.create(DebateState::new(id, config)).unwrap_err();
        assert!(matches!(err, EnsembleError::Conflict(_)));
    }

    fn sample_config() -> DebateConfig {
        DebateConfig {
            topic: "test".to_string(),
            participants: vec![],
            max_rounds: 1,
            timeout_seconds: 60,
            strategy: crate::models::VotingStrategy::ConfidenceWeighted,
            ensemble: crate::models::EnsembleConfig::default(),
            validation: None,
        }
    }

    use crate::fallback::{FallbackExecutor, ProviderRegistry};
    use crate::health::HealthMonitor;
    use crate::models::{EnsembleConfig, ModelRef, RoleSlot, RoleTag, ValidationConfig, VotingStrategy};
    use crate::providers::mock::{MockBehavior, MockProvider};

    /// Five-role debate where the Critic's whole chain (primary + one
    /// fallback) fails. §8 scenario 4: the other four roles clear
    /// `min_providers`, but the round still excludes a configured
    /// participant, so the result must come back `degraded` and the
    /// orchestrator must still complete rather than fail the debate.
    #[tokio::test]
    async fn five_role_debate_excludes_exhausted_role_and_is_degraded() {
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(
            MockProvider::new("analyst-p").with_behavior("m", MockBehavior::succeed("analyst draft", 1)),
        ));
        providers.register(Arc::new(
            MockProvider::new("proposer-p").with_behavior("m", MockBehavior::succeed("proposer draft", 1)),
        ));
        providers.register(Arc::new(
            MockProvider::new("critic-p").with_behavior("m", MockBehavior::fail("timeout", 1)),
        ));
        providers.register(Arc::new(
            MockProvider::new("critic-fb").with_behavior("m", MockBehavior::fail("timeout", 1)),
        ));
        providers.register(Arc::new(
            MockProvider::new("synthesis-p").with_behavior("m", MockBehavior::succeed("synthesis draft", 1)),
        ));
        providers.register(Arc::new(
            MockProvider::new("mediator-p").with_behavior("m", MockBehavior::succeed("mediator draft", 1)),
        ));

        let events = Arc::new(EventBus::default());
        let mut event_rx = events.subscribe();
        let executor = FallbackExecutor::new(
            Arc::new(HealthMonitor::default()),
            Arc::new(providers),
            events.clone(),
        );
        let coordinator = Arc::new(EnsembleCoordinator::new(executor));
        let registry = Arc::new(DebateRegistry::new());
        let orchestrator = DebateOrchestrator::new(coordinator, registry.clone(), events.clone());

        let participants = vec![
            RoleSlot::new(RoleTag::Analyst, ModelRef::new("analyst-p", "m"), vec![]),
            RoleSlot::new(RoleTag::Proposer, ModelRef::new("proposer-p", "m"), vec![]),
            RoleSlot::new(
                RoleTag::Critic,
                ModelRef::new("critic-p", "m"),
                vec![ModelRef::new("critic-fb", "m")],
            ),
            RoleSlot::new(RoleTag::Synthesis, ModelRef::new("synthesis-p", "m"), vec![]),
            RoleSlot::new(RoleTag::Mediator, ModelRef::new("mediator-p", "m"), vec![]),
        ];

        let config = DebateConfig {
            topic: "design a rate limiter".to_string(),
            participants,
            max_rounds: 1,
            timeout_seconds: 60,
            strategy: VotingStrategy::ConfidenceWeighted,
            ensemble: EnsembleConfig {
                min_providers: 3,
                fallback_to_best: true,
                ..EnsembleConfig::default()
            },
            validation: Some(ValidationConfig {
                enable_validation: false,
                enable_polish: false,
                ..ValidationConfig::default()
            }),
        };

        let debate_id = Uuid::new_v4();
        orchestrator.create_debate(debate_id, config).unwrap();
        orchestrator
            .run(debate_id, CancellationToken::new())
            .await
            .unwrap();

        let state = registry.get(debate_id).unwrap();
        assert_eq!(state.status, DebateStatus::Completed);
        // validation and polish disabled: InitialResponse -> FinalConclusion.
        assert_eq!(state.phases.len(), 2);

        let result = state.result.unwrap();
        assert!(result.degraded);
        assert_ne!(result.final_response.content, "");

        let mut critic_exhausted = 0;
        while let Ok(event) = event_rx.try_recv() {
            if let Event::FallbackExhausted { role, .. } = event {
                if role == "critic" {
                    critic_exhausted += 1;
                }
            }
        }
        // Critic's chain exhausts once per round it participates in.
        assert_eq!(critic_exhausted, state.phases.len());
    }

    /// §8 scenario 5: Validation's mean confidence clears
    /// `min_confidence_to_skip` (default 0.9), so PolishImprove is skipped
    /// and the debate goes straight from Validation to FinalConclusion.
    #[tokio::test]
    async fn high_validation_confidence_skips_polish_phase() {
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(
            MockProvider::new("a").with_behavior("m", MockBehavior::succeed("draft a", 1)),
        ));
        providers.register(Arc::new(
            MockProvider::new("b").with_behavior("m", MockBehavior::succeed("draft b", 1)),
        ));

        let events = Arc::new(EventBus::default());
        let executor = FallbackExecutor::new(
            Arc::new(HealthMonitor::default()),
            Arc::new(providers),
            events.clone(),
        );
        let coordinator = Arc::new(EnsembleCoordinator::new(executor));
        let registry = Arc::new(DebateRegistry::new());
        let orchestrator = DebateOrchestrator::new(coordinator, registry.clone(), events);

        let participants = vec![
            RoleSlot::new(RoleTag::Proposer, ModelRef::new("a", "m"), vec![]),
            RoleSlot::new(RoleTag::Critic, ModelRef::new("b", "m"), vec![]),
        ];

        let config = DebateConfig {
            topic: "what is 2+2".to_string(),
            participants,
            max_rounds: 1,
            timeout_seconds: 60,
            strategy: VotingStrategy::ConfidenceWeighted,
            ensemble: EnsembleConfig {
                min_providers: 1,
                ..EnsembleConfig::default()
            },
            validation: None,
        };

        let debate_id = Uuid::new_v4();
        orchestrator.create_debate(debate_id, config).unwrap();
        orchestrator
            .run(debate_id, CancellationToken::new())
            .await
            .unwrap();

        let state = registry.get(debate_id).unwrap();
        assert_eq!(state.status, DebateStatus::Completed);
        assert_eq!(state.phases.len(), 3);
        let phases: Vec<Phase> = state.phases.iter().map(|p| p.phase).collect();
        assert_eq!(
            phases,
            vec![Phase::InitialResponse, Phase::Validation, Phase::FinalConclusion]
        );
        assert!(state.result.unwrap().overall_confidence >= 0.9);
    }
}
