//! Debate state machine data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::fallback::FallbackChain;
use super::provider::ModelRef;
use super::request::{EnsembleConfig, ValidationConfig, VotingStrategy};
use super::response::Response;
use super::role::RoleSlot;

/// The 4-phase state machine. Initial state `InitialResponse`;
/// terminal state `FinalConclusion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    InitialResponse,
    Validation,
    PolishImprove,
    FinalConclusion,
}

impl Phase {
    /// The fixed phase ordering; a successful debate's phases are always a
    /// prefix of this sequence.
    pub const SEQUENCE: [Phase; 4] = [
        Phase::InitialResponse,
        Phase::Validation,
        Phase::PolishImprove,
        Phase::FinalConclusion,
    ];

    pub fn next(self) -> Option<Phase> {
        let idx = Phase::SEQUENCE.iter().position(|p| *p == self)?;
        Phase::SEQUENCE.get(idx + 1).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebateStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateConfig {
    pub topic: String,
    pub participants: Vec<RoleSlot>,
    pub max_rounds: u32,
    pub timeout_seconds: u64,
    pub strategy: VotingStrategy,
    pub ensemble: EnsembleConfig,
    pub validation: Option<ValidationConfig>,
}

/// One role's contribution within a phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleTurn {
    pub model: ModelRef,
    pub content: String,
    pub confidence: f64,
    pub chain: FallbackChain,
    #[serde(with = "super::fallback::duration_millis")]
    pub duration: std::time::Duration,
}

/// Append-only per-phase record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTranscript {
    pub phase: Phase,
    pub turns: Vec<RoleTurn>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub confidence: f64,
}

impl PhaseTranscript {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            turns: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
            confidence: 0.0,
        }
    }

    /// Mean of successful-role confidences in this phase.
    pub fn recompute_confidence(&mut self) {
        if self.turns.is_empty() {
            self.confidence = 0.0;
            return;
        }
        let sum: f64 = self.turns.iter().map(|t| t.confidence).sum();
        self.confidence = sum / self.turns.len() as f64;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateResult {
    pub final_response: Response,
    pub overall_confidence: f64,
    pub quality_improvement: f64,
    pub degraded: bool,
}

/// One (Validation, PolishImprove) pair's confidence, recorded when
/// `MaxValidationRounds` drives more than one pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRoundSummary {
    pub round: u32,
    pub validation_confidence: f64,
    pub polish_confidence: Option<f64>,
}

/// Populated only when the debate ran more than one (Validation,
/// PolishImprove) pair; a single-pass debate leaves this `None`, keeping
/// the common-case `phases` prefix invariant intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiPassResult {
    pub rounds: Vec<ValidationRoundSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateState {
    pub debate_id: Uuid,
    pub config: DebateConfig,
    pub status: DebateStatus,
    pub current_phase: Phase,
    pub phases: Vec<PhaseTranscript>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub result: Option<DebateResult>,
    pub multi_pass_result: Option<MultiPassResult>,
}

impl DebateState {
    pub fn new(debate_id: Uuid, config: DebateConfig) -> Self {
        Self {
            debate_id,
            config,
            status: DebateStatus::Pending,
            current_phase: Phase::InitialResponse,
            phases: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
            result: None,
            multi_pass_result: None,
        }
    }
}
