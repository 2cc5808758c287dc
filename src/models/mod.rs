//! Core domain models for the ensemble orchestrator.
//!
//! These are plain data types — no I/O, no locking, no async. The engine
//! modules (`providers`, `health`, `fallback`, `ensemble`, `debate`) own the
//! behavior; this module only owns the shapes.

pub mod debate;
pub mod fallback;
pub mod health;
pub mod provider;
pub mod request;
pub mod response;
pub mod role;
pub mod session;

pub use debate::{
    DebateConfig, DebateResult, DebateState, DebateStatus, MultiPassResult, Phase, PhaseTranscript,
    RoleTurn, ValidationRoundSummary,
};
pub use fallback::{FallbackAttempt, FallbackChain};
pub use health::{CircuitState, ProviderHealth};
pub use provider::{CapabilityBits, ModelRef, ProviderDescriptor};
pub use request::{
    ChatMessage, EnsembleConfig, MessageRole, ModelParams, Request, RequestFlags, RequestOrigin,
    RequestStatus, ValidationConfig, VotingStrategy,
};
pub use response::{FinishReason, Response, TokenUsage};
pub use role::{RoleSlot, RoleTag};
pub use session::{Session, SessionStatus};
