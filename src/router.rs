//! Request Router (C8).
//!
//! The thin fronting layer: classifies incoming work as single-shot vs
//! debate, materializes a `Request` with defaults applied, and dispatches
//! to the Fallback Executor or the Debate Orchestrator.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::debate::DebateOrchestrator;
use crate::error::EnsembleError;
use crate::ensemble::EnsembleCoordinator;
use crate::models::{
    ChatMessage, DebateConfig, EnsembleConfig, ModelParams, Request, RequestOrigin, RequestStatus,
    Response, RoleSlot, ValidationConfig,
};

pub struct RequestRouter {
    pub coordinator: Arc<EnsembleCoordinator>,
    pub orchestrator: Arc<DebateOrchestrator>,
}

impl RequestRouter {
    pub fn new(coordinator: Arc<EnsembleCoordinator>, orchestrator: Arc<DebateOrchestrator>) -> Self {
        Self {
            coordinator,
            orchestrator,
        }
    }

    /// Materializes a `Request` with defaults applied: temperature 0.7, max_tokens
    /// 1000, top_p 1.0, strategy `confidence_weighted`.
    pub fn build_request(
        &self,
        prompt: impl Into<String>,
        user_id: Option<String>,
        session_id: Option<String>,
        origin: RequestOrigin,
    ) -> Request {
        let mut request = Request::new(prompt, origin);
        if let Some(user_id) = user_id {
            request.user_id = user_id;
        }
        if let Some(session_id) = session_id {
            request.session_id = session_id;
        }
        request
    }

    /// `Complete`/`Chat` single-shot path: one slot, the
    /// degenerate `best_of_1` case, run directly through C4 rather than C5.
    pub async fn complete(
        &self,
        mut request: Request,
        slot: RoleSlot,
        cancel: CancellationToken,
    ) -> Result<Response, EnsembleError> {
        request.transition(RequestStatus::Running);
        let history: Vec<ChatMessage> = request.history.clone();
        let config = EnsembleConfig {
            min_providers: 1,
            ..request.ensemble_config.clone()
        };

        let result = self
            .coordinator
            .run_round(
                std::slice::from_ref(&slot),
                std::slice::from_ref(&request.prompt),
                &history,
                &request.params,
                &config,
                cancel,
                None,
            )
            .await;

        match result {
            Ok(round) => {
                request.transition(RequestStatus::Completed);
                Ok(round.aggregated)
            }
            Err(e) => {
                request.transition(RequestStatus::Failed);
                Err(e)
            }
        }
    }

    /// `CreateDebate`: generates a fresh debate_id when not
    /// supplied, registers it, and kicks off the phase machine.
    pub async fn create_debate(
        &self,
        debate_id: Option<Uuid>,
        topic: String,
        participants: Vec<RoleSlot>,
        timeout_seconds: u64,
        ensemble: EnsembleConfig,
        validation: Option<ValidationConfig>,
        cancel: CancellationToken,
    ) -> Result<Uuid, EnsembleError> {
        let debate_id = debate_id.unwrap_or_else(Uuid::new_v4);
        let config = DebateConfig {
            topic,
            participants,
            max_rounds: 1,
            timeout_seconds,
            strategy: ensemble.strategy,
            ensemble,
            validation,
        };
        self.orchestrator.create_debate(debate_id, config)?;

        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            let _ = orchestrator.run(debate_id, cancel).await;
        });

        Ok(debate_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelParams;

    #[test]
    fn build_request_applies_spec_defaults() {
        let params = ModelParams::default();
        assert_eq!(params.temperature, 0.7);
        assert_eq!(params.max_tokens, 1000);
        assert_eq!(params.top_p, 1.0);
    }
}
