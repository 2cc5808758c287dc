//! Role slots — the unit of fan-out for a coordinator round.

use serde::{Deserialize, Serialize};

use super::debate::Phase;
use super::provider::ModelRef;

/// The closed set of debate roles. A tagged value, not a class hierarchy
///.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleTag {
    Analyst,
    Proposer,
    Critic,
    Synthesis,
    Mediator,
}

impl RoleTag {
    pub const ALL: [RoleTag; 5] = [
        RoleTag::Analyst,
        RoleTag::Proposer,
        RoleTag::Critic,
        RoleTag::Synthesis,
        RoleTag::Mediator,
    ];

    /// Role -> default-weight table.
    pub fn default_weight(self) -> f64 {
        match self {
            RoleTag::Analyst => 1.0,
            RoleTag::Proposer => 1.0,
            RoleTag::Critic => 1.0,
            RoleTag::Synthesis => 1.2,
            RoleTag::Mediator => 1.0,
        }
    }

    /// Role+phase -> prompt-template table. Every template uses `{topic}`;
    /// every phase past `InitialResponse` also carries `{context}`, filled
    /// in by the debate orchestrator with the rendered transcript of prior
    /// phases (prior drafts, critiques, or earlier candidates depending on
    /// phase) so that role actually sees what the phase contract requires
    /// it to see.
    pub fn prompt_template(self, phase: Phase) -> &'static str {
        match phase {
            Phase::InitialResponse => match self {
                RoleTag::Analyst => "As the Analyst, break down the following request and identify its key requirements:\n\n{topic}",
                RoleTag::Proposer => "As the Proposer, draft a direct answer to the following request:\n\n{topic}",
                RoleTag::Critic => "As the Critic, identify weaknesses or risks you expect in an answer to the following request:\n\n{topic}",
                RoleTag::Synthesis => "As the Synthesis role, draft an initial combined answer for:\n\n{topic}",
                RoleTag::Mediator => "As the Mediator, draft an initial balanced answer for:\n\n{topic}",
            },
            Phase::Validation => match self {
                RoleTag::Analyst => "As the Analyst, validate the following drafts against the original request's requirements. Point out gaps, inconsistencies, or unmet requirements.\n\nRequest:\n{topic}\n\nDrafts to validate:\n{context}",
                RoleTag::Proposer => "As the Proposer, critique the following drafts (other than any of your own) for correctness and completeness against the request.\n\nRequest:\n{topic}\n\nDrafts to validate:\n{context}",
                RoleTag::Critic => "As the Critic, identify weaknesses, risks, and factual errors in the following drafts.\n\nRequest:\n{topic}\n\nDrafts to validate:\n{context}",
                RoleTag::Synthesis => "As the Synthesis role, validate whether the following drafts can be reconciled into one coherent answer; flag any that conflict.\n\nRequest:\n{topic}\n\nDrafts to validate:\n{context}",
                RoleTag::Mediator => "As the Mediator, validate the following drafts for disagreement between roles that will need resolving.\n\nRequest:\n{topic}\n\nDrafts to validate:\n{context}",
            },
            Phase::PolishImprove => match self {
                RoleTag::Analyst => "As the Analyst, revise your own draft in light of the validation critiques below. Produce an improved draft.\n\nRequest:\n{topic}\n\nYour draft and the validation critiques:\n{context}",
                RoleTag::Proposer => "As the Proposer, revise your own draft in light of the validation critiques below. Produce an improved draft.\n\nRequest:\n{topic}\n\nYour draft and the validation critiques:\n{context}",
                RoleTag::Critic => "As the Critic, revise your own draft in light of the validation critiques below. Produce an improved draft.\n\nRequest:\n{topic}\n\nYour draft and the validation critiques:\n{context}",
                RoleTag::Synthesis => "As the Synthesis role, revise your own draft in light of the validation critiques below. Produce an improved draft.\n\nRequest:\n{topic}\n\nYour draft and the validation critiques:\n{context}",
                RoleTag::Mediator => "As the Mediator, revise your own draft in light of the validation critiques below. Produce an improved draft.\n\nRequest:\n{topic}\n\nYour draft and the validation critiques:\n{context}",
            },
            Phase::FinalConclusion => match self {
                RoleTag::Analyst => "As the Analyst, given everything below, produce your final-answer candidate for the request.\n\nRequest:\n{topic}\n\nPrior phases:\n{context}",
                RoleTag::Proposer => "As the Proposer, given everything below, produce your final-answer candidate for the request.\n\nRequest:\n{topic}\n\nPrior phases:\n{context}",
                RoleTag::Critic => "As the Critic, given everything below, produce your final-answer candidate for the request.\n\nRequest:\n{topic}\n\nPrior phases:\n{context}",
                RoleTag::Synthesis => "As the Synthesis role, given everything below, combine the available perspectives into a final-answer candidate for the request.\n\nRequest:\n{topic}\n\nPrior phases:\n{context}",
                RoleTag::Mediator => "As the Mediator, given everything below, resolve remaining disagreements and produce a final-answer candidate for the request.\n\nRequest:\n{topic}\n\nPrior phases:\n{context}",
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RoleTag::Analyst => "analyst",
            RoleTag::Proposer => "proposer",
            RoleTag::Critic => "critic",
            RoleTag::Synthesis => "synthesis",
            RoleTag::Mediator => "mediator",
        }
    }
}

impl std::fmt::Display for RoleTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One fan-out lane in a round: a role, its primary model, an ordered
/// fallback chain of models, and a voting weight. The prompt template
/// itself is looked up per-phase from the role (see
/// `RoleTag::prompt_template`) rather than fixed at construction, since
/// each phase sends a different instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSlot {
    pub role: RoleTag,
    pub primary: ModelRef,
    pub fallbacks: Vec<ModelRef>,
    pub weight: f64,
}

impl RoleSlot {
    pub fn new(role: RoleTag, primary: ModelRef, fallbacks: Vec<ModelRef>) -> Self {
        Self {
            role,
            primary,
            fallbacks,
            weight: role.default_weight(),
        }
    }

    /// `[primary] ++ fallbacks`, the attempt list C3 walks in order.
    pub fn attempt_chain(&self) -> Vec<ModelRef> {
        let mut chain = Vec::with_capacity(1 + self.fallbacks.len());
        chain.push(self.primary.clone());
        chain.extend(self.fallbacks.iter().cloned());
        chain
    }

    /// Renders this slot's phase-specific template, substituting `{topic}`
    /// and, for every phase but `InitialResponse`, `{context}`.
    pub fn render_prompt(&self, phase: Phase, topic: &str, context: &str) -> String {
        self.role
            .prompt_template(phase)
            .replace("{topic}", topic)
            .replace("{context}", context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_chain_is_primary_then_fallbacks_in_order() {
        let slot = RoleSlot::new(
            RoleTag::Analyst,
            ModelRef::new("a", "a1"),
            vec![ModelRef::new("b", "b1"), ModelRef::new("c", "c1")],
        );
        let chain = slot.attempt_chain();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0], ModelRef::new("a", "a1"));
        assert_eq!(chain[2], ModelRef::new("c", "c1"));
    }

    #[test]
    fn initial_response_prompt_carries_topic_but_no_context_placeholder() {
        let slot = RoleSlot::new(RoleTag::Proposer, ModelRef::new("a", "a1"), vec![]);
        let prompt = slot.render_prompt(Phase::InitialResponse, "what is 2+2", "unused");
        assert!(prompt.contains("what is 2+2"));
        assert!(!prompt.contains("unused"));
    }

    #[test]
    fn validation_prompt_carries_topic_and_prior_drafts() {
        let slot = RoleSlot::new(RoleTag::Critic, ModelRef::new("a", "a1"), vec![]);
        let prompt = slot.render_prompt(Phase::Validation, "what is 2+2", "[proposer] it's 4");
        assert!(prompt.contains("what is 2+2"));
        assert!(prompt.contains("[proposer] it's 4"));
    }

    #[test]
    fn each_phase_uses_a_distinct_template_for_the_same_role() {
        let templates: std::collections::HashSet<&str> = Phase::SEQUENCE
            .iter()
            .map(|p| RoleTag::Mediator.prompt_template(*p))
            .collect();
        assert_eq!(templates.len(), Phase::SEQUENCE.len());
    }
}
