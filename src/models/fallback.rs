//! Fallback attempts and chains.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::provider::ModelRef;

/// Categorized provider error kind. The categorization
/// function itself lives in `providers::categorize_error` — this is just
/// the closed set of outcomes it can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    RateLimit,
    Timeout,
    Auth,
    Quota,
    Connection,
    Unavailable,
    Overloaded,
    InvalidRequest,
    EmptyResponse,
    Unknown,
}

impl ProviderErrorKind {
    /// `invalid_request` is the one category C3 does not retry.
    pub fn is_retryable(self) -> bool {
        !matches!(self, ProviderErrorKind::InvalidRequest)
    }
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProviderErrorKind::RateLimit => "rate_limit",
            ProviderErrorKind::Timeout => "timeout",
            ProviderErrorKind::Auth => "auth",
            ProviderErrorKind::Quota => "quota",
            ProviderErrorKind::Connection => "connection",
            ProviderErrorKind::Unavailable => "unavailable",
            ProviderErrorKind::Overloaded => "overloaded",
            ProviderErrorKind::InvalidRequest => "invalid_request",
            ProviderErrorKind::EmptyResponse => "empty_response",
            ProviderErrorKind::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// One provider attempt within a `FallbackChain`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackAttempt {
    pub provider_id: String,
    pub model: ModelRef,
    /// 1-based.
    pub attempt_number: u32,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    pub success: bool,
    pub error_message: Option<String>,
    pub error_kind: Option<ProviderErrorKind>,
}

pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(d)?;
        Ok(Duration::from_millis(ms))
    }
}

impl FallbackAttempt {
    pub fn success(
        provider_id: impl Into<String>,
        model: ModelRef,
        attempt_number: u32,
        duration: Duration,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            model,
            attempt_number,
            duration,
            success: true,
            error_message: None,
            error_kind: None,
        }
    }

    pub fn failure(
        provider_id: impl Into<String>,
        model: ModelRef,
        attempt_number: u32,
        duration: Duration,
        error_kind: ProviderErrorKind,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            model,
            attempt_number,
            duration,
            success: false,
            error_message: Some(error_message.into()),
            error_kind: Some(error_kind),
        }
    }
}

/// An ordered sequence of `FallbackAttempt`s a slot traversed. Invariants
///: attempt numbers strictly ascending from 1; at most one
/// entry has `success=true`; if any entry is successful, it is the last.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FallbackChain {
    attempts: Vec<FallbackAttempt>,
}

impl FallbackChain {
    pub fn new() -> Self {
        Self {
            attempts: Vec::new(),
        }
    }

    /// Appends an attempt, enforcing the chain invariants. Panics on a
    /// caller bug (out-of-order attempt numbers, or an attempt appended
    /// after a success) since those can only arise from a defect in the
    /// fallback executor itself, never from external input.
    pub fn push(&mut self, attempt: FallbackAttempt) {
        if let Some(last) = self.attempts.last() {
            assert!(
                attempt.attempt_number == last.attempt_number + 1,
                "attempt numbers must be strictly ascending"
            );
            assert!(!last.success, "cannot append after a successful attempt");
        } else {
            assert_eq!(attempt.attempt_number, 1, "first attempt must be numbered 1");
        }
        self.attempts.push(attempt);
    }

    pub fn attempts(&self) -> &[FallbackAttempt] {
        &self.attempts
    }

    pub fn is_success(&self) -> bool {
        self.attempts.last().map(|a| a.success).unwrap_or(false)
    }

    pub fn successful_model(&self) -> Option<&ModelRef> {
        self.attempts
            .last()
            .filter(|a| a.success)
            .map(|a| &a.model)
    }

    /// The dominant (most frequent) failure category across the chain,
    /// used by the coordinator/orchestrator to translate a slot failure
    /// into the error taxonomy. Ties broken by first
    /// occurrence order.
    pub fn dominant_error_kind(&self) -> Option<ProviderErrorKind> {
        use std::collections::HashMap;
        let mut counts: HashMap<ProviderErrorKind, usize> = HashMap::new();
        let mut order: Vec<ProviderErrorKind> = Vec::new();
        for attempt in &self.attempts {
            if let Some(kind) = attempt.error_kind {
                if !counts.contains_key(&kind) {
                    order.push(kind);
                }
                *counts.entry(kind).or_insert(0) += 1;
            }
        }
        order
            .into_iter()
            .max_by_key(|kind| counts[kind])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn model(p: &str) -> ModelRef {
        ModelRef::new(p, "m")
    }

    #[test]
    fn attempt_numbers_strictly_ascending_from_one() {
        let mut chain = FallbackChain::new();
        chain.push(FallbackAttempt::failure(
            "a",
            model("a"),
            1,
            Duration::from_millis(1),
            ProviderErrorKind::Timeout,
            "t",
        ));
        chain.push(FallbackAttempt::success(
            "b",
            model("b"),
            2,
            Duration::from_millis(1),
        ));
        assert!(chain.is_success());
        assert_eq!(chain.successful_model(), Some(&model("b")));
    }

    #[test]
    #[should_panic]
    fn push_after_success_panics() {
        let mut chain = FallbackChain::new();
        chain.push(FallbackAttempt::success(
            "a",
            model("a"),
            1,
            Duration::from_millis(1),
        ));
        chain.push(FallbackAttempt::failure(
            "b",
            model("b"),
            2,
            Duration::from_millis(1),
            ProviderErrorKind::Timeout,
            "t",
        ));
    }

    #[test]
    fn dominant_error_kind_picks_most_frequent() {
        let mut chain = FallbackChain::new();
        chain.push(FallbackAttempt::failure(
            "a",
            model("a"),
            1,
            Duration::from_millis(1),
            ProviderErrorKind::Timeout,
            "t",
        ));
        chain.push(FallbackAttempt::failure(
            "b",
            model("b"),
            2,
            Duration::from_millis(1),
            ProviderErrorKind::Timeout,
            "t",
        ));
        chain.push(FallbackAttempt::failure(
            "c",
            model("c"),
            3,
            Duration::from_millis(1),
            ProviderErrorKind::RateLimit,
            "r",
        ));
        assert_eq!(chain.dominant_error_kind(), Some(ProviderErrorKind::Timeout));
    }
}
