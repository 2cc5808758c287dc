//! Event Stream (C6).
//!
//! A closed-set, ordered event sequence shared by every other component.
//! Broadcast-based: cheap to clone, lossy by policy under backpressure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::fallback::ProviderErrorKind;
use crate::models::{ModelRef, Phase};

/// Closed set. `Cancelled` is folded into `Error` with
/// `error_kind` left unset and `message` set to `"cancelled"` — the spec's
/// closed event-kind list has no separate `Cancelled` variant, so the
/// teardown signal described in §4.3's edge-case policy is carried here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Event {
    DebateStarted {
        debate_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    PhaseStarted {
        debate_id: Uuid,
        phase: Phase,
        timestamp: DateTime<Utc>,
    },
    RoleRequest {
        debate_id: Option<Uuid>,
        role: String,
        model: ModelRef,
        attempt_num: u32,
        timestamp: DateTime<Utc>,
    },
    RoleResponse {
        debate_id: Option<Uuid>,
        role: String,
        model: ModelRef,
        attempt_num: u32,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    FallbackTriggered {
        debate_id: Option<Uuid>,
        role: String,
        from: ModelRef,
        to: Option<ModelRef>,
        error_kind: ProviderErrorKind,
        timestamp: DateTime<Utc>,
    },
    FallbackSuccess {
        debate_id: Option<Uuid>,
        role: String,
        model: ModelRef,
        attempt_num: u32,
        timestamp: DateTime<Utc>,
    },
    FallbackFailed {
        debate_id: Option<Uuid>,
        role: String,
        model: ModelRef,
        attempt_num: u32,
        error_kind: ProviderErrorKind,
        timestamp: DateTime<Utc>,
    },
    FallbackExhausted {
        debate_id: Option<Uuid>,
        role: String,
        attempts: u32,
        timestamp: DateTime<Utc>,
    },
    PhaseEnded {
        debate_id: Uuid,
        phase: Phase,
        confidence: f64,
        timestamp: DateTime<Utc>,
    },
    DebateEnded {
        debate_id: Uuid,
        success: bool,
        timestamp: DateTime<Utc>,
    },
    Error {
        debate_id: Option<Uuid>,
        role: Option<String>,
        error_kind: Option<ProviderErrorKind>,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    pub fn cancelled(debate_id: Option<Uuid>, role: Option<String>) -> Self {
        Event::Error {
            debate_id,
            role,
            error_kind: None,
            message: "cancelled".to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Single-producer-per-slot, fan-in-by-subscription event channel. Bounded
/// so a slow consumer cannot grow memory without limit; publishers must
/// never block on a full channel — `broadcast::Sender::send` is synchronous and non-blocking, it
/// just drops the event for lagging subscribers, which is exactly the
/// documented drop policy.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Best-effort publish. No receivers is not an error (nobody is
    /// listening yet); a full channel drops the oldest event for lagging
    /// receivers, per the broadcast channel's native semantics.
    pub fn publish(&self, event: Event) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.publish(Event::DebateStarted {
            debate_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        });
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, Event::DebateStarted { .. }));
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(Event::cancelled(None, None));
    }
}
