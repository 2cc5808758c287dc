//! Provider health data. The FSM transitions and the
//! fastest-available selection function live in the `health` engine module;
//! this is just the snapshot shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub provider_id: String,
    pub success_count: u64,
    pub failure_count: u64,
    pub consecutive_failures: u32,
    /// Arithmetic mean of the last K observed latencies (K default 50).
    pub average_latency_ms: f64,
    pub circuit_state: CircuitState,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
}

impl ProviderHealth {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            success_count: 0,
            failure_count: 0,
            consecutive_failures: 0,
            average_latency_ms: 0.0,
            circuit_state: CircuitState::Closed,
            last_success_at: None,
            last_failure_at: None,
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.success_count + self.failure_count
    }

    pub fn uptime_percent(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            100.0
        } else {
            (self.success_count as f64 / total as f64) * 100.0
        }
    }
}
