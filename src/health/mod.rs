//! Health Monitor (C2).
//!
//! Per-provider circuit breaker FSM, rolling latency, and the
//! fastest-available selection function. One `DashMap` entry per provider
//! gives fine-grained, per-key locking instead of a global lock.

use chrono::Utc;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::EnsembleError;
use crate::models::{CircuitState, ProviderHealth};

#[derive(Debug, Clone, Copy)]
pub struct HealthMonitorConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
    pub latency_window: usize,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
            latency_window: 50,
        }
    }
}

struct HealthEntry {
    health: ProviderHealth,
    latency_samples: VecDeque<f64>,
    last_failure_instant: Option<Instant>,
    half_open_trial_taken: bool,
}

impl HealthEntry {
    fn new(provider_id: &str) -> Self {
        Self {
            health: ProviderHealth::new(provider_id),
            latency_samples: VecDeque::new(),
            last_failure_instant: None,
            half_open_trial_taken: false,
        }
    }

    fn record_latency(&mut self, duration: Duration, window: usize) {
        let ms = duration.as_secs_f64() * 1000.0;
        self.latency_samples.push_back(ms);
        while self.latency_samples.len() > window {
            self.latency_samples.pop_front();
        }
        let sum: f64 = self.latency_samples.iter().sum();
        self.health.average_latency_ms = sum / self.latency_samples.len() as f64;
    }

    /// Lazily advances Open -> HalfOpen once the cooldown has elapsed
    ///.
    fn refresh_breaker(&mut self, cooldown: Duration) {
        if self.health.circuit_state == CircuitState::Open {
            if let Some(last_failure) = self.last_failure_instant {
                if last_failure.elapsed() >= cooldown {
                    self.health.circuit_state = CircuitState::HalfOpen;
                    self.half_open_trial_taken = false;
                }
            }
        }
    }

    /// Whether this provider currently permits a new attempt. HalfOpen
    /// permits exactly one concurrent trial.
    fn is_available(&mut self, cooldown: Duration) -> bool {
        self.refresh_breaker(cooldown);
        match self.health.circuit_state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                if self.half_open_trial_taken {
                    false
                } else {
                    self.half_open_trial_taken = true;
                    true
                }
            }
        }
    }
}

/// Per-provider success/failure counters, rolling latency, and breaker FSM.
pub struct HealthMonitor {
    config: HealthMonitorConfig,
    entries: DashMap<String, HealthEntry>,
}

impl HealthMonitor {
    pub fn new(config: HealthMonitorConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
        }
    }

    /// Health entries are created on first registration.
    pub fn register(&self, provider_id: &str) {
        self.entries
            .entry(provider_id.to_string())
            .or_insert_with(|| HealthEntry::new(provider_id));
    }

    /// Best-effort; a missing provider entry is silently ignored.
    pub fn record_success(&self, provider_id: &str, duration: Duration) {
        let Some(mut entry) = self.entries.get_mut(provider_id) else {
            debug!(provider_id, "record_success for unregistered provider ignored");
            return;
        };
        entry.record_latency(duration, self.config.latency_window);
        entry.health.success_count += 1;
        entry.health.consecutive_failures = 0;
        entry.health.last_success_at = Some(Utc::now());
        if entry.health.circuit_state != CircuitState::Closed {
            debug!(provider_id, "circuit closing after success");
        }
        entry.health.circuit_state = CircuitState::Closed;
        entry.half_open_trial_taken = false;
    }

    pub fn record_failure(&self, provider_id: &str, duration: Duration) {
        let Some(mut entry) = self.entries.get_mut(provider_id) else {
            debug!(provider_id, "record_failure for unregistered provider ignored");
            return;
        };
        entry.record_latency(duration, self.config.latency_window);
        entry.health.failure_count += 1;
        entry.health.consecutive_failures += 1;
        entry.health.last_failure_at = Some(Utc::now());
        entry.last_failure_instant = Some(Instant::now());

        match entry.health.circuit_state {
            CircuitState::Closed => {
                if entry.health.consecutive_failures >= self.config.failure_threshold {
                    warn!(provider_id, "circuit opening after consecutive failures");
                    entry.health.circuit_state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                warn!(provider_id, "trial request failed, circuit re-opening");
                entry.health.circuit_state = CircuitState::Open;
                entry.half_open_trial_taken = false;
            }
            CircuitState::Open => {}
        }
    }

    pub fn is_available(&self, provider_id: &str) -> bool {
        match self.entries.get_mut(provider_id) {
            Some(mut entry) => entry.is_available(self.config.cooldown),
            None => false,
        }
    }

    pub fn snapshot(&self, provider_id: &str) -> Option<ProviderHealth> {
        self.entries.get_mut(provider_id).map(|mut entry| {
            entry.refresh_breaker(self.config.cooldown);
            entry.health.clone()
        })
    }

    pub fn all_snapshots(&self) -> Vec<ProviderHealth> {
        self.entries
            .iter_mut()
            .map(|mut entry| {
                entry.refresh_breaker(self.config.cooldown);
                entry.health.clone()
            })
            .collect()
    }

    /// Filter candidates to those whose breaker reports available, then
    /// return the one with minimum rolling-mean latency; ties broken by
    /// insertion order.
    pub fn fastest_available(&self, candidates: &[String]) -> Result<String, EnsembleError> {
        let mut best: Option<(String, f64)> = None;
        for provider_id in candidates {
            self.register(provider_id);
            if !self.is_available(provider_id) {
                continue;
            }
            let latency = self
                .snapshot(provider_id)
                .map(|h| h.average_latency_ms)
                .unwrap_or(0.0);
            match &best {
                Some((_, best_latency)) if latency >= *best_latency => {}
                _ => best = Some((provider_id.clone(), latency)),
            }
        }
        best.map(|(id, _)| id)
            .ok_or_else(EnsembleError::no_available_provider)
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(HealthMonitorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaker_opens_after_threshold_consecutive_failures() {
        let monitor = HealthMonitor::new(HealthMonitorConfig {
            failure_threshold: 3,
            ..Default::default()
        });
        monitor.register("a");
        for _ in 0..3 {
            monitor.record_failure("a", Duration::from_millis(10));
        }
        assert_eq!(
            monitor.snapshot("a").unwrap().circuit_state,
            CircuitState::Open
        );
        assert!(!monitor.is_available("a"));
    }

    #[test]
    fn breaker_half_opens_after_cooldown() {
        let monitor = HealthMonitor::new(HealthMonitorConfig {
            failure_threshold: 1,
            cooldown: Duration::from_millis(10),
            ..Default::default()
        });
        monitor.register("a");
        monitor.record_failure("a", Duration::from_millis(1));
        assert!(!monitor.is_available("a"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(monitor.is_available("a"));
        assert_eq!(
            monitor.snapshot("a").unwrap().circuit_state,
            CircuitState::HalfOpen
        );
    }

    #[test]
    fn half_open_permits_single_trial() {
        let monitor = HealthMonitor::new(HealthMonitorConfig {
            failure_threshold: 1,
            cooldown: Duration::from_millis(1),
            ..Default::default()
        });
        monitor.register("a");
        monitor.record_failure("a", Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(monitor.is_available("a"));
        // Second concurrent query before the trial resolves is refused.
        assert!(!monitor.is_available("a"));
    }

    #[test]
    fn half_open_closes_on_success_and_reopens_on_failure() {
        let monitor = HealthMonitor::new(HealthMonitorConfig {
            failure_threshold: 1,
            cooldown: Duration::from_millis(1),
            ..Default::default()
        });
        monitor.register("a");
        monitor.record_failure("a", Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(monitor.is_available("a"));
        monitor.record_success("a", Duration::from_millis(1));
        assert_eq!(
            monitor.snapshot("a").unwrap().circuit_state,
            CircuitState::Closed
        );
    }

    #[test]
    fn fastest_available_selection_scenario() {
        let monitor = HealthMonitor::new(HealthMonitorConfig::default());
        for (id, latency_ms, open) in [("x", 200.0, true), ("y", 150.0, false), ("z", 120.0, false)] {
            monitor.register(id);
            monitor.record_success(id, Duration::from_millis(latency_ms as u64));
            if open {
                for _ in 0..5 {
                    monitor.record_failure(id, Duration::from_millis(1));
                }
            }
        }
        let candidates = vec!["x".to_string(), "y".to_string(), "z".to_string()];
        assert_eq!(monitor.fastest_available(&candidates).unwrap(), "z");

        // Open z too: y should win.
        for _ in 0..5 {
            monitor.record_failure("z", Duration::from_millis(1));
        }
        assert_eq!(monitor.fastest_available(&candidates).unwrap(), "y");

        // Open everything: error.
        for _ in 0..5 {
            monitor.record_failure("y", Duration::from_millis(1));
        }
        assert!(monitor.fastest_available(&candidates).is_err());
    }

    #[test]
    fn missing_provider_record_is_silently_ignored() {
        let monitor = HealthMonitor::default();
        monitor.record_success("ghost", Duration::from_millis(1));
        monitor.record_failure("ghost", Duration::from_millis(1));
        assert!(monitor.snapshot("ghost").is_none());
    }
}
