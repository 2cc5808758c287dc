//! Process configuration, loaded from the environment via `std::env::var`
//! (port/host/log-level), reading `.env` via `dotenv` before falling back
//! to hardcoded defaults. No dependency on the `config` crate: the env-var
//! surface here is small enough not to need it.

use std::env;
use std::time::Duration;

use crate::health::HealthMonitorConfig;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_host: String,
    pub bind_port: u16,
    pub log_level: String,
    pub health: HealthMonitorConfig,
    pub discovery_interval: Duration,
    pub event_bus_capacity: usize,
}

impl ServerConfig {
    /// Loads `.env` (if present) then reads environment variables, falling
    /// back to documented defaults (failure threshold 5, cooldown 30s,
    /// latency window 50).
    pub fn from_env() -> Self {
        let _ = dotenv::dotenv();

        Self {
            bind_host: env::var("ENSEMBLE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            bind_port: env::var("ENSEMBLE_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            log_level: env::var("ENSEMBLE_LOG").unwrap_or_else(|_| "info".to_string()),
            health: HealthMonitorConfig {
                failure_threshold: env::var("ENSEMBLE_BREAKER_THRESHOLD")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5),
                cooldown: Duration::from_secs(
                    env::var("ENSEMBLE_BREAKER_COOLDOWN_SECONDS")
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(30),
                ),
                latency_window: env::var("ENSEMBLE_LATENCY_WINDOW")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(50),
            },
            discovery_interval: Duration::from_secs(
                env::var("ENSEMBLE_DISCOVERY_INTERVAL_SECONDS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(300),
            ),
            event_bus_capacity: env::var("ENSEMBLE_EVENT_BUS_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024),
        }
    }

    /// The credential for a provider, resolved from its
    /// `credential_env_var`.
    pub fn credential_for(env_var: &str) -> Option<String> {
        env::var(env_var).ok()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            bind_port: 8080,
            log_level: "info".to_string(),
            health: HealthMonitorConfig::default(),
            discovery_interval: Duration::from_secs(300),
            event_bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.health.failure_threshold, 5);
        assert_eq!(config.health.cooldown, Duration::from_secs(30));
        assert_eq!(config.health.latency_window, 50);
    }
}
