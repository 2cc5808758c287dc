//! Session model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::request::ChatMessage;

pub const DEFAULT_TTL_HOURS: u32 = 24;
pub const MAX_TTL_HOURS: u32 = 168;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Terminated,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub ttl_hours: u32,
    pub context: Vec<ChatMessage>,
    pub status: SessionStatus,
}

impl Session {
    pub fn new(user_id: impl Into<String>, ttl_hours: Option<u32>) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            user_id: user_id.into(),
            created_at: now,
            last_active_at: now,
            ttl_hours: ttl_hours.unwrap_or(DEFAULT_TTL_HOURS).min(MAX_TTL_HOURS),
            context: Vec::new(),
            status: SessionStatus::Active,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let elapsed = now.signed_duration_since(self.last_active_at);
        elapsed.num_hours() >= self.ttl_hours as i64
    }

    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_is_capped_at_168_hours() {
        let session = Session::new("u1", Some(1000));
        assert_eq!(session.ttl_hours, MAX_TTL_HOURS);
    }

    #[test]
    fn default_ttl_is_24_hours() {
        let session = Session::new("u1", None);
        assert_eq!(session.ttl_hours, DEFAULT_TTL_HOURS);
    }
}
