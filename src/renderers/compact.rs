//! Compact single-line rendering, one line per event. Uses the same error
//! categorizer icon convention this crate's log lines use elsewhere.

use crate::events::Event;

fn icon_for_error(kind: crate::models::fallback::ProviderErrorKind) -> &'static str {
    use crate::models::fallback::ProviderErrorKind::*;
    match kind {
        RateLimit => "⏳",
        Timeout => "⌛",
        Auth => "🔒",
        Quota => "💳",
        Connection => "🔌",
        Unavailable => "🚫",
        Overloaded => "🧱",
        InvalidRequest => "⚠",
        EmptyResponse => "∅",
        Unknown => "?",
    }
}

/// Renders one event as a single compact line. Pure: no I/O, no state.
pub fn render_compact(event: &Event) -> String {
    match event {
        Event::DebateStarted { debate_id, .. } => format!("[debate {debate_id}] started"),
        Event::PhaseStarted { debate_id, phase, .. } => {
            format!("[debate {debate_id}] phase {phase:?} started")
        }
        Event::RoleRequest {
            role,
            model,
            attempt_num,
            ..
        } => format!("  {role} -> {model} (attempt {attempt_num})"),
        Event::RoleResponse {
            role,
            model,
            attempt_num,
            duration_ms,
            ..
        } => format!("  {role} <- {model} (attempt {attempt_num}, {duration_ms}ms)"),
        Event::FallbackTriggered {
            role,
            from,
            to,
            error_kind,
            ..
        } => {
            let icon = icon_for_error(*error_kind);
            match to {
                Some(to) => format!("  {role} {icon} {from} -> {to}"),
                None => format!("  {role} {icon} {from} -> (exhausted)"),
            }
        }
        Event::FallbackSuccess { role, model, .. } => format!("  {role} ✓ recovered via {model}"),
        Event::FallbackFailed {
            role,
            model,
            error_kind,
            ..
        } => format!("  {role} {} {model} failed", icon_for_error(*error_kind)),
        Event::FallbackExhausted { role, attempts, .. } => {
            format!("  {role} exhausted after {attempts} attempts")
        }
        Event::PhaseEnded {
            debate_id,
            phase,
            confidence,
            ..
        } => format!("[debate {debate_id}] phase {phase:?} ended (confidence {confidence:.2})"),
        Event::DebateEnded { debate_id, success, .. } => {
            format!("[debate {debate_id}] ended (success={success})")
        }
        Event::Error {
            debate_id,
            message,
            ..
        } => match debate_id {
            Some(id) => format!("[debate {id}] error: {message}"),
            None => format!("error: {message}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelRef;

    #[test]
    fn role_request_renders_attempt_number() {
        let event = Event::RoleRequest {
            debate_id: None,
            role: "analyst".to_string(),
            model: ModelRef::new("A", "a"),
            attempt_num: 2,
            timestamp: chrono::Utc::now(),
        };
        let line = render_compact(&event);
        assert!(line.contains("attempt 2"));
    }
}
