//! Markdown rendering of a single event, suitable for appending to a
//! running transcript view.

use crate::events::Event;

/// Pure function `Event -> String`; produces one Markdown block per event.
pub fn render_markdown(event: &Event) -> String {
    match event {
        Event::DebateStarted { debate_id, timestamp } => {
            format!("## Debate `{debate_id}` started at {timestamp}\n")
        }
        Event::PhaseStarted { phase, .. } => format!("### Phase: {phase:?}\n"),
        Event::RoleRequest {
            role,
            model,
            attempt_num,
            ..
        } => format!("- **{role}** → `{model}` (attempt {attempt_num})\n"),
        Event::RoleResponse {
            role,
            model,
            duration_ms,
            ..
        } => format!("- **{role}** ← `{model}` in {duration_ms}ms\n"),
        Event::FallbackTriggered {
            role,
            from,
            to,
            error_kind,
            ..
        } => match to {
            Some(to) => format!("- ⚠ **{role}**: `{from}` ({error_kind}) → falling back to `{to}`\n"),
            None => format!("- ⚠ **{role}**: `{from}` ({error_kind}) → no more fallbacks\n"),
        },
        Event::FallbackSuccess { role, model, .. } => {
            format!("- ✅ **{role}** recovered via `{model}`\n")
        }
        Event::FallbackFailed { role, model, error_kind, .. } => {
            format!("- ❌ **{role}**: `{model}` failed ({error_kind})\n")
        }
        Event::FallbackExhausted { role, attempts, .. } => {
            format!("- 🛑 **{role}** exhausted all {attempts} attempts\n")
        }
        Event::PhaseEnded { phase, confidence, .. } => {
            format!("*Phase {phase:?} confidence: {confidence:.2}*\n\n")
        }
        Event::DebateEnded { debate_id, success, .. } => {
            format!("## Debate `{debate_id}` ended (success: {success})\n")
        }
        Event::Error { message, .. } => format!("> **Error:** {message}\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Phase;

    #[test]
    fn phase_started_renders_as_heading() {
        let event = Event::PhaseStarted {
            debate_id: uuid::Uuid::new_v4(),
            phase: Phase::Validation,
            timestamp: chrono::Utc::now(),
        };
        let md = render_markdown(&event);
        assert!(md.starts_with("### Phase"));
    }
}
