//! Unsolicited remote events as a closed tagged union.

use crate::domain::message::Message;

/// Outcome reported by a `completed` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportedStatus {
    Success,
    Failed,
    /// The remote side gave up on the action but it may still be retried.
    Interrupted,
}

impl ReportedStatus {
    /// Missing status means success. `interrupted` is kept as such; any other
    /// non-success spelling is a failure.
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()) {
            None => ReportedStatus::Success,
            Some(s) if matches!(s.as_str(), "" | "success" | "succeeded" | "ok") => {
                ReportedStatus::Success
            }
            Some(s) if s == "interrupted" => ReportedStatus::Interrupted,
            Some(_) => ReportedStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    /// The remote side found a target for `command` and started working on it.
    Started {
        command: String,
        target: Option<String>,
        distance: Option<f64>,
    },
    Completed {
        command: String,
        status: ReportedStatus,
    },
    Failed {
        command: String,
        reason: String,
    },
    /// Navigation is blocked. Carries no target identity.
    Stuck,
    CombatEntered,
    LowHealth,
    /// Unrecognized `event_type`, or a recognized one missing its command.
    Unknown { event_type: String },
}

impl RemoteEvent {
    pub fn from_message(msg: &Message) -> Self {
        let event_type = msg.str_field("event_type").unwrap_or("").to_string();
        let command = msg
            .str_field("command")
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        match (event_type.as_str(), command) {
            ("started" | "action_started", Some(command)) => RemoteEvent::Started {
                command,
                target: msg.str_field("target").map(str::to_string),
                distance: msg.f64_field("distance"),
            },
            ("completed" | "action_complete" | "action_completed", Some(command)) => {
                RemoteEvent::Completed {
                    command,
                    status: ReportedStatus::parse(msg.str_field("status")),
                }
            }
            ("failed" | "action_failed", Some(command)) => RemoteEvent::Failed {
                command,
                reason: msg.str_field("reason").unwrap_or("unknown").to_string(),
            },
            ("stuck", _) => RemoteEvent::Stuck,
            ("combatEntered" | "combat_entered", _) => RemoteEvent::CombatEntered,
            ("lowHealth" | "low_health", _) => RemoteEvent::LowHealth,
            _ => RemoteEvent::Unknown { event_type },
        }
    }

    pub fn name(&self) -> &str {
        match self {
            RemoteEvent::Started { .. } => "started",
            RemoteEvent::Completed { .. } => "completed",
            RemoteEvent::Failed { .. } => "failed",
            RemoteEvent::Stuck => "stuck",
            RemoteEvent::CombatEntered => "combatEntered",
            RemoteEvent::LowHealth => "lowHealth",
            RemoteEvent::Unknown { event_type } => event_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn event(value: serde_json::Value) -> RemoteEvent {
        RemoteEvent::from_message(&Message::from_value(value, 0).unwrap())
    }

    #[test]
    fn started_carries_target_and_distance() {
        let ev = event(json!({
            "type": "EVENT", "event_type": "started",
            "command": "FIND_AND_INTERACT:chest", "target": "Chest_A", "distance": 12.5
        }));
        assert_eq!(
            ev,
            RemoteEvent::Started {
                command: "FIND_AND_INTERACT:chest".into(),
                target: Some("Chest_A".into()),
                distance: Some(12.5),
            }
        );
    }

    #[rstest]
    #[case(json!({"event_type": "completed", "command": "X:y"}), ReportedStatus::Success)]
    #[case(json!({"event_type": "completed", "command": "X:y", "status": "success"}), ReportedStatus::Success)]
    #[case(json!({"event_type": "action_complete", "command": "X:y", "status": "failed"}), ReportedStatus::Failed)]
    #[case(json!({"event_type": "completed", "command": "X:y", "status": "cancelled"}), ReportedStatus::Failed)]
    #[case(json!({"event_type": "completed", "command": "X:y", "status": "Interrupted"}), ReportedStatus::Interrupted)]
    fn completed_status_mapping(#[case] value: serde_json::Value, #[case] expected: ReportedStatus) {
        match event(value) {
            RemoteEvent::Completed { status, .. } => assert_eq!(status, expected),
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[rstest]
    #[case("stuck", RemoteEvent::Stuck)]
    #[case("combatEntered", RemoteEvent::CombatEntered)]
    #[case("combat_entered", RemoteEvent::CombatEntered)]
    #[case("lowHealth", RemoteEvent::LowHealth)]
    #[case("low_health", RemoteEvent::LowHealth)]
    fn identity_free_events(#[case] name: &str, #[case] expected: RemoteEvent) {
        assert_eq!(event(json!({"type": "EVENT", "event_type": name})), expected);
    }

    #[test]
    fn failed_without_reason_is_unknown_reason() {
        let ev = event(json!({"event_type": "action_failed", "command": "FIND_AND_INTERACT:chest"}));
        assert_eq!(
            ev,
            RemoteEvent::Failed {
                command: "FIND_AND_INTERACT:chest".into(),
                reason: "unknown".into()
            }
        );
    }

    #[test]
    fn unknown_and_commandless_events_fall_through() {
        assert_eq!(
            event(json!({"event_type": "levelUp"})),
            RemoteEvent::Unknown { event_type: "levelUp".into() }
        );
        assert_eq!(
            event(json!({"event_type": "started", "command": ""})),
            RemoteEvent::Unknown { event_type: "started".into() }
        );
    }
}
