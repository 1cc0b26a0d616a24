//! Directive lifecycle.
//!
//! unset -> set() -> active -> [TTL expired | auto-clear match] -> unset
//!
//! 時刻は呼び出し側から渡します（`Clock` port 経由）。このモジュール自体は
//! wall-clock を読みません。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::ledger::{ActionLedger, EntryStatus};

/// Phrases that make a directive tactical: a concrete action or target.
const TACTICAL_KEYWORDS: [&str; 11] = [
    "go to", "find", "use", "open", "interact", "buy", "teleporter", "chest", "shrine",
    "navigate", "get",
];

/// Target words shared between directive text and ledger commands.
const MATCH_KEYWORDS: [&str; 4] = ["teleporter", "chest", "shrine", "shop"];

/// How many of the most recent ledger entries auto-clear looks at.
pub const AUTO_CLEAR_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectiveKind {
    /// A concrete errand. Short-lived, cleared by matching ledger success.
    Tactical,
    /// A general posture. Only TTL ends it.
    Strategic,
}

impl DirectiveKind {
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        if TACTICAL_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            DirectiveKind::Tactical
        } else {
            DirectiveKind::Strategic
        }
    }

    pub fn ttl(self) -> Duration {
        match self {
            DirectiveKind::Tactical => Duration::seconds(45),
            DirectiveKind::Strategic => Duration::seconds(600),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DirectiveKind::Tactical => "tactical",
            DirectiveKind::Strategic => "strategic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub text: String,
    pub issued_at: DateTime<Utc>,
    pub kind: DirectiveKind,
}

impl Directive {
    pub fn new(text: impl Into<String>, issued_at: DateTime<Utc>) -> Self {
        let text = text.into();
        let kind = DirectiveKind::classify(&text);
        Self {
            text,
            issued_at,
            kind,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.kind.ttl()
    }

    /// Valid while elapsed < ttl.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now - self.issued_at < self.ttl()
    }

    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        (self.ttl() - (now - self.issued_at)).max(Duration::zero())
    }

    /// True when `command` names a target word that the directive text also names.
    pub fn matches_command(&self, command: &str) -> bool {
        let text = self.text.to_lowercase();
        let command = command.to_lowercase();
        MATCH_KEYWORDS
            .iter()
            .any(|kw| text.contains(kw) && command.contains(kw))
    }
}

/// Snapshot of the active directive, for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectiveStatus {
    pub text: String,
    pub kind: DirectiveKind,
    pub remaining_secs: i64,
}

/// Why a directive left the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    Expired,
    Fulfilled,
    Manual,
}

/// Holds at most one directive.
#[derive(Debug, Clone, Default)]
pub struct DirectiveSlot {
    active: Option<Directive>,
}

impl DirectiveSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any existing directive.
    pub fn set(&mut self, text: impl Into<String>, now: DateTime<Utc>) -> &Directive {
        let directive = Directive::new(text, now);
        info!(kind = directive.kind.as_str(), text = %directive.text, "directive set");
        self.active.insert(directive)
    }

    pub fn get(&self) -> Option<&Directive> {
        self.active.as_ref()
    }

    /// False if unset or elapsed >= ttl.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.active.as_ref().is_some_and(|d| d.is_valid_at(now))
    }

    /// The directive text to hand to the decision provider, if still valid.
    pub fn current_text(&self, now: DateTime<Utc>) -> Option<&str> {
        self.active
            .as_ref()
            .filter(|d| d.is_valid_at(now))
            .map(|d| d.text.as_str())
    }

    /// Drop the directive once its TTL has run out.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Option<Directive> {
        if self.active.as_ref().is_some_and(|d| !d.is_valid_at(now)) {
            return self.take(ClearReason::Expired);
        }
        None
    }

    /// Clear a tactical directive once a recent successful entry shares a target word with it.
    pub fn auto_clear(&mut self, ledger: &ActionLedger) -> Option<Directive> {
        let directive = self.active.as_ref()?;
        if directive.kind != DirectiveKind::Tactical {
            return None;
        }
        let fulfilled = ledger
            .recent(AUTO_CLEAR_WINDOW)
            .any(|e| e.status == EntryStatus::Success && directive.matches_command(&e.command));
        if fulfilled {
            return self.take(ClearReason::Fulfilled);
        }
        None
    }

    pub fn clear(&mut self) -> Option<Directive> {
        self.take(ClearReason::Manual)
    }

    pub fn status(&self, now: DateTime<Utc>) -> Option<DirectiveStatus> {
        let d = self.active.as_ref()?;
        Some(DirectiveStatus {
            text: d.text.clone(),
            kind: d.kind,
            remaining_secs: d.remaining_at(now).num_seconds(),
        })
    }

    fn take(&mut self, reason: ClearReason) -> Option<Directive> {
        let directive = self.active.take()?;
        match reason {
            ClearReason::Expired => info!(text = %directive.text, "directive expired"),
            ClearReason::Fulfilled => info!(text = %directive.text, "directive fulfilled"),
            ClearReason::Manual => info!(text = %directive.text, "directive cleared"),
        }
        Some(directive)
    }
}
