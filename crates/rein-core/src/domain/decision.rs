//! Decision model: what the provider sees and what it returns.

use serde::{Deserialize, Serialize};

use crate::domain::intent::SAFE_INTENTS;

/// Upper bound on intents per decision.
pub const MAX_INTENTS: usize = 5;

/// Recent intents handed to the provider.
pub const RECENT_INTENTS_FOR_PROVIDER: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionInput {
    /// World summary followed by the ledger summary.
    pub state_summary: String,
    /// At most [`RECENT_INTENTS_FOR_PROVIDER`], oldest first.
    pub recent_intents: Vec<String>,
    pub directive: Option<String>,
}

impl DecisionInput {
    pub fn new(
        state_summary: impl Into<String>,
        recent_intents: &[String],
        directive: Option<&str>,
    ) -> Self {
        let skip = recent_intents.len().saturating_sub(RECENT_INTENTS_FOR_PROVIDER);
        Self {
            state_summary: state_summary.into(),
            recent_intents: recent_intents[skip..].to_vec(),
            directive: directive.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionSource {
    /// Generative provider.
    Model,
    /// Deterministic rule table.
    Rules,
}

impl DecisionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionSource::Model => "model",
            DecisionSource::Rules => "rules",
        }
    }
}

/// 1..=5 ordered intents plus a rationale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    intents: Vec<String>,
    pub rationale: String,
    pub source: DecisionSource,
}

impl Decision {
    /// Blank intents are dropped, an empty list becomes the safe pair, and
    /// anything past [`MAX_INTENTS`] is cut.
    pub fn new(intents: Vec<String>, rationale: impl Into<String>, source: DecisionSource) -> Self {
        let mut intents: Vec<String> = intents
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if intents.is_empty() {
            intents = SAFE_INTENTS.iter().map(|s| s.to_string()).collect();
        }
        intents.truncate(MAX_INTENTS);
        Self {
            intents,
            rationale: rationale.into(),
            source,
        }
    }

    pub fn safe(rationale: impl Into<String>, source: DecisionSource) -> Self {
        Self::new(Vec::new(), rationale, source)
    }

    pub fn intents(&self) -> &[String] {
        &self.intents
    }
}
