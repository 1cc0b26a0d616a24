//! Intent vocabulary.
//!
//! An intent is a `VERB:args` string. The ledger keys on the raw string; the
//! executor parses it into [`Intent`] to decide how it goes on the wire.
//!
//! Category predicates below match on the command text. A structured
//! category field on the wire would let these go away.

use crate::domain::message::Outbound;

/// Issued when nothing better can be decided.
pub const SAFE_INTENTS: [&str; 2] = ["STRATEGY:balanced", "MODE:roam"];

/// Keyword naming the stage-objective target.
pub const OBJECTIVE_KEYWORD: &str = "teleporter";

const TARGET_SEEKING_VERB: &str = "FIND_AND_INTERACT";
const NAVIGATION_VERB: &str = "GOTO";

/// Persistent-mode settings on the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersistentSlot {
    Strategy,
    Mode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// `STRATEGY:<name>` (persistent)
    Strategy(String),
    /// `MODE:<name>` (persistent)
    Mode(String),
    /// `FIND_AND_INTERACT:<category>`; confirmed by a `started` event.
    FindAndInteract(String),
    /// `GOTO:<args>`, usually `GOTO:CANCEL`.
    Goto(String),
    /// `BUY_SHOP_ITEM:<item name>`; the item name keeps its case.
    BuyShopItem(String),
    /// Anything else with a verb.
    Other { verb: String, args: String },
}

impl Intent {
    /// Parse `VERB:args`. Returns `None` when there is no `:` separator.
    pub fn parse(raw: &str) -> Option<Self> {
        let (verb, args) = raw.trim().split_once(':')?;
        let verb = verb.trim().to_ascii_uppercase();
        let args = args.trim();
        let lower = args.to_lowercase();

        Some(match verb.as_str() {
            "STRATEGY" => Intent::Strategy(lower),
            "MODE" => Intent::Mode(lower),
            TARGET_SEEKING_VERB => Intent::FindAndInteract(lower),
            NAVIGATION_VERB => Intent::Goto(lower),
            "BUY_SHOP_ITEM" => Intent::BuyShopItem(args.to_string()),
            _ => Intent::Other {
                verb,
                args: args.to_string(),
            },
        })
    }

    /// Deferred intents are registered in the ledger by the `started` event
    /// instead of at issue time.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Intent::FindAndInteract(_))
    }

    /// The persistent setting this intent targets, with the requested value.
    pub fn persistent(&self) -> Option<(PersistentSlot, &str)> {
        match self {
            Intent::Strategy(v) => Some((PersistentSlot::Strategy, v)),
            Intent::Mode(v) => Some((PersistentSlot::Mode, v)),
            _ => None,
        }
    }

    /// The wire record for this intent, or `None` for verbs the remote side does not know.
    pub fn to_outbound(&self) -> Option<Outbound> {
        match self {
            Intent::Strategy(v) => Some(Outbound::command("STRATEGY", v.as_str())),
            Intent::Mode(v) => Some(Outbound::command("MODE", v.as_str())),
            Intent::FindAndInteract(v) => Some(Outbound::command(TARGET_SEEKING_VERB, v.as_str())),
            Intent::Goto(v) => Some(Outbound::command(NAVIGATION_VERB, v.to_ascii_uppercase())),
            Intent::BuyShopItem(v) => Some(Outbound::command("BUY_SHOP_ITEM", v.as_str())),
            Intent::Other { .. } => None,
        }
    }
}

/// True for raw intent strings that wait for remote confirmation before entering the ledger.
pub fn is_deferred_command(raw: &str) -> bool {
    Intent::parse(raw).is_some_and(|i| i.is_deferred())
}

/// Commands that send the remote side looking for a target.
pub fn is_target_seeking(command: &str) -> bool {
    verb_of(command).eq_ignore_ascii_case(TARGET_SEEKING_VERB)
}

/// Target-seeking commands plus explicit navigation.
pub fn is_navigation(command: &str) -> bool {
    is_target_seeking(command) || verb_of(command).eq_ignore_ascii_case(NAVIGATION_VERB)
}

/// Commands aimed at the stage objective.
pub fn references_objective(command: &str) -> bool {
    command.to_lowercase().contains(OBJECTIVE_KEYWORD)
}

/// True when `command` seeks a target of `category`.
pub fn references_category(command: &str, category: &str) -> bool {
    if !is_target_seeking(command) {
        return false;
    }
    let args = command.split_once(':').map(|(_, a)| a).unwrap_or("");
    args.trim().to_lowercase().starts_with(&category.to_lowercase())
}

fn verb_of(command: &str) -> &str {
    command.split(':').next().unwrap_or("").trim()
}
