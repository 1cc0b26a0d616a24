//! Domain model (wire records, events, intents, ledger, directive, world state).

pub mod decision;
pub mod directive;
pub mod event;
pub mod ids;
pub mod intent;
pub mod ledger;
pub mod message;
pub mod world;

pub use decision::{Decision, DecisionInput, DecisionSource};
pub use directive::{Directive, DirectiveKind, DirectiveSlot, DirectiveStatus};
pub use event::{RemoteEvent, ReportedStatus};
pub use ids::PeerId;
pub use intent::{Intent, PersistentSlot};
pub use ledger::{ActionLedger, EntryStatus, LedgerEntry};
pub use message::{Channel, Message, Outbound};
pub use world::{CombatStatus, Inventory, ObjectiveStatus, Target, TargetKey, WorldState};
