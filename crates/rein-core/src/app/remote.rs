//! Typed facade over the query battery.
//!
//! Every query may fail on its own. A failure (transport error or an error
//! response) is `None`; callers combine whatever came back.

use tracing::{debug, warn};

use crate::domain::message::{Message, Outbound};
use crate::domain::world::{CombatStatus, Inventory, ObjectiveStatus, Target};
use crate::error::TransportError;
use crate::ports::RemoteLink;

pub const QUERY_INTERACTABLES: &str = "QUERY_INTERACTABLES";
pub const QUERY_ALLIES: &str = "QUERY_ALLIES";
pub const QUERY_OBJECTIVE: &str = "QUERY_OBJECTIVE";
pub const QUERY_COMBAT_STATUS: &str = "QUERY_COMBAT_STATUS";
pub const QUERY_INVENTORY: &str = "QUERY_INVENTORY";

/// Results of one round of queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Closest target of each category.
    pub targets: Option<Vec<Target>>,
    pub ally_count: Option<usize>,
    pub objective: Option<ObjectiveStatus>,
    pub combat: Option<CombatStatus>,
    pub inventory: Option<Inventory>,
}

impl Snapshot {
    /// False only when combat status came back and says there is no active session.
    pub fn session_active(&self) -> bool {
        self.combat.as_ref().is_none_or(|c| c.in_game)
    }
}

pub struct RemoteQueries<'a> {
    link: &'a dyn RemoteLink,
}

impl<'a> RemoteQueries<'a> {
    pub fn new(link: &'a dyn RemoteLink) -> Self {
        Self { link }
    }

    /// Run the whole battery in order.
    pub async fn snapshot(&self) -> Snapshot {
        Snapshot {
            targets: self.interactables().await,
            ally_count: self.allies().await,
            objective: self.objective().await,
            combat: self.combat_status().await,
            inventory: self.inventory().await,
        }
    }

    pub async fn interactables(&self) -> Option<Vec<Target>> {
        self.query(QUERY_INTERACTABLES)
            .await
            .map(|msg| Target::closest_per_category(&msg))
    }

    pub async fn allies(&self) -> Option<usize> {
        self.query(QUERY_ALLIES).await.map(|msg| {
            msg.field("allies")
                .and_then(|v| v.as_array())
                .map_or(0, Vec::len)
        })
    }

    pub async fn objective(&self) -> Option<ObjectiveStatus> {
        self.query(QUERY_OBJECTIVE)
            .await
            .map(|msg| ObjectiveStatus::from_message(&msg))
    }

    pub async fn combat_status(&self) -> Option<CombatStatus> {
        self.query(QUERY_COMBAT_STATUS)
            .await
            .map(|msg| CombatStatus::from_message(&msg))
    }

    pub async fn inventory(&self) -> Option<Inventory> {
        self.query(QUERY_INVENTORY)
            .await
            .map(|msg| Inventory::from_message(&msg))
    }

    /// Send a command record. `Ok(false)` when the remote side answered with an error.
    pub async fn command(&self, outbound: Outbound) -> Result<bool, TransportError> {
        let msg = self.link.send_query(outbound).await?;
        if msg.is_error() {
            warn!(response = %msg.kind(), error = ?msg.field("error"), "command rejected");
            return Ok(false);
        }
        Ok(true)
    }

    async fn query(&self, kind: &str) -> Option<Message> {
        match self.link.send_query(Outbound::query(kind)).await {
            Ok(msg) if msg.is_error() => {
                debug!(query = kind, error = ?msg.field("error"), "query answered with error");
                None
            }
            Ok(msg) => Some(msg),
            Err(e) => {
                debug!(query = kind, error = %e, "query failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::FakeLink;
    use crate::domain::message::COMMAND_TYPE;
    use serde_json::json;

    #[tokio::test]
    async fn failed_queries_leave_holes() {
        let link = FakeLink::connected();
        link.answer(QUERY_INVENTORY, json!({"type": "INVENTORY", "money": 40, "items": [1, 2]}));
        link.answer(QUERY_OBJECTIVE, json!({"type": "OBJECTIVE", "error": "Not in game"}));

        let snap = RemoteQueries::new(&link).snapshot().await;
        assert_eq!(snap.inventory.as_ref().map(|i| (i.money, i.item_count)), Some((40, 2)));
        assert!(snap.objective.is_none());
        assert!(snap.targets.is_none());
        // no combat status means nothing says the session is over
        assert!(snap.session_active());
    }

    #[tokio::test]
    async fn closest_target_per_category() {
        let link = FakeLink::connected();
        link.answer(
            QUERY_INTERACTABLES,
            json!({"type": "INTERACTABLES", "interactables": [
                {"type": "chest", "name": "Far", "distance": 40.0},
                {"type": "chest", "name": "Near", "distance": 8.0},
                {"type": "shrine", "name": "Shrine_1", "distance": 20.0}
            ]}),
        );
        let targets = RemoteQueries::new(&link).interactables().await.unwrap();
        let names: Vec<_> = targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Near", "Shrine_1"]);
    }

    #[tokio::test]
    async fn not_in_game_marks_session_inactive() {
        let link = FakeLink::connected();
        link.answer(QUERY_COMBAT_STATUS, json!({"type": "COMBAT_STATUS", "note": "Not in game"}));
        let snap = RemoteQueries::new(&link).snapshot().await;
        assert!(!snap.session_active());
    }

    #[tokio::test]
    async fn rejected_command_is_not_an_error() {
        let link = FakeLink::connected();
        link.answer(COMMAND_TYPE, json!({"type": "error", "error": "unknown command"}));
        let ok = RemoteQueries::new(&link)
            .command(Outbound::command("MODE", "dance"))
            .await
            .unwrap();
        assert!(!ok);
    }
}
