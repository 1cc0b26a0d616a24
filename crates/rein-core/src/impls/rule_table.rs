//! Deterministic fallback: a fixed priority table over the world state.
//!
//! Pure function (world state -> decision), no side effects. Used when no
//! generative provider is configured or when it fails.

use crate::domain::decision::{Decision, DecisionSource};
use crate::domain::world::WorldState;

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleTable;

impl RuleTable {
    pub fn new() -> Self {
        Self
    }

    pub fn decide(&self, world: &WorldState) -> Decision {
        let (intents, rationale): (Vec<&str>, String) = if world.is_critical_health() {
            (
                vec!["STRATEGY:defensive", "GOTO:CANCEL", "MODE:roam"],
                format!("Critical health ({:.0}%), retreating", world.health_percent),
            )
        } else if world.objective_charged {
            (
                vec!["FIND_AND_INTERACT:teleporter"],
                "Teleporter charged, activating for next stage".to_string(),
            )
        } else if world.objective_charge > 0.0 {
            (
                vec!["MODE:combat", "STRATEGY:balanced"],
                format!("Teleporter charging ({:.0}%), defending", world.objective_charge),
            )
        } else if let Some(chest) = world
            .nearest_affordable_chest()
            .filter(|_| !world.in_combat && world.money > 0)
        {
            (
                vec!["FIND_AND_INTERACT:chest", "MODE:combat"],
                format!("Opening chest (cost: {})", chest.cost),
            )
        } else if world.boss_active && world.health_percent > 60.0 {
            (
                vec!["STRATEGY:aggressive", "MODE:combat"],
                "Boss active, engaging aggressively".to_string(),
            )
        } else if world.should_be_defensive() {
            (
                vec!["STRATEGY:defensive", "MODE:roam"],
                "Defensive exploration".to_string(),
            )
        } else if world.should_be_aggressive() {
            (
                vec!["STRATEGY:aggressive", "MODE:roam"],
                "Aggressive exploration".to_string(),
            )
        } else {
            (
                vec!["STRATEGY:balanced", "MODE:roam"],
                "Balanced exploration".to_string(),
            )
        };

        Decision::new(
            intents.into_iter().map(str::to_string).collect(),
            rationale,
            DecisionSource::Rules,
        )
    }
}
