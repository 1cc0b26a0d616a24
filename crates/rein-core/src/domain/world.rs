//! The slice of remote state the core consumes.
//!
//! Field-level parsing stays shallow on purpose: only what the ledger
//! inference, the inactive-session check and the rule table read is typed.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::message::Message;

/// Identity of a target for disappearance inference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetKey {
    pub category: String,
    pub name: String,
}

impl TargetKey {
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub category: String,
    pub name: String,
    #[serde(default)]
    pub cost: i64,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub charged: bool,
    #[serde(default, rename = "chargePercent")]
    pub charge_percent: f64,
    #[serde(default, rename = "bossActive")]
    pub boss_active: bool,
}

impl Target {
    pub fn key(&self) -> TargetKey {
        TargetKey::new(self.category.clone(), self.name.clone())
    }

    fn from_value(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;
        let str_of = |k: &str, default: &str| {
            obj.get(k)
                .and_then(|v| v.as_str())
                .unwrap_or(default)
                .to_string()
        };
        Some(Self {
            category: str_of("type", "unknown"),
            name: str_of("name", "Unknown"),
            cost: obj.get("cost").and_then(|v| v.as_i64()).unwrap_or(0),
            distance: obj.get("distance").and_then(|v| v.as_f64()).unwrap_or(0.0),
            charged: obj.get("charged").and_then(|v| v.as_bool()).unwrap_or(false),
            charge_percent: obj
                .get("chargePercent")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0),
            boss_active: obj
                .get("bossActive")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        })
    }

    /// Parse an interactables response, keeping the closest target of each category.
    pub fn closest_per_category(msg: &Message) -> Vec<Target> {
        let mut closest: BTreeMap<String, Target> = BTreeMap::new();
        let list = msg
            .field("interactables")
            .and_then(|v| v.as_array())
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        for target in list.iter().filter_map(Target::from_value) {
            match closest.get(&target.category) {
                Some(existing) if existing.distance <= target.distance => {}
                _ => {
                    closest.insert(target.category.clone(), target);
                }
            }
        }
        closest.into_values().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveStatus {
    pub objective: String,
    pub charged: bool,
    pub charge: f64,
    /// The monitored flag for transition inference.
    pub boss_active: bool,
}

impl ObjectiveStatus {
    pub fn from_message(msg: &Message) -> Self {
        Self {
            objective: msg.str_field("objective").unwrap_or("exploring").to_string(),
            charged: msg.bool_field("teleporter_charged").unwrap_or(false),
            charge: msg.f64_field("teleporter_charge").unwrap_or(0.0),
            boss_active: msg.bool_field("boss_active").unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatStatus {
    /// False in lobbies, loading screens and while dead.
    pub in_game: bool,
    pub in_combat: bool,
    pub enemy_count: i64,
    pub nearest_enemy_distance: f64,
    pub strategy: String,
    pub mode: String,
    pub health_percent: Option<f64>,
}

impl CombatStatus {
    pub fn from_message(msg: &Message) -> Self {
        Self {
            in_game: msg.str_field("note") != Some("Not in game"),
            in_combat: msg.bool_field("in_combat").unwrap_or(false),
            enemy_count: msg.i64_field("enemy_count").unwrap_or(0),
            nearest_enemy_distance: msg.f64_field("nearest_enemy_distance").unwrap_or(999.0),
            strategy: msg.str_field("strategy").unwrap_or("balanced").to_string(),
            mode: msg.str_field("mode").unwrap_or("roam").to_string(),
            health_percent: msg.f64_field("health_percent"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub money: i64,
    pub equipment: String,
    pub item_count: usize,
}

impl Inventory {
    pub fn from_message(msg: &Message) -> Self {
        Self {
            money: msg.i64_field("money").unwrap_or(0),
            equipment: msg.str_field("equipment").unwrap_or("None").to_string(),
            item_count: msg
                .field("items")
                .and_then(|v| v.as_array())
                .map_or(0, Vec::len),
        }
    }
}

/// Accumulated remote state. Each query result refreshes its part; a failed
/// query leaves the previous value in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub health_percent: f64,
    pub money: i64,
    pub enemy_count: i64,
    pub nearest_enemy_distance: f64,
    pub strategy: String,
    pub mode: String,
    pub in_combat: bool,
    pub objective_charged: bool,
    pub objective_charge: f64,
    pub boss_active: bool,
    pub targets: Vec<Target>,
    pub ally_count: usize,
}

impl Default for WorldState {
    fn default() -> Self {
        Self {
            health_percent: 100.0,
            money: 0,
            enemy_count: 0,
            nearest_enemy_distance: 999.0,
            strategy: "balanced".to_string(),
            mode: "roam".to_string(),
            in_combat: false,
            objective_charged: false,
            objective_charge: 0.0,
            boss_active: false,
            targets: Vec::new(),
            ally_count: 0,
        }
    }
}

impl WorldState {
    pub fn update_targets(&mut self, targets: Vec<Target>) {
        if let Some(objective) = targets.iter().find(|t| t.category == "teleporter") {
            self.objective_charged = objective.charged;
            self.objective_charge = objective.charge_percent;
            self.boss_active = objective.boss_active;
        }
        self.targets = targets;
    }

    pub fn update_objective(&mut self, objective: &ObjectiveStatus) {
        self.objective_charged = objective.charged;
        self.objective_charge = objective.charge;
        self.boss_active = objective.boss_active;
    }

    pub fn update_allies(&mut self, count: usize) {
        self.ally_count = count;
    }

    pub fn update_inventory(&mut self, inventory: &Inventory) {
        self.money = inventory.money;
    }

    pub fn update_combat(&mut self, combat: &CombatStatus) {
        self.in_combat = combat.in_game && combat.in_combat;
        self.enemy_count = combat.enemy_count;
        self.nearest_enemy_distance = combat.nearest_enemy_distance;
        self.strategy = combat.strategy.clone();
        self.mode = combat.mode.clone();
        if let Some(hp) = combat.health_percent {
            self.health_percent = hp;
        }
    }

    pub fn target_keys(&self) -> HashSet<TargetKey> {
        self.targets.iter().map(Target::key).collect()
    }

    pub fn is_critical_health(&self) -> bool {
        self.health_percent < 30.0
    }

    pub fn is_low_health(&self) -> bool {
        self.health_percent < 50.0
    }

    pub fn is_surrounded(&self) -> bool {
        self.enemy_count >= 5
    }

    pub fn should_be_defensive(&self) -> bool {
        self.is_critical_health() || (self.is_low_health() && self.is_surrounded())
    }

    pub fn should_be_aggressive(&self) -> bool {
        self.health_percent > 70.0 && self.boss_active && !self.is_surrounded()
    }

    /// Cheapest-to-reach chest the current money can pay for.
    pub fn nearest_affordable_chest(&self) -> Option<&Target> {
        self.targets
            .iter()
            .filter(|t| t.category == "chest" && t.cost <= self.money)
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// Text summary handed to the decision provider.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "State:\n\
             - Health: {:.0}%\n\
             - Money: {}\n\
             - Enemies: {} (closest {:.0}m)\n\
             - Strategy: {}\n\
             - Mode: {}\n\
             - In combat: {}\n\
             - Objective: {:.0}% charged (boss: {})\n",
            self.health_percent,
            self.money,
            self.enemy_count,
            self.nearest_enemy_distance,
            self.strategy,
            self.mode,
            self.in_combat,
            self.objective_charge,
            self.boss_active,
        );
        if self.targets.is_empty() {
            out.push_str("- Nearby targets: none\n");
        } else {
            let list: Vec<String> = self
                .targets
                .iter()
                .map(|t| format!("{}({}, {:.0}m, ${})", t.name, t.category, t.distance, t.cost))
                .collect();
            out.push_str(&format!("- Nearby targets: {}\n", list.join(", ")));
        }
        if self.ally_count > 0 {
            out.push_str(&format!("- Allies: {}\n", self.ally_count));
        }
        out
    }
}
