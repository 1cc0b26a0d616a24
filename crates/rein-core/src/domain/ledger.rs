//! Action ledger: issued intents and their evolving completion status.
//!
//! Evidence arrives from three places: explicit remote events, targets that
//! vanish between two observations, and a monitored flag flipping on. All three
//! funnel through [`LedgerEntry::transition`], so a status never moves backward.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::event::{RemoteEvent, ReportedStatus};
use crate::domain::intent::{is_navigation, is_target_seeking, references_category, references_objective};
use crate::domain::world::TargetKey;

pub const DEFAULT_CAPACITY: usize = 10;

/// Entry status.
///
/// State transitions:
/// - Pending -> Success | Failed | Interrupted
/// - Interrupted -> Success | Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Issued (or reported started), no outcome yet.
    Pending,

    /// Cut short by combat. Can still resolve.
    Interrupted,

    Success,

    Failed,
}

impl EntryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, EntryStatus::Success | EntryStatus::Failed)
    }

    /// Pending or interrupted: still waiting for evidence.
    pub fn is_open(self) -> bool {
        !self.is_terminal()
    }

    pub fn can_transition_to(self, next: EntryStatus) -> bool {
        use EntryStatus::*;
        matches!(
            (self, next),
            (Pending, Success | Failed | Interrupted) | (Interrupted, Success | Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Interrupted => "interrupted",
            EntryStatus::Success => "success",
            EntryStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ReportedStatus> for EntryStatus {
    fn from(status: ReportedStatus) -> Self {
        match status {
            ReportedStatus::Success => EntryStatus::Success,
            ReportedStatus::Failed => EntryStatus::Failed,
            ReportedStatus::Interrupted => EntryStatus::Interrupted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Insertion order, unique for the ledger's lifetime.
    pub seq: u64,
    pub command: String,
    pub status: EntryStatus,
    pub reason: String,
}

impl LedgerEntry {
    /// Move to `next` if the transition is allowed. Returns whether it moved.
    pub fn transition(&mut self, next: EntryStatus, reason: impl Into<String>) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.reason = reason.into();
        true
    }
}

/// Bounded, ordered log of issued intents. The oldest entry is evicted on
/// overflow regardless of its status.
#[derive(Debug, Clone)]
pub struct ActionLedger {
    entries: VecDeque<LedgerEntry>,
    capacity: usize,
    next_seq: u64,
}

impl Default for ActionLedger {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ActionLedger {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_seq: 0,
        }
    }

    pub fn append(
        &mut self,
        command: impl Into<String>,
        status: EntryStatus,
        reason: impl Into<String>,
    ) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push_back(LedgerEntry {
            seq,
            command: command.into(),
            status,
            reason: reason.into(),
        });
        while self.entries.len() > self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                debug!(command = %evicted.command, status = %evicted.status, "ledger entry evicted");
            }
        }
        seq
    }

    /// Fold one remote event into the ledger. Returns the number of entries touched.
    pub fn apply(&mut self, event: &RemoteEvent) -> usize {
        match event {
            RemoteEvent::Started {
                command,
                target,
                distance,
            } => {
                let reason = format!(
                    "found {} at {}m",
                    target.as_deref().unwrap_or("?"),
                    distance.map(|d| format!("{d:.0}")).unwrap_or_else(|| "?".to_string()),
                );
                if let Some(entry) = self
                    .entries
                    .iter_mut()
                    .find(|e| e.status == EntryStatus::Pending && e.command == *command)
                {
                    entry.reason = reason;
                    debug!(command = %command, "start refreshed existing entry");
                } else {
                    info!(command = %command, reason = %reason, "action started");
                    self.append(command.clone(), EntryStatus::Pending, reason);
                }
                1
            }
            RemoteEvent::Completed { command, status } => {
                let next = EntryStatus::from(*status);
                match self
                    .entries
                    .iter_mut()
                    .find(|e| e.status.can_transition_to(next) && e.command == *command)
                {
                    Some(entry) => {
                        entry.transition(next, "completed");
                        info!(command = %command, status = %next, "action completed");
                        1
                    }
                    None => {
                        debug!(command = %command, "completion with no open entry");
                        0
                    }
                }
            }
            RemoteEvent::Failed { command, reason } => {
                match self
                    .entries
                    .iter_mut()
                    .find(|e| e.status == EntryStatus::Pending && e.command == *command)
                {
                    Some(entry) => {
                        entry.transition(EntryStatus::Failed, reason.clone());
                    }
                    None => {
                        self.append(command.clone(), EntryStatus::Failed, reason.clone());
                    }
                }
                info!(command = %command, reason = %reason, "action failed");
                1
            }
            RemoteEvent::Stuck => {
                let touched = self.transition_where(
                    |e| e.status == EntryStatus::Pending && is_navigation(&e.command),
                    EntryStatus::Failed,
                    "stuck",
                );
                info!(touched, "navigation stuck");
                touched
            }
            RemoteEvent::CombatEntered => {
                let touched = self.transition_where(
                    |e| {
                        e.status == EntryStatus::Pending
                            && is_target_seeking(&e.command)
                            && !references_objective(&e.command)
                    },
                    EntryStatus::Interrupted,
                    "combat",
                );
                info!(touched, "combat entered");
                touched
            }
            RemoteEvent::LowHealth => {
                info!("low health reported");
                0
            }
            RemoteEvent::Unknown { event_type } => {
                debug!(event_type = %event_type, "ignoring unknown event");
                0
            }
        }
    }

    /// Targets seen in `previous` but gone from `current` were consumed. Every
    /// open entry seeking that category resolves to success.
    pub fn infer_from_disappearance(
        &mut self,
        previous: &HashSet<TargetKey>,
        current: &HashSet<TargetKey>,
    ) -> usize {
        let mut gone: Vec<&TargetKey> = previous.difference(current).collect();
        gone.sort();

        let mut touched = 0;
        for target in gone {
            let reason = format!("{} opened", target.name);
            let n = self.transition_where(
                |e| e.status.is_open() && references_category(&e.command, &target.category),
                EntryStatus::Success,
                &reason,
            );
            if n > 0 {
                info!(category = %target.category, name = %target.name, resolved = n, "target consumed");
            }
            touched += n;
        }
        touched
    }

    /// A false -> true flip of the monitored flag resolves open objective entries.
    pub fn infer_from_transition(&mut self, previous: bool, current: bool) -> usize {
        if previous || !current {
            return 0;
        }
        let touched = self.transition_where(
            |e| e.status.is_open() && references_objective(&e.command),
            EntryStatus::Success,
            "teleporter activated (boss spawned)",
        );
        if touched > 0 {
            info!(resolved = touched, "objective activated");
        }
        touched
    }

    /// The last `n` entries as text for the decision provider. Empty when there is no history.
    pub fn summarize(&self, n: usize) -> String {
        if self.entries.is_empty() || n == 0 {
            return String::new();
        }
        let mut out = String::from("Recent Action History:");
        for e in self.recent(n) {
            out.push_str(&format!("\n• {} → {}", e.command, e.status));
            if !e.reason.is_empty() {
                out.push_str(&format!(" ({})", e.reason));
            }
        }
        out
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter().skip(self.entries.len().saturating_sub(n))
    }

    pub fn entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn transition_where<F>(&mut self, pred: F, next: EntryStatus, reason: &str) -> usize
    where
        F: Fn(&LedgerEntry) -> bool,
    {
        self.entries
            .iter_mut()
            .filter(|e| pred(e))
            .map(|e| e.transition(next, reason))
            .filter(|moved| *moved)
            .count()
    }
}
