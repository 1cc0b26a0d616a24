//! Intent execution: ledger registration, then dispatch.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::app::remote::RemoteQueries;
use crate::domain::intent::{Intent, PersistentSlot, is_deferred_command};
use crate::domain::ledger::{ActionLedger, EntryStatus};
use crate::domain::message::Outbound;
use crate::error::TransportError;
use crate::ports::RemoteLink;

/// What one batch of intents did on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub sent: usize,
    /// Persistent settings already at the requested value.
    pub unchanged: usize,
    /// Unparseable or unknown verbs.
    pub skipped: usize,
    pub failed: usize,
}

/// What [`IntentExecutor::ensure`] did with a persistent setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingOutcome {
    /// Already known to hold; nothing sent.
    Unchanged,
    Applied,
    /// Sent, but the remote side answered with an error. The known value is left alone.
    Rejected,
}

/// Keeps the last known value of each persistent setting so unchanged ones
/// are not re-sent.
#[derive(Debug, Clone, Default)]
pub struct IntentExecutor {
    known: HashMap<PersistentSlot, String>,
}

impl IntentExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value reported by the remote side.
    pub fn observe(&mut self, slot: PersistentSlot, value: &str) {
        self.known.insert(slot, value.to_lowercase());
    }

    pub fn known(&self, slot: PersistentSlot) -> Option<&str> {
        self.known.get(&slot).map(String::as_str)
    }

    /// Register every non-deferred intent as pending, then send them in order.
    pub async fn execute(
        &mut self,
        intents: &[String],
        ledger: &mut ActionLedger,
        link: &dyn RemoteLink,
    ) -> ExecutionReport {
        for raw in intents {
            if !is_deferred_command(raw) {
                ledger.append(raw.clone(), EntryStatus::Pending, "");
            }
        }

        let remote = RemoteQueries::new(link);
        let mut report = ExecutionReport::default();

        for raw in intents {
            let Some(intent) = Intent::parse(raw) else {
                debug!(intent = %raw, "not a VERB:args intent, skipping");
                report.skipped += 1;
                continue;
            };

            if let Some((slot, value)) = intent.persistent() {
                match self.ensure(slot, value, link).await {
                    Ok(SettingOutcome::Applied) => report.sent += 1,
                    Ok(SettingOutcome::Unchanged) => report.unchanged += 1,
                    Ok(SettingOutcome::Rejected) => report.failed += 1,
                    Err(e) => {
                        warn!(intent = %raw, error = %e, "failed to send intent");
                        report.failed += 1;
                    }
                }
                continue;
            }

            let Some(outbound) = intent.to_outbound() else {
                debug!(intent = %raw, "unknown verb, not sent");
                report.skipped += 1;
                continue;
            };

            match remote.command(outbound).await {
                Ok(true) => report.sent += 1,
                Ok(false) => report.failed += 1,
                Err(e) => {
                    warn!(intent = %raw, error = %e, "failed to send intent");
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Set a persistent value unless it is already known to hold.
    pub async fn ensure(
        &mut self,
        slot: PersistentSlot,
        value: &str,
        link: &dyn RemoteLink,
    ) -> Result<SettingOutcome, TransportError> {
        let value = value.to_lowercase();
        if self.known(slot) == Some(value.as_str()) {
            return Ok(SettingOutcome::Unchanged);
        }
        let verb = match slot {
            PersistentSlot::Strategy => "STRATEGY",
            PersistentSlot::Mode => "MODE",
        };
        let accepted = RemoteQueries::new(link)
            .command(Outbound::command(verb, value.as_str()))
            .await?;
        if !accepted {
            return Ok(SettingOutcome::Rejected);
        }
        let previous = self.known.insert(slot, value.clone());
        info!(
            setting = verb,
            from = previous.as_deref().unwrap_or("?"),
            to = %value,
            "persistent mode changed"
        );
        Ok(SettingOutcome::Applied)
    }
}
