//! DecisionDriver - 周期的な decision loop
//!
//! 1 tick の流れ:
//! 1. 接続がなければ何もしない
//! 2. query battery を投げて world state を更新
//! 3. session が無効（lobby / loading）なら decide しない
//! 4. event を ledger に取り込み、target の消失と objective flag の変化から完了を推論
//! 5. directive の期限切れ / 達成を整理
//! 6. provider で decide（失敗時・未設定時は `RuleTable`）して execute
//!
//! `spawn()` で background task に載せ、`DriverHandle` から停止と directive 操作を行います。
//! 停止要求は tick の途中では割り込まず、進行中の tick が終わってから抜けます。

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::app::executor::{ExecutionReport, IntentExecutor, SettingOutcome};
use crate::app::remote::{RemoteQueries, Snapshot};
use crate::config::DriverConfig;
use crate::domain::decision::{Decision, DecisionInput, DecisionSource};
use crate::domain::directive::{DirectiveKind, DirectiveSlot, DirectiveStatus};
use crate::domain::event::RemoteEvent;
use crate::domain::intent::PersistentSlot;
use crate::domain::ledger::ActionLedger;
use crate::domain::world::{TargetKey, WorldState};
use crate::error::{ConfigError, ReinError};
use crate::impls::RuleTable;
use crate::ports::{Clock, DecisionProvider, RemoteLink, SystemClock};

/// Intents remembered across ticks. The provider only sees the tail.
const RECENT_INTENT_MEMORY: usize = 10;
const TIMING_LOG_EVERY: u64 = 5;

/// What a single tick ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Disconnected,
    /// Connected, but the remote side reports no active session.
    Inactive,
    Decided {
        source: DecisionSource,
        report: ExecutionReport,
    },
}

/// Shared view of the directive slot, usable from outside the loop.
#[derive(Clone)]
pub struct DirectiveHandle {
    slot: Arc<Mutex<DirectiveSlot>>,
    clock: Arc<dyn Clock>,
}

impl DirectiveHandle {
    /// Replace the current directive. Returns the kind it was classified as.
    pub fn set(&self, text: &str) -> DirectiveKind {
        let now = self.clock.now();
        self.lock().set(text, now).kind
    }

    /// Returns whether a directive was active.
    pub fn clear(&self) -> bool {
        self.lock().clear().is_some()
    }

    pub fn status(&self) -> Option<DirectiveStatus> {
        let now = self.clock.now();
        self.lock().status(now)
    }

    fn lock(&self) -> MutexGuard<'_, DirectiveSlot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// DriverBuilder は driver のワイヤリングを担当
///
/// # 使用例
/// ```ignore
/// let driver = DriverBuilder::new(bridge)
///     .maybe_provider(provider)
///     .config(config.driver.clone())
///     .build()?;
/// let handle = driver.spawn();
/// ```
pub struct DriverBuilder {
    link: Arc<dyn RemoteLink>,
    provider: Option<Arc<dyn DecisionProvider>>,
    clock: Arc<dyn Clock>,
    config: DriverConfig,
}

impl DriverBuilder {
    pub fn new(link: Arc<dyn RemoteLink>) -> Self {
        Self {
            link,
            provider: None,
            clock: Arc::new(SystemClock),
            config: DriverConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn DecisionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// `None` leaves the rule table as the only decider.
    pub fn maybe_provider(mut self, provider: Option<Arc<dyn DecisionProvider>>) -> Self {
        self.provider = provider;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    /// 起動前に設定を検証（Fail-fast）
    pub fn build(self) -> Result<DecisionDriver, ConfigError> {
        if self.config.interval_ms == 0 {
            return Err(ConfigError::Invalid("driver.interval_ms must be > 0".into()));
        }
        if self.config.ledger_capacity == 0 {
            return Err(ConfigError::Invalid("driver.ledger_capacity must be > 0".into()));
        }

        match &self.provider {
            Some(p) => info!(provider = p.name(), "decision driver ready"),
            None => info!("decision driver ready (rule table only)"),
        }

        Ok(DecisionDriver {
            link: self.link,
            provider: self.provider,
            rules: RuleTable::new(),
            clock: self.clock,
            directives: Arc::new(Mutex::new(DirectiveSlot::new())),
            ledger: ActionLedger::new(self.config.ledger_capacity),
            executor: IntentExecutor::new(),
            world: WorldState::default(),
            last_targets: HashSet::new(),
            boss_seen: false,
            recent_intents: Vec::new(),
            iteration: 0,
            posture_sent: false,
            config: self.config,
        })
    }
}

pub struct DecisionDriver {
    link: Arc<dyn RemoteLink>,
    provider: Option<Arc<dyn DecisionProvider>>,
    rules: RuleTable,
    clock: Arc<dyn Clock>,
    directives: Arc<Mutex<DirectiveSlot>>,
    ledger: ActionLedger,
    executor: IntentExecutor,
    world: WorldState,
    /// Targets seen by the last successful interactables query.
    last_targets: HashSet<TargetKey>,
    /// Objective flag as of the previous tick.
    boss_seen: bool,
    recent_intents: Vec<String>,
    iteration: u64,
    posture_sent: bool,
    config: DriverConfig,
}

impl DecisionDriver {
    pub fn directives(&self) -> DirectiveHandle {
        DirectiveHandle {
            slot: Arc::clone(&self.directives),
            clock: Arc::clone(&self.clock),
        }
    }

    pub fn ledger(&self) -> &ActionLedger {
        &self.ledger
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// Completed decision rounds.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub async fn tick(&mut self) -> Result<TickOutcome, ReinError> {
        if !self.link.is_connected() {
            debug!("no peer connected, skipping tick");
            return Ok(TickOutcome::Disconnected);
        }
        let started = Instant::now();

        let snapshot = RemoteQueries::new(self.link.as_ref()).snapshot().await;
        let targets_refreshed = snapshot.targets.is_some();
        let active = snapshot.session_active();
        self.absorb(snapshot);

        if !active {
            debug!("no active session, skipping decision");
            return Ok(TickOutcome::Inactive);
        }

        if !self.posture_sent {
            self.send_initial_posture().await?;
        }

        for msg in self.link.poll_events() {
            let event = RemoteEvent::from_message(&msg);
            let touched = self.ledger.apply(&event);
            debug!(event = event.name(), touched, "event applied");
        }

        // a failed interactables query says nothing about what disappeared
        if targets_refreshed {
            let current = self.world.target_keys();
            self.ledger.infer_from_disappearance(&self.last_targets, &current);
            self.last_targets = current;
        }
        self.ledger
            .infer_from_transition(self.boss_seen, self.world.boss_active);
        self.boss_seen = self.world.boss_active;

        let directive = {
            let now = self.clock.now();
            let mut slot = self.directives.lock().unwrap_or_else(|e| e.into_inner());
            slot.expire(now);
            slot.auto_clear(&self.ledger);
            slot.current_text(now).map(str::to_string)
        };

        let decision = self.decide(directive.as_deref()).await;
        debug!(
            source = decision.source.as_str(),
            intents = ?decision.intents(),
            rationale = %decision.rationale,
            "decided"
        );

        self.remember(decision.intents());
        let report = self
            .executor
            .execute(decision.intents(), &mut self.ledger, self.link.as_ref())
            .await;

        self.iteration += 1;
        if self.iteration % TIMING_LOG_EVERY == 0 {
            info!(
                iteration = self.iteration,
                elapsed_ms = started.elapsed().as_millis() as u64,
                source = decision.source.as_str(),
                rationale = %decision.rationale,
                "tick"
            );
        }

        Ok(TickOutcome::Decided {
            source: decision.source,
            report,
        })
    }

    /// Run ticks until shutdown is requested.
    pub fn spawn(self) -> DriverHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let directives = self.directives();
        let join = tokio::spawn(run(self, shutdown_rx));
        DriverHandle {
            shutdown_tx,
            join,
            directives,
        }
    }

    fn absorb(&mut self, snapshot: Snapshot) {
        if let Some(targets) = snapshot.targets {
            self.world.update_targets(targets);
        }
        if let Some(count) = snapshot.ally_count {
            self.world.update_allies(count);
        }
        if let Some(objective) = &snapshot.objective {
            self.world.update_objective(objective);
        }
        if let Some(combat) = &snapshot.combat {
            self.world.update_combat(combat);
            if combat.in_game {
                self.executor.observe(PersistentSlot::Strategy, &combat.strategy);
                self.executor.observe(PersistentSlot::Mode, &combat.mode);
            }
        }
        if let Some(inventory) = &snapshot.inventory {
            self.world.update_inventory(inventory);
        }
    }

    /// Configured strategy and mode, once per driver. Not recorded in the ledger.
    /// A rejected setting leaves the posture pending for the next tick.
    async fn send_initial_posture(&mut self) -> Result<(), ReinError> {
        let link = self.link.as_ref();
        let strategy = self
            .executor
            .ensure(PersistentSlot::Strategy, &self.config.initial_strategy, link)
            .await?;
        let mode = self
            .executor
            .ensure(PersistentSlot::Mode, &self.config.initial_mode, link)
            .await?;
        if strategy == SettingOutcome::Rejected || mode == SettingOutcome::Rejected {
            warn!(?strategy, ?mode, "initial posture rejected, retrying next tick");
            return Ok(());
        }
        self.posture_sent = true;
        Ok(())
    }

    async fn decide(&self, directive: Option<&str>) -> Decision {
        let Some(provider) = &self.provider else {
            return self.rules.decide(&self.world);
        };

        let mut summary = self.world.summary();
        let history = self.ledger.summarize(self.config.summary_entries);
        if !history.is_empty() {
            summary.push('\n');
            summary.push_str(&history);
        }
        let input = DecisionInput::new(summary, &self.recent_intents, directive);

        match provider.decide(&input).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "provider failed, using rule table");
                self.rules.decide(&self.world)
            }
        }
    }

    fn remember(&mut self, intents: &[String]) {
        self.recent_intents.extend(intents.iter().cloned());
        if self.recent_intents.len() > RECENT_INTENT_MEMORY {
            let excess = self.recent_intents.len() - RECENT_INTENT_MEMORY;
            self.recent_intents.drain(..excess);
        }
    }
}

async fn run(mut driver: DecisionDriver, mut shutdown_rx: watch::Receiver<bool>) -> DecisionDriver {
    let interval = driver.config.interval();
    info!(interval_ms = driver.config.interval_ms, "decision loop started");
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        match driver.tick().await {
            Ok(outcome) => debug!(?outcome, "tick finished"),
            Err(e) => error!(error = %e, kind = ?e.kind(), "tick failed"),
        }

        tokio::select! {
            // sender dropped counts as shutdown too
            _ = shutdown_rx.changed() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    info!(iterations = driver.iteration, "decision loop stopped");
    driver
}

/// Handle to a spawned driver.
pub struct DriverHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<DecisionDriver>,
    directives: DirectiveHandle,
}

impl DriverHandle {
    pub fn directives(&self) -> &DirectiveHandle {
        &self.directives
    }

    /// Ask the loop to stop after the current tick.
    pub fn request_shutdown(&self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Stop and hand the driver back. `None` if the loop panicked.
    pub async fn shutdown_and_join(self) -> Option<DecisionDriver> {
        self.request_shutdown();
        match self.join.await {
            Ok(driver) => Some(driver),
            Err(e) => {
                error!(error = %e, "decision loop ended abnormally");
                None
            }
        }
    }
}
