//! Orchestrator that owns the active sub-machine and the control surface.
//!
//! Controller-level state machine:
//!
//! ```text
//! UNCONFIGURED -> POLLING <-> WATCHING
//! ```
//!
//! `UNCONFIGURED` is entered at startup without an account and left once one
//! is set. In `POLLING` the poller drives the ticker; a live-check that finds
//! a session switches to `WATCHING`, where the watcher drives it. The two
//! schedules are never armed at the same time: mode transitions re-arm the
//! single ticker at the new period, and each tick handler runs to completion
//! (network call included) before the next tick is considered.
//!
//! A severe poll failure sets a halted flag instead of tearing the loop
//! down; ticks are ignored until a forced re-check (or a config change)
//! restarts the schedule.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::checker::LiveStatusProvider;
use crate::settings::Settings;
use crate::tracker::poller::{PollOutcome, Poller};
use crate::tracker::watcher::{WatchOutcome, Watcher};
use crate::tracker::{CheckConfig, TrackerCommand};
use crate::types::{Lane, LiveSession, TrackerEvent};
use crate::viewer::PresencePinger;

/// Seconds between poll ticks; the check counter counts these, which is
/// what makes its unit "minutes".
const POLL_TICK_SECS: u64 = 60;

/// Which sub-machine currently drives the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// No account configured; nothing scheduled.
    Unconfigured,
    /// Poller active, watcher idle.
    Polling,
    /// Watcher active, poller idle.
    Watching,
}

/// Follow-up action while driving a transition chain.
enum Step {
    PollTick,
    Check,
    WatchTick,
}

/// Cloneable control surface for the tracker task.
///
/// All operations are fire-and-forget commands handed to the run loop, so
/// they are safe to invoke from any task.
#[derive(Clone)]
pub struct TrackerHandle {
    commands: mpsc::UnboundedSender<TrackerCommand>,
    cancel: CancellationToken,
}

impl TrackerHandle {
    /// Enable or disable a lane.
    pub fn set_lane_enabled(&self, lane: Lane, enabled: bool) {
        self.send(TrackerCommand::SetLaneEnabled { lane, enabled });
    }

    /// Change the idle poll interval.
    pub fn set_poll_interval(&self, minutes: u32) {
        self.send(TrackerCommand::SetPollInterval { minutes });
    }

    /// Replace the account identity.
    pub fn set_account(&self, account: impl Into<String>) {
        self.send(TrackerCommand::SetAccount {
            account: account.into(),
        });
    }

    /// Run a live-check now (recovery path after a severe failure).
    pub fn force_check(&self) {
        self.send(TrackerCommand::ForceCheck);
    }

    /// Gracefully stop the tracker, optionally reporting in-flight progress.
    pub fn prepare_to_exit(&self, flush_outstanding: bool) {
        self.send(TrackerCommand::PrepareToExit { flush_outstanding });
    }

    /// Hard-stop the run loop without draining anything.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn send(&self, command: TrackerCommand) {
        if self.commands.send(command).is_err() {
            warn!("tracker command dropped, task has stopped");
        }
    }
}

/// The tracker orchestrator. Construct with [`Controller::new`], then hand
/// the returned controller to [`Controller::run`] on a task of its own.
pub struct Controller {
    config: CheckConfig,
    account: String,
    mode: Mode,
    halted: bool,
    rearm: bool,
    poller: Poller,
    watcher: Watcher,
    commands: mpsc::UnboundedReceiver<TrackerCommand>,
    cancel: CancellationToken,
}

impl Controller {
    /// Build a controller plus its control handle and event stream.
    ///
    /// Starts in `POLLING` when the settings carry an account, otherwise in
    /// `UNCONFIGURED` until one arrives via [`TrackerHandle::set_account`].
    pub fn new(
        settings: &Settings,
        provider: Arc<dyn LiveStatusProvider>,
        pinger: Arc<dyn PresencePinger>,
    ) -> (
        Self,
        TrackerHandle,
        mpsc::UnboundedReceiver<TrackerEvent>,
    ) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let mode = if settings.has_account() {
            Mode::Polling
        } else {
            warn!("no account configured, tracker idle until one is set");
            Mode::Unconfigured
        };

        let controller = Self {
            config: CheckConfig::from_settings(settings),
            account: settings.account.clone(),
            mode,
            halted: false,
            rearm: false,
            poller: Poller::new(provider, event_tx.clone()),
            watcher: Watcher::new(pinger, event_tx),
            commands: command_rx,
            cancel: cancel.clone(),
        };
        let handle = TrackerHandle {
            commands: command_tx,
            cancel,
        };
        (controller, handle, event_rx)
    }

    /// Current controller mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Run the tracker until told to exit.
    ///
    /// Performs the initial live-check immediately when configured, then
    /// alternates between ticker fires and inbound commands.
    pub async fn run(mut self) {
        info!("tracker started");
        if self.mode == Mode::Polling {
            self.drive(Step::Check).await;
        }

        let mut ticker = self.new_ticker();
        loop {
            if self.rearm {
                self.rearm = false;
                ticker = self.new_ticker();
            }
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("tracker cancelled");
                    break;
                }
                _ = ticker.tick() => self.on_tick().await,
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command).await {
                            break;
                        }
                    }
                    // Every handle dropped; nobody is listening anymore.
                    None => break,
                },
            }
        }
        info!("tracker stopped");
    }

    /// Build the ticker for the current mode, consuming the immediate first
    /// fire so the next tick lands a full period out.
    fn new_ticker(&self) -> tokio::time::Interval {
        let secs = match self.mode {
            Mode::Watching => u64::from(self.config.watch_interval_secs),
            _ => POLL_TICK_SECS,
        };
        let mut ticker = tokio::time::interval(Duration::from_secs(secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.reset();
        ticker
    }

    /// Dispatch one ticker fire to the active sub-machine.
    async fn on_tick(&mut self) {
        match self.mode {
            Mode::Unconfigured => {}
            // Halted: a severe failure disarmed the schedule.
            Mode::Polling if self.halted => {}
            Mode::Polling => self.drive(Step::PollTick).await,
            Mode::Watching => self.drive(Step::WatchTick).await,
        }
    }

    /// Run one step and follow the resulting transitions until the machine
    /// settles. Chains are short: a check that finds a session pings once,
    /// and a dying session triggers at most one immediate re-check.
    async fn drive(&mut self, first: Step) {
        let mut next = Some(first);
        while let Some(step) = next.take() {
            next = match step {
                Step::PollTick => {
                    let outcome = self.poller.on_tick(&self.config).await;
                    self.absorb_poll(outcome)
                }
                Step::Check => {
                    let outcome = self.poller.check_once(&self.config).await;
                    self.absorb_poll(outcome)
                }
                Step::WatchTick => {
                    let outcome = self.watcher.on_tick(&self.account).await;
                    self.absorb_watch(outcome)
                }
            };
        }
    }

    fn absorb_poll(&mut self, outcome: PollOutcome) -> Option<Step> {
        match outcome {
            PollOutcome::Idle => None,
            PollOutcome::Halted => {
                self.halted = true;
                None
            }
            PollOutcome::Live(session) => {
                self.enter_watching(session);
                // First ping goes out immediately.
                Some(Step::WatchTick)
            }
        }
    }

    fn absorb_watch(&mut self, outcome: WatchOutcome) -> Option<Step> {
        match outcome {
            WatchOutcome::Continue | WatchOutcome::Retry => None,
            WatchOutcome::HandBack { recheck } => {
                self.enter_polling();
                recheck.then_some(Step::Check)
            }
        }
    }

    fn enter_watching(&mut self, session: LiveSession) {
        self.mode = Mode::Watching;
        self.rearm = true;
        self.watcher.begin(session);
    }

    fn enter_polling(&mut self) {
        debug!("poll schedule (re)armed");
        self.mode = Mode::Polling;
        self.halted = false;
        self.rearm = true;
        self.poller.reset();
    }

    /// Apply one command. Returns true when the run loop should exit.
    async fn handle_command(&mut self, command: TrackerCommand) -> bool {
        match command {
            TrackerCommand::SetLaneEnabled { lane, enabled } => {
                self.set_lane_enabled(lane, enabled).await;
            }
            TrackerCommand::SetPollInterval { minutes } => {
                let minutes = minutes.max(1);
                info!(minutes, "poll interval updated");
                self.config.poll_interval_mins = minutes;
            }
            TrackerCommand::SetAccount { account } => {
                self.set_account(account).await;
            }
            TrackerCommand::ForceCheck => {
                self.force_check().await;
            }
            TrackerCommand::PrepareToExit { flush_outstanding } => {
                info!("preparing to exit");
                if flush_outstanding {
                    self.watcher.finish();
                } else {
                    self.watcher.abandon();
                }
                self.mode = Mode::Unconfigured;
                return true;
            }
        }
        false
    }

    async fn set_lane_enabled(&mut self, lane: Lane, enabled: bool) {
        info!(lane = %lane, enabled, "lane toggled");
        match lane {
            Lane::League => self.config.league_enabled = enabled,
            Lane::Contenders => self.config.contenders_enabled = enabled,
        }

        if enabled {
            // A freshly enabled lane is worth checking right away; this also
            // restarts a poll schedule halted by a severe failure. An active
            // watch on the other lane is left alone.
            if self.mode == Mode::Polling {
                self.enter_polling();
                self.drive(Step::Check).await;
            }
        } else if self.mode == Mode::Watching
            && self.watcher.session().map(|s| s.lane) == Some(lane)
        {
            // Cut the in-flight session short cleanly and resume polling.
            self.watcher.finish();
            self.enter_polling();
        }
    }

    async fn set_account(&mut self, account: String) {
        info!("account identity replaced");
        self.account = account;

        // An in-flight session is no longer attributable; drop it without a
        // terminal event.
        self.watcher.abandon();

        if self.account.trim().is_empty() {
            warn!("empty account, tracker idle until one is set");
            self.mode = Mode::Unconfigured;
            return;
        }
        self.enter_polling();
        self.drive(Step::Check).await;
    }

    async fn force_check(&mut self) {
        match self.mode {
            Mode::Watching => debug!("force check ignored while watching"),
            Mode::Unconfigured => debug!("force check ignored without an account"),
            Mode::Polling => {
                if self.halted {
                    // Recovery: restart the schedule before checking.
                    self.enter_polling();
                }
                self.drive(Step::Check).await;
            }
        }
    }
}
