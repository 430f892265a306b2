//! The check/watch polling state machine.
//!
//! A single spawned task owns the whole machine: the [`Poller`] decides on a
//! low-frequency schedule whether a broadcast has gone live, the [`Watcher`]
//! accrues watched minutes for the active session on a high-frequency
//! schedule, and the [`Controller`] owns whichever of the two is driving the
//! ticker. Control operations arrive on a command channel (safe to invoke
//! from any task) and notifications leave on an event channel, so the
//! presentation layer never touches tracker state directly.

mod command;
mod controller;
mod poller;
mod watcher;

pub use command::TrackerCommand;
pub use controller::{Controller, Mode, TrackerHandle};
pub use poller::{PollOutcome, Poller};
pub use watcher::{WatchOutcome, Watcher};

use crate::settings::Settings;
use crate::types::Lane;

/// Seconds between presence pings while watching.
pub const DEFAULT_WATCH_INTERVAL_SECS: u32 = 60;

/// Runtime view of the user settings, read at the top of every tick.
///
/// Owned by the controller and mutated only through [`TrackerCommand`]s, so
/// a change that races an in-flight tick takes effect on the next one.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Whether the league lane is polled.
    pub league_enabled: bool,
    /// Whether the contenders lane is polled.
    pub contenders_enabled: bool,
    /// Minutes between live-checks while idle.
    pub poll_interval_mins: u32,
    /// Seconds between presence pings while watching.
    pub watch_interval_secs: u32,
}

impl CheckConfig {
    /// Build the runtime config from persisted settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            league_enabled: settings.league,
            contenders_enabled: settings.contenders,
            poll_interval_mins: settings.check_interval_mins.max(1),
            watch_interval_secs: DEFAULT_WATCH_INTERVAL_SECS,
        }
    }

    /// Whether `lane` is enabled for polling.
    pub fn lane_enabled(&self, lane: Lane) -> bool {
        match lane {
            Lane::League => self.league_enabled,
            Lane::Contenders => self.contenders_enabled,
        }
    }
}
