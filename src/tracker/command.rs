//! Control operations accepted by the tracker task.

use crate::types::Lane;

/// Commands sent from other tasks into the tracker's run loop.
#[derive(Debug, Clone)]
pub enum TrackerCommand {
    /// Enable or disable polling/watching of a lane.
    ///
    /// Disabling the lane currently being watched cuts the session short
    /// cleanly; enabling a lane triggers an immediate check and doubles as
    /// the recovery path after a severe poll failure.
    SetLaneEnabled {
        /// Lane to toggle.
        lane: Lane,
        /// New enabled state.
        enabled: bool,
    },

    /// Change the idle poll interval; effective on the next tick.
    SetPollInterval {
        /// Minutes between live-checks (clamped to at least 1).
        minutes: u32,
    },

    /// Replace the account identity used for presence pings.
    ///
    /// An in-flight watch session is abandoned without a terminal event
    /// (the minutes are no longer attributable) and polling restarts from
    /// scratch under the new identity.
    SetAccount {
        /// New account identifier; empty returns to the unconfigured state.
        account: String,
    },

    /// Run a live-check immediately, bypassing the idle counter.
    ///
    /// Also the recovery entry point after a severe failure halted the poll
    /// schedule. Ignored while a session is being watched.
    ForceCheck,

    /// Stop all schedules and end the run loop.
    PrepareToExit {
        /// When true, nonzero in-flight progress is reported with a
        /// terminal watching event before teardown.
        flush_outstanding: bool,
    },
}
