//! Core data types shared across the tracker.

use serde::{Deserialize, Serialize};

/// One of the two tracked broadcast lanes.
///
/// The league broadcast is always evaluated before the contenders circuit,
/// so when both report live on the same check the league wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    /// Main league broadcast.
    League,
    /// Secondary contenders-circuit broadcast.
    Contenders,
}

impl Lane {
    /// Both lanes, in check-priority order.
    pub const ALL: [Lane; 2] = [Lane::League, Lane::Contenders];

    /// Stable lowercase name used in history records and log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::League => "league",
            Self::Contenders => "contenders",
        }
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live, trackable broadcast found by a live-check.
///
/// Owned by the active watcher for the duration of the watch and discarded
/// when control hands back to the poller. The lane never changes after
/// creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSession {
    /// Lane this session belongs to.
    pub lane: Lane,
    /// Opaque video identifier from the page's player block.
    pub video_id: String,
    /// Opaque entry identifier the tracking endpoint expects.
    pub entry_id: String,
    /// Display title of the broadcast.
    pub title: String,
}

/// Notifications emitted by the tracker for presentation and persistence.
#[derive(Debug, Clone)]
pub enum TrackerEvent {
    /// A poll tick passed without a live-check; carries the minutes left
    /// until the next one.
    IdleProgress {
        /// Minutes remaining before the next live-check.
        minutes_remaining: u32,
    },
    /// A live-check is starting.
    Checking,
    /// A watch tick completed.
    Watching {
        /// Lane being watched.
        lane: Lane,
        /// Minutes accrued so far in this session.
        minutes_watched: u32,
        /// Broadcast title.
        title: String,
        /// True on the terminal tick of a session.
        ended: bool,
    },
    /// A session ended with zero minutes watched: the page flickered to
    /// live without a real broadcast behind it.
    FalseTracking {
        /// Lane that produced the false positive.
        lane: Lane,
    },
    /// A failure was caught and classified.
    Error {
        /// Human-readable description.
        message: String,
        /// True when the relevant schedule halted and a forced re-check is
        /// needed to resume; false for conditions that self-heal next tick.
        severe: bool,
    },
}
