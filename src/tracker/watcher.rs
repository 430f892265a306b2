//! High-frequency watcher that accrues watched minutes for a live session.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::types::{LiveSession, TrackerEvent};
use crate::viewer::{PingError, PresencePinger};

/// Outcome of a watch tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Keep the watch schedule running.
    Continue,
    /// Transient failure; the same session retries on the next tick.
    Retry,
    /// Session over; hand control back to the poller. `recheck` asks for an
    /// immediate live-check instead of waiting out the full interval.
    HandBack {
        /// Run a live-check as soon as polling resumes.
        recheck: bool,
    },
}

/// Watch-side half of the state machine.
///
/// Holds the active [`LiveSession`] and its progress counter; the counter
/// only ever grows within a session and resets when a new one begins.
pub struct Watcher {
    pinger: Arc<dyn PresencePinger>,
    events: mpsc::UnboundedSender<TrackerEvent>,
    session: Option<LiveSession>,
    minutes_watched: u32,
}

impl Watcher {
    /// Watcher reporting through `events` and pinging via `pinger`.
    pub fn new(
        pinger: Arc<dyn PresencePinger>,
        events: mpsc::UnboundedSender<TrackerEvent>,
    ) -> Self {
        Self {
            pinger,
            events,
            session: None,
            minutes_watched: 0,
        }
    }

    /// Adopt a fresh session and reset progress.
    pub fn begin(&mut self, session: LiveSession) {
        info!(lane = %session.lane, title = %session.title, "start watching");
        self.session = Some(session);
        self.minutes_watched = 0;
    }

    /// The session currently being watched, if any.
    pub fn session(&self) -> Option<&LiveSession> {
        self.session.as_ref()
    }

    /// Minutes accrued in the current session.
    pub fn minutes_watched(&self) -> u32 {
        self.minutes_watched
    }

    /// Drop the session without emitting anything.
    ///
    /// Used when the account changes (minutes are no longer attributable)
    /// and on non-flushing teardown. Safe to call with no session active.
    pub fn abandon(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(lane = %session.lane, "session abandoned");
        }
    }

    /// End the active session early, emitting the terminal event when any
    /// progress had accrued.
    ///
    /// Used when the watched lane is disabled mid-session and on flushing
    /// teardown. Safe to call with no session active.
    pub fn finish(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if self.minutes_watched == 0 {
            return;
        }
        info!(
            lane = %session.lane,
            minutes = self.minutes_watched,
            "session cut short"
        );
        self.emit(TrackerEvent::Watching {
            lane: session.lane,
            minutes_watched: self.minutes_watched,
            title: session.title,
            ended: true,
        });
    }

    /// One watch tick: send a ping and classify the response.
    pub async fn on_tick(&mut self, account: &str) -> WatchOutcome {
        let Some(session) = self.session.clone() else {
            debug!("watch tick without a session");
            return WatchOutcome::HandBack { recheck: false };
        };

        match self.pinger.ping(account, &session).await {
            Ok(true) => {
                self.emit(TrackerEvent::Watching {
                    lane: session.lane,
                    minutes_watched: self.minutes_watched,
                    title: session.title.clone(),
                    ended: false,
                });
                self.minutes_watched += 1;
                WatchOutcome::Continue
            }
            Ok(false) if self.minutes_watched > 0 => {
                info!(
                    lane = %session.lane,
                    minutes = self.minutes_watched,
                    "session ended"
                );
                self.session = None;
                self.emit(TrackerEvent::Watching {
                    lane: session.lane,
                    minutes_watched: self.minutes_watched,
                    title: session.title.clone(),
                    ended: true,
                });
                WatchOutcome::HandBack { recheck: false }
            }
            Ok(false) => {
                warn!(lane = %session.lane, "watched for 0 minutes, stream has probably ended");
                self.session = None;
                self.emit(TrackerEvent::FalseTracking { lane: session.lane });
                WatchOutcome::HandBack { recheck: false }
            }
            Err(err) => self.report(err),
        }
    }

    fn report(&mut self, err: PingError) -> WatchOutcome {
        error!("presence ping failed: {err}");
        self.emit(TrackerEvent::Error {
            message: err.to_string(),
            severe: err.is_severe(),
        });

        if err.retry_in_place() {
            return WatchOutcome::Retry;
        }

        // Connectivity loss may have masked an end-of-stream; re-check the
        // page as soon as polling resumes.
        let recheck = matches!(err, PingError::Connection(_));
        self.session = None;
        WatchOutcome::HandBack { recheck }
    }

    fn emit(&self, event: TrackerEvent) {
        let _ = self.events.send(event);
    }
}
