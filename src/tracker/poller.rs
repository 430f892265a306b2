//! Low-frequency poller that decides when a broadcast has gone live.
//!
//! The ticker fires once a minute; the poller throttles actual page fetches
//! to one per configured interval with its check counter and emits idle
//! progress on the ticks in between.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::checker::{CheckError, LiveStatusProvider};
use crate::tracker::CheckConfig;
use crate::types::{Lane, LiveSession, TrackerEvent};

/// Outcome of a poll tick or forced check.
#[derive(Debug)]
pub enum PollOutcome {
    /// Nothing beyond idle bookkeeping happened; the schedule continues.
    Idle,
    /// A live session was found; the controller should start watching.
    Live(LiveSession),
    /// A severe failure; the poll schedule halts until a forced re-check.
    Halted,
}

/// Poll-side half of the state machine.
pub struct Poller {
    provider: Arc<dyn LiveStatusProvider>,
    events: mpsc::UnboundedSender<TrackerEvent>,
    check_counter: u32,
}

impl Poller {
    /// Poller reporting through `events` and checking via `provider`.
    pub fn new(
        provider: Arc<dyn LiveStatusProvider>,
        events: mpsc::UnboundedSender<TrackerEvent>,
    ) -> Self {
        Self {
            provider,
            events,
            check_counter: 0,
        }
    }

    /// Re-arm for a fresh polling cycle.
    pub fn reset(&mut self) {
        self.check_counter = 0;
    }

    /// One scheduler tick.
    ///
    /// Runs a live-check when the counter reaches the configured interval,
    /// otherwise counts the tick and reports the minutes remaining.
    pub async fn on_tick(&mut self, config: &CheckConfig) -> PollOutcome {
        self.check_counter += 1;
        if self.check_counter >= config.poll_interval_mins {
            self.check_counter = 0;
            self.check_once(config).await
        } else {
            self.emit(TrackerEvent::IdleProgress {
                minutes_remaining: config.poll_interval_mins - self.check_counter,
            });
            PollOutcome::Idle
        }
    }

    /// Query the enabled lanes in priority order (league first).
    pub async fn check_once(&mut self, config: &CheckConfig) -> PollOutcome {
        info!("checking whether a broadcast is live");
        self.emit(TrackerEvent::Checking);

        for lane in Lane::ALL {
            if !config.lane_enabled(lane) {
                continue;
            }
            match self.provider.check_live(lane).await {
                Ok(Some(session)) => {
                    info!(lane = %lane, title = %session.title, "broadcast is live");
                    return PollOutcome::Live(session);
                }
                Ok(None) => {}
                Err(err) => return self.report(err),
            }
        }

        self.emit(TrackerEvent::IdleProgress {
            minutes_remaining: config.poll_interval_mins,
        });
        PollOutcome::Idle
    }

    fn report(&self, err: CheckError) -> PollOutcome {
        let severe = err.is_severe();
        error!("live-check failed: {err}");
        self.emit(TrackerEvent::Error {
            message: err.to_string(),
            severe,
        });
        if severe {
            warn!("poll schedule halted until a forced re-check");
            PollOutcome::Halted
        } else {
            PollOutcome::Idle
        }
    }

    fn emit(&self, event: TrackerEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn config(interval: u32) -> CheckConfig {
        CheckConfig {
            league_enabled: true,
            contenders_enabled: true,
            poll_interval_mins: interval,
            watch_interval_secs: 60,
        }
    }

    fn session(lane: Lane) -> LiveSession {
        LiveSession {
            lane,
            video_id: "vid".into(),
            entry_id: "entry".into(),
            title: "Grand Finals".into(),
        }
    }

    /// Provider that records queried lanes and reports the given lanes live.
    struct FixedProvider {
        live: Vec<Lane>,
        calls: Mutex<Vec<Lane>>,
    }

    impl FixedProvider {
        fn new(live: &[Lane]) -> Self {
            Self {
                live: live.to_vec(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LiveStatusProvider for FixedProvider {
        async fn check_live(&self, lane: Lane) -> Result<Option<LiveSession>, CheckError> {
            self.calls.lock().unwrap().push(lane);
            Ok(self.live.contains(&lane).then(|| session(lane)))
        }
    }

    /// Provider that always fails with the produced error.
    struct ErrProvider(fn() -> CheckError);

    #[async_trait]
    impl LiveStatusProvider for ErrProvider {
        async fn check_live(&self, _lane: Lane) -> Result<Option<LiveSession>, CheckError> {
            Err((self.0)())
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<TrackerEvent>) -> Vec<TrackerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn throttles_to_one_check_per_interval() {
        let provider = Arc::new(FixedProvider::new(&[]));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut poller = Poller::new(provider.clone(), tx);
        let config = config(3);

        for _ in 0..6 {
            assert!(matches!(poller.on_tick(&config).await, PollOutcome::Idle));
        }

        // 2 checks in 6 ticks, 4 calls (both lanes per check).
        assert_eq!(provider.calls.lock().unwrap().len(), 4);

        let remaining: Vec<Option<u32>> = drain(&mut rx)
            .into_iter()
            .map(|e| match e {
                TrackerEvent::IdleProgress { minutes_remaining } => Some(minutes_remaining),
                _ => None,
            })
            .collect();
        // Two cycles: countdown, check (None for Checking), full-interval reset.
        assert_eq!(
            remaining,
            vec![
                Some(2),
                Some(1),
                None,
                Some(3),
                Some(2),
                Some(1),
                None,
                Some(3)
            ]
        );
    }

    #[tokio::test]
    async fn league_wins_when_both_lanes_live() {
        let provider = Arc::new(FixedProvider::new(&[Lane::League, Lane::Contenders]));
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut poller = Poller::new(provider.clone(), tx);

        let outcome = poller.check_once(&config(1)).await;
        match outcome {
            PollOutcome::Live(session) => assert_eq!(session.lane, Lane::League),
            other => panic!("expected live outcome, got {other:?}"),
        }
        // The contenders page was never fetched.
        assert_eq!(*provider.calls.lock().unwrap(), vec![Lane::League]);
    }

    #[tokio::test]
    async fn disabled_lanes_are_skipped() {
        let provider = Arc::new(FixedProvider::new(&[Lane::League]));
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut poller = Poller::new(provider.clone(), tx);

        let mut config = config(1);
        config.league_enabled = false;

        assert!(matches!(
            poller.check_once(&config).await,
            PollOutcome::Idle
        ));
        assert_eq!(*provider.calls.lock().unwrap(), vec![Lane::Contenders]);
    }

    #[tokio::test]
    async fn http_error_halts_and_reports_severe() {
        let provider = Arc::new(ErrProvider(|| CheckError::Http { status: 500 }));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut poller = Poller::new(provider, tx);

        assert!(matches!(
            poller.check_once(&config(1)).await,
            PollOutcome::Halted
        ));

        let events = drain(&mut rx);
        assert!(matches!(events[0], TrackerEvent::Checking));
        match &events[1] {
            TrackerEvent::Error { message, severe } => {
                assert!(severe);
                assert!(message.contains("500"));
            }
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_keeps_polling() {
        let provider = Arc::new(ErrProvider(|| CheckError::Timeout("deadline".into())));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut poller = Poller::new(provider, tx);

        assert!(matches!(
            poller.check_once(&config(1)).await,
            PollOutcome::Idle
        ));

        let events = drain(&mut rx);
        assert!(
            events
                .iter()
                .any(|e| matches!(e, TrackerEvent::Error { severe: false, .. }))
        );
    }

    #[tokio::test]
    async fn force_path_leaves_counter_untouched() {
        let provider = Arc::new(FixedProvider::new(&[]));
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut poller = Poller::new(provider, tx);
        let config = config(3);

        poller.on_tick(&config).await;
        assert_eq!(poller.check_counter, 1);
        poller.check_once(&config).await;
        assert_eq!(poller.check_counter, 1);
        poller.reset();
        assert_eq!(poller.check_counter, 0);
    }
}
