//! Append-only watch history and aggregate statistics.
//!
//! Completed watch sessions land in a CSV file, one row per session, with a
//! header written on first use. The file is the source for the `stats`
//! summary: per-lane minute totals over the last 24 hours, the last 7 days
//! and the current month.

use chrono::{DateTime, Datelike, Duration, Local};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

use crate::error::OmnicError;
use crate::types::{Lane, TrackerEvent};

/// One watch-session row in the history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchRecord {
    /// When the session was recorded.
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Local>,
    /// Account the minutes accrued to.
    #[serde(rename = "Account")]
    pub account: String,
    /// Lane the session belonged to.
    #[serde(rename = "Type")]
    pub lane: Lane,
    /// Broadcast title.
    #[serde(rename = "Title")]
    pub title: String,
    /// Minutes watched.
    #[serde(rename = "Minutes")]
    pub minutes: u32,
}

/// Per-lane minute totals over the standard reporting windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaneStats {
    /// Minutes in the last 24 hours.
    pub last_day: u32,
    /// Minutes in the last 7 days.
    pub last_week: u32,
    /// Minutes in the current calendar month.
    pub this_month: u32,
}

/// Append-only CSV log of completed watch sessions.
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    /// Log backed by the CSV file at `path` (created on first append).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, writing the header when creating the file.
    pub fn append(&self, record: &WatchRecord) -> crate::Result<()> {
        debug!(lane = %record.lane, minutes = record.minutes, "writing history record");

        let new_file = !self.path.exists();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                OmnicError::History(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| OmnicError::History(format!("cannot open {}: {e}", self.path.display())))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(new_file)
            .from_writer(file);
        writer
            .serialize(record)
            .map_err(|e| OmnicError::History(format!("cannot write record: {e}")))?;
        writer
            .flush()
            .map_err(|e| OmnicError::History(format!("cannot flush history: {e}")))?;
        Ok(())
    }

    /// Aggregate per-lane totals for `account` as of `now`.
    ///
    /// Rows that fail to parse and rows belonging to other accounts are
    /// skipped. Returns `(league, contenders)`.
    pub fn summarize(
        &self,
        account: &str,
        now: DateTime<Local>,
    ) -> crate::Result<(LaneStats, LaneStats)> {
        let mut league = LaneStats::default();
        let mut contenders = LaneStats::default();

        if !self.path.exists() {
            return Ok((league, contenders));
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| OmnicError::History(format!("cannot read {}: {e}", self.path.display())))?;

        let day_cutoff = now - Duration::hours(24);
        let week_cutoff = now - Duration::days(7);

        for row in reader.deserialize::<WatchRecord>() {
            let record = match row {
                Ok(record) => record,
                Err(e) => {
                    warn!("skipping malformed history row: {e}");
                    continue;
                }
            };
            if record.account != account {
                continue;
            }

            let stats = match record.lane {
                Lane::League => &mut league,
                Lane::Contenders => &mut contenders,
            };
            if record.timestamp > day_cutoff {
                stats.last_day += record.minutes;
                stats.last_week += record.minutes;
            } else if record.timestamp > week_cutoff {
                stats.last_week += record.minutes;
            }
            if record.timestamp.month() == now.month() && record.timestamp.year() == now.year() {
                stats.this_month += record.minutes;
            }
        }

        Ok((league, contenders))
    }
}

/// Tracks in-flight session progress from tracker events and writes
/// completed sessions to the log.
///
/// The latest `Watching` progress is held as a pending record so an error
/// or shutdown loses at most the minute in flight; zero-minute sessions are
/// never persisted.
pub struct RecordKeeper {
    history: HistoryLog,
    account: String,
    pending: Option<WatchRecord>,
}

impl RecordKeeper {
    /// Keeper writing to `history` on behalf of `account`.
    pub fn new(history: HistoryLog, account: impl Into<String>) -> Self {
        Self {
            history,
            account: account.into(),
            pending: None,
        }
    }

    /// Update bookkeeping for one tracker event.
    pub fn observe(&mut self, event: &TrackerEvent) {
        match event {
            TrackerEvent::Watching {
                lane,
                minutes_watched,
                title,
                ended,
            } => {
                self.pending = Some(WatchRecord {
                    timestamp: Local::now(),
                    account: self.account.clone(),
                    lane: *lane,
                    title: title.clone(),
                    minutes: *minutes_watched,
                });
                if *ended {
                    self.flush();
                }
            }
            TrackerEvent::FalseTracking { .. } => {
                self.pending = None;
            }
            TrackerEvent::Error { .. } => {
                self.flush();
            }
            TrackerEvent::IdleProgress { .. } | TrackerEvent::Checking => {}
        }
    }

    /// Write any outstanding progress (error and exit paths).
    pub fn flush(&mut self) {
        let Some(record) = self.pending.take() else {
            return;
        };
        if record.minutes == 0 {
            return;
        }
        if let Err(e) = self.history.append(&record) {
            error!("cannot write history record: {e}");
        }
    }
}
