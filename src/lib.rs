//! Omnic: headless watch-reward tracker for league broadcasts.
//!
//! Polls the public event page for the two tracked lanes (the league
//! broadcast and the contenders circuit) and, once one goes live, sends
//! per-minute presence pings to the tracking endpoint so viewership rewards
//! accrue to the configured account.
//!
//! # Architecture
//!
//! The core is a check/watch state machine driven by a single tokio task:
//! - **Poller**: low-frequency "is it live yet" checks, throttled to one
//!   page fetch per configured interval
//! - **Watcher**: high-frequency "still watching" pings for the active
//!   live session
//! - **Controller**: owns whichever sub-machine is active, the runtime
//!   config, and the thread-safe command surface
//!
//! Outbound notifications leave on an event channel ([`TrackerEvent`]); the
//! HTTP collaborators sit behind the [`checker::LiveStatusProvider`] and
//! [`viewer::PresencePinger`] trait seams so the machine is testable without
//! a network.

pub mod checker;
pub mod error;
pub mod history;
pub mod http;
pub mod settings;
pub mod tracker;
pub mod types;
pub mod viewer;

pub use error::{OmnicError, Result};
pub use settings::Settings;
pub use tracker::{Controller, TrackerCommand, TrackerHandle};
pub use types::{Lane, LiveSession, TrackerEvent};
