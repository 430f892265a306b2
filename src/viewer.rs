//! Presence pinger: asserts continued viewing to the tracking endpoint.
//!
//! Each ping mimics what the web player sends (a browser-style OPTIONS
//! preflight followed by a JSON POST) and reports whether the upstream
//! wants tracking to continue. The endpoint distinguishes transport-level
//! failures from an application-level failure status inside an otherwise
//! successful response, and so do we.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::types::{Lane, LiveSession};

/// Production tracking API host.
pub const DEFAULT_TRACKING_BASE: &str =
    "https://wzavfvwgfk.execute-api.us-east-2.amazonaws.com/production";

/// Origin the tracking endpoint expects pings to come from.
const PAGE_ORIGIN: &str = "https://overwatchleague.com";

/// Errors from a presence ping, classified per failure disposition.
#[derive(Debug, thiserror::Error)]
pub enum PingError {
    /// The ping exceeded its connect/read deadline.
    #[error("ping timed out: {0}")]
    Timeout(String),

    /// Could not reach the tracking host.
    #[error("couldn't connect for ping: {0}")]
    Connection(String),

    /// The endpoint responded with a non-success HTTP status.
    #[error("ping HTTP error: status {status}")]
    Http {
        /// HTTP status code of the response.
        status: u16,
    },

    /// The endpoint answered 200 but its payload carried a failure status.
    #[error("bad tracking payload status: {0}")]
    BadStatus(String),

    /// The payload was not the expected JSON shape.
    #[error("tracking payload shape unexpected: {0}")]
    Payload(String),

    /// Anything else.
    #[error("ping failed: {0}")]
    Other(String),
}

impl PingError {
    /// Whether this failure requires a forced re-check to resume tracking.
    pub fn is_severe(&self) -> bool {
        !matches!(self, Self::Timeout(_) | Self::Connection(_))
    }

    /// Whether the watcher keeps its schedule and retries the same session
    /// on the next tick.
    pub fn retry_in_place(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    fn from_request(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Http {
                status: status.as_u16(),
            }
        } else {
            Self::Other(err.to_string())
        }
    }
}

/// Port for sending one presence ping.
#[async_trait]
pub trait PresencePinger: Send + Sync {
    /// Send one ping for `session` on behalf of `account`.
    ///
    /// `Ok(true)` means the upstream wants tracking to continue.
    async fn ping(&self, account: &str, session: &LiveSession) -> Result<bool, PingError>;
}

/// Presence pinger backed by the sentinel tracking API.
pub struct SentinelViewer {
    client: reqwest::Client,
    base_url: String,
}

impl SentinelViewer {
    /// Viewer against the production tracking host.
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, DEFAULT_TRACKING_BASE)
    }

    /// Viewer against a custom tracking host (local debugging, tests).
    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn tracking_url(&self, lane: Lane) -> String {
        let path = match lane {
            Lane::League => "owl",
            Lane::Contenders => "contenders",
        };
        format!("{}/v2/sentinel-tracking/{}", self.base_url, path)
    }
}

#[async_trait]
impl PresencePinger for SentinelViewer {
    async fn ping(&self, account: &str, session: &LiveSession) -> Result<bool, PingError> {
        let url = self.tracking_url(session.lane);
        debug!(lane = %session.lane, url, "sending presence ping");

        // The endpoint rejects bare POSTs; send the preflight a browser would.
        self.client
            .request(reqwest::Method::OPTIONS, &url)
            .header("Accept", "*/*")
            .header("Access-Control-Request-Method", "POST")
            .header("Access-Control-Request-Headers", "content-type,x-origin")
            .send()
            .await
            .map_err(PingError::from_request)?
            .error_for_status()
            .map_err(PingError::from_request)?;

        let payload = json!({
            "accountId": account,
            "videoId": session.video_id,
            "type": "video_player",
            "entryId": session.entry_id,
            "liveTest": false,
            "locale": "en-us",
        });

        let body: Value = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .header("x-origin", "overwatchleague.com")
            .header("Referer", format!("{PAGE_ORIGIN}/"))
            .header("Origin", PAGE_ORIGIN)
            .json(&payload)
            .send()
            .await
            .map_err(PingError::from_request)?
            .error_for_status()
            .map_err(PingError::from_request)?
            .json()
            .await
            .map_err(|e| PingError::Payload(e.to_string()))?;

        trace!(%body, "tracking response");
        parse_tracking_response(&body)
    }
}

/// Interpret the tracking endpoint's response payload.
pub(crate) fn parse_tracking_response(body: &Value) -> Result<bool, PingError> {
    let status = body
        .get("status")
        .and_then(Value::as_i64)
        .ok_or_else(|| PingError::Payload("missing payload status".into()))?;
    if status != 200 {
        return Err(PingError::BadStatus(body.to_string()));
    }

    body.pointer("/data/continueTracking")
        .and_then(Value::as_bool)
        .ok_or_else(|| PingError::Payload("missing continueTracking flag".into()))
}
