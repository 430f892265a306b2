//! Live-status provider: decides whether a lane's broadcast is live.
//!
//! Fetches the public event page for a lane and inspects the
//! `__NEXT_DATA__` JSON blob embedded in the markup. The page carries an
//! array of layout blocks; the one containing `videoPlayer` describes the
//! stream, including whether it is live and whether reward tracking is
//! enabled for it.

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, trace};

use crate::types::{Lane, LiveSession};

/// Production event page host.
pub const DEFAULT_PAGE_BASE: &str = "https://overwatchleague.com";

/// Errors from a live-check, classified per failure disposition.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// The page request exceeded its connect/read deadline.
    #[error("check timed out: {0}")]
    Timeout(String),

    /// Could not reach the page host.
    #[error("couldn't connect for check: {0}")]
    Connection(String),

    /// The page responded with a non-success HTTP status.
    #[error("check HTTP error: status {status}")]
    Http {
        /// HTTP status code of the response.
        status: u16,
    },

    /// The page markup or embedded data did not have the expected shape.
    #[error("page shape unexpected: {0}")]
    Page(String),

    /// Anything else.
    #[error("check failed: {0}")]
    Other(String),
}

impl CheckError {
    /// Whether this failure halts the poll schedule until a forced re-check.
    ///
    /// Timeouts and connection failures self-heal on the next scheduled
    /// tick; everything else needs user action.
    pub fn is_severe(&self) -> bool {
        !matches!(self, Self::Timeout(_) | Self::Connection(_))
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

/// Port for "is this lane live right now" queries.
#[async_trait]
pub trait LiveStatusProvider: Send + Sync {
    /// Returns the live session for `lane`, or `None` when nothing is live
    /// or the stream is not trackable.
    async fn check_live(&self, lane: Lane) -> Result<Option<LiveSession>, CheckError>;
}

/// Live-status provider backed by the public event page.
pub struct PageChecker {
    client: reqwest::Client,
    base_url: String,
}

impl PageChecker {
    /// Checker against the production page host.
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, DEFAULT_PAGE_BASE)
    }

    /// Checker against a custom page host (local debugging, tests).
    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn page_url(&self, lane: Lane) -> String {
        match lane {
            Lane::League => format!("{}/en-us/", self.base_url),
            Lane::Contenders => format!("{}/en-us/contenders", self.base_url),
        }
    }
}

#[async_trait]
impl LiveStatusProvider for PageChecker {
    async fn check_live(&self, lane: Lane) -> Result<Option<LiveSession>, CheckError> {
        let url = self.page_url(lane);
        debug!(lane = %lane, url, "fetching event page");

        let body = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(CheckError::from_request)?
            .error_for_status()
            .map_err(CheckError::from_request)?
            .text()
            .await
            .map_err(CheckError::from_request)?;

        trace!(bytes = body.len(), "event page received");
        parse_live_session(&body, lane)
    }
}

/// Parse the event page body into a live session, if one is running.
///
/// Extracted as a separate function for testability with mock HTML.
pub(crate) fn parse_live_session(
    body: &str,
    lane: Lane,
) -> Result<Option<LiveSession>, CheckError> {
    let document = Html::parse_document(body);
    let selector = Selector::parse("script#__NEXT_DATA__")
        .map_err(|e| CheckError::Page(format!("invalid data selector: {e:?}")))?;

    let script = document
        .select(&selector)
        .next()
        .ok_or_else(|| CheckError::Page("missing __NEXT_DATA__ script".into()))?;
    let json = script.text().collect::<String>();

    let data: Value = serde_json::from_str(&json)
        .map_err(|e| CheckError::Page(format!("embedded JSON: {e}")))?;

    let blocks = data
        .pointer("/props/pageProps/blocks")
        .and_then(Value::as_array)
        .ok_or_else(|| CheckError::Page("missing page blocks".into()))?;
    let player = blocks
        .iter()
        .find_map(|block| block.get("videoPlayer"))
        .ok_or_else(|| CheckError::Page("no video player block".into()))?;

    // Reward tracking can be switched off page-side while the stream stays
    // live; such a stream is not worth watching.
    let tracking = player
        .pointer("/videoLogin/0/enableSentinelTracking")
        .and_then(Value::as_str);
    if tracking == Some("None") {
        debug!(lane = %lane, "reward tracking disabled on page");
        return Ok(None);
    }

    let Some(video) = player.get("video").filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    if video.get("isLive").and_then(Value::as_bool) != Some(true) {
        return Ok(None);
    }

    let video_id = video
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| CheckError::Page("live video has no id".into()))?;
    let entry_id = player
        .get("uid")
        .and_then(Value::as_str)
        .ok_or_else(|| CheckError::Page("video player has no uid".into()))?;
    let title = video
        .pointer("/metadata/title")
        .and_then(Value::as_str)
        .ok_or_else(|| CheckError::Page("live video has no title".into()))?;

    Ok(Some(LiveSession {
        lane,
        video_id: video_id.to_owned(),
        entry_id: entry_id.to_owned(),
        title: title.to_owned(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with_player(player: &str) -> String {
        format!(
            concat!(
                "<html><body>",
                "<script id=\"__NEXT_DATA__\" type=\"application/json\">",
                "{{\"props\":{{\"pageProps\":{{\"blocks\":[{{\"hero\":{{}}}},{{\"videoPlayer\":{player}}}]}}}}}}",
                "</script></body></html>"
            ),
            player = player
        )
    }

    fn live_player() -> &'static str {
        r#"{
            "uid": "blt0123456789",
            "videoLogin": [{"enableSentinelTracking": "True"}],
            "video": {
                "id": "vid-42",
                "isLive": true,
                "metadata": {"title": "Grand Finals"}
            }
        }"#
    }

    #[test]
    fn parses_live_session() {
        let body = page_with_player(live_player());
        let session = parse_live_session(&body, Lane::League)
            .unwrap()
            .expect("session");
        assert_eq!(session.lane, Lane::League);
        assert_eq!(session.video_id, "vid-42");
        assert_eq!(session.entry_id, "blt0123456789");
        assert_eq!(session.title, "Grand Finals");
    }

    #[test]
    fn not_live_video_yields_none() {
        let body = page_with_player(
            r#"{"uid": "x", "video": {"id": "v", "isLive": false, "metadata": {"title": "t"}}}"#,
        );
        assert_eq!(parse_live_session(&body, Lane::League).unwrap(), None);
    }

    #[test]
    fn null_video_yields_none() {
        let body = page_with_player(r#"{"uid": "x", "video": null}"#);
        assert_eq!(parse_live_session(&body, Lane::Contenders).unwrap(), None);
    }

    #[test]
    fn disabled_tracking_yields_none() {
        let body = page_with_player(
            r#"{
                "uid": "x",
                "videoLogin": [{"enableSentinelTracking": "None"}],
                "video": {"id": "v", "isLive": true, "metadata": {"title": "t"}}
            }"#,
        );
        assert_eq!(parse_live_session(&body, Lane::League).unwrap(), None);
    }

    #[test]
    fn missing_script_is_page_error() {
        let err = parse_live_session("<html><body>maintenance</body></html>", Lane::League)
            .unwrap_err();
        assert!(matches!(err, CheckError::Page(_)));
        assert!(err.is_severe());
    }

    #[test]
    fn malformed_embedded_json_is_page_error() {
        let body = concat!(
            "<html><body><script id=\"__NEXT_DATA__\">not json</script></body></html>"
        );
        let err = parse_live_session(body, Lane::League).unwrap_err();
        assert!(matches!(err, CheckError::Page(_)));
    }

    #[test]
    fn live_video_without_id_is_page_error() {
        let body = page_with_player(
            r#"{"uid": "x", "video": {"isLive": true, "metadata": {"title": "t"}}}"#,
        );
        let err = parse_live_session(&body, Lane::League).unwrap_err();
        assert!(matches!(err, CheckError::Page(_)));
    }

    #[test]
    fn timeouts_and_connection_failures_are_transient() {
        assert!(!CheckError::Timeout("deadline".into()).is_severe());
        assert!(!CheckError::Connection("refused".into()).is_severe());
        assert!(CheckError::Http { status: 500 }.is_severe());
        assert!(CheckError::Page("shape".into()).is_severe());
        assert!(CheckError::Other("?".into()).is_severe());
    }

    #[test]
    fn http_error_displays_status() {
        let err = CheckError::Http { status: 503 };
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn page_urls_per_lane() {
        let checker = PageChecker::with_base_url(
            crate::http::build_client().unwrap(),
            "http://127.0.0.1:5000",
        );
        assert_eq!(
            checker.page_url(Lane::League),
            "http://127.0.0.1:5000/en-us/"
        );
        assert_eq!(
            checker.page_url(Lane::Contenders),
            "http://127.0.0.1:5000/en-us/contenders"
        );
    }
}
