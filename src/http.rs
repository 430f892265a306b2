//! Shared HTTP client for page checks and presence pings.
//!
//! Provides a configured [`reqwest::Client`] with browser-like headers and a
//! rotating User-Agent, matching what the tracking endpoint expects from a
//! real viewer session.

use rand::seq::SliceRandom;
use std::time::Duration;

/// Connection establishment deadline for every external call.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Total per-request deadline; breaches surface as timeout errors.
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Realistic browser User-Agent strings, one picked per client.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.7; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (X11; Fedora; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// Build the [`reqwest::Client`] shared by the checker and the viewer.
///
/// The client has:
/// - Cookie store enabled (the event page sets consent cookies)
/// - The connect/read timeout pair every external call is bounded by
/// - A random User-Agent from the rotation list
///
/// # Errors
///
/// Returns the underlying [`reqwest::Error`] if the client cannot be
/// constructed.
pub fn build_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .cookie_store(true)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(READ_TIMEOUT)
        .user_agent(random_user_agent())
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
}

/// Select a random User-Agent string from the rotation list.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS
        .choose(&mut rng)
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_user_agent_returns_valid_ua() {
        let ua = random_user_agent();
        assert!(USER_AGENTS.contains(&ua));
        assert!(ua.contains("Mozilla/5.0"));
    }

    #[test]
    fn build_client_succeeds() {
        assert!(build_client().is_ok());
    }

    #[test]
    fn user_agents_list_not_empty() {
        assert!(!USER_AGENTS.is_empty());
    }
}
