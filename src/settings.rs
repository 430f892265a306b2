//! Persisted user settings.
//!
//! Stored as pretty-printed JSON. A missing or unparseable file yields the
//! defaults (with a log line), so a fresh install and a corrupted file both
//! start the tracker in a sane state; unknown fields are ignored for
//! forward compatibility.

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::OmnicError;
use crate::types::Lane;

/// Default minutes between live-checks while idle.
pub const DEFAULT_POLL_INTERVAL_MINS: u32 = 10;

/// Largest accepted poll interval.
const MAX_POLL_INTERVAL_MINS: u32 = 60;

/// User settings for the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Account identifier rewards accrue to; empty means not configured.
    pub account: String,
    /// Whether the league lane is polled.
    pub league: bool,
    /// Whether the contenders lane is polled.
    pub contenders: bool,
    /// Minutes between live-checks while idle.
    pub check_interval_mins: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            account: String::new(),
            league: true,
            contenders: true,
            check_interval_mins: DEFAULT_POLL_INTERVAL_MINS,
        }
    }
}

impl Settings {
    /// Load settings from `path`.
    ///
    /// A missing file yields defaults; an unparseable file is reported and
    /// also yields defaults rather than refusing to start.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no settings file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(OmnicError::Settings(format!(
                    "cannot read {}: {e}",
                    path.display()
                )));
            }
        };

        let mut settings: Settings = match serde_json::from_slice(&bytes) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("cannot parse {}, using defaults: {e}", path.display());
                return Ok(Self::default());
            }
        };
        settings.clamp();
        Ok(settings)
    }

    /// Persist settings to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                OmnicError::Settings(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| OmnicError::Settings(format!("cannot serialize settings: {e}")))?;
        std::fs::write(path, json)
            .map_err(|e| OmnicError::Settings(format!("cannot write {}: {e}", path.display())))?;
        Ok(())
    }

    /// True when an account identity has been configured.
    pub fn has_account(&self) -> bool {
        !self.account.trim().is_empty()
    }

    /// Whether a lane is enabled.
    pub fn lane_enabled(&self, lane: Lane) -> bool {
        match lane {
            Lane::League => self.league,
            Lane::Contenders => self.contenders,
        }
    }

    /// Default settings location under the user config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("omnic").join("settings.json"))
    }

    fn clamp(&mut self) {
        self.check_interval_mins = self.check_interval_mins.clamp(1, MAX_POLL_INTERVAL_MINS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = Settings::load(&dir.path().join("settings.json")).expect("load");
        assert_eq!(settings, Settings::default());
        assert!(!settings.has_account());
    }

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("settings.json");

        let settings = Settings {
            account: "123456789".into(),
            league: true,
            contenders: false,
            check_interval_mins: 5,
        };
        settings.save(&path).expect("save");

        let restored = Settings::load(&path).expect("load");
        assert_eq!(restored, settings);
        assert!(restored.has_account());
        assert!(restored.lane_enabled(Lane::League));
        assert!(!restored.lane_enabled(Lane::Contenders));
    }

    #[test]
    fn unparseable_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").expect("write");

        let settings = Settings::load(&path).expect("load");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"account": "42", "middle_click": "context_menu"}"#,
        )
        .expect("write");

        let settings = Settings::load(&path).expect("load");
        assert_eq!(settings.account, "42");
        assert_eq!(settings.check_interval_mins, DEFAULT_POLL_INTERVAL_MINS);
    }

    #[test]
    fn interval_is_clamped_on_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");

        std::fs::write(&path, r#"{"check_interval_mins": 0}"#).expect("write");
        assert_eq!(Settings::load(&path).expect("load").check_interval_mins, 1);

        std::fs::write(&path, r#"{"check_interval_mins": 240}"#).expect("write");
        assert_eq!(
            Settings::load(&path).expect("load").check_interval_mins,
            MAX_POLL_INTERVAL_MINS
        );
    }
}
