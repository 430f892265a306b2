//! Error types for the omnic library surface.
//!
//! Failures of the HTTP collaborators have their own taxonomies
//! ([`crate::checker::CheckError`], [`crate::viewer::PingError`]) because the
//! state machine dispatches on the failure kind; everything else funnels
//! through [`OmnicError`].

/// Top-level error type for settings, history and tracker plumbing.
#[derive(Debug, thiserror::Error)]
pub enum OmnicError {
    /// Settings load/store error.
    #[error("settings error: {0}")]
    Settings(String),

    /// Watch-history log error.
    #[error("history error: {0}")]
    History(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, OmnicError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = OmnicError::Settings("cannot parse settings.json".into());
        assert_eq!(err.to_string(), "settings error: cannot parse settings.json");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = OmnicError::from(io);
        assert!(matches!(err, OmnicError::Io(_)));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<OmnicError>();
    }
}
