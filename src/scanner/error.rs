use thiserror::Error;

/// Errors raised while inspecting an object or submitting its status report.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The engine refused the report (bad token, unknown execution).
    #[error("status report rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// Network-layer failure reaching a remote engine.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The engine this sender was wired to no longer exists.
    #[error("workflow engine is gone")]
    EngineGone,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_display() {
        let err = ScanError::Rejected {
            status: 409,
            message: "token already redeemed".into(),
        };
        assert_eq!(
            err.to_string(),
            "status report rejected (status 409): token already redeemed"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ScanError>();
    }
}
