use thiserror::Error;

/// Result of a single gated call. Gates never return anything else.
pub type CallOutcome<T> = Result<T, GateError>;

#[derive(Debug, Error)]
pub enum GateError {
    /// A blocking gate already had a call in flight; the operation was not run.
    #[error("another call is still in progress")]
    ConcurrentCallBlocked,
    #[error("call failed: {error:#}")]
    CallFailed { error: anyhow::Error },
}

impl GateError {
    pub fn failed(error: impl Into<anyhow::Error>) -> Self {
        Self::CallFailed {
            error: error.into(),
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::ConcurrentCallBlocked)
    }

    /// The wrapped operation's error, if the call got far enough to fail.
    pub fn call_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::ConcurrentCallBlocked => None,
            Self::CallFailed { error } => Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn failed_keeps_original_error_for_downcast() {
        let err = GateError::failed(io::Error::other("boom"));
        let inner = err
            .call_error()
            .and_then(|e| e.downcast_ref::<io::Error>())
            .expect("io error preserved");
        assert_eq!(inner.to_string(), "boom");
        assert!(!err.is_blocked());
    }

    #[test]
    fn blocked_has_no_payload() {
        let err = GateError::ConcurrentCallBlocked;
        assert!(err.is_blocked());
        assert!(err.call_error().is_none());
    }
}
