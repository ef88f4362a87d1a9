//! Error types for nevars-core

use crate::session::SessionState;

/// Result type alias for nevars operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed cause carried by [`Error::ConnectionSetupFailed`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Command frame parameters are inconsistent with the mode
    #[error("Invalid frame request: {0}")]
    InvalidFrameRequest(String),

    /// OBIS address does not match `XX.XX.XX*XX`
    #[error("Invalid OBIS address format: {0:?}")]
    InvalidAddressFormat(String),

    /// Response cannot be parsed
    #[error("Malformed frame: {reason} (raw: {raw})")]
    MalformedFrame {
        reason: String,
        raw: String,
    },

    /// Response parsed but its BCC does not match
    #[error("Checksum mismatch: expected 0x{expected:02X}, received 0x{received:02X}")]
    ChecksumMismatch {
        expected: u8,
        received: u8,
    },

    /// Well-formed response that is not the expected acknowledgement
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Meter answered with a negative acknowledgement or error code
    #[error("Meter returned error: {0}")]
    ErrorCodeReceived(String),

    /// A handshake step failed
    #[error("Connection setup failed in state {state:?}: {source}")]
    ConnectionSetupFailed {
        state: SessionState,
        #[source]
        source: BoxError,
    },

    /// Operation requires an authenticated session
    #[error("Session not ready (state: {state:?})")]
    SessionNotReady {
        state: SessionState,
    },
}

impl Error {
    pub(crate) fn malformed(reason: impl Into<String>, raw: &[u8]) -> Self {
        Self::MalformedFrame {
            reason: reason.into(),
            raw: escape(raw),
        }
    }

    /// Wrap a handshake-step failure
    pub fn setup_failed(state: SessionState, source: impl Into<BoxError>) -> Self {
        Self::ConnectionSetupFailed {
            state,
            source: source.into(),
        }
    }

    /// Check if the response was structurally unusable (checksum failures included)
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedFrame { .. } | Self::ChecksumMismatch { .. })
    }

    /// Check if the meter itself reported the failure
    pub fn is_meter_error(&self) -> bool {
        matches!(self, Self::ErrorCodeReceived(_))
    }

    /// Check if the session must be reopened before further use
    pub fn requires_reconnect(&self) -> bool {
        matches!(
            self,
            Self::ConnectionSetupFailed { .. } | Self::SessionNotReady { .. }
        )
    }
}

/// Render raw response bytes for error messages
pub(crate) fn escape(raw: &[u8]) -> String {
    raw.escape_ascii().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_mismatch_is_malformed() {
        let err = Error::ChecksumMismatch {
            expected: 0x52,
            received: 0x53,
        };
        assert!(err.is_malformed());
        assert!(!err.requires_reconnect());
    }

    #[test]
    fn test_setup_failed_keeps_source() {
        let cause = Error::malformed("too short", b"/TPC");
        let err = Error::setup_failed(SessionState::Requested, cause);

        assert!(err.requires_reconnect());
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("too short"));
    }

    #[test]
    fn test_malformed_escapes_raw() {
        let err = Error::malformed("no parenthesis", b"\x02600100FF\x03");
        assert_eq!(
            err.to_string(),
            "Malformed frame: no parenthesis (raw: \\x02600100FF\\x03)"
        );
    }
}
