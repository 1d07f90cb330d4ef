//! Error kinds surfaced by the plugin services.

use thiserror::Error;

/// User-facing message shown when the user declines attribute release.
pub const CONSENT_DENIED_MESSAGE: &str =
    "You did not give consent to release your information, the authentication was aborted";

#[derive(Error, Debug)]
pub enum SvsError {
    /// accept/deny/render reached without a prior `process` for this session,
    /// or after the pending decision was already consumed.
    #[error("no pending consent for session {session_id}")]
    NoPendingConsent { session_id: String },

    /// The user declined; the authentication attempt must be terminated.
    #[error("consent denied: {message}")]
    ConsentDenied { message: String },

    /// A state slot could not be (de)serialized.
    #[error("malformed session state in slot {slot}")]
    State {
        slot: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SvsError {
    pub fn consent_denied() -> Self {
        Self::ConsentDenied {
            message: CONSENT_DENIED_MESSAGE.to_string(),
        }
    }

    /// HTTP status the host should answer with when this error ends a request.
    pub fn status(&self) -> u16 {
        match self {
            SvsError::NoPendingConsent { .. } => 400,
            SvsError::ConsentDenied { .. } => 403,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = SvsError::NoPendingConsent {
            session_id: "abc".to_string(),
        };
        assert_eq!(err.status(), 400);
        assert!(err.to_string().contains("abc"));

        assert_eq!(SvsError::consent_denied().status(), 403);
        assert_eq!(SvsError::Config("bad".to_string()).status(), 500);
    }
}
