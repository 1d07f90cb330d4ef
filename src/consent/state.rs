//! Pending consent decision kept in the session between redirects.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::SvsError;
use crate::host::state::CONSENT_KEY;
use crate::host::{InternalResponse, StateBag};

/// Context of a consent decision awaiting the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentState {
    /// Already filtered response.
    pub internal_response: InternalResponse,
    /// Attribute allow-list in force when the decision was requested.
    pub filter: BTreeSet<String>,
    #[serde(default)]
    pub requester_display_name: Option<String>,
    #[serde(default)]
    pub requester_logo: Option<String>,
}

impl ConsentState {
    /// Read the pending decision without consuming it.
    pub fn load(state: &StateBag) -> Result<Self, SvsError> {
        state
            .get(CONSENT_KEY)?
            .ok_or_else(|| no_pending(state))
    }

    /// Remove the pending decision from the session.
    pub fn take(state: &mut StateBag) -> Result<Self, SvsError> {
        match state.take(CONSENT_KEY)? {
            Some(consent) => Ok(consent),
            None => Err(no_pending(state)),
        }
    }

    pub fn store(&self, state: &mut StateBag) -> Result<(), SvsError> {
        state.insert(CONSENT_KEY, self)
    }
}

fn no_pending(state: &StateBag) -> SvsError {
    SvsError::NoPendingConsent {
        session_id: state.session_id.clone(),
    }
}
