//! Data types for per-user Open-Banking sessions.
//!
//! A session is created when a user initiates a login against a bank, lives while the browser
//! completes the bank's authentication flow, and ends when the authorization code has been
//! exchanged for an access token (or when it expires first).

use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use ppg_common::Secret;
use rand::{thread_rng, RngCore};
use serde::{Deserialize, Serialize};

/// An opaque session identifier. Generated from 32 bytes of OS randomness and carried by the
/// browser through the bank redirect as the OAuth2 `state` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        thread_rng().fill_bytes(&mut bytes);
        let token = bytes.iter().map(|b| format!("{b:02x}")).collect::<String>();
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The request to create a new session, supplied by the login-initiation endpoint.
#[derive(Debug, Clone)]
pub struct NewSession {
    /// Free-form hint identifying the user to the bank (sandbox banks typically ignore it).
    pub user_hint: String,
    /// Identifier of the bank the user chose to authenticate against.
    pub bank_id: String,
    /// Where the browser is sent once the code exchange has completed.
    pub login_success_url: String,
}

/// Where a session is in the authorization-code exchange.
///
/// A session holds an access token only in the terminal phase, so "awaiting code" and
/// "token issued" are mutually exclusive by construction.
#[derive(Debug, Clone)]
pub enum SessionPhase {
    /// Waiting for the bank to redirect the browser back with an authorization code.
    AwaitingCode,
    /// A redirect has arrived and the code exchange has started. A second redirect for the same
    /// session is rejected while in this phase.
    ExchangeInProgress,
    /// The code was exchanged for an access token.
    TokenIssued(Secret<String>),
}

#[derive(Debug, Clone)]
pub struct OpenBankingSession {
    pub id: SessionId,
    pub user_hint: String,
    pub bank_id: String,
    pub login_success_url: String,
    pub phase: SessionPhase,
    pub created_at: DateTime<Utc>,
}

impl OpenBankingSession {
    pub fn new(id: SessionId, new_session: NewSession) -> Self {
        Self {
            id,
            user_hint: new_session.user_hint,
            bank_id: new_session.bank_id,
            login_success_url: new_session.login_success_url,
            phase: SessionPhase::AwaitingCode,
            created_at: Utc::now(),
        }
    }

    pub fn access_token(&self) -> Option<&Secret<String>> {
        match &self.phase {
            SessionPhase::TokenIssued(token) => Some(token),
            _ => None,
        }
    }
}
