use chrono::Duration;
use ppg_common::Secret;
use thiserror::Error;

use crate::session_objects::{NewSession, OpenBankingSession, SessionId};

#[derive(Debug, Clone, Error)]
pub enum SessionStoreError {
    #[error("Session is expired or invalid. Restart the login flow.")]
    ExpiredOrInvalid,
    #[error("The authorization code for this session has already been exchanged.")]
    ExchangeAlreadyStarted,
    #[error("Session is not in a state that allows this operation. {0}")]
    InvalidTransition(String),
}

/// The `SessionStore` trait defines behaviour for managing Open-Banking sessions.
///
/// A session is created on login initiation and walks through
/// `AwaitingCode -> ExchangeInProgress -> TokenIssued`. The store is the synchronization point for
/// overlapping browser requests against the same session: [`SessionStore::begin_code_exchange`] is
/// an atomic transition, so only one caller can ever start the code exchange for a given session.
///
/// Every operation against an unknown or already-consumed identifier fails with
/// [`SessionStoreError::ExpiredOrInvalid`], which callers must treat as a short-circuit.
#[allow(async_fn_in_trait)]
pub trait SessionStore {
    /// Creates a session in the `AwaitingCode` phase and returns its fresh opaque identifier.
    async fn create_session(&self, new_session: NewSession) -> Result<SessionId, SessionStoreError>;

    /// Fetches a snapshot of the session.
    async fn fetch_session(&self, id: &SessionId) -> Result<OpenBankingSession, SessionStoreError>;

    /// Atomically moves the session from `AwaitingCode` to `ExchangeInProgress` and returns the
    /// updated snapshot. Fails with [`SessionStoreError::ExchangeAlreadyStarted`] if the exchange
    /// has already been started or completed for this session.
    async fn begin_code_exchange(&self, id: &SessionId) -> Result<OpenBankingSession, SessionStoreError>;

    /// Moves the session from `ExchangeInProgress` to `TokenIssued`, storing the access token.
    async fn complete_code_exchange(
        &self,
        id: &SessionId,
        access_token: Secret<String>,
    ) -> Result<(), SessionStoreError>;

    /// Removes the session and returns its final snapshot. Used after terminal success, and to
    /// destroy a session whose token exchange failed.
    async fn consume_session(&self, id: &SessionId) -> Result<OpenBankingSession, SessionStoreError>;

    /// Destroys sessions older than `max_age`, returning how many were removed.
    async fn purge_expired(&self, max_age: Duration) -> usize;
}
