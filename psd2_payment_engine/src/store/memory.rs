use std::{collections::HashMap, sync::Arc};

use chrono::{Duration, Utc};
use log::*;
use ppg_common::Secret;
use tokio::sync::Mutex;

use crate::{
    session_objects::{NewSession, OpenBankingSession, SessionId, SessionPhase},
    traits::{SessionStore, SessionStoreError},
};

/// Process-wide in-memory session store.
///
/// All state transitions happen under the map lock, so they are atomic with respect to each other.
/// The lock is never held across a downstream call: callers run the token exchange between
/// `begin_code_exchange` and `complete_code_exchange`, during which the session sits in the
/// `ExchangeInProgress` phase and rejects any overlapping redirect for the same identifier.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<Mutex<HashMap<SessionId, OpenBankingSession>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    async fn create_session(&self, new_session: NewSession) -> Result<SessionId, SessionStoreError> {
        let id = SessionId::random();
        let session = OpenBankingSession::new(id.clone(), new_session);
        debug!("🗝️ Created session {id} for bank '{}'", session.bank_id);
        self.sessions.lock().await.insert(id.clone(), session);
        Ok(id)
    }

    async fn fetch_session(&self, id: &SessionId) -> Result<OpenBankingSession, SessionStoreError> {
        self.sessions.lock().await.get(id).cloned().ok_or(SessionStoreError::ExpiredOrInvalid)
    }

    async fn begin_code_exchange(&self, id: &SessionId) -> Result<OpenBankingSession, SessionStoreError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(id).ok_or(SessionStoreError::ExpiredOrInvalid)?;
        match session.phase {
            SessionPhase::AwaitingCode => {
                session.phase = SessionPhase::ExchangeInProgress;
                trace!("🗝️ Session {id} is exchanging its authorization code");
                Ok(session.clone())
            },
            SessionPhase::ExchangeInProgress | SessionPhase::TokenIssued(_) => {
                warn!("🗝️ Rejecting a second code exchange for session {id}");
                Err(SessionStoreError::ExchangeAlreadyStarted)
            },
        }
    }

    async fn complete_code_exchange(
        &self,
        id: &SessionId,
        access_token: Secret<String>,
    ) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(id).ok_or(SessionStoreError::ExpiredOrInvalid)?;
        match session.phase {
            SessionPhase::ExchangeInProgress => {
                session.phase = SessionPhase::TokenIssued(access_token);
                debug!("🗝️ Session {id} now holds an access token");
                Ok(())
            },
            _ => Err(SessionStoreError::InvalidTransition(
                "An access token can only be stored while a code exchange is in progress.".to_string(),
            )),
        }
    }

    async fn consume_session(&self, id: &SessionId) -> Result<OpenBankingSession, SessionStoreError> {
        let session = self.sessions.lock().await.remove(id).ok_or(SessionStoreError::ExpiredOrInvalid)?;
        debug!("🗝️ Session {id} consumed");
        Ok(session)
    }

    async fn purge_expired(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.created_at > cutoff);
        before - sessions.len()
    }
}
