use chrono::Duration;
use mockall::mock;
use ppg_common::Secret;
use psd2_payment_engine::{
    session_objects::{NewSession, OpenBankingSession, SessionId},
    traits::{SessionStore, SessionStoreError, TokenExchange, TokenExchangeError},
};

mock! {
    pub Sessions {}
    impl SessionStore for Sessions {
        async fn create_session(&self, new_session: NewSession) -> Result<SessionId, SessionStoreError>;
        async fn fetch_session(&self, id: &SessionId) -> Result<OpenBankingSession, SessionStoreError>;
        async fn begin_code_exchange(&self, id: &SessionId) -> Result<OpenBankingSession, SessionStoreError>;
        async fn complete_code_exchange(&self, id: &SessionId, access_token: Secret<String>) -> Result<(), SessionStoreError>;
        async fn consume_session(&self, id: &SessionId) -> Result<OpenBankingSession, SessionStoreError>;
        async fn purge_expired(&self, max_age: Duration) -> usize;
    }
}

mock! {
    pub Bank {}
    impl TokenExchange for Bank {
        async fn exchange_code(&self, code: &str) -> Result<Secret<String>, TokenExchangeError>;
        fn authorization_url(&self, session_id: &SessionId) -> String;
    }
}
