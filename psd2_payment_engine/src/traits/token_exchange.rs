use ppg_common::Secret;
use thiserror::Error;

use crate::session_objects::SessionId;

#[derive(Debug, Clone, Error)]
pub enum TokenExchangeError {
    #[error("The bank's token endpoint rejected the code exchange. {0}")]
    Rejected(String),
    #[error("Could not reach the bank's token endpoint. {0}")]
    Transport(String),
    #[error("The bank's token endpoint returned an unusable response. {0}")]
    InvalidResponse(String),
}

/// The outbound OAuth2 seam to the bank.
///
/// Implementations make the synchronous (awaited) server-to-server call that upgrades an
/// authorization code to an access token. Callers must attempt the exchange at most once per
/// received code; a replayed code is the bank's to reject, not ours to retry.
#[allow(async_fn_in_trait)]
pub trait TokenExchange {
    /// Exchanges an authorization code for an opaque access token.
    async fn exchange_code(&self, code: &str) -> Result<Secret<String>, TokenExchangeError>;

    /// Builds the URL the browser is sent to for user authentication at the bank, with the given
    /// session identifier carried as the OAuth2 `state` parameter.
    fn authorization_url(&self, session_id: &SessionId) -> String;
}
