//! The reqwest-backed client for the bank's Open-Banking OAuth2 endpoints.
//!
//! The exact PSD2 API surface is bank-specific and out of scope here; the gateway only needs two
//! things from the bank: a URL to send the user's browser to, and the server-to-server code
//! exchange that yields an opaque access token.

use std::sync::Arc;

use log::*;
use ppg_common::Secret;
use psd2_payment_engine::{session_objects::SessionId, TokenExchange, TokenExchangeError};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT},
    Client,
    Url,
};
use serde::Deserialize;

use crate::{config::BankConfig, errors::ServerError};

const OPEN_BANKING_SCOPE: &str = "payments";

#[derive(Clone)]
pub struct OpenBankingApi {
    config: BankConfig,
    auth_url: Url,
    client: Arc<Client>,
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
}

impl OpenBankingApi {
    pub fn new(config: BankConfig) -> Result<Self, ServerError> {
        let auth_url = Url::parse(&config.auth_url)
            .map_err(|e| ServerError::ConfigurationError(format!("Invalid bank authorization URL: {e}")))?;
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.call_timeout)
            .build()
            .map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self { config, auth_url, client: Arc::new(client) })
    }
}

impl TokenExchange for OpenBankingApi {
    async fn exchange_code(&self, code: &str) -> Result<Secret<String>, TokenExchangeError> {
        debug!("🏛️ Exchanging an authorization code at {}", self.config.token_url);
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_url.as_str()),
            ("client_id", self.config.client_id.as_str()),
        ];
        let response = self
            .client
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(self.config.client_secret.reveal()))
            .form(&params)
            .send()
            .await
            .map_err(|e| TokenExchangeError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(TokenExchangeError::Rejected(format!("HTTP {status}: {message}")));
        }
        let token = response
            .json::<TokenEndpointResponse>()
            .await
            .map_err(|e| TokenExchangeError::InvalidResponse(e.to_string()))?;
        info!("🏛️ Obtained an access token from the bank");
        Ok(Secret::new(token.access_token))
    }

    fn authorization_url(&self, session_id: &SessionId) -> String {
        let mut url = self.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_url)
            .append_pair("scope", OPEN_BANKING_SCOPE)
            .append_pair("state", session_id.as_str());
        url.to_string()
    }
}
