use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use ppg_common::MinorAmount;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::gateway::errors::ProcessingError;

/// Per-request caller metadata, captured before any parsing so that failure messages can name the
/// caller even when the body is garbage. Exists only for the duration of one request.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub caller_address: String,
    pub requested_url: String,
}

impl CallerContext {
    pub fn new<S1: Into<String>, S2: Into<String>>(caller_address: S1, requested_url: S2) -> Self {
        Self { caller_address: caller_address.into(), requested_url: requested_url.into() }
    }
}

impl Display for CallerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "From {} URL={}", self.caller_address, self.requested_url)
    }
}

/// One validated payment-processing call: a JSON object, immutable once parsed.
#[derive(Debug, Clone)]
pub struct ProcessingRequest {
    document: Value,
}

impl ProcessingRequest {
    /// Parses a request body. The body must be present and parse as a JSON *object*; anything
    /// else is a malformed request carrying the underlying parser message.
    pub fn from_slice(body: &[u8]) -> Result<Self, ProcessingError> {
        if body.is_empty() {
            return Err(ProcessingError::MalformedRequest("Request body is missing".to_string()));
        }
        let document: Value =
            serde_json::from_slice(body).map_err(|e| ProcessingError::MalformedRequest(e.to_string()))?;
        if !document.is_object() {
            return Err(ProcessingError::MalformedRequest("Request body is not a JSON object".to_string()));
        }
        Ok(Self { document })
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Re-serializes the parsed document. serde_json's map keeps its keys ordered, so two bodies
    /// that differ only in key order or whitespace produce the same canonical form.
    pub fn canonical(&self) -> String {
        self.document.to_string()
    }

    /// Deserializes the document into an operation-specific payload.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, ProcessingError> {
        serde_json::from_value(self.document.clone()).map_err(|e| ProcessingError::MalformedRequest(e.to_string()))
    }
}

/// The JSON document a successful operation handler produces. Written verbatim as the HTTP body.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingResponse {
    document: Value,
}

impl ProcessingResponse {
    pub fn new(document: Value) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn to_body(&self) -> String {
        self.document.to_string()
    }
}

//----------------------------------  Operation payloads  -------------------------------------------------------------

/// The fields common to an authorization call from the merchant-side payment system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizePayload {
    /// Client-supplied wall-clock time of the call, checked against the permitted clock skew.
    pub time_stamp: DateTime<Utc>,
    /// When the end user completed authentication with their payment credential.
    pub user_authenticated_at: DateTime<Utc>,
    /// The account (IBAN or sandbox account id) to draw the payment from.
    pub account_id: String,
    pub amount: MinorAmount,
    pub currency: String,
    pub payee: String,
}

/// A re-submission of an authorization together with the answer to a step-up challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengePayload {
    #[serde(flatten)]
    pub request: AuthorizePayload,
    pub challenge_answer: String,
}

/// The final leg: executes a previously issued authorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizePayload {
    pub time_stamp: DateTime<Utc>,
    pub authorization_ref: String,
}
