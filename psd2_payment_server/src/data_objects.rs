use serde::{Deserialize, Serialize};

/// Form body of the login-initiation POST. Everything is optional: the sandbox only supports a
/// single user, but the fields are kept so the flow matches a multi-bank production setup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub user_hint: Option<String>,
    #[serde(default)]
    pub bank_id: Option<String>,
}

/// Query parameters the bank attaches when redirecting the browser back to us. Both are optional
/// at the type level so their absence maps to our own errors instead of a framework 400.
#[derive(Debug, Clone, Deserialize)]
pub struct RedirectParams {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}
