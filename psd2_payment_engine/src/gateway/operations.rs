//! The payment operations this provider exposes to merchant-side callers.
//!
//! Three operations make up a payment: `authorize` issues an authorization reference (possibly
//! after a risk-based step-up), `challenge` re-submits an authorization together with the step-up
//! answer, and `finalize` executes a previously issued authorization exactly once.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use futures_util::{future::BoxFuture, FutureExt};
use log::*;
use ppg_common::MinorAmount;
use rand::{thread_rng, RngCore};
use serde_json::json;
use tokio::sync::Mutex;

use crate::gateway::{
    dispatch::{HandlerResult, ProcessCall},
    errors::ProcessingError,
    freshness::FreshnessBounds,
    objects::{AuthorizePayload, CallerContext, ChallengePayload, FinalizePayload, ProcessingRequest, ProcessingResponse},
};

pub const OP_AUTHORIZE: &str = "authorize";
pub const OP_CHALLENGE: &str = "challenge";
pub const OP_FINALIZE: &str = "finalize";

/// Name of the step-up challenge parameter. The sandbox challenge is a fixed knowledge question;
/// production deployments would plug a real RBA provider in here.
pub const RBA_CHALLENGE_FIELD: &str = "mother";
const DEFAULT_RBA_ANSWER: &str = "garbo";

#[derive(Debug, Clone)]
pub struct AuthorityOptions {
    /// The bank identity included in every response document.
    pub bank_common_name: String,
    /// Amounts at or above this limit trigger the step-up challenge.
    pub rba_threshold: MinorAmount,
    pub rba_challenge_answer: String,
    pub bounds: FreshnessBounds,
}

impl Default for AuthorityOptions {
    fn default() -> Self {
        Self {
            bank_common_name: "Open Banking Sandbox Bank".to_string(),
            rba_threshold: MinorAmount::from_major(1000),
            rba_challenge_answer: DEFAULT_RBA_ANSWER.to_string(),
            bounds: FreshnessBounds::default(),
        }
    }
}

struct IssuedAuthorization {
    amount: MinorAmount,
    currency: String,
    payee: String,
    issued_at: DateTime<Utc>,
}

/// Shared state behind the three operation handlers: the bank's identity, the RBA policy and the
/// set of authorizations issued but not yet finalized.
pub struct PaymentAuthority {
    options: AuthorityOptions,
    authorizations: Mutex<HashMap<String, IssuedAuthorization>>,
}

impl PaymentAuthority {
    pub fn new(options: AuthorityOptions) -> Self {
        Self { options, authorizations: Mutex::new(HashMap::new()) }
    }

    async fn authorize(
        &self,
        ctx: &CallerContext,
        payload: AuthorizePayload,
        challenge_answer: Option<&str>,
    ) -> HandlerResult {
        let now = Utc::now();
        self.options.bounds.check_clock_skew(payload.time_stamp, now)?;
        self.options.bounds.check_auth_age(payload.user_authenticated_at, now)?;
        if payload.account_id.trim().is_empty() {
            return Err(ProcessingError::declined("No payment account was specified."));
        }
        if payload.amount.value() <= 0 {
            return Err(ProcessingError::declined(format!(
                "Cannot authorize a non-positive amount ({}).",
                payload.amount
            )));
        }
        if payload.amount >= self.options.rba_threshold {
            match challenge_answer {
                None => {
                    info!(
                        "🏦️ {} {} from {} is at or above the step-up limit, issuing a challenge",
                        payload.amount, payload.currency, ctx.caller_address
                    );
                    return Ok(self.challenge_request(&payload));
                },
                Some(answer) if answer != self.options.rba_challenge_answer => {
                    debug!("🏦️ Challenge answer from {} did not match", ctx.caller_address);
                    return Err(ProcessingError::declined(
                        "Additional verification failed. The challenge answer did not match.",
                    ));
                },
                Some(_) => trace!("🏦️ Challenge answer accepted"),
            }
        }
        Ok(self.issue_authorization(payload, now).await)
    }

    fn challenge_request(&self, payload: &AuthorizePayload) -> ProcessingResponse {
        ProcessingResponse::new(json!({
            "status": "challenge",
            "provider": self.options.bank_common_name,
            "text": format!(
                "Payments of {} {} and above require an additional verification step.",
                self.options.rba_threshold, payload.currency
            ),
            "challenges": [{ "name": RBA_CHALLENGE_FIELD, "label": "Mother's maiden name" }],
        }))
    }

    async fn issue_authorization(&self, payload: AuthorizePayload, now: DateTime<Utc>) -> ProcessingResponse {
        let reference = new_reference();
        info!(
            "🏦️ Authorized {} {} to '{}' from account {} [{reference}]",
            payload.amount, payload.currency, payload.payee, payload.account_id
        );
        let issued = IssuedAuthorization {
            amount: payload.amount,
            currency: payload.currency.clone(),
            payee: payload.payee.clone(),
            issued_at: now,
        };
        self.authorizations.lock().await.insert(reference.clone(), issued);
        ProcessingResponse::new(json!({
            "status": "authorized",
            "provider": self.options.bank_common_name,
            "authorizationRef": reference,
            "accountId": payload.account_id,
            "amount": payload.amount,
            "currency": payload.currency,
            "payee": payload.payee,
            "issuedAt": now.to_rfc3339(),
        }))
    }

    async fn finalize(&self, ctx: &CallerContext, payload: FinalizePayload) -> HandlerResult {
        let now = Utc::now();
        self.options.bounds.check_clock_skew(payload.time_stamp, now)?;
        let reference = payload.authorization_ref;
        let authorization = self.authorizations.lock().await.remove(&reference).ok_or_else(|| {
            debug!("🏦️ {} asked to finalize unknown authorization {reference}", ctx.caller_address);
            ProcessingError::declined(format!("Authorization {reference} is unknown or has already been finalized."))
        })?;
        if now - authorization.issued_at > self.options.bounds.max_auth_age {
            return Err(ProcessingError::declined(format!("Authorization {reference} has expired.")));
        }
        info!(
            "🏦️ Finalized {} {} to '{}' [{reference}]",
            authorization.amount, authorization.currency, authorization.payee
        );
        Ok(ProcessingResponse::new(json!({
            "status": "finalized",
            "provider": self.options.bank_common_name,
            "authorizationRef": reference,
            "amount": authorization.amount,
            "currency": authorization.currency,
            "payee": authorization.payee,
            "finalizedAt": now.to_rfc3339(),
        })))
    }
}

fn new_reference() -> String {
    let mut bytes = [0u8; 8];
    thread_rng().fill_bytes(&mut bytes);
    format!("PA-{}", bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
}

//----------------------------------  Handlers  ------------------------------------------------------------------------

pub struct AuthorizeHandler(pub Arc<PaymentAuthority>);

impl ProcessCall for AuthorizeHandler {
    fn process<'a>(&'a self, ctx: &'a CallerContext, request: &'a ProcessingRequest) -> BoxFuture<'a, HandlerResult> {
        async move {
            let payload: AuthorizePayload = request.payload()?;
            self.0.authorize(ctx, payload, None).await
        }
        .boxed()
    }
}

pub struct ChallengeHandler(pub Arc<PaymentAuthority>);

impl ProcessCall for ChallengeHandler {
    fn process<'a>(&'a self, ctx: &'a CallerContext, request: &'a ProcessingRequest) -> BoxFuture<'a, HandlerResult> {
        async move {
            let payload: ChallengePayload = request.payload()?;
            self.0.authorize(ctx, payload.request, Some(&payload.challenge_answer)).await
        }
        .boxed()
    }
}

pub struct FinalizeHandler(pub Arc<PaymentAuthority>);

impl ProcessCall for FinalizeHandler {
    fn process<'a>(&'a self, ctx: &'a CallerContext, request: &'a ProcessingRequest) -> BoxFuture<'a, HandlerResult> {
        async move {
            let payload: FinalizePayload = request.payload()?;
            self.0.finalize(ctx, payload).await
        }
        .boxed()
    }
}
