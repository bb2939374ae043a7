//! PSD2 Payment Engine
//!
//! The provider-side core of the payment gateway, kept free of HTTP specifics so the server crate
//! stays a thin shell. The library is divided into two main sections:
//! 1. Open-Banking session management ([`session_objects`], [`mod@store`]): opaque sessions that
//!    carry a user through the bank's OAuth2 authorization-code flow exactly once. Backends
//!    implement the [`traits::SessionStore`] trait; an in-memory backend is provided.
//! 2. The processing core ([`mod@gateway`]): envelope objects, the operation dispatcher with its
//!    idempotency cache, and the payment operations (authorize, challenge, finalize).
//!
//! The outbound seam to the bank is the [`traits::TokenExchange`] trait; the server crate provides
//! the reqwest-backed implementation.

pub mod gateway;
pub mod session_objects;
mod store;
pub mod traits;

pub use gateway::{
    dispatch::{HandlerResult, ProcessCall, ProcessingApi},
    errors::ProcessingError,
    freshness::FreshnessBounds,
    idempotency::{Fingerprint, IdempotencyCache},
    objects::{CallerContext, ProcessingRequest, ProcessingResponse},
    operations::{
        AuthorityOptions,
        AuthorizeHandler,
        ChallengeHandler,
        FinalizeHandler,
        PaymentAuthority,
        OP_AUTHORIZE,
        OP_CHALLENGE,
        OP_FINALIZE,
    },
};
pub use store::MemorySessionStore;
pub use traits::{SessionStore, SessionStoreError, TokenExchange, TokenExchangeError};
