//! # Gateway processing core
//!
//! The modules here make up the server-to-server half of the gateway:
//!
//! * [`objects`] holds the request/response envelope types and the operation payloads.
//! * [`dispatch`] routes a validated request to the handler registered for its operation.
//! * [`idempotency`] absorbs retried and concurrent duplicate requests before a handler runs.
//! * [`operations`] contains the payment operations themselves (authorize, challenge, finalize).
//! * [`freshness`] enforces the clock-skew and authentication-age bounds.
//!
//! The HTTP layer validates the envelope, builds a [`objects::CallerContext`], and calls
//! [`dispatch::ProcessingApi::process`]; everything after that point is HTTP-agnostic.

pub mod dispatch;
pub mod errors;
pub mod freshness;
pub mod idempotency;
pub mod objects;
pub mod operations;
