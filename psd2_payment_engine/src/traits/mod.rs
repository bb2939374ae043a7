//! Interface contracts for the gateway's backends.
//!
//! The gateway core never talks to a concrete session map or bank API directly. Instead it is
//! written against the traits in this module, so that backends can be swapped (an in-memory map
//! today, Redis tomorrow) and so that the HTTP layer can be tested against mocks.
//!
//! * [`SessionStore`] manages per-user Open-Banking sessions and enforces the at-most-once
//!   authorization-code exchange.
//! * [`TokenExchange`] is the outbound seam to the bank: it upgrades an authorization code to an
//!   access token and knows how to build the user-authorization URL.

mod session_store;
mod token_exchange;

pub use session_store::{SessionStore, SessionStoreError};
pub use token_exchange::{TokenExchange, TokenExchangeError};
