//! # PPG server
//! This module hosts the server code for the PSD2 payment gateway (PPG). It is responsible for:
//! Walking a browser through the bank's OAuth2 authorization-code flow (login initiation and the
//! redirect leg, including the server-to-server code exchange).
//! Receiving signed-JSON payment-processing calls from merchant-side systems, validating their
//! envelope, and dispatching them to the payment operations.
//! Translating every failure into the uniform plain-text error response.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/account/login`: GET shows a minimal confirmation page; POST creates an Open-Banking session
//!   and redirects the browser to the bank.
//! * `/api/redirect`: The redirect target the bank sends the browser back to with the
//!   authorization code.
//! * `/processing/{operation}`: The server-to-server JSON payment-processing endpoint.

pub mod cli;
pub mod config;
pub mod errors;

pub mod data_objects;
pub mod expiry_worker;
pub mod helpers;
pub mod integrations;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
