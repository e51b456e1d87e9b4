//! # Open Banking gateway server
//!
//! The HTTP surface of the gateway. It is responsible for:
//! * Registering Third-Party Providers (TPPs), and validating and rate limiting them on every protected call.
//! * The OAuth2 authorization-code flow, and minting the bearer tokens that end-users delegate to TPPs.
//! * The consent lifecycle endpoints.
//! * Serving account, balance and transaction data, payment initiation and funds confirmation, as JSON:API documents.
//! * Giving every interaction an id, and writing it to the audit trail.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/openapi.json`, `/spec`: The OpenAPI description of everything else.
//!
//! See [routes](routes/index.html) for the rest.
pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod json_api;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
