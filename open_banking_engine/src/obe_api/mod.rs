//! # Open Banking engine public API
//!
//! The `obe_api` module exposes the programmatic API of the gateway core. The API is modular, so that callers can pick
//! and choose the functionality they need, and back each part with whatever storage implements the relevant traits.
//!
//! * [`tpp_api`] registers Third-Party Providers and validates them (status, expiry, rate limit) on every call.
//! * [`consent_api`] manages the consent lifecycle and enforces consents before data is released.
//! * [`oauth_api`] issues and redeems single-use authorization codes.
//! * [`banking_api`] projects accounts, balances and transactions, and records payment initiations.
//! * [`audit_api`] writes and reads the audit trail.
//!
//! # API usage
//!
//! Every API is created by supplying a backend that implements the traits it needs:
//!
//! ```rust,ignore
//! use open_banking_engine::{SqliteDatabase, TppApi};
//! let db = SqliteDatabase::new_with_url("sqlite://data/open_banking.db", 25).await?;
//! let api = TppApi::new(db);
//! let tpp = api.validate("tpp-demo", "/accounts").await?;
//! ```
pub mod audit_api;
pub mod banking_api;
pub mod banking_objects;
pub mod consent_api;
pub mod consent_objects;
pub mod oauth_api;
pub mod oauth_objects;
pub mod tpp_api;
pub mod tpp_objects;
