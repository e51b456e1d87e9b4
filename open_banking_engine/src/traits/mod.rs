//! #  Backend contracts.
//!
//! This module defines the behaviour that a storage backend needs to expose in order to be used by the Open Banking
//! gateway. Each concern gets its own trait and its own error type, so that the API layer (and the tests) can depend on
//! exactly the slice of the backend they need.
//!
//! * [`TppManagement`] stores registered Third-Party Providers, and the append-only rate-limit ledger.
//! * [`ConsentManagement`] persists consents and their state transitions.
//! * [`AuthorizationCodeStore`] issues and consumes single-use OAuth authorization codes.
//! * [`AuditLog`] is the append-only request/response audit trail.
//! * [`BankingData`] is the (external) business data store: accounts, balances, transactions and payments.
mod audit_log;
mod authorization_codes;
mod banking_data;
mod consent_management;
mod tpp_management;

pub use audit_log::{AuditApiError, AuditLog};
pub use authorization_codes::{AuthorizationCodeStore, OAuthApiError};
pub use banking_data::{BankingApiError, BankingData};
pub use consent_management::{ConsentApiError, ConsentManagement};
pub use tpp_management::{TppApiError, TppManagement};
