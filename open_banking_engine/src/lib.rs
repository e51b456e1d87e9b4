//! Open Banking Engine
//!
//! The core of a PSD2-style Open Banking gateway: the rules that decide whether a Third-Party Provider (TPP) may read an
//! end-user's account data or initiate a payment on their behalf. This library is transport-agnostic; the HTTP surface
//! lives in `open_banking_server`.
//!
//! The library is divided into three main sections:
//! 1. Backend contracts ([`mod@traits`]) and the SQLite backend that implements them ([`SqliteDatabase`]). The data
//!    types stored by backends are defined in [`db_types`] and are public.
//! 2. The public API ([`mod@obe_api`]): TPP registration and validation (including rate limiting), the consent
//!    lifecycle, OAuth authorization codes, the banking data projections, and the audit trail.
//! 3. A small event channel ([`mod@events`]) used to write the audit trail off the request path.
pub mod db_types;
pub mod events;
mod obe_api;
mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use obe_api::{
    audit_api::AuditApi,
    banking_api::BankingApi,
    banking_objects,
    consent_api::ConsentApi,
    consent_objects,
    oauth_api::{OAuthApi, DEFAULT_CODE_TTL_SECS},
    oauth_objects,
    tpp_api::TppApi,
    tpp_objects,
};
pub use sqlite::{SqliteDatabase, SqliteDatabaseError};
