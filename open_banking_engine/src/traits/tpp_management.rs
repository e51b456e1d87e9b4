use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{NewTpp, Tpp, TppStatus};

#[derive(Debug, Clone, Error)]
pub enum TppApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("A TPP with id {0} is already registered")]
    AlreadyExists(String),
    #[error("TPP {0} is not registered")]
    NotFound(String),
    #[error("TPP status: {0}")]
    NotAuthorized(TppStatus),
    #[error("TPP registration expired")]
    Expired,
    #[error("Rate limit of {limit} requests per hour exceeded ({count} requests)")]
    RateLimitExceeded { limit: i64, count: i64 },
    #[error("Invalid registration request: {0}")]
    InvalidRegistration(String),
}

impl From<sqlx::Error> for TppApiError {
    fn from(e: sqlx::Error) -> Self {
        TppApiError::DatabaseError(e.to_string())
    }
}

/// The `TppManagement` trait defines behaviour for the registry of Third-Party Providers.
///
/// TPPs are never deleted. Their lifecycle is managed entirely through `authorization_status`.
///
/// The trait also owns the rate-limit ledger. Usage is recorded as individual entries that are summed over the trailing
/// hour; there is no mutable counter to race on.
#[allow(async_fn_in_trait)]
pub trait TppManagement {
    /// Stores a new TPP with status `pending`. Returns [`TppApiError::AlreadyExists`] if the `tpp_id` is taken.
    async fn insert_tpp(&self, tpp: NewTpp) -> Result<Tpp, TppApiError>;

    /// Fetches the TPP with the given public identifier. If no TPP exists, `None` is returned.
    async fn fetch_tpp(&self, tpp_id: &str) -> Result<Option<Tpp>, TppApiError>;

    /// Administrative status change. Returns the updated record, or `None` if the TPP is unknown.
    async fn update_tpp_status(&self, tpp_id: &str, status: TppStatus) -> Result<Option<Tpp>, TppApiError>;

    /// Appends a usage entry `(tpp_id, endpoint, at, 1)` and returns the number of requests recorded for the TPP
    /// in the hour ending at `at`, *including* this one.
    ///
    /// The append and the sum must happen atomically, so that concurrent callers never undercount.
    async fn record_usage(&self, tpp_id: &str, endpoint: &str, at: DateTime<Utc>) -> Result<i64, TppApiError>;

    /// The number of requests recorded for the TPP since `since`.
    async fn usage_since(&self, tpp_id: &str, since: DateTime<Utc>) -> Result<i64, TppApiError>;
}
