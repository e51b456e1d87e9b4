use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{AuthorizationCode, NewAuthorizationCode},
    traits::TppApiError,
};

#[derive(Debug, Clone, Error)]
pub enum OAuthApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Invalid scope: {0}")]
    InvalidScope(String),
    #[error("Invalid grant: {0}")]
    InvalidGrant(String),
    #[error(transparent)]
    Tpp(#[from] TppApiError),
}

impl From<sqlx::Error> for OAuthApiError {
    fn from(e: sqlx::Error) -> Self {
        OAuthApiError::DatabaseError(e.to_string())
    }
}

/// Storage for OAuth2 authorization codes.
#[allow(async_fn_in_trait)]
pub trait AuthorizationCodeStore {
    async fn insert_authorization_code(&self, code: NewAuthorizationCode) -> Result<AuthorizationCode, OAuthApiError>;

    /// Atomically marks the code as used and returns it.
    ///
    /// Returns `None` if the code does not exist, has already been used, or expired before `at`. A code can be
    /// consumed at most once, even under concurrent calls.
    async fn consume_authorization_code(
        &self,
        code: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<AuthorizationCode>, OAuthApiError>;
}
