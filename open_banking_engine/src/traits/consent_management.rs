use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{Consent, ConsentStatus, NewConsent, Permission},
    traits::TppManagement,
};

#[derive(Debug, Clone, Error)]
pub enum ConsentApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Consent {0} does not exist")]
    NotFound(String),
    #[error("An authenticated end-user is required")]
    Unauthenticated,
    #[error("The x-tpp-id header is required")]
    MissingTpp,
    #[error("TPP {0} is not registered")]
    UnknownTpp(String),
    #[error("Invalid consent request: {0}")]
    InvalidRequest(String),
    #[error("Consent cannot move from {from} to {to}")]
    InvalidTransition { from: ConsentStatus, to: ConsentStatus },
    #[error("No valid consent for {0}")]
    NoValidConsent(Permission),
}

impl From<sqlx::Error> for ConsentApiError {
    fn from(e: sqlx::Error) -> Self {
        ConsentApiError::DatabaseError(e.to_string())
    }
}

/// Persistence of data-access consents.
///
/// Consents are granted to registered TPPs, so a consent store is also a TPP registry.
///
/// Backends never decide whether a consent is *usable*; expiry is evaluated by the caller against `valid_until` every
/// time the consent is read.
#[allow(async_fn_in_trait)]
pub trait ConsentManagement: TppManagement {
    /// Stores a new consent in `pending` status with SCA `required`.
    async fn insert_consent(&self, consent: NewConsent) -> Result<Consent, ConsentApiError>;

    async fn fetch_consent(&self, consent_id: &str) -> Result<Option<Consent>, ConsentApiError>;

    /// Marks a `pending` consent as `authorized`, with SCA finalised and `authorized_at` stamped.
    ///
    /// The update is conditional on the consent still being `pending`. If it is not (or it does not exist), `None` is
    /// returned and nothing changes.
    async fn authorize_consent(&self, consent_id: &str, at: DateTime<Utc>) -> Result<Option<Consent>, ConsentApiError>;

    /// Revokes the consent, stamping `revoked_at`. Revoking an already revoked consent leaves it untouched.
    /// Returns `None` if the consent does not exist.
    async fn revoke_consent(&self, consent_id: &str, at: DateTime<Utc>) -> Result<Option<Consent>, ConsentApiError>;

    /// The most recent `authorized` consent for the `(tpp_id, user_id)` pair that includes `permission` and whose
    /// `valid_until` is after `at`.
    async fn find_active_consent(
        &self,
        tpp_id: &str,
        user_id: &str,
        permission: Permission,
        at: DateTime<Utc>,
    ) -> Result<Option<Consent>, ConsentApiError>;

    /// Stamps `last_action_date` on the consent.
    async fn touch_consent(&self, consent_id: &str, at: DateTime<Utc>) -> Result<(), ConsentApiError>;
}
