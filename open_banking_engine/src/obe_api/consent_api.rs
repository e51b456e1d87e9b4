//! The consent lifecycle.
//!
//! ```text
//!   pending --authorise--> authorized --revoke--> revoked
//! ```
//!
//! Expiry is never written by a background job. A consent whose `valid_until` has passed is rejected on read exactly
//! like a revoked one.
use std::fmt::Debug;

use chrono::Utc;
use log::*;
use uuid::Uuid;

use crate::{
    db_types::{Consent, ConsentStatus, NewConsent, Permission},
    obe_api::consent_objects::ConsentRequest,
    traits::{ConsentApiError, ConsentManagement},
};

pub struct ConsentApi<B> {
    db: B,
}

impl<B: Debug> Debug for ConsentApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConsentApi ({:?})", self.db)
    }
}

impl<B> ConsentApi<B>
where B: ConsentManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Creates a `pending` consent for the `(tpp_id, user_id)` pair.
    ///
    /// The end-user is checked before the TPP, so an anonymous call is always reported as unauthenticated.
    pub async fn create(
        &self,
        tpp_id: Option<&str>,
        user_id: Option<&str>,
        request: ConsentRequest,
    ) -> Result<Consent, ConsentApiError> {
        let user_id = user_id.filter(|u| !u.is_empty()).ok_or(ConsentApiError::Unauthenticated)?;
        let tpp_id = tpp_id.filter(|t| !t.is_empty()).ok_or(ConsentApiError::MissingTpp)?;
        if self.db.fetch_tpp(tpp_id).await.map_err(|e| ConsentApiError::DatabaseError(e.to_string()))?.is_none() {
            return Err(ConsentApiError::UnknownTpp(tpp_id.to_string()));
        }
        let permissions = request.requested_permissions();
        if permissions.is_empty() {
            return Err(ConsentApiError::InvalidRequest("access must grant at least one permission".into()));
        }
        let now = Utc::now();
        let consent = NewConsent {
            consent_id: Uuid::new_v4().to_string(),
            tpp_id: tpp_id.to_string(),
            user_id: user_id.to_string(),
            permissions,
            recurring_indicator: request.recurring_indicator.unwrap_or(false),
            frequency_per_day: request.frequency()?,
            valid_until: request.expiry(now)?,
        };
        let consent = self.db.insert_consent(consent).await?;
        info!("📜️ Consent {} created for {tpp_id}/{user_id} [{}]", consent.consent_id, consent.permissions);
        Ok(consent)
    }

    /// Completes SCA for a pending consent.
    pub async fn authorize(&self, consent_id: &str) -> Result<Consent, ConsentApiError> {
        let now = Utc::now();
        let consent = self.get(consent_id).await?;
        if consent.status != ConsentStatus::Pending {
            warn!("📜️ Consent {consent_id} cannot be authorised from {}", consent.status);
            return Err(ConsentApiError::InvalidTransition { from: consent.status, to: ConsentStatus::Authorized });
        }
        if consent.is_expired_at(now) {
            warn!("📜️ Consent {consent_id} expired before it was authorised");
            let (from, to) = (ConsentStatus::Expired, ConsentStatus::Authorized);
            return Err(ConsentApiError::InvalidTransition { from, to });
        }
        match self.db.authorize_consent(consent_id, now).await? {
            Some(consent) => {
                info!("📜️ Consent {consent_id} authorised");
                Ok(consent)
            },
            // Someone else moved it out of `pending` in the meantime
            None => {
                let current = self.get(consent_id).await?;
                Err(ConsentApiError::InvalidTransition { from: current.status, to: ConsentStatus::Authorized })
            },
        }
    }

    /// Fetches the consent. The returned status reflects expiry: an authorised consent past its `valid_until` is
    /// reported as `expired`.
    pub async fn get(&self, consent_id: &str) -> Result<Consent, ConsentApiError> {
        let mut consent =
            self.db.fetch_consent(consent_id).await?.ok_or_else(|| ConsentApiError::NotFound(consent_id.to_string()))?;
        if !consent.status.is_terminal() && consent.is_expired_at(Utc::now()) {
            consent.status = ConsentStatus::Expired;
        }
        Ok(consent)
    }

    /// Revokes the consent. Revoking twice is not an error, and leaves the original `revoked_at` in place.
    pub async fn revoke(&self, consent_id: &str) -> Result<Consent, ConsentApiError> {
        let consent = self
            .db
            .revoke_consent(consent_id, Utc::now())
            .await?
            .ok_or_else(|| ConsentApiError::NotFound(consent_id.to_string()))?;
        info!("📜️ Consent {consent_id} revoked");
        Ok(consent)
    }

    /// Finds the consent that lets `tpp_id` access `user_id`'s data for `permission`, and records the access.
    pub async fn require_for(
        &self,
        tpp_id: &str,
        user_id: &str,
        permission: Permission,
    ) -> Result<Consent, ConsentApiError> {
        let now = Utc::now();
        let consent = self.db.find_active_consent(tpp_id, user_id, permission, now).await?.ok_or_else(|| {
            warn!("📜️ No valid {permission} consent for {tpp_id}/{user_id}");
            ConsentApiError::NoValidConsent(permission)
        })?;
        self.db.touch_consent(&consent.consent_id, now).await?;
        trace!("📜️ Consent {} used for {permission}", consent.consent_id);
        Ok(consent)
    }
}
