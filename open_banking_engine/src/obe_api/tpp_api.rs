//! Registration and validation of Third-Party Providers.
use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{NewTpp, Tpp, TppStatus},
    obe_api::tpp_objects::TppRegistration,
    traits::{TppApiError, TppManagement},
};

/// `TppApi` guards every protected call: a TPP must be `authorized`, unexpired, and within its hourly quota.
pub struct TppApi<B> {
    db: B,
    default_rate_limit: i64,
}

impl<B: Debug> Debug for TppApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TppApi ({:?})", self.db)
    }
}

impl<B> TppApi<B>
where B: TppManagement
{
    pub fn new(db: B) -> Self {
        Self { db, default_rate_limit: NewTpp::DEFAULT_RATE_LIMIT_PER_HOUR }
    }

    /// Sets the hourly quota given to newly registered TPPs.
    pub fn with_default_rate_limit(mut self, rate_limit_per_hour: i64) -> Self {
        self.default_rate_limit = rate_limit_per_hour;
        self
    }

    /// Registers a new TPP. The TPP starts out `pending` and cannot call protected endpoints until it has been
    /// authorized out of band.
    pub async fn register(&self, registration: TppRegistration) -> Result<Tpp, TppApiError> {
        let new_tpp = registration.into_new_tpp(self.default_rate_limit, Utc::now())?;
        let tpp = self.db.insert_tpp(new_tpp).await?;
        info!("🔐️ TPP {} ({}) registered, pending review", tpp.tpp_id, tpp.name);
        Ok(tpp)
    }

    pub async fn fetch_tpp(&self, tpp_id: &str) -> Result<Option<Tpp>, TppApiError> {
        self.db.fetch_tpp(tpp_id).await
    }

    /// Administrative status change. Not reachable over HTTP.
    pub async fn set_status(&self, tpp_id: &str, status: TppStatus) -> Result<Tpp, TppApiError> {
        let tpp =
            self.db.update_tpp_status(tpp_id, status).await?.ok_or_else(|| TppApiError::NotFound(tpp_id.to_string()))?;
        info!("🔐️ TPP {tpp_id} is now {status}");
        Ok(tpp)
    }

    /// Checks that the TPP may call `endpoint` right now, and charges the call against its quota.
    ///
    /// The usage entry is written before the quota comparison, so calls rejected for exceeding the limit still count.
    pub async fn validate(&self, tpp_id: &str, endpoint: &str) -> Result<Tpp, TppApiError> {
        let now = Utc::now();
        let tpp = self.db.fetch_tpp(tpp_id).await?.ok_or_else(|| {
            warn!("🔐️ Unknown TPP {tpp_id} tried to call {endpoint}");
            TppApiError::NotFound(tpp_id.to_string())
        })?;
        if tpp.authorization_status != TppStatus::Authorized {
            warn!("🔐️ TPP {tpp_id} has status {} and may not call {endpoint}", tpp.authorization_status);
            return Err(TppApiError::NotAuthorized(tpp.authorization_status));
        }
        if tpp.is_expired_at(now) {
            warn!("🔐️ TPP {tpp_id} registration expired at {}", tpp.expires_at);
            return Err(TppApiError::Expired);
        }
        let count = self.db.record_usage(tpp_id, endpoint, now).await?;
        if count > tpp.rate_limit_per_hour {
            warn!("🚦️ TPP {tpp_id} exceeded its quota: {count} > {}", tpp.rate_limit_per_hour);
            return Err(TppApiError::RateLimitExceeded { limit: tpp.rate_limit_per_hour, count });
        }
        trace!("🔐️ TPP {tpp_id} validated for {endpoint} ({count}/{})", tpp.rate_limit_per_hour);
        Ok(tpp)
    }
}
