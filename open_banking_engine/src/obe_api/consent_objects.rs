use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Permission, Permissions},
    traits::ConsentApiError,
};

pub const DEFAULT_CONSENT_VALIDITY_DAYS: i64 = 90;
pub const DEFAULT_FREQUENCY_PER_DAY: i64 = 4;

/// An account designation inside a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountReference {
    #[serde(default)]
    pub iban: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// The `access` object of a consent request. Each non-empty key grants the matching permission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentAccess {
    #[serde(default)]
    pub accounts: Option<Vec<AccountReference>>,
    #[serde(default)]
    pub balances: Option<Vec<AccountReference>>,
    #[serde(default)]
    pub transactions: Option<Vec<AccountReference>>,
    #[serde(default)]
    pub payments: Option<Vec<AccountReference>>,
}

impl ConsentAccess {
    pub fn permissions(&self) -> Permissions {
        let granted = |refs: &Option<Vec<AccountReference>>| refs.as_ref().is_some_and(|r| !r.is_empty());
        let mut permissions = Permissions::new();
        if granted(&self.accounts) {
            permissions.insert(Permission::Accounts);
        }
        if granted(&self.balances) {
            permissions.insert(Permission::Balances);
        }
        if granted(&self.transactions) {
            permissions.insert(Permission::Transactions);
        }
        if granted(&self.payments) {
            permissions.insert(Permission::Payments);
        }
        permissions
    }
}

/// A request to create a consent.
///
/// `validUntil` may be a calendar date (valid through the end of that day, UTC) or a full RFC 3339 timestamp.
/// Besides the `access` object, permissions may be listed explicitly; the two are merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRequest {
    #[serde(default)]
    pub access: ConsentAccess,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub recurring_indicator: Option<bool>,
    #[serde(default)]
    pub valid_until: Option<String>,
    #[serde(default)]
    pub frequency_per_day: Option<i64>,
}

impl ConsentRequest {
    pub fn requested_permissions(&self) -> Permissions {
        let mut permissions = self.access.permissions();
        for p in &self.permissions {
            permissions.insert(*p);
        }
        permissions
    }

    pub fn expiry(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ConsentApiError> {
        let valid_until = match self.valid_until.as_deref().map(str::trim) {
            None | Some("") => now + Duration::days(DEFAULT_CONSENT_VALIDITY_DAYS),
            Some(s) => parse_valid_until(s)?,
        };
        if valid_until <= now {
            return Err(ConsentApiError::InvalidRequest("validUntil must be in the future".into()));
        }
        Ok(valid_until)
    }

    pub fn frequency(&self) -> Result<i64, ConsentApiError> {
        match self.frequency_per_day {
            None => Ok(DEFAULT_FREQUENCY_PER_DAY),
            Some(f) if f >= 1 => Ok(f),
            Some(f) => Err(ConsentApiError::InvalidRequest(format!("frequencyPerDay must be at least 1, got {f}"))),
        }
    }
}

fn parse_valid_until(s: &str) -> Result<DateTime<Utc>, ConsentApiError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
        .ok_or_else(|| ConsentApiError::InvalidRequest(format!("validUntil is not a valid date: {s}")))
}
