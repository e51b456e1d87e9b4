use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{NewTpp, Permissions, Tpp, TppStatus},
    traits::TppApiError,
};

/// A TPP registration request, as submitted by the provider itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TppRegistration {
    pub tpp_id: String,
    pub name: String,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub registration_number: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub authority: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub qwac_certificate: Option<String>,
    #[serde(default)]
    pub qseal_certificate: Option<String>,
}

impl TppRegistration {
    /// Validates the request and converts it into an insert request. New registrations are valid for one year.
    pub fn into_new_tpp(self, rate_limit_per_hour: i64, now: DateTime<Utc>) -> Result<NewTpp, TppApiError> {
        let tpp_id = self.tpp_id.trim().to_string();
        let name = self.name.trim().to_string();
        if tpp_id.is_empty() {
            return Err(TppApiError::InvalidRegistration("tppId is required".into()));
        }
        if name.is_empty() {
            return Err(TppApiError::InvalidRegistration("name is required".into()));
        }
        let services = Permissions::from_scope(&self.services.join(" "))
            .map_err(|e| TppApiError::InvalidRegistration(e.to_string()))?;
        if self.redirect_uris.iter().any(|u| u.trim().is_empty()) {
            return Err(TppApiError::InvalidRegistration("redirect URIs cannot be empty".into()));
        }
        let mut tpp = NewTpp::new(tpp_id, name)
            .with_services(services)
            .with_redirect_uris(self.redirect_uris)
            .with_rate_limit(rate_limit_per_hour)
            .with_expiry(now + Duration::days(365));
        tpp.organization_id = self.organization_id;
        tpp.registration_number = self.registration_number;
        tpp.country = self.country;
        tpp.authority = self.authority;
        tpp.email = self.email;
        tpp.qwac_certificate = self.qwac_certificate;
        tpp.qseal_certificate = self.qseal_certificate;
        Ok(tpp)
    }
}

/// The answer to a successful registration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TppRegistrationResult {
    pub tpp_id: String,
    pub name: String,
    pub status: TppStatus,
    pub expires_at: DateTime<Utc>,
    pub message: String,
}

impl From<Tpp> for TppRegistrationResult {
    fn from(tpp: Tpp) -> Self {
        Self {
            tpp_id: tpp.tpp_id,
            name: tpp.name,
            status: tpp.authorization_status,
            expires_at: tpp.expires_at,
            message: "Registration received and pending review".to_string(),
        }
    }
}
