//! Data types persisted by the gateway backends.
//!
//! Everything in here maps more or less one-to-one onto a database table. Types prefixed with `New` are insert
//! requests; the plain types are what gets read back.
use std::{collections::BTreeSet, fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use obg_common::Amount;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, Row, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------     Permission      ---------------------------------------------------------
/// The scope vocabulary shared by TPP services, OAuth scopes and consent permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Accounts,
    Balances,
    Transactions,
    Payments,
    FundsConfirmation,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Accounts => "accounts",
            Permission::Balances => "balances",
            Permission::Transactions => "transactions",
            Permission::Payments => "payments",
            Permission::FundsConfirmation => "fundsconfirmation",
        }
    }
}

impl Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accounts" => Ok(Self::Accounts),
            "balances" => Ok(Self::Balances),
            "transactions" => Ok(Self::Transactions),
            "payments" => Ok(Self::Payments),
            "fundsconfirmation" => Ok(Self::FundsConfirmation),
            _ => Err(ConversionError(format!("Unknown permission: {s}"))),
        }
    }
}

//--------------------------------------     Permissions     ---------------------------------------------------------
/// An ordered set of [`Permission`]s.
///
/// Stored as a comma-separated string in the database, and rendered as space-separated when used as an OAuth scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(BTreeSet<Permission>);

impl Permissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, permission: Permission) -> bool {
        self.0.insert(permission)
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_subset(&self, other: &Permissions) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.0.iter()
    }

    /// Parses an OAuth `scope` parameter (space-separated, commas tolerated).
    pub fn from_scope(scope: &str) -> Result<Self, ConversionError> {
        scope
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(Permission::from_str)
            .collect()
    }

    pub fn to_scope(&self) -> String {
        self.0.iter().map(Permission::as_str).collect::<Vec<_>>().join(" ")
    }
}

impl FromIterator<Permission> for Permissions {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Display for Permissions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.0.iter().map(Permission::as_str).collect::<Vec<_>>().join(",");
        f.write_str(&s)
    }
}

impl FromStr for Permissions {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',').filter(|s| !s.trim().is_empty()).map(Permission::from_str).collect()
    }
}

fn decode_err<E>(column: &str, e: E) -> sqlx::Error
where E: std::error::Error + Send + Sync + 'static {
    sqlx::Error::ColumnDecode { index: column.to_string(), source: Box::new(e) }
}

//--------------------------------------      TppStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TppStatus {
    /// Registered, awaiting review by the regulator-facing back office.
    Pending,
    Authorized,
    Suspended,
    Revoked,
}

impl Display for TppStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TppStatus::Pending => write!(f, "pending"),
            TppStatus::Authorized => write!(f, "authorized"),
            TppStatus::Suspended => write!(f, "suspended"),
            TppStatus::Revoked => write!(f, "revoked"),
        }
    }
}

impl FromStr for TppStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "authorized" => Ok(Self::Authorized),
            "suspended" => Ok(Self::Suspended),
            "revoked" => Ok(Self::Revoked),
            s => Err(ConversionError(format!("Invalid TPP status: {s}"))),
        }
    }
}

//--------------------------------------         Tpp         ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct Tpp {
    pub id: i64,
    pub tpp_id: String,
    pub name: String,
    pub organization_id: Option<String>,
    pub registration_number: Option<String>,
    pub country: Option<String>,
    pub authority: Option<String>,
    pub email: Option<String>,
    pub services: Permissions,
    pub redirect_uris: Vec<String>,
    pub qwac_certificate: Option<String>,
    pub qseal_certificate: Option<String>,
    pub authorization_status: TppStatus,
    pub expires_at: DateTime<Utc>,
    pub rate_limit_per_hour: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tpp {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn allows_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == uri)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Tpp {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let services: String = row.try_get("services")?;
        let redirect_uris: String = row.try_get("redirect_uris")?;
        Ok(Self {
            id: row.try_get("id")?,
            tpp_id: row.try_get("tpp_id")?,
            name: row.try_get("name")?,
            organization_id: row.try_get("organization_id")?,
            registration_number: row.try_get("registration_number")?,
            country: row.try_get("country")?,
            authority: row.try_get("authority")?,
            email: row.try_get("email")?,
            services: services.parse().map_err(|e| decode_err("services", e))?,
            redirect_uris: serde_json::from_str(&redirect_uris).map_err(|e| decode_err("redirect_uris", e))?,
            qwac_certificate: row.try_get("qwac_certificate")?,
            qseal_certificate: row.try_get("qseal_certificate")?,
            authorization_status: row.try_get("authorization_status")?,
            expires_at: row.try_get("expires_at")?,
            rate_limit_per_hour: row.try_get("rate_limit_per_hour")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

//--------------------------------------        NewTpp       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewTpp {
    /// The caller-supplied, globally unique TPP identifier
    pub tpp_id: String,
    pub name: String,
    pub organization_id: Option<String>,
    pub registration_number: Option<String>,
    pub country: Option<String>,
    pub authority: Option<String>,
    pub email: Option<String>,
    pub services: Permissions,
    pub redirect_uris: Vec<String>,
    pub qwac_certificate: Option<String>,
    pub qseal_certificate: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub rate_limit_per_hour: i64,
}

impl NewTpp {
    pub const DEFAULT_RATE_LIMIT_PER_HOUR: i64 = 1000;

    pub fn new<S: Into<String>>(tpp_id: S, name: S) -> Self {
        Self {
            tpp_id: tpp_id.into(),
            name: name.into(),
            organization_id: None,
            registration_number: None,
            country: None,
            authority: None,
            email: None,
            services: Permissions::default(),
            redirect_uris: vec![],
            qwac_certificate: None,
            qseal_certificate: None,
            expires_at: Utc::now() + Duration::days(365),
            rate_limit_per_hour: Self::DEFAULT_RATE_LIMIT_PER_HOUR,
        }
    }

    pub fn with_services(mut self, services: Permissions) -> Self {
        self.services = services;
        self
    }

    pub fn with_redirect_uris(mut self, uris: Vec<String>) -> Self {
        self.redirect_uris = uris;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit_per_hour: i64) -> Self {
        self.rate_limit_per_hour = rate_limit_per_hour;
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = expires_at;
        self
    }
}

//--------------------------------------    ConsentStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConsentStatus {
    Pending,
    Authorized,
    Rejected,
    Revoked,
    Expired,
}

impl ConsentStatus {
    /// Terminal consents can never become usable again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Revoked | Self::Expired)
    }
}

impl Display for ConsentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsentStatus::Pending => write!(f, "pending"),
            ConsentStatus::Authorized => write!(f, "authorized"),
            ConsentStatus::Rejected => write!(f, "rejected"),
            ConsentStatus::Revoked => write!(f, "revoked"),
            ConsentStatus::Expired => write!(f, "expired"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScaStatus {
    Required,
    Finalised,
}

impl Display for ScaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaStatus::Required => write!(f, "required"),
            ScaStatus::Finalised => write!(f, "finalised"),
        }
    }
}

//--------------------------------------       Consent       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct Consent {
    pub id: i64,
    pub consent_id: String,
    pub tpp_id: String,
    pub user_id: String,
    pub permissions: Permissions,
    pub status: ConsentStatus,
    pub sca_status: ScaStatus,
    pub recurring_indicator: bool,
    pub frequency_per_day: i64,
    /// The consent's expiration date. A consent is unusable from this moment on, whatever its status says.
    pub valid_until: DateTime<Utc>,
    pub last_action_date: Option<DateTime<Utc>>,
    pub authorized_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Consent {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_until <= now
    }

    /// A consent may be used to access data only while it is authorized *and* not past its expiration date.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ConsentStatus::Authorized && !self.is_expired_at(now)
    }

    pub fn grants(&self, permission: Permission, now: DateTime<Utc>) -> bool {
        self.is_usable_at(now) && self.permissions.contains(permission)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Consent {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let permissions: String = row.try_get("permissions")?;
        Ok(Self {
            id: row.try_get("id")?,
            consent_id: row.try_get("consent_id")?,
            tpp_id: row.try_get("tpp_id")?,
            user_id: row.try_get("user_id")?,
            permissions: permissions.parse().map_err(|e| decode_err("permissions", e))?,
            status: row.try_get("status")?,
            sca_status: row.try_get("sca_status")?,
            recurring_indicator: row.try_get("recurring_indicator")?,
            frequency_per_day: row.try_get("frequency_per_day")?,
            valid_until: row.try_get("valid_until")?,
            last_action_date: row.try_get("last_action_date")?,
            authorized_at: row.try_get("authorized_at")?,
            revoked_at: row.try_get("revoked_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewConsent {
    pub consent_id: String,
    pub tpp_id: String,
    pub user_id: String,
    pub permissions: Permissions,
    pub recurring_indicator: bool,
    pub frequency_per_day: i64,
    pub valid_until: DateTime<Utc>,
}

//--------------------------------------  AuthorizationCode  ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct AuthorizationCode {
    pub id: i64,
    pub code: String,
    pub client_id: Option<String>,
    pub user_id: String,
    #[sqlx(try_from = "String")]
    pub scope: Permissions,
    pub redirect_uri: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<String> for Permissions {
    type Error = ConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone)]
pub struct NewAuthorizationCode {
    pub code: String,
    pub client_id: Option<String>,
    pub user_id: String,
    pub scope: Permissions,
    pub redirect_uri: Option<String>,
    pub expires_at: DateTime<Utc>,
}

//--------------------------------------     AuditRecord     ---------------------------------------------------------
/// One request/response pair, as captured at the gateway boundary.
#[derive(Debug, Clone, Default)]
pub struct NewAuditRecord {
    pub interaction_id: String,
    pub tpp_id: Option<String>,
    pub user_id: Option<String>,
    pub consent_id: Option<String>,
    pub endpoint: String,
    pub method: String,
    /// Request headers as a JSON object
    pub request_headers: String,
    pub request_body: Option<String>,
    pub response_status: u16,
    pub response_body: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct AuditRecord {
    pub id: i64,
    pub interaction_id: String,
    pub tpp_id: Option<String>,
    pub user_id: Option<String>,
    pub consent_id: Option<String>,
    pub endpoint: String,
    pub method: String,
    pub request_headers: String,
    pub request_body: Option<String>,
    pub response_status: i64,
    pub response_body: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     BankAccount     ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct BankAccount {
    pub id: i64,
    /// The public resource identifier of the account
    pub account_id: String,
    pub user_id: String,
    pub iban: String,
    pub currency: String,
    pub name: String,
    pub product: Option<String>,
    /// The booked balance
    pub current_balance: Amount,
    /// The balance available for payments, after reservations and credit lines
    pub available_balance: Amount,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBankAccount {
    pub account_id: String,
    pub user_id: String,
    pub iban: String,
    pub currency: String,
    pub name: String,
    pub product: Option<String>,
    pub current_balance: Amount,
    pub available_balance: Amount,
}

impl BankAccount {
    pub fn balance(&self) -> AccountBalance {
        AccountBalance {
            account_id: self.account_id.clone(),
            currency: self.currency.clone(),
            current: self.current_balance,
            available: self.available_balance,
            reference_date: self.updated_at,
        }
    }
}

/// A point-in-time view of an account's balances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountBalance {
    pub account_id: String,
    pub currency: String,
    pub current: Amount,
    pub available: Amount,
    pub reference_date: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct BankTransaction {
    pub id: i64,
    pub transaction_id: String,
    pub account_id: String,
    /// Signed: negative amounts are debits
    pub amount: Amount,
    pub currency: String,
    pub booking_date: NaiveDate,
    pub value_date: Option<NaiveDate>,
    pub creditor_name: Option<String>,
    pub debtor_name: Option<String>,
    pub remittance_information: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewBankTransaction {
    pub transaction_id: String,
    pub account_id: String,
    pub amount: Amount,
    pub currency: String,
    pub booking_date: NaiveDate,
    pub value_date: Option<NaiveDate>,
    pub creditor_name: Option<String>,
    pub debtor_name: Option<String>,
    pub remittance_information: Option<String>,
}

//--------------------------------------    PaymentStatus    ---------------------------------------------------------
/// ISO 20022 transaction status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[sqlx(rename = "RCVD")]
    #[serde(rename = "RCVD")]
    Received,
    #[sqlx(rename = "ACTC")]
    #[serde(rename = "ACTC")]
    AcceptedTechnicalValidation,
    #[sqlx(rename = "ACSC")]
    #[serde(rename = "ACSC")]
    AcceptedSettlementCompleted,
    #[sqlx(rename = "RJCT")]
    #[serde(rename = "RJCT")]
    Rejected,
    #[sqlx(rename = "CANC")]
    #[serde(rename = "CANC")]
    Cancelled,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Received => write!(f, "RCVD"),
            PaymentStatus::AcceptedTechnicalValidation => write!(f, "ACTC"),
            PaymentStatus::AcceptedSettlementCompleted => write!(f, "ACSC"),
            PaymentStatus::Rejected => write!(f, "RJCT"),
            PaymentStatus::Cancelled => write!(f, "CANC"),
        }
    }
}

//--------------------------------------       Payment       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Payment {
    pub id: i64,
    pub payment_id: String,
    pub tpp_id: String,
    pub user_id: String,
    pub consent_id: Option<String>,
    pub debtor_iban: String,
    pub creditor_iban: String,
    pub creditor_name: Option<String>,
    pub amount: Amount,
    pub currency: String,
    pub remittance_information: Option<String>,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub tpp_id: String,
    pub user_id: String,
    pub consent_id: Option<String>,
    pub debtor_iban: String,
    pub creditor_iban: String,
    pub creditor_name: Option<String>,
    pub amount: Amount,
    pub currency: String,
    pub remittance_information: Option<String>,
}

//--------------------------------------   TransactionQuery  ---------------------------------------------------------
/// Filter for transaction history queries. Both bounds are inclusive booking dates.
#[derive(Debug, Clone, Default)]
pub struct TransactionQuery {
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

impl TransactionQuery {
    pub fn with_from_date(mut self, date: NaiveDate) -> Self {
        self.from_date = Some(date);
        self
    }

    pub fn with_to_date(mut self, date: NaiveDate) -> Self {
        self.to_date = Some(date);
        self
    }
}
