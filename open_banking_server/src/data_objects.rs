//! Attribute shapes of the JSON:API resources, and their projections from the engine's records.
use chrono::{DateTime, NaiveDate, Utc};
use obg_common::Amount;
use open_banking_engine::{
    db_types::{
        AccountBalance,
        BankAccount,
        BankTransaction,
        Consent,
        ConsentStatus,
        Payment,
        PaymentStatus,
        Permission,
        ScaStatus,
        TppStatus,
    },
    banking_objects::FundsConfirmation,
    tpp_objects::TppRegistrationResult,
};
use serde::{Deserialize, Serialize};

use crate::json_api::{Resource, ResourceObject};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountValue {
    pub currency: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IbanReference {
    pub iban: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountAttributes {
    pub iban: String,
    pub currency: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
}

impl From<BankAccount> for ResourceObject {
    fn from(account: BankAccount) -> Self {
        let attributes = AccountAttributes {
            iban: account.iban,
            currency: account.currency,
            name: account.name,
            product: account.product,
        };
        ResourceObject::new(account.account_id, Resource::Account(attributes))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceEntry {
    pub balance_type: String,
    pub balance_amount: AmountValue,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceAttributes {
    pub account_id: String,
    pub balances: Vec<BalanceEntry>,
    pub reference_date: DateTime<Utc>,
}

impl From<AccountBalance> for ResourceObject {
    fn from(balance: AccountBalance) -> Self {
        let entry = |balance_type: &str, amount: Amount| BalanceEntry {
            balance_type: balance_type.to_string(),
            balance_amount: AmountValue { currency: balance.currency.clone(), amount },
        };
        let balances = vec![entry("closingBooked", balance.current), entry("interimAvailable", balance.available)];
        let id = balance.account_id.clone();
        let attributes =
            BalanceAttributes { account_id: balance.account_id, balances, reference_date: balance.reference_date };
        ResourceObject::new(id, Resource::Balance(attributes))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundsConfirmationAttributes {
    pub account: IbanReference,
    pub instructed_amount: AmountValue,
    pub funds_available: bool,
}

impl From<FundsConfirmation> for ResourceObject {
    fn from(check: FundsConfirmation) -> Self {
        let attributes = FundsConfirmationAttributes {
            account: IbanReference { iban: check.iban },
            instructed_amount: AmountValue { currency: check.currency, amount: check.amount },
            funds_available: check.funds_available,
        };
        ResourceObject::new(check.account_id, Resource::FundsConfirmation(attributes))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionAttributes {
    pub account_id: String,
    pub transaction_amount: AmountValue,
    pub booking_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creditor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debtor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remittance_information_unstructured: Option<String>,
}

impl From<BankTransaction> for ResourceObject {
    fn from(tx: BankTransaction) -> Self {
        let attributes = TransactionAttributes {
            account_id: tx.account_id,
            transaction_amount: AmountValue { currency: tx.currency, amount: tx.amount },
            booking_date: tx.booking_date,
            value_date: tx.value_date,
            creditor_name: tx.creditor_name,
            debtor_name: tx.debtor_name,
            remittance_information_unstructured: tx.remittance_information,
        };
        ResourceObject::new(tx.transaction_id, Resource::Transaction(attributes))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAttributes {
    pub payment_id: String,
    pub transaction_status: PaymentStatus,
    pub instructed_amount: AmountValue,
    pub debtor_account: IbanReference,
    pub creditor_account: IbanReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creditor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remittance_information_unstructured: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for ResourceObject {
    fn from(payment: Payment) -> Self {
        let id = payment.payment_id.clone();
        let attributes = PaymentAttributes {
            payment_id: payment.payment_id,
            transaction_status: payment.status,
            instructed_amount: AmountValue { currency: payment.currency, amount: payment.amount },
            debtor_account: IbanReference { iban: payment.debtor_iban },
            creditor_account: IbanReference { iban: payment.creditor_iban },
            creditor_name: payment.creditor_name,
            remittance_information_unstructured: payment.remittance_information,
            created_at: payment.created_at,
        };
        ResourceObject::new(id, Resource::Payment(attributes))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentAttributes {
    pub consent_id: String,
    pub consent_status: ConsentStatus,
    pub sca_status: ScaStatus,
    pub permissions: Vec<Permission>,
    pub recurring_indicator: bool,
    pub frequency_per_day: i64,
    pub valid_until: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_action_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl From<Consent> for ResourceObject {
    fn from(consent: Consent) -> Self {
        let id = consent.consent_id.clone();
        let attributes = ConsentAttributes {
            consent_id: consent.consent_id,
            consent_status: consent.status,
            sca_status: consent.sca_status,
            permissions: consent.permissions.iter().copied().collect(),
            recurring_indicator: consent.recurring_indicator,
            frequency_per_day: consent.frequency_per_day,
            valid_until: consent.valid_until,
            last_action_date: consent.last_action_date,
            authorized_at: consent.authorized_at,
            revoked_at: consent.revoked_at,
        };
        ResourceObject::new(id, Resource::Consent(attributes))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TppAttributes {
    pub tpp_id: String,
    pub name: String,
    pub status: TppStatus,
    pub expires_at: DateTime<Utc>,
}

impl From<TppRegistrationResult> for ResourceObject {
    fn from(result: TppRegistrationResult) -> Self {
        let id = result.tpp_id.clone();
        let attributes = TppAttributes {
            tpp_id: result.tpp_id,
            name: result.name,
            status: result.status,
            expires_at: result.expires_at,
        };
        ResourceObject::new(id, Resource::Tpp(attributes))
    }
}

/// The links that accompany a consent, pointing at the SCA step and at the status poll.
pub fn consent_links(consent_id: &str) -> [(&'static str, String); 3] {
    [
        ("self", format!("/consents/{consent_id}")),
        ("scaRedirect", format!("/consents/{consent_id}/authorise")),
        ("status", format!("/consents/{consent_id}")),
    ]
}

/// The links that accompany a payment initiation. SCA for payments happens at the authorization endpoint.
pub fn payment_links(payment: &Payment) -> [(&'static str, String); 3] {
    let id = &payment.payment_id;
    [
        ("self", format!("/payments/{id}")),
        (
            "scaRedirect",
            format!("/oauth/authorize?response_type=code&client_id={}&scope=payments&state={id}", payment.tpp_id),
        ),
        ("status", format!("/payments/{id}/status")),
    ]
}
