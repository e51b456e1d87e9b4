use chrono::NaiveDate;
use obg_common::Amount;
use serde::{Deserialize, Serialize};

use crate::obe_api::consent_objects::AccountReference;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructedAmount {
    pub currency: Option<Currency>,
    pub amount: Amount,
}

/// An ISO 4217 currency code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    pub fn as_str(&self) -> &str {
        // Only ever built from ASCII uppercase letters
        std::str::from_utf8(&self.0).unwrap_or("XXX")
    }
}

impl TryFrom<String> for Currency {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let bytes = value.as_bytes();
        match bytes {
            [a, b, c] if bytes.iter().all(u8::is_ascii_alphabetic) => {
                Ok(Self([a.to_ascii_uppercase(), b.to_ascii_uppercase(), c.to_ascii_uppercase()]))
            },
            _ => Err(format!("{value} is not a currency code")),
        }
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.as_str().to_string()
    }
}

/// Body of `POST /payments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInitiation {
    pub instructed_amount: InstructedAmount,
    /// The account to debit. Defaults to the end-user's first account.
    #[serde(default)]
    pub debtor_account: Option<AccountReference>,
    pub creditor_account: AccountReference,
    #[serde(default)]
    pub creditor_name: Option<String>,
    #[serde(default)]
    pub remittance_information_unstructured: Option<String>,
}

/// Body of `POST /funds-confirmation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundsConfirmationRequest {
    pub account: AccountReference,
    pub instructed_amount: InstructedAmount,
}

/// The outcome of a funds check, with the account and amount it was made against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundsConfirmation {
    pub account_id: String,
    pub iban: String,
    pub amount: Amount,
    pub currency: String,
    pub funds_available: bool,
}

/// Query string of the transaction history endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilter {
    #[serde(default)]
    pub from_date: Option<NaiveDate>,
    #[serde(default)]
    pub to_date: Option<NaiveDate>,
}
