use thiserror::Error;

use crate::db_types::{BankAccount, BankTransaction, NewPayment, Payment, TransactionQuery};

#[derive(Debug, Clone, Error)]
pub enum BankingApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<sqlx::Error> for BankingApiError {
    fn from(e: sqlx::Error) -> Self {
        BankingApiError::DatabaseError(e.to_string())
    }
}

/// The business data store behind the gateway.
///
/// The gateway does not own this data; it only projects it into API resources once access has been granted.
#[allow(async_fn_in_trait)]
pub trait BankingData {
    async fn fetch_accounts_for_user(&self, user_id: &str) -> Result<Vec<BankAccount>, BankingApiError>;

    async fn fetch_account(&self, account_id: &str) -> Result<Option<BankAccount>, BankingApiError>;

    async fn fetch_account_by_iban(&self, iban: &str) -> Result<Option<BankAccount>, BankingApiError>;

    /// Transactions on the account matching the query, most recent booking date first.
    async fn fetch_transactions(
        &self,
        account_id: &str,
        query: TransactionQuery,
    ) -> Result<Vec<BankTransaction>, BankingApiError>;

    /// Stores a payment initiation in `RCVD` status. The backend generates the `payment_id`.
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, BankingApiError>;

    async fn fetch_payment(&self, payment_id: &str) -> Result<Option<Payment>, BankingApiError>;
}
