//! Projection of business data once access has been granted.
//!
//! Every method takes the end-user the caller is acting for. Accounts that belong to someone else are reported as
//! missing, never as forbidden, so that account identifiers cannot be probed.
use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{AccountBalance, BankAccount, BankTransaction, NewPayment, Payment, TransactionQuery},
    obe_api::banking_objects::{FundsConfirmation, FundsConfirmationRequest, InstructedAmount, PaymentInitiation},
    traits::{BankingApiError, BankingData},
};

pub struct BankingApi<B> {
    db: B,
}

impl<B: Debug> Debug for BankingApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BankingApi ({:?})", self.db)
    }
}

impl<B> BankingApi<B>
where B: BankingData
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn accounts_for_user(&self, user_id: &str) -> Result<Vec<BankAccount>, BankingApiError> {
        self.db.fetch_accounts_for_user(user_id).await
    }

    pub async fn account_for_user(&self, user_id: &str, account_id: &str) -> Result<BankAccount, BankingApiError> {
        match self.db.fetch_account(account_id).await? {
            Some(account) if account.user_id == user_id => Ok(account),
            _ => Err(BankingApiError::NotFound(format!("Account {account_id}"))),
        }
    }

    pub async fn balances(&self, user_id: &str, account_id: &str) -> Result<AccountBalance, BankingApiError> {
        let account = self.account_for_user(user_id, account_id).await?;
        Ok(account.balance())
    }

    pub async fn transactions(
        &self,
        user_id: &str,
        account_id: &str,
        query: TransactionQuery,
    ) -> Result<Vec<BankTransaction>, BankingApiError> {
        if let (Some(from), Some(to)) = (query.from_date, query.to_date) {
            if from > to {
                return Err(BankingApiError::InvalidRequest("fromDate is after toDate".into()));
            }
        }
        let account = self.account_for_user(user_id, account_id).await?;
        self.db.fetch_transactions(&account.account_id, query).await
    }

    /// Records a payment initiation. The payment starts, and stays, in `RCVD`.
    pub async fn initiate_payment(
        &self,
        tpp_id: &str,
        user_id: &str,
        consent_id: Option<String>,
        request: PaymentInitiation,
    ) -> Result<Payment, BankingApiError> {
        if !request.instructed_amount.amount.is_positive() {
            return Err(BankingApiError::InvalidRequest("instructedAmount.amount must be positive".into()));
        }
        let creditor_iban = request
            .creditor_account
            .iban
            .filter(|i| !i.trim().is_empty())
            .ok_or_else(|| BankingApiError::InvalidRequest("creditorAccount.iban is required".into()))?;
        let debtor = match request.debtor_account.and_then(|a| a.iban) {
            Some(iban) => self.owned_account_by_iban(user_id, &iban).await?,
            None => self
                .db
                .fetch_accounts_for_user(user_id)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| BankingApiError::InvalidRequest("debtorAccount is required".into()))?,
        };
        let currency = checked_currency(&request.instructed_amount, &debtor)?;
        let payment = NewPayment {
            tpp_id: tpp_id.to_string(),
            user_id: user_id.to_string(),
            consent_id,
            debtor_iban: debtor.iban,
            creditor_iban,
            creditor_name: request.creditor_name,
            amount: request.instructed_amount.amount,
            currency,
            remittance_information: request.remittance_information_unstructured,
        };
        let payment = self.db.insert_payment(payment).await?;
        info!("💸️ Payment {} of {} {} initiated by {tpp_id}", payment.payment_id, payment.amount, payment.currency);
        Ok(payment)
    }

    /// A payment is only visible to the TPP that initiated it, on behalf of the same end-user.
    pub async fn payment_status(
        &self,
        tpp_id: &str,
        user_id: &str,
        payment_id: &str,
    ) -> Result<Payment, BankingApiError> {
        match self.db.fetch_payment(payment_id).await? {
            Some(p) if p.tpp_id == tpp_id && p.user_id == user_id => Ok(p),
            _ => Err(BankingApiError::NotFound(format!("Payment {payment_id}"))),
        }
    }

    /// Side-effect free check that the account's available balance covers the amount.
    pub async fn confirm_funds(
        &self,
        user_id: &str,
        request: FundsConfirmationRequest,
    ) -> Result<FundsConfirmation, BankingApiError> {
        let iban = request
            .account
            .iban
            .filter(|i| !i.trim().is_empty())
            .ok_or_else(|| BankingApiError::InvalidRequest("account.iban is required".into()))?;
        if !request.instructed_amount.amount.is_positive() {
            return Err(BankingApiError::InvalidRequest("instructedAmount.amount must be positive".into()));
        }
        let account = self.owned_account_by_iban(user_id, &iban).await?;
        let currency = checked_currency(&request.instructed_amount, &account)?;
        let amount = request.instructed_amount.amount;
        let funds_available = account.available_balance >= amount;
        debug!("💸️ Funds check on {}: {amount} requested, available: {funds_available}", account.account_id);
        Ok(FundsConfirmation { account_id: account.account_id, iban: account.iban, amount, currency, funds_available })
    }

    async fn owned_account_by_iban(&self, user_id: &str, iban: &str) -> Result<BankAccount, BankingApiError> {
        match self.db.fetch_account_by_iban(iban).await? {
            Some(account) if account.user_id == user_id => Ok(account),
            _ => Err(BankingApiError::NotFound(format!("Account {iban}"))),
        }
    }
}

fn checked_currency(amount: &InstructedAmount, account: &BankAccount) -> Result<String, BankingApiError> {
    match amount.currency {
        Some(c) if !c.as_str().eq_ignore_ascii_case(&account.currency) => Err(BankingApiError::InvalidRequest(format!(
            "{} does not match the account currency {}",
            c.as_str(),
            account.currency
        ))),
        _ => Ok(account.currency.clone()),
    }
}
