use chrono::{DateTime, Utc};
use mockall::mock;
use open_banking_engine::{
    db_types::{BankAccount, BankTransaction, NewPayment, NewTpp, Payment, Tpp, TppStatus, TransactionQuery},
    traits::{BankingApiError, BankingData, TppApiError, TppManagement},
};

mock! {
    pub BankingStore {}
    impl BankingData for BankingStore {
        async fn fetch_accounts_for_user(&self, user_id: &str) -> Result<Vec<BankAccount>, BankingApiError>;
        async fn fetch_account(&self, account_id: &str) -> Result<Option<BankAccount>, BankingApiError>;
        async fn fetch_account_by_iban(&self, iban: &str) -> Result<Option<BankAccount>, BankingApiError>;
        async fn fetch_transactions(
            &self,
            account_id: &str,
            query: TransactionQuery,
        ) -> Result<Vec<BankTransaction>, BankingApiError>;
        async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, BankingApiError>;
        async fn fetch_payment(&self, payment_id: &str) -> Result<Option<Payment>, BankingApiError>;
    }
}

mock! {
    pub TppStore {}
    impl TppManagement for TppStore {
        async fn insert_tpp(&self, tpp: NewTpp) -> Result<Tpp, TppApiError>;
        async fn fetch_tpp(&self, tpp_id: &str) -> Result<Option<Tpp>, TppApiError>;
        async fn update_tpp_status(&self, tpp_id: &str, status: TppStatus) -> Result<Option<Tpp>, TppApiError>;
        async fn record_usage(&self, tpp_id: &str, endpoint: &str, at: DateTime<Utc>) -> Result<i64, TppApiError>;
        async fn usage_since(&self, tpp_id: &str, since: DateTime<Utc>) -> Result<i64, TppApiError>;
    }
}
