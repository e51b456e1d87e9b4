//! `SqliteDatabase` is a concrete implementation of an Open Banking gateway backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`] module.
use std::{fmt::Debug, time::Duration};

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate, SqlitePool};

use super::{
    db::{audit, auth_codes, banking, consents, new_pool, tpps},
    SqliteDatabaseError,
};
use crate::{
    db_types::{
        AuditRecord,
        AuthorizationCode,
        BankAccount,
        BankTransaction,
        Consent,
        NewAuditRecord,
        NewAuthorizationCode,
        NewBankAccount,
        NewBankTransaction,
        NewConsent,
        NewPayment,
        NewTpp,
        Payment,
        Permission,
        Tpp,
        TppStatus,
        TransactionQuery,
    },
    traits::{
        AuditApiError,
        AuditLog,
        AuthorizationCodeStore,
        BankingApiError,
        BankingData,
        ConsentApiError,
        ConsentManagement,
        OAuthApiError,
        TppApiError,
        TppManagement,
    },
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({})", self.url)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the default store timeout.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        Self::new_with_timeout(url, max_connections, DEFAULT_TIMEOUT).await
    }

    pub async fn new_with_timeout(
        url: &str,
        max_connections: u32,
        timeout: Duration,
    ) -> Result<Self, SqliteDatabaseError> {
        let pool = new_pool(url, max_connections, timeout).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Applies any outstanding schema migrations.
    pub async fn migrate(&self) -> Result<(), SqliteDatabaseError> {
        migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), SqliteDatabaseError> {
        self.pool.close().await;
        Ok(())
    }

    /// Seeds an account into the business data tables. The gateway itself never creates accounts; this exists for
    /// fixtures and local demos.
    pub async fn insert_account(&self, account: NewBankAccount) -> Result<BankAccount, BankingApiError> {
        let mut tx = self.pool.begin().await?;
        let account = banking::insert_account(account, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        Ok(account)
    }

    pub async fn insert_transaction(&self, tx: NewBankTransaction) -> Result<BankTransaction, BankingApiError> {
        let mut db_tx = self.pool.begin().await?;
        let tx = banking::insert_transaction(tx, &mut db_tx).await?;
        db_tx.commit().await?;
        Ok(tx)
    }
}

impl TppManagement for SqliteDatabase {
    async fn insert_tpp(&self, tpp: NewTpp) -> Result<Tpp, TppApiError> {
        let mut tx = self.pool.begin().await?;
        let tpp = tpps::insert_tpp(tpp, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ TPP {} registered with id {}", tpp.tpp_id, tpp.id);
        Ok(tpp)
    }

    async fn fetch_tpp(&self, tpp_id: &str) -> Result<Option<Tpp>, TppApiError> {
        let mut conn = self.pool.acquire().await?;
        let tpp = tpps::fetch_tpp(tpp_id, &mut conn).await?;
        Ok(tpp)
    }

    async fn update_tpp_status(&self, tpp_id: &str, status: TppStatus) -> Result<Option<Tpp>, TppApiError> {
        let mut tx = self.pool.begin().await?;
        let tpp = tpps::update_status(tpp_id, status, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        Ok(tpp)
    }

    /// Appends the usage entry and sums the trailing hour in one transaction. SQLite serialises writers, so the sum
    /// always includes every entry committed before ours.
    async fn record_usage(&self, tpp_id: &str, endpoint: &str, at: DateTime<Utc>) -> Result<i64, TppApiError> {
        let mut tx = self.pool.begin().await?;
        tpps::append_usage(tpp_id, endpoint, at, &mut tx).await?;
        let count = tpps::sum_usage_since(tpp_id, tpps::window_start(at), &mut tx).await?;
        tx.commit().await?;
        trace!("🚦️ {tpp_id} has made {count} requests in the last hour");
        Ok(count)
    }

    async fn usage_since(&self, tpp_id: &str, since: DateTime<Utc>) -> Result<i64, TppApiError> {
        let mut conn = self.pool.acquire().await?;
        let count = tpps::sum_usage_since(tpp_id, since, &mut conn).await?;
        Ok(count)
    }
}

impl ConsentManagement for SqliteDatabase {
    async fn insert_consent(&self, consent: NewConsent) -> Result<Consent, ConsentApiError> {
        let mut tx = self.pool.begin().await?;
        let consent = consents::insert_consent(consent, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        Ok(consent)
    }

    async fn fetch_consent(&self, consent_id: &str) -> Result<Option<Consent>, ConsentApiError> {
        let mut conn = self.pool.acquire().await?;
        let consent = consents::fetch_consent(consent_id, &mut conn).await?;
        Ok(consent)
    }

    async fn authorize_consent(&self, consent_id: &str, at: DateTime<Utc>) -> Result<Option<Consent>, ConsentApiError> {
        let mut tx = self.pool.begin().await?;
        let consent = consents::authorize_consent(consent_id, at, &mut tx).await?;
        tx.commit().await?;
        Ok(consent)
    }

    async fn revoke_consent(&self, consent_id: &str, at: DateTime<Utc>) -> Result<Option<Consent>, ConsentApiError> {
        let mut tx = self.pool.begin().await?;
        let consent = match consents::revoke_consent(consent_id, at, &mut tx).await? {
            Some(c) => Some(c),
            // Already revoked, or missing
            None => consents::fetch_consent(consent_id, &mut tx).await?,
        };
        tx.commit().await?;
        Ok(consent)
    }

    async fn find_active_consent(
        &self,
        tpp_id: &str,
        user_id: &str,
        permission: Permission,
        at: DateTime<Utc>,
    ) -> Result<Option<Consent>, ConsentApiError> {
        let mut conn = self.pool.acquire().await?;
        let consent = consents::find_active_consent(tpp_id, user_id, permission, at, &mut conn).await?;
        Ok(consent)
    }

    async fn touch_consent(&self, consent_id: &str, at: DateTime<Utc>) -> Result<(), ConsentApiError> {
        let mut tx = self.pool.begin().await?;
        consents::touch_consent(consent_id, at, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

impl AuthorizationCodeStore for SqliteDatabase {
    async fn insert_authorization_code(&self, code: NewAuthorizationCode) -> Result<AuthorizationCode, OAuthApiError> {
        let mut tx = self.pool.begin().await?;
        let code = auth_codes::insert_code(code, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        Ok(code)
    }

    async fn consume_authorization_code(
        &self,
        code: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<AuthorizationCode>, OAuthApiError> {
        let mut tx = self.pool.begin().await?;
        let code = auth_codes::consume_code(code, at, &mut tx).await?;
        tx.commit().await?;
        Ok(code)
    }
}

impl AuditLog for SqliteDatabase {
    async fn append_audit_record(&self, record: NewAuditRecord) -> Result<i64, AuditApiError> {
        let mut tx = self.pool.begin().await?;
        let id = audit::insert_record(record, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        Ok(id)
    }

    async fn fetch_audit_records_for_interaction(
        &self,
        interaction_id: &str,
    ) -> Result<Vec<AuditRecord>, AuditApiError> {
        let mut conn = self.pool.acquire().await?;
        let records = audit::fetch_records_for_interaction(interaction_id, &mut conn).await?;
        Ok(records)
    }
}

impl BankingData for SqliteDatabase {
    async fn fetch_accounts_for_user(&self, user_id: &str) -> Result<Vec<BankAccount>, BankingApiError> {
        let mut conn = self.pool.acquire().await?;
        let accounts = banking::fetch_accounts_for_user(user_id, &mut conn).await?;
        Ok(accounts)
    }

    async fn fetch_account(&self, account_id: &str) -> Result<Option<BankAccount>, BankingApiError> {
        let mut conn = self.pool.acquire().await?;
        let account = banking::fetch_account(account_id, &mut conn).await?;
        Ok(account)
    }

    async fn fetch_account_by_iban(&self, iban: &str) -> Result<Option<BankAccount>, BankingApiError> {
        let mut conn = self.pool.acquire().await?;
        let account = banking::fetch_account_by_iban(iban, &mut conn).await?;
        Ok(account)
    }

    async fn fetch_transactions(
        &self,
        account_id: &str,
        query: TransactionQuery,
    ) -> Result<Vec<BankTransaction>, BankingApiError> {
        let mut conn = self.pool.acquire().await?;
        let transactions = banking::fetch_transactions(account_id, query, &mut conn).await?;
        Ok(transactions)
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, BankingApiError> {
        let mut tx = self.pool.begin().await?;
        let payment = banking::insert_payment(payment, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        Ok(payment)
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<Option<Payment>, BankingApiError> {
        let mut conn = self.pool.acquire().await?;
        let payment = banking::fetch_payment(payment_id, &mut conn).await?;
        Ok(payment)
    }
}
