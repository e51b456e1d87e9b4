use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::db_types::{
    BankAccount,
    BankTransaction,
    NewBankAccount,
    NewBankTransaction,
    NewPayment,
    Payment,
    PaymentStatus,
    TransactionQuery,
};

pub async fn fetch_accounts_for_user(
    user_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<BankAccount>, sqlx::Error> {
    let accounts = sqlx::query_as("SELECT * FROM bank_accounts WHERE user_id = $1 ORDER BY id")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(accounts)
}

pub async fn fetch_account(account_id: &str, conn: &mut SqliteConnection) -> Result<Option<BankAccount>, sqlx::Error> {
    let account = sqlx::query_as("SELECT * FROM bank_accounts WHERE account_id = $1")
        .bind(account_id)
        .fetch_optional(conn)
        .await?;
    Ok(account)
}

pub async fn fetch_account_by_iban(
    iban: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<BankAccount>, sqlx::Error> {
    let account =
        sqlx::query_as("SELECT * FROM bank_accounts WHERE iban = $1").bind(iban).fetch_optional(conn).await?;
    Ok(account)
}

/// Fetches transactions for the account according to the criteria in the `TransactionQuery`.
///
/// Results are ordered by booking date, most recent first.
pub async fn fetch_transactions(
    account_id: &str,
    query: TransactionQuery,
    conn: &mut SqliteConnection,
) -> Result<Vec<BankTransaction>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM bank_transactions WHERE account_id = ");
    builder.push_bind(account_id.to_string());
    if let Some(from) = query.from_date {
        builder.push(" AND booking_date >= ");
        builder.push_bind(from);
    }
    if let Some(to) = query.to_date {
        builder.push(" AND booking_date <= ");
        builder.push_bind(to);
    }
    builder.push(" ORDER BY booking_date DESC, id DESC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let transactions = builder.build_query_as::<BankTransaction>().fetch_all(conn).await?;
    Ok(transactions)
}

pub async fn insert_payment(
    payment: NewPayment,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Payment, sqlx::Error> {
    let payment_id = Uuid::new_v4().to_string();
    let payment: Payment = sqlx::query_as(
        r#"
            INSERT INTO payments (
                payment_id,
                tpp_id,
                user_id,
                consent_id,
                debtor_iban,
                creditor_iban,
                creditor_name,
                amount,
                currency,
                remittance_information,
                status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
            RETURNING *;
        "#,
    )
    .bind(payment_id)
    .bind(payment.tpp_id)
    .bind(payment.user_id)
    .bind(payment.consent_id)
    .bind(payment.debtor_iban)
    .bind(payment.creditor_iban)
    .bind(payment.creditor_name)
    .bind(payment.amount)
    .bind(payment.currency)
    .bind(payment.remittance_information)
    .bind(PaymentStatus::Received)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Payment {} for {} received", payment.payment_id, payment.amount);
    Ok(payment)
}

pub async fn fetch_payment(payment_id: &str, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    let payment =
        sqlx::query_as("SELECT * FROM payments WHERE payment_id = $1").bind(payment_id).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn insert_account(
    account: NewBankAccount,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<BankAccount, sqlx::Error> {
    let account = sqlx::query_as(
        r#"
            INSERT INTO bank_accounts (
                account_id,
                user_id,
                iban,
                currency,
                name,
                product,
                current_balance,
                available_balance,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(account.account_id)
    .bind(account.user_id)
    .bind(account.iban)
    .bind(account.currency)
    .bind(account.name)
    .bind(account.product)
    .bind(account.current_balance)
    .bind(account.available_balance)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(account)
}

pub async fn insert_transaction(
    tx: NewBankTransaction,
    conn: &mut SqliteConnection,
) -> Result<BankTransaction, sqlx::Error> {
    let tx = sqlx::query_as(
        r#"
            INSERT INTO bank_transactions (
                transaction_id,
                account_id,
                amount,
                currency,
                booking_date,
                value_date,
                creditor_name,
                debtor_name,
                remittance_information
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(tx.transaction_id)
    .bind(tx.account_id)
    .bind(tx.amount)
    .bind(tx.currency)
    .bind(tx.booking_date)
    .bind(tx.value_date)
    .bind(tx.creditor_name)
    .bind(tx.debtor_name)
    .bind(tx.remittance_information)
    .fetch_one(conn)
    .await?;
    Ok(tx)
}
