#![allow(dead_code)]
use chrono::{NaiveDate, Utc};
use obg_common::Amount;
use open_banking_engine::{
    db_types::{NewBankAccount, NewBankTransaction, Tpp, TppStatus},
    tpp_objects::TppRegistration,
    traits::TppManagement,
    SqliteDatabase,
};
use tempfile::TempDir;

pub const ALICE_IBAN: &str = "DE02100100109307118603";
pub const BOB_IBAN: &str = "DE89370400440532013000";

/// A fresh, migrated database. Keep the `TempDir` alive for as long as the database is used.
pub async fn prepare_db() -> (TempDir, SqliteDatabase) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir().expect("Error creating temporary directory");
    let url = db_url(&dir);
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    db.migrate().await.expect("Error running migrations");
    (dir, db)
}

pub fn db_url(dir: &TempDir) -> String {
    format!("sqlite://{}", dir.path().join("engine_test.db").display())
}

pub async fn register(db: &SqliteDatabase, tpp_id: &str, services: &[&str], rate_limit: i64) -> Tpp {
    let registration = TppRegistration {
        tpp_id: tpp_id.to_string(),
        name: "Test TPP".to_string(),
        services: services.iter().map(|s| s.to_string()).collect(),
        redirect_uris: vec!["https://tpp.example/cb".to_string()],
        ..Default::default()
    };
    let tpp = registration.into_new_tpp(rate_limit, Utc::now()).expect("Invalid registration");
    db.insert_tpp(tpp).await.expect("Error registering TPP")
}

pub async fn authorized(db: &SqliteDatabase, tpp_id: &str, services: &[&str], rate_limit: i64) -> Tpp {
    register(db, tpp_id, services, rate_limit).await;
    db.update_tpp_status(tpp_id, TppStatus::Authorized).await.unwrap().unwrap()
}

pub async fn seed_accounts(db: &SqliteDatabase) {
    for (account_id, user_id, iban, available) in
        [("acc-alice", "alice", ALICE_IBAN, 50_000), ("acc-bob", "bob", BOB_IBAN, 100)]
    {
        let account = NewBankAccount {
            account_id: account_id.to_string(),
            user_id: user_id.to_string(),
            iban: iban.to_string(),
            currency: "EUR".to_string(),
            name: "Current account".to_string(),
            product: None,
            current_balance: Amount::from(available + 1_000),
            available_balance: Amount::from(available),
        };
        db.insert_account(account).await.unwrap();
    }
    for (id, day, amount) in [("t1", "2024-01-05", -1_000), ("t2", "2024-02-10", 20_000), ("t3", "2024-03-15", -500)] {
        let booking_date = NaiveDate::parse_from_str(day, "%Y-%m-%d").unwrap();
        let tx = NewBankTransaction {
            transaction_id: id.to_string(),
            account_id: "acc-alice".to_string(),
            amount: Amount::from(amount),
            currency: "EUR".to_string(),
            booking_date,
            value_date: None,
            creditor_name: None,
            debtor_name: None,
            remittance_information: None,
        };
        db.insert_transaction(tx).await.unwrap();
    }
}
