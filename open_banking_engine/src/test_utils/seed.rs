//! Fixture data for the business tables.
use chrono::{Duration, NaiveDate, Utc};
use obg_common::Amount;

use crate::{
    db_types::{BankAccount, NewBankAccount, NewBankTransaction, Permissions, Tpp, TppStatus},
    obe_api::tpp_objects::TppRegistration,
    traits::TppManagement,
    SqliteDatabase,
};

pub const ALICE: &str = "alice";
pub const BOB: &str = "bob";
pub const ALICE_IBAN: &str = "DE02100100109307118603";
pub const ALICE_SAVINGS_IBAN: &str = "DE02120300000000202051";
pub const BOB_IBAN: &str = "DE89370400440532013000";

/// Inserts an `authorized` TPP with the given services and quota.
pub async fn authorized_tpp(db: &SqliteDatabase, tpp_id: &str, services: &str, rate_limit: i64) -> Tpp {
    let services = Permissions::from_scope(services).expect("Invalid services");
    let registration = TppRegistration {
        tpp_id: tpp_id.to_string(),
        name: format!("{tpp_id} Ltd"),
        services: services.iter().map(|p| p.to_string()).collect(),
        redirect_uris: vec![format!("https://{tpp_id}.example/callback")],
        ..Default::default()
    };
    let tpp = registration.into_new_tpp(rate_limit, Utc::now()).expect("Invalid registration");
    db.insert_tpp(tpp).await.expect("Error inserting TPP");
    db.update_tpp_status(tpp_id, TppStatus::Authorized).await.expect("Error updating TPP").expect("TPP vanished")
}

/// Two accounts for alice, one for bob, and a few transactions on alice's current account.
pub async fn seed_accounts(db: &SqliteDatabase) -> Vec<BankAccount> {
    let accounts = [
        ("acc-alice-1", ALICE, ALICE_IBAN, "Current account", 150_000, 125_050),
        ("acc-alice-2", ALICE, ALICE_SAVINGS_IBAN, "Savings", 1_000_000, 1_000_000),
        ("acc-bob-1", BOB, BOB_IBAN, "Current account", 5_000, 5_000),
    ];
    let mut result = Vec::with_capacity(accounts.len());
    for (account_id, user_id, iban, name, current, available) in accounts {
        let account = NewBankAccount {
            account_id: account_id.to_string(),
            user_id: user_id.to_string(),
            iban: iban.to_string(),
            currency: "EUR".to_string(),
            name: name.to_string(),
            product: Some("Girokonto".to_string()),
            current_balance: Amount::from(current),
            available_balance: Amount::from(available),
        };
        result.push(db.insert_account(account).await.expect("Error inserting account"));
    }
    let today = Utc::now().date_naive();
    let txs = [
        ("tx-1", -4_250, today - Duration::days(40), Some("Grocer"), "Weekly shop"),
        ("tx-2", 250_000, today - Duration::days(20), None, "Salary"),
        ("tx-3", -1_999, today - Duration::days(2), Some("Streaming Inc"), "Subscription"),
    ];
    for (transaction_id, amount, booking_date, creditor, remittance) in txs {
        let tx = NewBankTransaction {
            transaction_id: transaction_id.to_string(),
            account_id: "acc-alice-1".to_string(),
            amount: Amount::from(amount),
            currency: "EUR".to_string(),
            booking_date,
            value_date: Some(booking_date),
            creditor_name: creditor.map(String::from),
            debtor_name: None,
            remittance_information: Some(remittance.to_string()),
        };
        db.insert_transaction(tx).await.expect("Error inserting transaction");
    }
    result
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("Invalid date")
}
