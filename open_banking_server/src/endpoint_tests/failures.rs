//! Backend failures, driven through mocked stores.
use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use open_banking_engine::{
    test_utils::seed::ALICE,
    traits::{BankingApiError, TppApiError},
    BankingApi,
    ConsentApi,
    SqliteDatabase,
    TppApi,
};

use super::{
    helpers::{access_token, bearer, closed_audit_queue, issuer, send, TestGateway},
    mocks::{MockBankingStore, MockTppStore},
};
use crate::{
    helpers::TPP_ID_HEADER,
    routes::{AccountsRoute, BalancesRoute},
};

const LEAKY_ERROR: &str = "no such table: bank_accounts (/var/lib/obg/gateway.db)";

fn accounts_request() -> TestRequest {
    let token = access_token(ALICE, "accounts balances", Some("tpp-a"));
    TestRequest::get().uri("/accounts").insert_header((TPP_ID_HEADER, "tpp-a")).insert_header(bearer(&token))
}

fn configure_banking(db: SqliteDatabase, banking: MockBankingStore) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(TppApi::new(db.clone())))
            .app_data(web::Data::new(ConsentApi::new(db)))
            .app_data(web::Data::new(BankingApi::new(banking)))
            .app_data(web::Data::new(issuer()))
            .service(AccountsRoute::<SqliteDatabase, SqliteDatabase, MockBankingStore>::new())
            .service(BalancesRoute::<SqliteDatabase, SqliteDatabase, MockBankingStore>::new());
    }
}

#[actix_web::test]
async fn banking_backend_failures_are_opaque() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    gw.authorized_tpp("tpp-a", "accounts balances", 100).await;
    gw.grant_consent("tpp-a", ALICE, "accounts balances").await;

    let mut banking = MockBankingStore::new();
    banking.expect_fetch_accounts_for_user().returning(|_| Err(BankingApiError::DatabaseError(LEAKY_ERROR.into())));
    let res = send(configure_banking(gw.db(), banking), accounts_request(), closed_audit_queue()).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.json()["errors"][0]["status"], "500");
    assert!(!res.body.contains("no such table"), "{}", res.body);
    assert!(res.error_detail().contains("x-fapi-interaction-id"));
}

#[actix_web::test]
async fn missing_accounts_are_not_found() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    gw.authorized_tpp("tpp-a", "accounts balances", 100).await;
    gw.grant_consent("tpp-a", ALICE, "accounts balances").await;

    let mut banking = MockBankingStore::new();
    banking.expect_fetch_account().times(1).returning(|_| Ok(None));
    let token = access_token(ALICE, "balances", Some("tpp-a"));
    let req = TestRequest::get()
        .uri("/accounts/acc-gone/balances")
        .insert_header((TPP_ID_HEADER, "tpp-a"))
        .insert_header(bearer(&token));
    let res = send(configure_banking(gw.db(), banking), req, closed_audit_queue()).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn tpp_registry_failures_are_opaque() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    let db = gw.db();
    let mut tpps = MockTppStore::new();
    tpps.expect_fetch_tpp().returning(|_| Err(TppApiError::DatabaseError(LEAKY_ERROR.into())));
    // A registry that cannot be read must never be mistaken for an empty one, and nobody gets charged
    tpps.expect_record_usage().never();

    let configure = move |cfg: &mut ServiceConfig| {
        cfg.app_data(web::Data::new(TppApi::new(tpps)))
            .app_data(web::Data::new(ConsentApi::new(db.clone())))
            .app_data(web::Data::new(BankingApi::new(db)))
            .app_data(web::Data::new(issuer()))
            .service(AccountsRoute::<MockTppStore, SqliteDatabase, SqliteDatabase>::new());
    };
    let res = send(configure, accounts_request(), closed_audit_queue()).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!res.body.contains("no such table"), "{}", res.body);
}
