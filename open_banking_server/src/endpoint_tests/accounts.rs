use actix_web::{http::StatusCode, test::TestRequest};
use chrono::{Duration, Utc};
use open_banking_engine::{
    db_types::{NewConsent, NewTpp, Permissions, TppStatus},
    test_utils::seed::{ALICE, BOB},
    traits::{ConsentManagement, TppManagement},
    ConsentApi,
};
use serde_json::json;

use super::helpers::{access_token, bearer, Reply, TestGateway};
use crate::helpers::TPP_ID_HEADER;

async fn get_as(gw: &TestGateway, tpp_id: &str, token: &str, uri: &str) -> Reply {
    gw.call(TestRequest::get().uri(uri).insert_header((TPP_ID_HEADER, tpp_id)).insert_header(bearer(token))).await
}

#[actix_web::test]
async fn registration_to_first_account_listing() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    let registration = json!({ "tppId": "tpp-demo", "name": "Demo", "services": ["accounts"] });
    let res = gw.call(TestRequest::post().uri("/tpps").set_json(registration)).await;
    assert_eq!(res.status, StatusCode::CREATED);

    let token = access_token(ALICE, "accounts", Some("tpp-demo"));
    let res = get_as(&gw, "tpp-demo", &token, "/accounts").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.error_detail(), "TPP status: pending");

    gw.db().update_tpp_status("tpp-demo", TppStatus::Authorized).await.unwrap();
    let res = get_as(&gw, "tpp-demo", &token, "/accounts").await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    gw.grant_consent("tpp-demo", ALICE, "accounts").await;
    let res = get_as(&gw, "tpp-demo", &token, "/accounts").await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let body = res.json();
    let data = body["data"].as_array().expect("data must be an array");
    assert_eq!(data.len(), 2);
    assert!(data.iter().all(|a| a["type"] == "accounts"));
    assert_eq!(data[0]["id"], "acc-alice-1");
    assert_eq!(data[0]["attributes"]["iban"], "DE02100100109307118603");
    assert_eq!(body["meta"]["totalCount"], 2);
    assert_eq!(body["links"]["self"], "/accounts");
}

#[actix_web::test]
async fn only_active_tpps_may_call_protected_routes() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    let db = gw.db();
    for (tpp_id, status) in [("tpp-suspended", TppStatus::Suspended), ("tpp-revoked", TppStatus::Revoked)] {
        gw.authorized_tpp(tpp_id, "accounts", 100).await;
        db.update_tpp_status(tpp_id, status).await.unwrap();
    }
    let expired = NewTpp::new("tpp-expired", "Expired Ltd")
        .with_services(Permissions::from_scope("accounts").unwrap())
        .with_rate_limit(100)
        .with_expiry(Utc::now() - Duration::days(1));
    db.insert_tpp(expired).await.unwrap();
    db.update_tpp_status("tpp-expired", TppStatus::Authorized).await.unwrap();

    for (tpp_id, detail) in [
        ("tpp-suspended", "TPP status: suspended"),
        ("tpp-revoked", "TPP status: revoked"),
        ("tpp-expired", ""),
        ("tpp-unknown", ""),
    ] {
        let token = access_token(ALICE, "accounts", None);
        let res = get_as(&gw, tpp_id, &token, "/accounts").await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "{tpp_id}");
        if !detail.is_empty() {
            assert_eq!(res.error_detail(), detail);
        }
        // Rejected callers are not charged
        assert_eq!(db.usage_since(tpp_id, Utc::now() - Duration::hours(1)).await.unwrap(), 0);
    }

    let res = gw.call(TestRequest::get().uri("/accounts").insert_header(bearer(&access_token(ALICE, "accounts", None))))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.error_detail(), "The x-tpp-id header is required");
}

#[actix_web::test]
async fn the_hourly_quota_is_enforced() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    gw.authorized_tpp("tpp-a", "accounts", 3).await;
    gw.grant_consent("tpp-a", ALICE, "accounts").await;
    let token = access_token(ALICE, "accounts", Some("tpp-a"));
    for i in 0..3 {
        let res = get_as(&gw, "tpp-a", &token, "/accounts").await;
        assert_eq!(res.status, StatusCode::OK, "call {i}");
    }
    let res = get_as(&gw, "tpp-a", &token, "/accounts").await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.json()["errors"][0]["status"], "429");
    // Every route draws on the same quota
    let res = get_as(&gw, "tpp-a", &token, "/accounts/acc-alice-1").await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
}

#[actix_web::test]
async fn token_checks_follow_tpp_checks() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    gw.authorized_tpp("tpp-a", "accounts balances", 100).await;
    gw.authorized_tpp("tpp-b", "accounts", 100).await;
    gw.grant_consent("tpp-a", ALICE, "accounts balances").await;

    let res = gw.call(TestRequest::get().uri("/accounts").insert_header((TPP_ID_HEADER, "tpp-a"))).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = get_as(&gw, "tpp-a", "not.a.jwt", "/accounts").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    // Issued to tpp-b, presented by tpp-a
    let res = get_as(&gw, "tpp-a", &access_token(ALICE, "accounts", Some("tpp-b")), "/accounts").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = get_as(&gw, "tpp-a", &access_token(ALICE, "accounts", None), "/accounts/acc-alice-1/balances").await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.error_detail(), "Insufficient scope. Missing scope: balances");
}

#[actix_web::test]
async fn access_requires_an_authorized_unexpired_consent() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    let db = gw.db();
    gw.authorized_tpp("tpp-a", "accounts balances", 100).await;
    let token = access_token(ALICE, "accounts balances", Some("tpp-a"));
    let consents = ConsentApi::new(db.clone());

    // Pending
    let pending = consents
        .create(Some("tpp-a"), Some(ALICE), serde_json::from_value(json!({ "permissions": ["accounts"] })).unwrap())
        .await
        .unwrap();
    assert_eq!(get_as(&gw, "tpp-a", &token, "/accounts").await.status, StatusCode::FORBIDDEN);

    // Authorised, but for a different permission
    consents.authorize(&pending.consent_id).await.unwrap();
    assert_eq!(get_as(&gw, "tpp-a", &token, "/accounts").await.status, StatusCode::OK);
    assert_eq!(get_as(&gw, "tpp-a", &token, "/accounts/acc-alice-1/balances").await.status, StatusCode::FORBIDDEN);

    // Revoked
    consents.revoke(&pending.consent_id).await.unwrap();
    assert_eq!(get_as(&gw, "tpp-a", &token, "/accounts").await.status, StatusCode::FORBIDDEN);

    // Authorised, then lapsed
    let lapsed = NewConsent {
        consent_id: "consent-lapsed".into(),
        tpp_id: "tpp-a".into(),
        user_id: ALICE.into(),
        permissions: Permissions::from_scope("accounts").unwrap(),
        recurring_indicator: true,
        frequency_per_day: 4,
        valid_until: Utc::now() - Duration::minutes(1),
    };
    db.insert_consent(lapsed).await.unwrap();
    db.authorize_consent("consent-lapsed", Utc::now()).await.unwrap();
    assert_eq!(get_as(&gw, "tpp-a", &token, "/accounts").await.status, StatusCode::FORBIDDEN);

    // Another TPP's consent is no use
    gw.authorized_tpp("tpp-b", "accounts", 100).await;
    gw.grant_consent("tpp-b", ALICE, "accounts").await;
    assert_eq!(get_as(&gw, "tpp-a", &token, "/accounts").await.status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn account_detail_and_balances() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    gw.authorized_tpp("tpp-a", "accounts balances", 100).await;
    gw.grant_consent("tpp-a", ALICE, "accounts balances").await;
    let token = access_token(ALICE, "accounts balances", Some("tpp-a"));

    let res = get_as(&gw, "tpp-a", &token, "/accounts/acc-alice-1").await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["data"]["type"], "accounts");
    assert_eq!(body["data"]["attributes"]["currency"], "EUR");
    assert_eq!(body["links"]["balances"], "/accounts/acc-alice-1/balances");

    let res = get_as(&gw, "tpp-a", &token, "/accounts/acc-alice-1/balances").await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["data"]["type"], "balances");
    let balances = body["data"]["attributes"]["balances"].as_array().unwrap();
    assert_eq!(balances[0]["balanceType"], "closingBooked");
    assert_eq!(balances[0]["balanceAmount"]["amount"], "1500.00");
    assert_eq!(balances[1]["balanceType"], "interimAvailable");
    assert_eq!(balances[1]["balanceAmount"]["amount"], "1250.50");

    // Bob's account is invisible to alice
    let res = get_as(&gw, "tpp-a", &token, "/accounts/acc-bob-1").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    let res = get_as(&gw, "tpp-a", &token, "/accounts/acc-nobody").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn transaction_history_is_filtered_by_booking_date() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    gw.authorized_tpp("tpp-a", "transactions", 100).await;
    gw.grant_consent("tpp-a", ALICE, "transactions").await;
    gw.grant_consent("tpp-a", BOB, "transactions").await;
    let token = access_token(ALICE, "transactions", Some("tpp-a"));

    let res = get_as(&gw, "tpp-a", &token, "/accounts/acc-alice-1/transactions").await;
    assert_eq!(res.status, StatusCode::OK);
    let ids = |res: &Reply| {
        res.json()["data"].as_array().unwrap().iter().map(|t| t["id"].as_str().unwrap().to_string()).collect::<Vec<_>>()
    };
    let mut all = ids(&res);
    all.sort();
    assert_eq!(all, ["tx-1", "tx-2", "tx-3"]);

    let from = (Utc::now() - Duration::days(30)).date_naive();
    let to = (Utc::now() - Duration::days(10)).date_naive();
    let res = get_as(&gw, "tpp-a", &token, &format!("/accounts/acc-alice-1/transactions?fromDate={from}")).await;
    let mut recent = ids(&res);
    recent.sort();
    assert_eq!(recent, ["tx-2", "tx-3"]);
    let uri = format!("/accounts/acc-alice-1/transactions?fromDate={from}&toDate={to}");
    assert_eq!(ids(&get_as(&gw, "tpp-a", &token, &uri).await), ["tx-2"]);

    let res = get_as(&gw, "tpp-a", &token, "/accounts/acc-alice-1/transactions?fromDate=last-tuesday").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let bob = access_token(BOB, "transactions", Some("tpp-a"));
    let res = get_as(&gw, "tpp-a", &bob, "/accounts/acc-alice-1/transactions").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}
