use actix_web::{http::StatusCode, test::TestRequest};
use open_banking_engine::{db_types::TppStatus, traits::TppManagement};
use serde_json::json;

use super::helpers::TestGateway;

fn registration(tpp_id: &str) -> serde_json::Value {
    json!({
        "tppId": tpp_id,
        "name": "Demo Payments GmbH",
        "organizationId": "PSDDE-BAFIN-123456",
        "country": "DE",
        "services": ["accounts", "balances", "payments"],
        "redirectUris": ["https://demo.example/callback"]
    })
}

#[actix_web::test]
async fn new_registrations_are_pending() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    let res = gw.call(TestRequest::post().uri("/tpps").set_json(registration("tpp-demo"))).await;
    assert_eq!(res.status, StatusCode::CREATED);
    let body = res.json();
    assert_eq!(body["data"]["type"], "tpps");
    assert_eq!(body["data"]["id"], "tpp-demo");
    assert_eq!(body["data"]["attributes"]["status"], "pending");
    assert!(body["meta"]["message"].as_str().is_some_and(|m| !m.is_empty()));

    let tpp = gw.db().fetch_tpp("tpp-demo").await.unwrap().expect("TPP was not stored");
    assert_eq!(tpp.authorization_status, TppStatus::Pending);
    assert_eq!(tpp.rate_limit_per_hour, gw.config.default_rate_limit);
}

#[actix_web::test]
async fn duplicate_registrations_conflict() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    let res = gw.call(TestRequest::post().uri("/tpps").set_json(registration("tpp-demo"))).await;
    assert_eq!(res.status, StatusCode::CREATED);
    let res = gw.call(TestRequest::post().uri("/tpps").set_json(registration("tpp-demo"))).await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.json()["errors"][0]["status"], "409");
}

#[actix_web::test]
async fn invalid_registrations_are_rejected() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    let mut body = registration("tpp-demo");
    body["services"] = json!(["accounts", "mortgages"]);
    let res = gw.call(TestRequest::post().uri("/tpps").set_json(body)).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = gw.call(TestRequest::post().uri("/tpps").set_json(json!({ "tppId": " ", "name": "x" }))).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = gw
        .call(TestRequest::post().uri("/tpps").insert_header(("content-type", "application/json")).set_payload("{nope"))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.error_detail().contains("request body"), "{}", res.error_detail());
}

#[actix_web::test]
async fn oversized_bodies_are_refused() {
    let _ = env_logger::try_init();
    let mut gw = TestGateway::new().await;
    gw.config.max_body_bytes = 1024;
    let mut body = registration("tpp-big");
    body["name"] = json!("x".repeat(4096));
    let res = gw.call(TestRequest::post().uri("/tpps").set_json(body)).await;
    assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(res.header("content-type"), Some("application/vnd.api+json"));
    assert_eq!(res.json()["errors"][0]["status"], "413");
    assert!(gw.db().fetch_tpp("tpp-big").await.unwrap().is_none());

    // Ordinary registrations are unaffected
    let res = gw.call(TestRequest::post().uri("/tpps").set_json(registration("tpp-small"))).await;
    assert_eq!(res.status, StatusCode::CREATED);
}
