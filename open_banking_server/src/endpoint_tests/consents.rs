use actix_web::{http::StatusCode, test::TestRequest};
use open_banking_engine::test_utils::seed::{ALICE, ALICE_IBAN};
use serde_json::{json, Value};

use super::helpers::{access_token, bearer, Reply, TestGateway};
use crate::helpers::TPP_ID_HEADER;

fn consent_request() -> Value {
    json!({
        "access": {
            "accounts": [{ "iban": ALICE_IBAN }],
            "balances": [{ "iban": ALICE_IBAN }]
        },
        "recurringIndicator": true,
        "frequencyPerDay": 4
    })
}

async fn create(gw: &TestGateway) -> Reply {
    let token = access_token(ALICE, "accounts", None);
    gw.call(
        TestRequest::post()
            .uri("/consents")
            .insert_header((TPP_ID_HEADER, "tpp-a"))
            .insert_header(bearer(&token))
            .set_json(consent_request()),
    )
    .await
}

#[actix_web::test]
async fn consent_lifecycle() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    gw.authorized_tpp("tpp-a", "accounts balances", 100).await;

    let res = create(&gw).await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    let body = res.json();
    assert_eq!(body["data"]["type"], "consents");
    let attributes = &body["data"]["attributes"];
    assert_eq!(attributes["consentStatus"], "pending");
    assert_eq!(attributes["scaStatus"], "required");
    assert_eq!(attributes["permissions"], json!(["accounts", "balances"]));
    assert_eq!(attributes["recurringIndicator"], true);
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["links"]["scaRedirect"], format!("/consents/{id}/authorise"));

    let res = gw.call(TestRequest::get().uri(&format!("/consents/{id}"))).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["data"]["attributes"]["consentStatus"], "pending");

    let res = gw.call(TestRequest::post().uri(&format!("/consents/{id}/authorise"))).await;
    assert_eq!(res.status, StatusCode::OK);
    let attributes = res.json()["data"]["attributes"].clone();
    assert_eq!(attributes["consentStatus"], "authorized");
    assert_eq!(attributes["scaStatus"], "finalised");
    assert!(attributes["authorizedAt"].is_string());

    // Already authorised
    let res = gw.call(TestRequest::post().uri(&format!("/consents/{id}/authorise"))).await;
    assert_eq!(res.status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn revoking_twice_is_harmless() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    gw.authorized_tpp("tpp-a", "accounts balances", 100).await;
    let id = create(&gw).await.json()["data"]["id"].as_str().unwrap().to_string();
    gw.call(TestRequest::post().uri(&format!("/consents/{id}/authorise"))).await;

    let first = gw.call(TestRequest::delete().uri(&format!("/consents/{id}"))).await;
    assert_eq!(first.status, StatusCode::OK);
    let second = gw.call(TestRequest::delete().uri(&format!("/consents/{id}"))).await;
    assert_eq!(second.status, StatusCode::OK);
    let (first, second) = (first.json(), second.json());
    assert_eq!(first["data"]["attributes"]["consentStatus"], "revoked");
    assert_eq!(second["data"]["attributes"]["consentStatus"], "revoked");
    assert_eq!(first["data"]["attributes"]["revokedAt"], second["data"]["attributes"]["revokedAt"]);

    // A revoked consent can never be authorised again
    let res = gw.call(TestRequest::post().uri(&format!("/consents/{id}/authorise"))).await;
    assert_eq!(res.status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn consent_creation_needs_an_end_user_and_a_known_tpp() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    gw.authorized_tpp("tpp-a", "accounts", 100).await;

    let anonymous =
        TestRequest::post().uri("/consents").insert_header((TPP_ID_HEADER, "tpp-a")).set_json(consent_request());
    let res = gw.call(anonymous).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let token = access_token(ALICE, "accounts", None);
    let no_tpp = TestRequest::post().uri("/consents").insert_header(bearer(&token)).set_json(consent_request());
    let res = gw.call(no_tpp).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = gw
        .call(
            TestRequest::post()
                .uri("/consents")
                .insert_header((TPP_ID_HEADER, "tpp-nobody"))
                .insert_header(bearer(&token))
                .set_json(consent_request()),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = gw
        .call(
            TestRequest::post()
                .uri("/consents")
                .insert_header((TPP_ID_HEADER, "tpp-a"))
                .insert_header(bearer(&token))
                .set_json(json!({ "access": {} })),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn unknown_consents() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    for req in [
        TestRequest::get().uri("/consents/does-not-exist"),
        TestRequest::delete().uri("/consents/does-not-exist"),
        TestRequest::post().uri("/consents/does-not-exist/authorise"),
    ] {
        let res = gw.call(req).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert_eq!(res.json()["errors"][0]["status"], "404");
    }
}
