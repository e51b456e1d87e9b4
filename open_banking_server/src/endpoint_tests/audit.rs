use actix_web::{http::StatusCode, test::TestRequest};
use open_banking_engine::{
    db_types::AuditRecord,
    test_utils::seed::{ALICE, ALICE_IBAN, BOB_IBAN},
    AuditApi,
};
use serde_json::{json, Value};

use super::helpers::{access_token, bearer, Reply, TestGateway};
use crate::helpers::{INTERACTION_ID_HEADER, TPP_ID_HEADER};

/// The audit records written for the interaction that produced `res`.
async fn audit_trail(gw: &TestGateway, res: &Reply) -> Vec<AuditRecord> {
    let id = res.header(INTERACTION_ID_HEADER).expect("Every response must carry an interaction id");
    AuditApi::new(gw.db()).records_for_interaction(id).await.unwrap()
}

#[actix_web::test]
async fn every_interaction_is_audited_exactly_once() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    gw.authorized_tpp("tpp-a", "accounts", 2).await;
    gw.grant_consent("tpp-a", ALICE, "accounts").await;
    let token = access_token(ALICE, "accounts", Some("tpp-a"));
    let accounts =
        || TestRequest::get().uri("/accounts").insert_header((TPP_ID_HEADER, "tpp-a")).insert_header(bearer(&token));

    let requests = vec![
        (TestRequest::get().uri("/health"), StatusCode::OK),
        (TestRequest::get().uri("/no/such/thing"), StatusCode::NOT_FOUND),
        (TestRequest::get().uri("/accounts"), StatusCode::UNAUTHORIZED),
        (TestRequest::post().uri("/tpps").set_json(json!({ "tppId": "tpp-a", "name": "Again" })), StatusCode::CONFLICT),
        (accounts(), StatusCode::OK),
        (accounts(), StatusCode::OK),
        (accounts(), StatusCode::TOO_MANY_REQUESTS),
        (TestRequest::get().uri("/consents/nope"), StatusCode::NOT_FOUND),
    ];
    for (req, expected) in requests {
        let res = gw.call(req).await;
        assert_eq!(res.status, expected, "{}", res.body);
        let trail = audit_trail(&gw, &res).await;
        assert_eq!(trail.len(), 1, "{trail:?}");
        assert_eq!(trail[0].response_status, i64::from(res.status.as_u16()));
    }
}

#[actix_web::test]
async fn audit_records_name_the_parties() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    gw.authorized_tpp("tpp-a", "payments", 100).await;
    let consent = gw.grant_consent("tpp-a", ALICE, "payments").await;
    let token = access_token(ALICE, "payments", Some("tpp-a"));
    let body = json!({
        "instructedAmount": { "currency": "EUR", "amount": "12.00" },
        "debtorAccount": { "iban": ALICE_IBAN },
        "creditorAccount": { "iban": BOB_IBAN }
    });
    let res = gw
        .call(
            TestRequest::post()
                .uri("/payments")
                .insert_header((TPP_ID_HEADER, "tpp-a"))
                .insert_header(bearer(&token))
                .set_json(body),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);

    let trail = audit_trail(&gw, &res).await;
    let record = &trail[0];
    assert_eq!(record.tpp_id.as_deref(), Some("tpp-a"));
    assert_eq!(record.user_id.as_deref(), Some(ALICE));
    assert_eq!(record.consent_id.as_deref(), Some(consent.consent_id.as_str()));
    assert_eq!(record.method, "POST");
    assert_eq!(record.endpoint, "/payments");
    assert_eq!(record.response_status, 201);

    let request_body: Value = serde_json::from_str(record.request_body.as_deref().unwrap()).unwrap();
    assert_eq!(request_body["instructedAmount"]["amount"], "12.00");
    let response_body: Value = serde_json::from_str(record.response_body.as_deref().unwrap()).unwrap();
    assert_eq!(response_body, res.json());

    // Credentials never reach the audit trail
    let headers: Value = serde_json::from_str(&record.request_headers).unwrap();
    assert_eq!(headers["authorization"], "[REDACTED]");
    assert!(!record.request_headers.contains(&token));
    assert_eq!(headers[TPP_ID_HEADER], "tpp-a");
}

#[actix_web::test]
async fn caller_interaction_ids_correlate_with_the_trail() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    let id = "0b7c3e7e-8f41-4c8e-9a7d-2f3c4d5e6f70";
    let res = gw.call(TestRequest::get().uri("/accounts").insert_header((INTERACTION_ID_HEADER, id))).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.header(INTERACTION_ID_HEADER), Some(id));
    let trail = audit_trail(&gw, &res).await;
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].interaction_id, id);
    assert_eq!(trail[0].response_status, 401);
    assert!(trail[0].tpp_id.is_none());
}
