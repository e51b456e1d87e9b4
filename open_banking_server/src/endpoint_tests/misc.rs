use actix_web::{
    http::{Method, StatusCode},
    test::TestRequest,
    web,
};
use uuid::Uuid;

use super::helpers::{closed_audit_queue, send, TestGateway};
use crate::{
    helpers::INTERACTION_ID_HEADER,
    routes::{health, not_found},
};

#[actix_web::test]
async fn health_check() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    let res = gw.call(TestRequest::get().uri("/health")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, "👍️\n");
}

#[actix_web::test]
async fn openapi_is_served_at_both_paths() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    for path in ["/openapi.json", "/spec"] {
        let res = gw.call(TestRequest::get().uri(path)).await;
        assert_eq!(res.status, StatusCode::OK, "{path}");
        let doc = res.json();
        assert_eq!(doc["openapi"], "3.0.3");
        assert!(doc["paths"]["/accounts"]["get"].is_object());
    }
}

#[actix_web::test]
async fn every_response_carries_cors_headers() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    let res = gw.call(TestRequest::get().uri("/accounts")).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.header("access-control-allow-origin"), Some("*"));
    assert_eq!(res.header("access-control-expose-headers"), Some(INTERACTION_ID_HEADER));
}

#[actix_web::test]
async fn preflight_requests_are_answered_on_any_path() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    for path in ["/accounts", "/payments/abc/status", "/no/such/thing"] {
        let res = gw.call(TestRequest::default().method(Method::OPTIONS).uri(path)).await;
        assert_eq!(res.status, StatusCode::NO_CONTENT, "{path}");
        assert_eq!(res.header("access-control-allow-origin"), Some("*"));
        let methods = res.header("access-control-allow-methods").unwrap();
        assert!(methods.contains("DELETE"));
        let headers = res.header("access-control-allow-headers").unwrap();
        assert!(headers.contains("x-tpp-id"));
        assert_eq!(res.header("access-control-max-age"), Some("86400"));
    }
}

#[actix_web::test]
async fn unknown_paths_get_the_error_envelope() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    let res = gw.call(TestRequest::get().uri("/no/such/thing")).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.header("content-type"), Some("application/vnd.api+json"));
    let body = res.json();
    assert_eq!(body["errors"][0]["status"], "404");
    assert_eq!(body["errors"][0]["title"], "Not Found");
    assert!(res.error_detail().contains("/no/such/thing"));
}

#[actix_web::test]
async fn interaction_id_is_echoed_or_minted() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    let id = "5c2e8f4a-0d1b-4d6a-9f0e-3b7a1c2d4e5f";
    let res = gw.call(TestRequest::get().uri("/health").insert_header((INTERACTION_ID_HEADER, id))).await;
    assert_eq!(res.header(INTERACTION_ID_HEADER), Some(id));

    let res = gw.call(TestRequest::get().uri("/health")).await;
    let minted = res.header(INTERACTION_ID_HEADER).expect("An interaction id must always be returned");
    assert!(Uuid::parse_str(minted).is_ok(), "{minted}");

    let res = gw.call(TestRequest::get().uri("/no/such/thing")).await;
    assert!(res.header(INTERACTION_ID_HEADER).is_some());
}

#[actix_web::test]
async fn an_unavailable_audit_queue_does_not_fail_the_request() {
    let _ = env_logger::try_init();
    let configure = |cfg: &mut web::ServiceConfig| {
        cfg.service(health).default_service(web::to(not_found));
    };
    let res = send(configure, TestRequest::get().uri("/health"), closed_audit_queue()).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.header(INTERACTION_ID_HEADER).is_some());

    let res = send(configure, TestRequest::get().uri("/nowhere"), closed_audit_queue()).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}
