use actix_web::{http::StatusCode, test::TestRequest};
use open_banking_engine::{oauth_objects::TokenResponse, test_utils::seed::ALICE};
use serde_json::json;

use super::helpers::{bearer, Reply, TestGateway};
use crate::helpers::{PSU_ID_HEADER, TPP_ID_HEADER};

const CALLBACK: &str = "https://tpp-a.example/callback";

async fn authorization_code(gw: &TestGateway, scope: &str) -> Reply {
    let uri = format!(
        "/oauth/authorize?response_type=code&client_id=tpp-a&redirect_uri={}&scope={}&state=xyz",
        CALLBACK.replace(':', "%3A").replace('/', "%2F"),
        scope.replace(' ', "%20")
    );
    gw.call(TestRequest::get().uri(&uri).insert_header((PSU_ID_HEADER, ALICE))).await
}

fn exchange(code: &str) -> TestRequest {
    TestRequest::post().uri("/oauth/token").set_form(vec![
        ("grant_type", "authorization_code"),
        ("code", code),
        ("client_id", "tpp-a"),
        ("redirect_uri", CALLBACK),
    ])
}

#[actix_web::test]
async fn authorization_code_flow() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    gw.authorized_tpp("tpp-a", "accounts balances transactions", 100).await;

    let res = authorization_code(&gw, "accounts balances").await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let grant = res.json();
    assert_eq!(grant["state"], "xyz");
    assert_eq!(grant["scope"], "accounts balances");
    let code = grant["code"].as_str().unwrap().to_string();

    let res = gw.call(exchange(&code)).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.header("cache-control"), Some("no-store"));
    let tokens: TokenResponse = serde_json::from_str(&res.body).unwrap();
    assert_eq!(tokens.token_type, "Bearer");
    assert_eq!(tokens.scope, "accounts balances");
    assert!(tokens.expires_in > 0);

    // The token is good for the resource API, once the end-user has consented
    gw.grant_consent("tpp-a", ALICE, "accounts").await;
    let res = gw
        .call(
            TestRequest::get()
                .uri("/accounts")
                .insert_header((TPP_ID_HEADER, "tpp-a"))
                .insert_header(bearer(&tokens.access_token)),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.json()["data"].as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn codes_are_single_use() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    gw.authorized_tpp("tpp-a", "accounts", 100).await;
    let code = authorization_code(&gw, "accounts").await.json()["code"].as_str().unwrap().to_string();

    let res = gw.call(exchange(&code)).await;
    assert_eq!(res.status, StatusCode::OK);
    let res = gw.call(exchange(&code)).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.error_detail().contains("invalid, expired or used"), "{}", res.error_detail());
}

#[actix_web::test]
async fn authorization_needs_an_end_user_and_a_registered_scope() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    gw.authorized_tpp("tpp-a", "accounts", 100).await;

    let res = gw.call(TestRequest::get().uri("/oauth/authorize?response_type=code&client_id=tpp-a")).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = authorization_code(&gw, "accounts payments").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let uri = "/oauth/authorize?response_type=code&client_id=tpp-a&redirect_uri=https%3A%2F%2Fevil.example%2F";
    let res = gw.call(TestRequest::get().uri(uri).insert_header((PSU_ID_HEADER, ALICE))).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let uri = "/oauth/authorize?response_type=code&client_id=tpp-nobody";
    let res = gw.call(TestRequest::get().uri(uri).insert_header((PSU_ID_HEADER, ALICE))).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn refresh_tokens_are_bound_to_their_client() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    gw.authorized_tpp("tpp-a", "accounts", 100).await;
    gw.authorized_tpp("tpp-b", "accounts", 100).await;
    let code = authorization_code(&gw, "accounts").await.json()["code"].as_str().unwrap().to_string();
    let tokens: TokenResponse = serde_json::from_str(&gw.call(exchange(&code)).await.body).unwrap();

    let refresh = |client: &'static str| {
        TestRequest::post().uri("/oauth/token").set_json(json!({
            "grant_type": "refresh_token",
            "refresh_token": tokens.refresh_token,
            "client_id": client,
        }))
    };
    let res = gw.call(refresh("tpp-a")).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let refreshed: TokenResponse = serde_json::from_str(&res.body).unwrap();
    assert_eq!(refreshed.scope, "accounts");

    let res = gw.call(refresh("tpp-b")).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.error_detail().starts_with("Invalid grant"), "{}", res.error_detail());

    // An access token is not a refresh token
    let res = gw
        .call(TestRequest::post().uri("/oauth/token").set_form(vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", tokens.access_token.as_str()),
            ("client_id", "tpp-a"),
        ]))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn unsupported_grant_types() {
    let _ = env_logger::try_init();
    let gw = TestGateway::new().await;
    let res = gw
        .call(TestRequest::post().uri("/oauth/token").set_form(vec![("grant_type", "client_credentials")]))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.error_detail().contains("unsupported grant_type"), "{}", res.error_detail());

    let no_code = TestRequest::post().uri("/oauth/token").set_form(vec![("grant_type", "authorization_code")]);
    let res = gw.call(no_code).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error_detail(), "code is required");
}
