//! The machine-readable description of the gateway's API, served at `/openapi.json` and `/spec`.
use serde_json::{json, Map, Value};

fn operation(summary: &str, tag: &str, secured: bool, responses: &[(&str, &str)]) -> Value {
    let responses: Map<String, Value> =
        responses.iter().map(|(code, desc)| (code.to_string(), json!({ "description": desc }))).collect();
    let mut op = json!({ "summary": summary, "tags": [tag], "responses": Value::Object(responses) });
    if secured {
        op["security"] = json!([{ "bearer": [] }]);
        op["parameters"] = json!([{ "$ref": "#/components/parameters/TppId" }]);
    }
    op
}

fn with_path_id(mut op: Value, name: &str) -> Value {
    let param = json!({ "name": name, "in": "path", "required": true, "schema": { "type": "string" } });
    match op.get_mut("parameters").and_then(Value::as_array_mut) {
        Some(params) => params.push(param),
        None => op["parameters"] = json!([param]),
    }
    op
}

pub fn document() -> Value {
    const PROTECTED: &[(&str, &str)] = &[
        ("200", "Success"),
        ("401", "Unknown, unauthorized or expired TPP, or missing bearer token"),
        ("403", "Insufficient scope or no valid consent"),
        ("429", "Hourly request quota exhausted"),
    ];
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Open Banking Gateway",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "PSD2-style access to account information and payment initiation for registered TPPs."
        },
        "paths": {
            "/tpps": {
                "post": operation("Register a TPP", "tpps", false, &[("201", "Registered, pending review"), ("409", "Already registered")])
            },
            "/oauth/authorize": {
                "get": operation("Issue an authorization code", "oauth", false, &[("200", "Authorization grant"), ("400", "Invalid request or scope")])
            },
            "/oauth/token": {
                "post": operation("Exchange a code or refresh token", "oauth", false, &[("200", "Token pair"), ("400", "Invalid grant")])
            },
            "/accounts": {
                "get": operation("List the end-user's accounts", "accounts", true, PROTECTED)
            },
            "/accounts/{accountId}": {
                "get": with_path_id(operation("Account detail", "accounts", true, PROTECTED), "accountId")
            },
            "/accounts/{accountId}/transactions": {
                "get": with_path_id(operation("Transaction history, filtered by fromDate and toDate", "accounts", true, PROTECTED), "accountId")
            },
            "/accounts/{accountId}/balances": {
                "get": with_path_id(operation("Booked and available balances", "accounts", true, PROTECTED), "accountId")
            },
            "/payments": {
                "post": operation("Initiate a payment", "payments", true, PROTECTED)
            },
            "/payments/{paymentId}": {
                "get": with_path_id(operation("Payment detail", "payments", true, PROTECTED), "paymentId")
            },
            "/payments/{paymentId}/status": {
                "get": with_path_id(operation("Payment status", "payments", true, PROTECTED), "paymentId")
            },
            "/funds-confirmation": {
                "post": operation("Check that an account can cover an amount", "funds", true, PROTECTED)
            },
            "/consents": {
                "post": operation("Create a consent", "consents", false, &[("201", "Pending consent"), ("400", "Invalid request"), ("401", "No authenticated end-user")])
            },
            "/consents/{consentId}": {
                "get": with_path_id(operation("Poll a consent", "consents", false, &[("200", "Consent"), ("404", "Unknown consent")]), "consentId"),
                "delete": with_path_id(operation("Revoke a consent", "consents", false, &[("200", "Revoked consent"), ("404", "Unknown consent")]), "consentId")
            },
            "/consents/{consentId}/authorise": {
                "post": with_path_id(operation("Complete SCA for a consent", "consents", false, &[("200", "Authorised consent"), ("409", "Consent is not pending")]), "consentId")
            }
        },
        "components": {
            "securitySchemes": {
                "bearer": { "type": "http", "scheme": "bearer", "bearerFormat": "JWT" }
            },
            "parameters": {
                "TppId": { "name": "x-tpp-id", "in": "header", "required": true, "schema": { "type": "string" } }
            }
        }
    })
}
