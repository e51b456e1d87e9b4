//! JSON:API envelopes.
//!
//! Every success body is a [`Document`] whose primary data is one [`ResourceObject`] or a list of them, and every
//! failure is an [`ErrorDocument`]. Resources are a closed set of tagged variants ([`Resource`]), so an attribute
//! shape can only ever be rendered under its own `type`.
use std::collections::BTreeMap;

use actix_web::{
    body::BoxBody,
    http::{header::CONTENT_TYPE, StatusCode},
    HttpRequest,
    HttpResponse,
    Responder,
};
use serde::Serialize;
use serde_json::Value;

use crate::data_objects::{
    AccountAttributes,
    BalanceAttributes,
    ConsentAttributes,
    FundsConfirmationAttributes,
    PaymentAttributes,
    TppAttributes,
    TransactionAttributes,
};

pub const JSON_API_MEDIA_TYPE: &str = "application/vnd.api+json";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "attributes")]
pub enum Resource {
    #[serde(rename = "accounts")]
    Account(AccountAttributes),
    #[serde(rename = "transactions")]
    Transaction(TransactionAttributes),
    #[serde(rename = "balances")]
    Balance(BalanceAttributes),
    #[serde(rename = "payments")]
    Payment(PaymentAttributes),
    #[serde(rename = "funds-confirmations")]
    FundsConfirmation(FundsConfirmationAttributes),
    #[serde(rename = "consents")]
    Consent(ConsentAttributes),
    #[serde(rename = "tpps")]
    Tpp(TppAttributes),
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceObject {
    pub id: String,
    #[serde(flatten)]
    pub resource: Resource,
}

impl ResourceObject {
    pub fn new<S: Into<String>>(id: S, resource: Resource) -> Self {
        Self { id: id.into(), resource }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PrimaryData {
    One(Box<ResourceObject>),
    Many(Vec<ResourceObject>),
}

#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub data: PrimaryData,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl Document {
    pub fn single(resource: ResourceObject) -> Self {
        Self { data: PrimaryData::One(Box::new(resource)), links: BTreeMap::new(), meta: None }
    }

    pub fn collection(resources: Vec<ResourceObject>) -> Self {
        let count = resources.len();
        Self {
            data: PrimaryData::Many(resources),
            links: BTreeMap::new(),
            meta: Some(serde_json::json!({ "totalCount": count })),
        }
    }

    pub fn with_link<K: Into<String>, V: Into<String>>(mut self, rel: K, href: V) -> Self {
        self.links.insert(rel.into(), href.into());
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn into_response(self, status: StatusCode) -> HttpResponse {
        HttpResponse::build(status).insert_header((CONTENT_TYPE, JSON_API_MEDIA_TYPE)).json(self)
    }

    pub fn created(self) -> HttpResponse {
        self.into_response(StatusCode::CREATED)
    }
}

impl Responder for Document {
    type Body = BoxBody;

    fn respond_to(self, _req: &HttpRequest) -> HttpResponse<Self::Body> {
        self.into_response(StatusCode::OK)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorObject {
    pub status: String,
    pub title: String,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDocument {
    pub errors: Vec<ErrorObject>,
}

impl ErrorDocument {
    pub fn new<S: Into<String>>(status: StatusCode, detail: S) -> Self {
        let title = status.canonical_reason().unwrap_or("Error").to_string();
        Self { errors: vec![ErrorObject { status: status.as_u16().to_string(), title, detail: detail.into() }] }
    }
}
