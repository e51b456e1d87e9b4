//! Interaction tracing and audit capture.
//!
//! Wraps the whole application. Every request is given an interaction id (the caller's `x-fapi-interaction-id` if it
//! is a valid UUID, a fresh one otherwise), which is echoed on the response, success or failure. Once the response
//! has been produced, the request/response pair is handed to the audit queue. The handover never waits: if the queue
//! is full the record is dropped and the drop is logged, and the response is returned unchanged either way.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    body::{to_bytes, BoxBody, MessageBody},
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::InternalError,
    http::header::{HeaderMap, HeaderName, HeaderValue},
    web,
    Error,
    HttpMessage,
    HttpResponse,
};
use futures::future::LocalBoxFuture;
use log::*;
use open_banking_engine::{
    db_types::NewAuditRecord,
    events::{AuditEvent, EventProducer},
};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::ValidatedTpp;
use crate::{
    auth::JwtClaims,
    config::ServerOptions,
    errors::payload_error,
    helpers::{get_remote_ip, tpp_id, INTERACTION_ID_HEADER},
};

const REDACTED_HEADERS: [&str; 3] = ["authorization", "cookie", "proxy-authorization"];

/// The interaction id of the current request, for handlers that want to log it.
#[derive(Debug, Clone)]
pub struct InteractionId(pub String);

/// Handlers attach this to the request when it concerns a specific consent, so the audit record can name it.
#[derive(Debug, Clone)]
pub struct AuditedConsent(pub String);

pub struct InteractionTracerFactory {
    producer: EventProducer<AuditEvent>,
    options: ServerOptions,
}

impl InteractionTracerFactory {
    pub fn new(producer: EventProducer<AuditEvent>, options: ServerOptions) -> Self {
        Self { producer, options }
    }
}

impl<S, B> Transform<S, ServiceRequest> for InteractionTracerFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<BoxBody>;
    type Transform = InteractionTracerService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(InteractionTracerService {
            producer: self.producer.clone(),
            options: self.options,
            service: Rc::new(service),
        }))
    }
}

pub struct InteractionTracerService<S> {
    producer: EventProducer<AuditEvent>,
    options: ServerOptions,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for InteractionTracerService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<BoxBody>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let producer = self.producer.clone();
        let options = self.options;
        Box::pin(async move {
            let interaction_id = interaction_id_for(req.headers());
            req.extensions_mut().insert(InteractionId(interaction_id.clone()));
            let mut record = NewAuditRecord {
                interaction_id: interaction_id.clone(),
                tpp_id: tpp_id(req.request()).map(String::from),
                endpoint: req.path().to_string(),
                method: req.method().to_string(),
                request_headers: headers_as_json(req.headers()),
                ip_address: get_remote_ip(req.request(), options.use_x_forwarded_for, options.use_forwarded)
                    .map(|ip| ip.to_string()),
                ..Default::default()
            };

            let res = match req.extract::<web::Bytes>().await {
                Ok(body) => {
                    record.request_body = captured_body(&body, options.audit_max_body_bytes);
                    req.set_payload(bytes_to_payload(body));
                    service.call(req).await.map(ServiceResponse::map_into_boxed_body)
                },
                Err(e) => {
                    warn!("💻️ Could not read the body of interaction {interaction_id}. {e}");
                    Ok(req.error_response(payload_error(&e)))
                },
            };

            match res {
                Ok(res) => {
                    let (http_req, res) = res.into_parts();
                    {
                        let extensions = http_req.extensions();
                        if let Some(tpp) = extensions.get::<ValidatedTpp>() {
                            record.tpp_id = Some(tpp.0.tpp_id.clone());
                        }
                        record.user_id = extensions.get::<JwtClaims>().map(|c| c.sub.clone());
                        record.consent_id = extensions.get::<AuditedConsent>().map(|c| c.0.clone());
                    }
                    let res = trace_response(res, &mut record, options.audit_max_body_bytes).await;
                    submit(&producer, record);
                    Ok(ServiceResponse::new(http_req, res))
                },
                // Errors that escaped the handlers still get their envelope, their id and their audit record
                Err(e) => {
                    let res = trace_response(e.error_response(), &mut record, options.audit_max_body_bytes).await;
                    submit(&producer, record);
                    Err(InternalError::from_response(e.to_string(), res).into())
                },
            }
        })
    }
}

/// Buffers the response so its body can be audited, records the outcome and stamps the interaction id on it.
async fn trace_response(res: HttpResponse, record: &mut NewAuditRecord, max_body_bytes: usize) -> HttpResponse {
    let status = res.status();
    let (mut res, body) = res.into_parts();
    let body = to_bytes(body).await.unwrap_or_else(|e| {
        warn!("💻️ Could not buffer the response body of interaction {}. {e}", record.interaction_id);
        web::Bytes::new()
    });
    record.response_status = status.as_u16();
    record.response_body = captured_body(&body, max_body_bytes);
    if let Ok(value) = HeaderValue::from_str(&record.interaction_id) {
        res.headers_mut().insert(HeaderName::from_static(INTERACTION_ID_HEADER), value);
    }
    res.set_body(body).map_into_boxed_body()
}

fn submit(producer: &EventProducer<AuditEvent>, record: NewAuditRecord) {
    trace!("🧾️ {} {} -> {} [{}]", record.method, record.endpoint, record.response_status, record.interaction_id);
    let interaction_id = record.interaction_id.clone();
    if !producer.try_publish_event(AuditEvent::new(record)) {
        warn!("🧾️ The audit record for interaction {interaction_id} was dropped");
    }
}

/// Reuses the caller's interaction id if it is a UUID, otherwise mints one.
fn interaction_id_for(headers: &HeaderMap) -> String {
    headers
        .get(INTERACTION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .unwrap_or_else(Uuid::new_v4)
        .to_string()
}

fn headers_as_json(headers: &HeaderMap) -> String {
    let mut map = Map::new();
    for (name, value) in headers {
        let name = name.as_str();
        let value = if REDACTED_HEADERS.contains(&name) {
            "[REDACTED]".to_string()
        } else {
            String::from_utf8_lossy(value.as_bytes()).into_owned()
        };
        // Repeated headers keep their last value
        map.insert(name.to_string(), Value::String(value));
    }
    Value::Object(map).to_string()
}

fn captured_body(body: &[u8], max_bytes: usize) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    let end = body.len().min(max_bytes);
    Some(String::from_utf8_lossy(&body[..end]).into_owned())
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
