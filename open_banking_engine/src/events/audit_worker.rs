//! The background writer for the audit trail.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use super::{AuditEvent, EventHandler, EventProducer, Handler};
use crate::{obe_api::audit_api::AuditApi, SqliteDatabase};

/// Creates the audit queue. Returns the handler (to be started with [`EventHandler::start_handler`]) and a producer
/// for the request path.
///
/// Failed writes are logged and otherwise ignored: the response the record describes has already been sent.
pub fn audit_channel(db: SqliteDatabase, buffer_size: usize) -> (EventHandler<AuditEvent>, EventProducer<AuditEvent>) {
    let api = Arc::new(AuditApi::new(db));
    let handler: Handler<AuditEvent> = Arc::new(move |ev: AuditEvent| {
        let api = Arc::clone(&api);
        Box::pin(async move {
            let interaction_id = ev.record.interaction_id.clone();
            if let Err(e) = api.record(ev.record).await {
                error!("🧾️ Could not write audit record for interaction {interaction_id}: {e}");
            }
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let handler = EventHandler::new(buffer_size, handler);
    let producer = handler.subscribe();
    (handler, producer)
}
