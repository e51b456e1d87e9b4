mod audit_worker;
mod channel;
mod event_types;

pub use audit_worker::audit_channel;
pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::AuditEvent;
