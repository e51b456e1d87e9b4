use crate::db_types::NewAuditRecord;

/// A captured request/response pair, on its way to the audit trail.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub record: NewAuditRecord,
}

impl AuditEvent {
    pub fn new(record: NewAuditRecord) -> Self {
        Self { record }
    }
}
