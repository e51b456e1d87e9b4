use thiserror::Error;

use crate::db_types::{AuditRecord, NewAuditRecord};

#[derive(Debug, Clone, Error)]
pub enum AuditApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for AuditApiError {
    fn from(e: sqlx::Error) -> Self {
        AuditApiError::DatabaseError(e.to_string())
    }
}

/// The append-only audit trail. Records are never updated or deleted.
#[allow(async_fn_in_trait)]
pub trait AuditLog {
    async fn append_audit_record(&self, record: NewAuditRecord) -> Result<i64, AuditApiError>;

    /// All records for the given interaction id, oldest first.
    async fn fetch_audit_records_for_interaction(&self, interaction_id: &str)
        -> Result<Vec<AuditRecord>, AuditApiError>;
}
