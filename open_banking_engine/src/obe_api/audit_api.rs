use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{AuditRecord, NewAuditRecord},
    traits::{AuditApiError, AuditLog},
};

/// Writes and reads the audit trail.
pub struct AuditApi<B> {
    db: B,
}

impl<B: Debug> Debug for AuditApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuditApi ({:?})", self.db)
    }
}

impl<B> AuditApi<B>
where B: AuditLog
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn record(&self, record: NewAuditRecord) -> Result<i64, AuditApiError> {
        let interaction_id = record.interaction_id.clone();
        let status = record.response_status;
        let id = self.db.append_audit_record(record).await?;
        trace!("🧾️ Audit record #{id} stored for interaction {interaction_id} ({status})");
        Ok(id)
    }

    pub async fn records_for_interaction(&self, interaction_id: &str) -> Result<Vec<AuditRecord>, AuditApiError> {
        self.db.fetch_audit_records_for_interaction(interaction_id).await
    }
}
