use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::db_types::{AuditRecord, NewAuditRecord};

pub async fn insert_record(
    record: NewAuditRecord,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO audit_log (
                interaction_id,
                tpp_id,
                user_id,
                consent_id,
                endpoint,
                method,
                request_headers,
                request_body,
                response_status,
                response_body,
                ip_address,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id;
        "#,
    )
    .bind(record.interaction_id)
    .bind(record.tpp_id)
    .bind(record.user_id)
    .bind(record.consent_id)
    .bind(record.endpoint)
    .bind(record.method)
    .bind(record.request_headers)
    .bind(record.request_body)
    .bind(i64::from(record.response_status))
    .bind(record.response_body)
    .bind(record.ip_address)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

pub async fn fetch_records_for_interaction(
    interaction_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<AuditRecord>, sqlx::Error> {
    let records = sqlx::query_as("SELECT * FROM audit_log WHERE interaction_id = $1 ORDER BY id")
        .bind(interaction_id)
        .fetch_all(conn)
        .await?;
    Ok(records)
}
