use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{Consent, ConsentStatus, NewConsent, Permission, ScaStatus};

pub async fn insert_consent(
    consent: NewConsent,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Consent, sqlx::Error> {
    let consent: Consent = sqlx::query_as(
        r#"
            INSERT INTO consents (
                consent_id,
                tpp_id,
                user_id,
                permissions,
                status,
                sca_status,
                recurring_indicator,
                frequency_per_day,
                valid_until,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING *;
        "#,
    )
    .bind(consent.consent_id)
    .bind(consent.tpp_id)
    .bind(consent.user_id)
    .bind(consent.permissions.to_string())
    .bind(ConsentStatus::Pending)
    .bind(ScaStatus::Required)
    .bind(consent.recurring_indicator)
    .bind(consent.frequency_per_day)
    .bind(consent.valid_until)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Consent {} stored for {}/{}", consent.consent_id, consent.tpp_id, consent.user_id);
    Ok(consent)
}

pub async fn fetch_consent(consent_id: &str, conn: &mut SqliteConnection) -> Result<Option<Consent>, sqlx::Error> {
    let consent =
        sqlx::query_as("SELECT * FROM consents WHERE consent_id = $1").bind(consent_id).fetch_optional(conn).await?;
    Ok(consent)
}

/// `pending -> authorized`. The `WHERE` clause makes the transition conditional, so two racing authorisations cannot
/// both succeed.
pub async fn authorize_consent(
    consent_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Consent>, sqlx::Error> {
    let consent = sqlx::query_as(
        r#"
            UPDATE consents SET
                status = $1,
                sca_status = $2,
                authorized_at = $3,
                updated_at = $3
            WHERE consent_id = $4 AND status = $5
            RETURNING *;
        "#,
    )
    .bind(ConsentStatus::Authorized)
    .bind(ScaStatus::Finalised)
    .bind(now)
    .bind(consent_id)
    .bind(ConsentStatus::Pending)
    .fetch_optional(conn)
    .await?;
    Ok(consent)
}

/// Moves the consent to `revoked` unless it already is. Returns the updated row, or `None` if nothing changed.
pub async fn revoke_consent(
    consent_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Consent>, sqlx::Error> {
    let consent = sqlx::query_as(
        r#"
            UPDATE consents SET
                status = $1,
                revoked_at = $2,
                updated_at = $2
            WHERE consent_id = $3 AND status != $1
            RETURNING *;
        "#,
    )
    .bind(ConsentStatus::Revoked)
    .bind(now)
    .bind(consent_id)
    .fetch_optional(conn)
    .await?;
    Ok(consent)
}

/// Authorized, unexpired consents for the pair, most recent first. The permission filter is applied on the decoded
/// permission set.
pub async fn find_active_consent(
    tpp_id: &str,
    user_id: &str,
    permission: Permission,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Consent>, sqlx::Error> {
    let candidates: Vec<Consent> = sqlx::query_as(
        r#"
            SELECT * FROM consents
            WHERE tpp_id = $1 AND user_id = $2 AND status = $3 AND valid_until > $4
            ORDER BY id DESC;
        "#,
    )
    .bind(tpp_id)
    .bind(user_id)
    .bind(ConsentStatus::Authorized)
    .bind(at)
    .fetch_all(conn)
    .await?;
    Ok(candidates.into_iter().find(|c| c.grants(permission, at)))
}

pub async fn touch_consent(
    consent_id: &str,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE consents SET last_action_date = $1 WHERE consent_id = $2")
        .bind(at)
        .bind(consent_id)
        .execute(conn)
        .await?;
    Ok(())
}
