use chrono::{DateTime, Duration, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewTpp, Tpp, TppStatus},
    traits::TppApiError,
};

/// Inserts a new TPP with status `pending`. This is not atomic on its own; run it inside a transaction if the
/// existence check and the insert must not interleave with another writer.
pub async fn insert_tpp(tpp: NewTpp, now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Tpp, TppApiError> {
    if fetch_tpp(&tpp.tpp_id, conn).await?.is_some() {
        return Err(TppApiError::AlreadyExists(tpp.tpp_id));
    }
    let redirect_uris =
        serde_json::to_string(&tpp.redirect_uris).map_err(|e| TppApiError::InvalidRegistration(e.to_string()))?;
    let result = sqlx::query_as(
        r#"
            INSERT INTO tpps (
                tpp_id,
                name,
                organization_id,
                registration_number,
                country,
                authority,
                email,
                services,
                redirect_uris,
                qwac_certificate,
                qseal_certificate,
                authorization_status,
                expires_at,
                rate_limit_per_hour,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $15)
            RETURNING *;
        "#,
    )
    .bind(&tpp.tpp_id)
    .bind(tpp.name)
    .bind(tpp.organization_id)
    .bind(tpp.registration_number)
    .bind(tpp.country)
    .bind(tpp.authority)
    .bind(tpp.email)
    .bind(tpp.services.to_string())
    .bind(redirect_uris)
    .bind(tpp.qwac_certificate)
    .bind(tpp.qseal_certificate)
    .bind(TppStatus::Pending)
    .bind(tpp.expires_at)
    .bind(tpp.rate_limit_per_hour)
    .bind(now)
    .fetch_one(conn)
    .await;
    match result {
        Ok(tpp) => Ok(tpp),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(TppApiError::AlreadyExists(tpp.tpp_id)),
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_tpp(tpp_id: &str, conn: &mut SqliteConnection) -> Result<Option<Tpp>, sqlx::Error> {
    let tpp = sqlx::query_as("SELECT * FROM tpps WHERE tpp_id = $1").bind(tpp_id).fetch_optional(conn).await?;
    Ok(tpp)
}

pub async fn update_status(
    tpp_id: &str,
    status: TppStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Tpp>, sqlx::Error> {
    let tpp = sqlx::query_as(
        "UPDATE tpps SET authorization_status = $1, updated_at = $2 WHERE tpp_id = $3 RETURNING *",
    )
    .bind(status)
    .bind(now)
    .bind(tpp_id)
    .fetch_optional(conn)
    .await?;
    debug!("🗃️ TPP {tpp_id} status set to {status}");
    Ok(tpp)
}

/// Appends a single usage entry for the TPP.
pub async fn append_usage(
    tpp_id: &str,
    endpoint: &str,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO rate_limit_entries (tpp_id, endpoint, window_start, request_count) VALUES ($1, $2, $3, 1)",
    )
    .bind(tpp_id)
    .bind(endpoint)
    .bind(at)
    .execute(conn)
    .await?;
    trace!("🚦️ Usage entry recorded for {tpp_id} on {endpoint}");
    Ok(())
}

/// Sums the usage entries for the TPP whose window started on or after `since`.
pub async fn sum_usage_since(
    tpp_id: &str,
    since: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(request_count), 0) FROM rate_limit_entries WHERE tpp_id = $1 AND window_start >= $2",
    )
    .bind(tpp_id)
    .bind(since)
    .fetch_one(conn)
    .await?;
    Ok(count)
}

/// Start of the trailing one-hour window ending at `at`.
pub fn window_start(at: DateTime<Utc>) -> DateTime<Utc> {
    at - Duration::hours(1)
}
