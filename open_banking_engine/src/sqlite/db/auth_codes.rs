use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::db_types::{AuthorizationCode, NewAuthorizationCode};

pub async fn insert_code(
    code: NewAuthorizationCode,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<AuthorizationCode, sqlx::Error> {
    let code = sqlx::query_as(
        r#"
            INSERT INTO authorization_codes (code, client_id, user_id, scope, redirect_uri, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(code.code)
    .bind(code.client_id)
    .bind(code.user_id)
    .bind(code.scope.to_string())
    .bind(code.redirect_uri)
    .bind(code.expires_at)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(code)
}

/// Marks an unused, unexpired code as used in a single statement and returns it.
pub async fn consume_code(
    code: &str,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<AuthorizationCode>, sqlx::Error> {
    let code = sqlx::query_as(
        r#"
            UPDATE authorization_codes SET used_at = $1
            WHERE code = $2 AND used_at IS NULL AND expires_at > $1
            RETURNING *;
        "#,
    )
    .bind(at)
    .bind(code)
    .fetch_optional(conn)
    .await?;
    Ok(code)
}
