//! # SQLite Database methods
//!
//! This module contains the "low-level" SQLite database interactions.
//!
//! All these interactions are simple functions (rather than stateful structs) that accept a `&mut SqliteConnection`
//! argument. Callers can obtain a connection from a pool, or open an atomic transaction as the need arises, and call
//! through to the functions without any other changes.
use std::{str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

use super::SqliteDatabaseError;

pub mod audit;
pub mod auth_codes;
pub mod banking;
pub mod consents;
pub mod tpps;

/// Creates a new connection pool. The database file is created if it does not exist yet.
///
/// `timeout` bounds both the wait for a pooled connection and the time SQLite will wait on a locked database, so that a
/// stuck store surfaces as an error rather than a hung request.
pub async fn new_pool(url: &str, max_connections: u32, timeout: Duration) -> Result<SqlitePool, SqliteDatabaseError> {
    let options = SqliteConnectOptions::from_str(url)
        .map_err(|e| SqliteDatabaseError::InvalidUrl { url: url.to_string(), reason: e.to_string() })?
        .create_if_missing(true)
        .busy_timeout(timeout);
    let pool =
        SqlitePoolOptions::new().max_connections(max_connections).acquire_timeout(timeout).connect_with(options).await?;
    info!("🗃️ Connected to {url} with up to {max_connections} connections");
    Ok(pool)
}
