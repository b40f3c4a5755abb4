pub mod activity;
pub mod admin;
pub mod alerts;
pub mod auth;
pub mod chat;
pub mod error;
pub mod middleware;
pub mod pages;
pub mod settings;
pub mod tips;
pub mod weather;

use chrono::{DateTime, Utc};

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;

/// Timestamps come back from SQLite as text; an unparseable one is a
/// corrupt row, not a default.
pub(crate) fn db_time(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    stratus_types::models::parse_db_timestamp(raw)
        .ok_or_else(|| anyhow::anyhow!("unparseable timestamp in database: {raw:?}"))
}
