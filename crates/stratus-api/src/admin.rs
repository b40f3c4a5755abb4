use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use stratus_types::api::{
    ActivityEntry, AdminUsersResponse, SystemLogEntry, UserLocationEntry, UserStats, UserSummary,
};
use stratus_types::models::{ActivityKind, LogLevel};

use crate::auth::AppState;
use crate::db_time;
use crate::error::{ApiError, blocking};

const DEFAULT_USER_LIMIT: u32 = 25;
const DEFAULT_LOG_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 500;

#[derive(Debug, Deserialize)]
pub struct UsersQuery {
    pub limit: Option<u32>,
}

pub async fn users(
    State(state): State<AppState>,
    Query(query): Query<UsersQuery>,
) -> Result<Json<AdminUsersResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_USER_LIMIT).min(MAX_LIMIT);

    let (rows, stats, homes) = {
        let st = state.clone();
        blocking(move || -> anyhow::Result<_> {
            let rows = st.db.list_plain_users(limit)?;
            let stats = st.db.user_stats()?;
            let mut homes = Vec::with_capacity(rows.len());
            for row in &rows {
                homes.push(st.db.get_profile(&row.id)?.and_then(|p| p.home_location));
            }
            Ok((rows, stats, homes))
        })
        .await??
    };

    let users = rows
        .into_iter()
        .zip(homes)
        .map(|(row, home_location)| -> anyhow::Result<UserSummary> {
            Ok(UserSummary {
                id: row.id.parse()?,
                username: row.username,
                email: row.email,
                created_at: db_time(&row.created_at)?,
                last_active: row.last_active.as_deref().map(db_time).transpose()?,
                home_location,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Json(AdminUsersResponse {
        success: true,
        users,
        stats: UserStats {
            total: stats.total,
            active: stats.active,
            new_today: stats.new_today,
            inactive: stats.inactive,
        },
    }))
}

pub async fn locations(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let rows = {
        let st = state.clone();
        blocking(move || st.db.list_user_locations()).await??
    };

    let locations = rows
        .into_iter()
        .map(|row| -> anyhow::Result<UserLocationEntry> {
            Ok(UserLocationEntry {
                user_id: row.location.user_id.parse()?,
                username: row.username,
                latitude: row.location.latitude,
                longitude: row.location.longitude,
                label: row.location.label,
                updated_at: db_time(&row.location.updated_at)?,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Json(json!({ "success": true, "locations": locations })))
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub level: Option<String>,
    pub module: Option<String>,
    pub limit: Option<u32>,
}

pub async fn system_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Value>, ApiError> {
    let level = query
        .level
        .as_deref()
        .map(|raw| {
            LogLevel::parse(raw)
                .map(|l| l.as_str().to_string())
                .ok_or_else(|| ApiError::bad_request(format!("Unknown log level '{raw}'")))
        })
        .transpose()?;
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).min(MAX_LIMIT);

    let rows = {
        let st = state.clone();
        let module = query.module.clone();
        blocking(move || st.db.list_system_logs(level.as_deref(), module.as_deref(), limit))
            .await??
    };

    let logs = rows
        .into_iter()
        .map(|row| -> anyhow::Result<SystemLogEntry> {
            Ok(SystemLogEntry {
                id: row.id.parse()?,
                level: LogLevel::parse(&row.level)
                    .ok_or_else(|| anyhow::anyhow!("unknown log level in database: {}", row.level))?,
                message: row.message,
                module: row.module,
                user_id: row.user_id.as_deref().map(str::parse).transpose()?,
                extra: row.extra.as_deref().and_then(|e| serde_json::from_str(e).ok()),
                created_at: db_time(&row.created_at)?,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Json(json!({ "success": true, "logs": logs })))
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub user_id: Option<Uuid>,
    pub activity: Option<String>,
    pub limit: Option<u32>,
}

pub async fn activity_logs(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Value>, ApiError> {
    let activity = query
        .activity
        .as_deref()
        .map(|raw| {
            ActivityKind::parse(raw)
                .map(|a| a.as_str().to_string())
                .ok_or_else(|| ApiError::bad_request(format!("Unknown activity type '{raw}'")))
        })
        .transpose()?;
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).min(MAX_LIMIT);

    let rows = {
        let st = state.clone();
        let user_id = query.user_id.map(|id| id.to_string());
        blocking(move || st.db.list_activity(user_id.as_deref(), activity.as_deref(), limit))
            .await??
    };

    let entries = rows
        .into_iter()
        .map(|row| -> anyhow::Result<ActivityEntry> {
            Ok(ActivityEntry {
                id: row.id.parse()?,
                user_id: row.user_id.parse()?,
                username: row.username,
                activity: ActivityKind::parse(&row.activity).ok_or_else(|| {
                    anyhow::anyhow!("unknown activity kind in database: {}", row.activity)
                })?,
                description: row.description,
                ip_address: row.ip_address,
                user_agent: row.user_agent,
                created_at: db_time(&row.created_at)?,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Json(json!({ "success": true, "activity": entries })))
}
