use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use stratus_db::models::AlertRow;
use stratus_types::api::{AdminAlertSummary, AlertResponse, Claims, CreateAlertRequest};
use stratus_types::models::{AlertKind, DeliveryStatus, LogLevel, Severity};

use crate::activity;
use crate::auth::AppState;
use crate::db_time;
use crate::error::{ApiError, AppJson, blocking};

/// Active alerts addressed to the caller. Pending deliveries flip to
/// delivered as a side effect, so polling doubles as the delivery receipt.
pub async fn my_alerts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rows = {
        let st = state.clone();
        let user_id = claims.sub.to_string();
        blocking(move || -> anyhow::Result<_> {
            st.db.mark_deliveries_delivered(&user_id)?;
            st.db.active_alerts_for_user(&user_id)
        })
        .await??
    };

    let alerts = rows
        .into_iter()
        .map(|row| {
            let delivery = DeliveryStatus::parse(&row.status);
            alert_response(row.alert, delivery)
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Json(json!({ "success": true, "alerts": alerts })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(alert_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let updated = {
        let st = state.clone();
        let user_id = claims.sub.to_string();
        blocking(move || st.db.mark_delivery_read(&alert_id.to_string(), &user_id)).await??
    };

    if !updated {
        return Err(ApiError::NotFound("No alert delivery found".into()));
    }

    Ok(Json(json!({ "success": true })))
}

pub async fn create_alert(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<CreateAlertRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.title.trim().is_empty() || req.description.trim().is_empty() {
        return Err(ApiError::bad_request("Title and description are required"));
    }
    if req.location.trim().is_empty() {
        return Err(ApiError::bad_request("Location is required"));
    }
    if req.expires_at <= chrono::Utc::now() {
        return Err(ApiError::bad_request("Expiry must be in the future"));
    }

    let id = Uuid::new_v4();
    {
        let st = state.clone();
        // Stored in SQLite's datetime format so expiry comparisons work
        let expires = req.expires_at.format("%Y-%m-%d %H:%M:%S").to_string();
        let admin_id = claims.sub;
        blocking(move || -> anyhow::Result<()> {
            st.db.insert_alert(
                &id.to_string(),
                req.title.trim(),
                req.description.trim(),
                req.alert_type.as_str(),
                req.severity.as_str(),
                req.location.trim(),
                &expires,
                &admin_id.to_string(),
            )?;
            activity::record_system(
                &st.db,
                LogLevel::Info,
                &format!("Weather alert published: {}", req.title.trim()),
                "alerts",
                Some(admin_id),
                Some(&json!({ "alert_id": id, "severity": req.severity.as_str() }).to_string()),
            );
            Ok(())
        })
        .await??;
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "alert_id": id })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct AdminAlertsQuery {
    pub limit: Option<u32>,
}

pub async fn admin_alerts(
    State(state): State<AppState>,
    Query(query): Query<AdminAlertsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let limit = query.limit.unwrap_or(50).min(200);

    let rows = {
        let st = state.clone();
        blocking(move || st.db.list_alerts_with_counts(limit)).await??
    };

    let alerts = rows
        .into_iter()
        .map(|row| -> anyhow::Result<AdminAlertSummary> {
            Ok(AdminAlertSummary {
                id: row.alert.id.parse()?,
                title: row.alert.title,
                alert_type: parse_kind(&row.alert.alert_type)?,
                severity: parse_severity(&row.alert.severity)?,
                location: row.alert.location,
                issued_at: db_time(&row.alert.issued_at)?,
                expires_at: db_time(&row.alert.expires_at)?,
                is_active: row.alert.is_active,
                pending: row.pending,
                delivered: row.delivered,
                read: row.read,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Json(json!({ "success": true, "alerts": alerts })))
}

fn alert_response(row: AlertRow, delivery: Option<DeliveryStatus>) -> anyhow::Result<AlertResponse> {
    Ok(AlertResponse {
        id: row.id.parse()?,
        title: row.title,
        description: row.description,
        alert_type: parse_kind(&row.alert_type)?,
        severity: parse_severity(&row.severity)?,
        location: row.location,
        issued_at: db_time(&row.issued_at)?,
        expires_at: db_time(&row.expires_at)?,
        delivery,
    })
}

fn parse_kind(raw: &str) -> anyhow::Result<AlertKind> {
    AlertKind::parse(raw).ok_or_else(|| anyhow::anyhow!("unknown alert type in database: {raw}"))
}

fn parse_severity(raw: &str) -> anyhow::Result<Severity> {
    Severity::parse(raw).ok_or_else(|| anyhow::anyhow!("unknown severity in database: {raw}"))
}
