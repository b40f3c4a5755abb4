use axum::{
    Json,
    extract::{Extension, State},
};
use serde_json::{Value, json};

use stratus_assistant::{alerts, tips};
use stratus_types::api::{Claims, TemperatureAlertRequest, TipsRequest};

use crate::auth::AppState;
use crate::error::{ApiError, AppJson, blocking};

/// Session-state key for the per-session alert dismissal.
const DISMISSED_KEY: &str = "temp_alert_dismissed";

pub async fn health_tips(
    State(state): State<AppState>,
    AppJson(req): AppJson<TipsRequest>,
) -> Result<Json<Value>, ApiError> {
    let generated = tips::generate_tips(&state.chat, &req).await;

    Ok(Json(json!({ "success": true, "tips": generated })))
}

pub async fn temperature_alert(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<TemperatureAlertRequest>,
) -> Result<Json<Value>, ApiError> {
    // A dismissal earlier in the session silences further alerts
    let dismissed = {
        let st = state.clone();
        let sid = claims.sid.to_string();
        blocking(move || st.db.session_state_get(&sid, DISMISSED_KEY)).await??
    };
    if dismissed.as_deref() == Some("true") {
        return Ok(Json(json!({
            "success": true,
            "alert": null,
            "message": "Alert already dismissed this session",
        })));
    }

    let temperature = req
        .temperature
        .ok_or_else(|| ApiError::bad_request("Temperature is required"))?;

    let location = req.location.as_deref().unwrap_or("Unknown location");
    let alert =
        alerts::build_alert(&state.chat, temperature, location, req.condition.as_deref()).await;

    match alert {
        Some(alert) => Ok(Json(json!({ "success": true, "alert": alert }))),
        None => Ok(Json(json!({
            "success": true,
            "alert": null,
            "message": "Temperature is comfortable, no alert needed",
        }))),
    }
}

pub async fn dismiss_state(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Value>, ApiError> {
    let dismissed = {
        let st = state.clone();
        let sid = claims.sid.to_string();
        blocking(move || st.db.session_state_get(&sid, DISMISSED_KEY)).await??
    };

    Ok(Json(json!({
        "success": true,
        "dismissed": dismissed.as_deref() == Some("true"),
    })))
}

pub async fn dismiss_alert(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Value>, ApiError> {
    {
        let st = state.clone();
        let sid = claims.sid.to_string();
        blocking(move || st.db.session_state_put(&sid, DISMISSED_KEY, "true")).await??;
    }

    Ok(Json(json!({ "success": true, "message": "Alert dismissed" })))
}
