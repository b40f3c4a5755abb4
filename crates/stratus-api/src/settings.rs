use axum::{
    Json,
    extract::{Extension, State},
};
use serde_json::{Value, json};

use stratus_db::models::ProfileRow;
use stratus_types::api::{Claims, LocationReport, ProfileResponse, SettingsUpdate};
use stratus_types::models::NotifyFrequency;

use crate::auth::AppState;
use crate::db_time;
use crate::error::{ApiError, AppJson, blocking};

const MAX_PHONE_LEN: usize = 32;
const MAX_LOCATION_LEN: usize = 120;

pub async fn get_settings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Value>, ApiError> {
    let profile = load_profile(&state, &claims).await?;

    Ok(Json(json!({ "success": true, "settings": profile })))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<SettingsUpdate>,
) -> Result<Json<Value>, ApiError> {
    let phone = match req.phone.as_deref().map(str::trim) {
        Some(p) if p.len() > MAX_PHONE_LEN => {
            return Err(ApiError::bad_request("Phone number is too long"));
        }
        other => other.map(str::to_string),
    };
    let home_location = match req.home_location.as_deref().map(str::trim) {
        Some(l) if l.len() > MAX_LOCATION_LEN => {
            return Err(ApiError::bad_request("Home location is too long"));
        }
        other => other.map(str::to_string),
    };

    let updated = {
        let st = state.clone();
        let user_id = claims.sub.to_string();
        blocking(move || {
            st.db.update_profile(
                &user_id,
                phone.as_deref(),
                home_location.as_deref(),
                req.alerts_enabled,
                req.safety_tips_enabled,
                req.notification_frequency.map(|f| f.as_str()),
            )
        })
        .await??
    };
    if !updated {
        return Err(ApiError::NotFound("Profile not found".into()));
    }

    let profile = load_profile(&state, &claims).await?;

    Ok(Json(json!({ "success": true, "settings": profile })))
}

pub async fn report_location(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<LocationReport>,
) -> Result<Json<Value>, ApiError> {
    let valid = req.latitude.is_finite()
        && req.longitude.is_finite()
        && (-90.0..=90.0).contains(&req.latitude)
        && (-180.0..=180.0).contains(&req.longitude);
    if !valid {
        return Err(ApiError::bad_request("Coordinates out of range"));
    }

    let label = req
        .label
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string);

    {
        let st = state.clone();
        let user_id = claims.sub.to_string();
        blocking(move || {
            st.db
                .upsert_location(&user_id, req.latitude, req.longitude, label.as_deref())
        })
        .await??;
    }

    Ok(Json(json!({ "success": true })))
}

async fn load_profile(state: &AppState, claims: &Claims) -> Result<ProfileResponse, ApiError> {
    let row = {
        let st = state.clone();
        let user_id = claims.sub.to_string();
        blocking(move || st.db.get_profile(&user_id)).await??
    }
    .ok_or_else(|| ApiError::NotFound("Profile not found".into()))?;

    profile_response(row).map_err(ApiError::Internal)
}

fn profile_response(row: ProfileRow) -> anyhow::Result<ProfileResponse> {
    Ok(ProfileResponse {
        phone: row.phone,
        home_location: row.home_location,
        alerts_enabled: row.alerts_enabled,
        safety_tips_enabled: row.safety_tips_enabled,
        notification_frequency: NotifyFrequency::parse(&row.notification_frequency)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "unknown notification frequency in database: {}",
                    row.notification_frequency
                )
            })?,
        updated_at: db_time(&row.updated_at)?,
    })
}
