use axum::{
    Json,
    extract::{Extension, Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use stratus_types::api::{Claims, SearchParams, WeatherParams};
use stratus_weather::{CurrentConditions, LocationQuery};

use crate::auth::AppState;
use crate::error::{ApiError, AppJson, blocking};

const DEFAULT_FORECAST_DAYS: u8 = 5;

pub async fn current_get(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<WeatherParams>,
) -> Result<Json<Value>, ApiError> {
    current_inner(state, claims, params).await
}

pub async fn current_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(params): AppJson<WeatherParams>,
) -> Result<Json<Value>, ApiError> {
    current_inner(state, claims, params).await
}

async fn current_inner(
    state: AppState,
    claims: Claims,
    params: WeatherParams,
) -> Result<Json<Value>, ApiError> {
    let query = resolve_params(&params)?;
    let key = cache_key(&query);

    // The cache lives and dies with the session row, no TTL
    let cached = {
        let st = state.clone();
        let sid = claims.sid.to_string();
        let key = key.clone();
        blocking(move || st.db.session_state_get(&sid, &key)).await??
    };
    if let Some(text) = cached {
        match serde_json::from_str::<Value>(&text) {
            Ok(weather) => {
                return Ok(Json(json!({
                    "success": true,
                    "weather": weather,
                    "cached": true,
                })));
            }
            Err(e) => warn!("discarding unreadable weather cache entry: {e}"),
        }
    }

    let conditions = match &query {
        LocationQuery::City(city) => state.weather.current_with_fallback(city).await?.0,
        coords => state.weather.current(coords).await?,
    };

    store_cached(&state, &claims, &key, &conditions).await;

    Ok(Json(json!({
        "success": true,
        "weather": conditions,
        "cached": false,
    })))
}

pub async fn forecast_get(
    State(state): State<AppState>,
    Query(params): Query<WeatherParams>,
) -> Result<Json<Value>, ApiError> {
    forecast_inner(state, params).await
}

pub async fn forecast_post(
    State(state): State<AppState>,
    AppJson(params): AppJson<WeatherParams>,
) -> Result<Json<Value>, ApiError> {
    forecast_inner(state, params).await
}

async fn forecast_inner(state: AppState, params: WeatherParams) -> Result<Json<Value>, ApiError> {
    let query = resolve_params(&params)?;
    let days = params.days.unwrap_or(DEFAULT_FORECAST_DAYS).clamp(1, 5);

    let forecast = state.weather.forecast(&query, days).await?;

    Ok(Json(json!({ "success": true, "forecast": forecast })))
}

#[derive(Debug, Deserialize)]
pub struct AirParams {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

pub async fn air(
    State(state): State<AppState>,
    Query(params): Query<AirParams>,
) -> Result<Json<Value>, ApiError> {
    let (lat, lon) = match (params.lat, params.lon) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return Err(ApiError::bad_request("Latitude and longitude required")),
    };
    check_coords(lat, lon)?;

    let air = state.weather.air_quality(lat, lon).await?;

    Ok(Json(json!({ "success": true, "air_quality": air })))
}

pub async fn search_get(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, ApiError> {
    search_inner(state, params).await
}

pub async fn search_post(
    State(state): State<AppState>,
    AppJson(params): AppJson<SearchParams>,
) -> Result<Json<Value>, ApiError> {
    search_inner(state, params).await
}

async fn search_inner(state: AppState, params: SearchParams) -> Result<Json<Value>, ApiError> {
    let query = params
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::bad_request("Search query required"))?;
    let limit = params.limit.unwrap_or(5).clamp(1, 10);

    let results = state.weather.search(query, limit).await?;

    Ok(Json(json!({ "success": true, "results": results })))
}

/// Either a non-blank city or a full coordinate pair.
fn resolve_params(params: &WeatherParams) -> Result<LocationQuery, ApiError> {
    if let Some(city) = params
        .city
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        return Ok(LocationQuery::City(city.to_string()));
    }

    if let (Some(lat), Some(lon)) = (params.lat, params.lon) {
        check_coords(lat, lon)?;
        return Ok(LocationQuery::Coords { lat, lon });
    }

    Err(ApiError::bad_request("City name or coordinates required"))
}

fn check_coords(lat: f64, lon: f64) -> Result<(), ApiError> {
    let valid = lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon);
    if !valid {
        return Err(ApiError::bad_request("Coordinates out of range"));
    }
    Ok(())
}

fn cache_key(query: &LocationQuery) -> String {
    match query {
        LocationQuery::City(city) => format!("weather:{}", city.to_lowercase()),
        LocationQuery::Coords { lat, lon } => format!("weather:{lat:.4},{lon:.4}"),
    }
}

async fn store_cached(state: &AppState, claims: &Claims, key: &str, conditions: &CurrentConditions) {
    let Ok(payload) = serde_json::to_string(conditions) else {
        return;
    };
    let st = state.clone();
    let sid = claims.sid.to_string();
    let key = key.to_string();
    let stored = tokio::task::spawn_blocking(move || st.db.session_state_put(&sid, &key, &payload))
        .await;
    match stored {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("failed to cache weather payload: {e}"),
        Err(e) => warn!("spawn_blocking join error: {e}"),
    }
}
