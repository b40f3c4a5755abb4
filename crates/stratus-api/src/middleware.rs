use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;

use stratus_types::api::Claims;
use stratus_types::models::Role;

use crate::auth::{AppState, SESSION_COOKIE};
use crate::error::{ApiError, blocking};

/// Pull the JWT from the Authorization header, falling back to the session
/// cookie for browser page loads.
pub fn token_from(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
}

pub fn decode_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

/// Extract and validate the JWT, then check the session row it names is
/// still alive. Logging out or pruning the row revokes the token early.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = token_from(req.headers()).ok_or(ApiError::Unauthorized)?;
    let claims = decode_token(&state.jwt_secret, &token).ok_or(ApiError::Unauthorized)?;

    let st = state.clone();
    let sid = claims.sid.to_string();
    let sub = claims.sub.to_string();
    let session = blocking(move || -> anyhow::Result<_> {
        let session = st.db.get_valid_session(&sid)?;
        if session.is_some() {
            st.db.touch_last_active(&sub)?;
        }
        Ok(session)
    })
    .await??;

    if session.is_none() {
        return Err(ApiError::Unauthorized);
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Layered inside `require_auth`, so the claims extension is already set.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    let is_admin = req
        .extensions()
        .get::<Claims>()
        .is_some_and(|c| c.role == Role::Admin);

    if !is_admin {
        return Err(ApiError::Forbidden);
    }

    Ok(next.run(req).await)
}

/// Best-effort variant for page handlers, which redirect instead of
/// returning 401. Any failure along the way reads as "not signed in".
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Option<Claims> {
    let token = token_from(headers)?;
    let claims = decode_token(&state.jwt_secret, &token)?;

    let st = state.clone();
    let sid = claims.sid.to_string();
    let sub = claims.sub.to_string();
    let session = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let session = st.db.get_valid_session(&sid)?;
        if session.is_some() {
            st.db.touch_last_active(&sub)?;
        }
        Ok(session)
    })
    .await
    .ok()?
    .unwrap_or_else(|e| {
        debug!("session lookup failed: {e}");
        None
    });

    session.map(|_| claims)
}
