use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, Method, header},
    middleware::Next,
    response::Response,
};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use stratus_db::Database;
use stratus_types::models::{ActivityKind, LogLevel, Role};

use crate::auth::AppState;
use crate::middleware::{decode_token, token_from};

/// Append one row to the activity log. Failures are logged and swallowed,
/// a broken audit trail must never break the request that caused it.
pub fn record(
    db: &Database,
    user_id: Uuid,
    kind: ActivityKind,
    description: &str,
    ip: Option<&str>,
    user_agent: Option<&str>,
    metadata: Option<&str>,
) {
    if let Err(e) = db.insert_activity(
        &Uuid::new_v4().to_string(),
        &user_id.to_string(),
        kind.as_str(),
        description,
        ip,
        user_agent,
        metadata,
    ) {
        warn!("failed to record {} activity: {e}", kind.as_str());
    }
}

/// System-log counterpart of [`record`], same swallow-errors contract.
/// Admin and service events go here rather than into the activity feed.
pub fn record_system(
    db: &Database,
    level: LogLevel,
    message: &str,
    module: &str,
    user_id: Option<Uuid>,
    extra: Option<&str>,
) {
    let user_id = user_id.map(|u| u.to_string());
    if let Err(e) = db.insert_system_log(
        &Uuid::new_v4().to_string(),
        level.as_str(),
        message,
        module,
        user_id.as_deref(),
        extra,
    ) {
        warn!("failed to record system log: {e}");
    }
}

/// First hop of x-forwarded-for when present, otherwise the peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match forwarded {
        Some(ip) => Some(ip.to_string()),
        None => peer.map(|p| p.ip().to_string()),
    }
}

pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.chars().take(255).collect())
}

/// Route-to-activity mapping for requests made by signed-in users. Sign-in,
/// sign-up and logout are recorded by their handlers instead, since the
/// request either carries no token yet or the session is already gone.
fn classify(method: &Method, path: &str) -> Option<(ActivityKind, String, Option<String>)> {
    if path == "/api/chat" && method == Method::POST {
        return Some((
            ActivityKind::Chat,
            "User sent a message to chatbot".to_string(),
            Some(json!({ "endpoint": path }).to_string()),
        ));
    }

    if path.starts_with("/api/weather") && (method == Method::GET || method == Method::POST) {
        return Some((
            ActivityKind::WeatherQuery,
            "User queried weather data".to_string(),
            Some(json!({ "endpoint": path }).to_string()),
        ));
    }

    if path == "/alerts" && method == Method::GET {
        return Some((
            ActivityKind::AlertView,
            "User viewed weather alerts".to_string(),
            None,
        ));
    }

    if path == "/api/settings" && method == Method::POST {
        return Some((
            ActivityKind::SettingsChange,
            "User updated account settings".to_string(),
            None,
        ));
    }

    if path == "/api/location" && method == Method::POST {
        return Some((
            ActivityKind::MapView,
            "User shared their location for the map".to_string(),
            Some(json!({ "path": path }).to_string()),
        ));
    }

    if path.starts_with("/api/") && method == Method::POST {
        return Some((
            ActivityKind::ApiCall,
            format!("API request to {path}"),
            Some(json!({ "method": method.as_str(), "endpoint": path }).to_string()),
        ));
    }

    None
}

/// Outermost layer on the whole router. Decodes the token on its own rather
/// than relying on `require_auth` having run, so page routes are covered too.
pub async fn track_activity(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let headers = req.headers().clone();
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);
    let claims = token_from(&headers).and_then(|t| decode_token(&state.jwt_secret, &t));

    let response = next.run(req).await;

    let Some(claims) = claims else {
        return response;
    };
    // Admin actions land in system logs, not the user activity feed
    if claims.role == Role::Admin {
        return response;
    }
    if path.starts_with("/static") {
        return response;
    }
    // The dismiss-state probe fires on every dashboard load
    if path == "/api/dismiss-alert" && method == Method::GET {
        return response;
    }

    let Some((kind, description, metadata)) = classify(&method, &path) else {
        return response;
    };

    let ip = client_ip(&headers, peer);
    let ua = user_agent(&headers);
    let st = state.clone();
    tokio::task::spawn_blocking(move || {
        record(
            &st.db,
            claims.sub,
            kind,
            &description,
            ip.as_deref(),
            ua.as_deref(),
            metadata.as_deref(),
        );
    });

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn chat_posts_map_to_chat_activity() {
        let (kind, description, metadata) = classify(&Method::POST, "/api/chat").unwrap();
        assert_eq!(kind, ActivityKind::Chat);
        assert_eq!(description, "User sent a message to chatbot");
        assert!(metadata.unwrap().contains("/api/chat"));
    }

    #[test]
    fn weather_routes_map_on_get_and_post() {
        for method in [Method::GET, Method::POST] {
            let (kind, _, _) = classify(&method, "/api/weather/current").unwrap();
            assert_eq!(kind, ActivityKind::WeatherQuery);
        }
        assert!(classify(&Method::DELETE, "/api/weather/current").is_none());
    }

    #[test]
    fn alerts_page_view_is_logged_but_api_fetch_is_not() {
        let (kind, _, _) = classify(&Method::GET, "/alerts").unwrap();
        assert_eq!(kind, ActivityKind::AlertView);
        assert!(classify(&Method::GET, "/api/alerts").is_none());
    }

    #[test]
    fn location_report_wins_over_api_catchall() {
        let (kind, _, _) = classify(&Method::POST, "/api/location").unwrap();
        assert_eq!(kind, ActivityKind::MapView);
    }

    #[test]
    fn unmatched_api_posts_fall_through_to_api_call() {
        let (kind, description, metadata) = classify(&Method::POST, "/api/health-tips").unwrap();
        assert_eq!(kind, ActivityKind::ApiCall);
        assert_eq!(description, "API request to /api/health-tips");
        let meta = metadata.unwrap();
        assert!(meta.contains("POST"));
        assert!(meta.contains("/api/health-tips"));
    }

    #[test]
    fn page_gets_and_auth_routes_are_unclassified() {
        assert!(classify(&Method::GET, "/dashboard").is_none());
        assert!(classify(&Method::GET, "/api/chat/history").is_none());
        assert!(classify(&Method::POST, "/auth/logout").is_none());
    }

    #[test]
    fn forwarded_header_beats_peer_address() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        assert_eq!(
            client_ip(&headers, Some(peer)).as_deref(),
            Some("203.0.113.9")
        );

        headers.clear();
        assert_eq!(
            client_ip(&headers, Some(peer)).as_deref(),
            Some("127.0.0.1")
        );
        assert_eq!(client_ip(&headers, None), None);
    }

    #[test]
    fn user_agent_is_truncated_to_255_chars() {
        let mut headers = HeaderMap::new();
        let long = "x".repeat(300);
        headers.insert(header::USER_AGENT, HeaderValue::from_str(&long).unwrap());
        assert_eq!(user_agent(&headers).unwrap().len(), 255);
    }
}
