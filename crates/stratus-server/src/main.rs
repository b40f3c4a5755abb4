mod cleanup;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use stratus_api::middleware::{require_admin, require_auth};
use stratus_api::{AppState, AppStateInner, activity, admin, alerts, auth, chat, pages, settings, tips, weather};
use stratus_assistant::{ChatClient, ChatEngine};
use stratus_db::Database;
use stratus_types::models::{LogLevel, Role};
use stratus_weather::WeatherClient;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "stratus_server=debug,stratus_api=debug,stratus_weather=info,stratus_assistant=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    // Config
    let host = std::env::var("STRATUS_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("STRATUS_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let db_path = std::env::var("STRATUS_DB_PATH").unwrap_or_else(|_| "stratus.db".into());
    let jwt_secret = std::env::var("STRATUS_JWT_SECRET").unwrap_or_default();
    if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
        eprintln!("FATAL: STRATUS_JWT_SECRET is unset or still a placeholder.");
        eprintln!("       Session tokens are signed with it. Set it in your .env file and restart.");
        std::process::exit(1);
    }
    let session_ttl_hours: i64 = std::env::var("STRATUS_SESSION_TTL_HOURS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(336); // 14 days
    let weather_api_key = std::env::var("STRATUS_WEATHER_API_KEY").unwrap_or_default();
    if weather_api_key.is_empty() {
        warn!("STRATUS_WEATHER_API_KEY is unset, weather lookups will fail");
    }
    let weather_api_url = std::env::var("STRATUS_WEATHER_API_URL")
        .unwrap_or_else(|_| "https://api.openweathermap.org/data/2.5".into());
    let weather_geo_url = std::env::var("STRATUS_WEATHER_GEO_URL")
        .unwrap_or_else(|_| "https://api.openweathermap.org/geo/1.0".into());
    let chat_api_key = std::env::var("STRATUS_CHAT_API_KEY").unwrap_or_default();
    if chat_api_key.is_empty() {
        warn!("STRATUS_CHAT_API_KEY is unset, assistant replies will use the built-in fallback");
    }
    let chat_api_url = std::env::var("STRATUS_CHAT_API_URL")
        .unwrap_or_else(|_| "https://api.groq.com/openai/v1".into());
    let chat_model =
        std::env::var("STRATUS_CHAT_MODEL").unwrap_or_else(|_| "llama-3.3-70b-versatile".into());
    let static_dir = std::env::var("STRATUS_STATIC_DIR").unwrap_or_else(|_| "static".into());
    let cleanup_interval_secs: u64 = std::env::var("STRATUS_CLEANUP_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3600);

    // Init database
    let db = Database::open(&PathBuf::from(&db_path))?;
    seed_admin(&db)?;
    activity::record_system(&db, LogLevel::Info, "Server started", "server", None, None);

    // Shared state
    let weather_client = WeatherClient::new(&weather_api_key, &weather_api_url, &weather_geo_url);
    let chat_client = ChatClient::new(&chat_api_key, &chat_api_url, &chat_model);
    let engine = ChatEngine::new(chat_client.clone(), weather_client.clone());
    let templates = pages::build_templates()?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        session_ttl_hours,
        weather: weather_client,
        chat: chat_client,
        engine,
        templates,
    });

    // Background cleanup task (runs every hour by default)
    tokio::spawn(cleanup::run_cleanup_loop(state.clone(), cleanup_interval_secs));

    // Routes
    let page_routes = Router::new()
        .route("/", get(pages::home))
        .route("/signin", get(pages::signin_page))
        .route("/signup", get(pages::signup_page))
        .route("/dashboard", get(pages::dashboard))
        .route("/chat", get(pages::chat_page))
        .route("/forecast", get(pages::forecast_page))
        .route("/alerts", get(pages::alerts_page))
        .route("/health-tips", get(pages::health_tips_page))
        .route("/settings", get(pages::settings_page))
        .route("/admin", get(pages::admin_home))
        .route("/admin/users", get(pages::admin_users_page))
        .route("/admin/alerts", get(pages::admin_alerts_page))
        .route("/admin/map", get(pages::admin_map_page))
        .route("/admin/chat", get(pages::admin_chat_page))
        .with_state(state.clone());

    let public_api = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/api/health", get(health))
        .with_state(state.clone());

    let protected_api = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/api/chat", post(chat::send_message))
        .route("/api/chat/history", get(chat::history))
        .route("/api/weather/current", get(weather::current_get))
        .route("/api/weather/current", post(weather::current_post))
        .route("/api/weather/forecast", get(weather::forecast_get))
        .route("/api/weather/forecast", post(weather::forecast_post))
        .route("/api/weather/air", get(weather::air))
        .route("/api/weather/search", get(weather::search_get))
        .route("/api/weather/search", post(weather::search_post))
        .route("/api/health-tips", post(tips::health_tips))
        .route("/api/temperature-alert", post(tips::temperature_alert))
        .route("/api/dismiss-alert", get(tips::dismiss_state))
        .route("/api/dismiss-alert", post(tips::dismiss_alert))
        .route("/api/alerts", get(alerts::my_alerts))
        .route("/api/alerts/{id}/read", post(alerts::mark_read))
        .route("/api/location", post(settings::report_location))
        .route("/api/settings", get(settings::get_settings))
        .route("/api/settings", post(settings::update_settings))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let admin_api = Router::new()
        .route("/api/admin/users", get(admin::users))
        .route("/api/admin/locations", get(admin::locations))
        .route("/api/admin/alerts", get(alerts::admin_alerts))
        .route("/api/admin/alerts", post(alerts::create_alert))
        .route("/api/admin/logs", get(admin::system_logs))
        .route("/api/admin/activity", get(admin::activity_logs))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let app = Router::new()
        .merge(page_routes)
        .merge(public_api)
        .merge(protected_api)
        .merge(admin_api)
        .nest_service("/static", ServeDir::new(&static_dir))
        .layer(middleware::from_fn_with_state(state.clone(), activity::track_activity))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Stratus server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

/// Create the admin account from env vars on first boot.
///
/// Skipped when the variables are unset or the email is already registered.
fn seed_admin(db: &Database) -> anyhow::Result<()> {
    let (Ok(email), Ok(password)) = (
        std::env::var("STRATUS_ADMIN_EMAIL"),
        std::env::var("STRATUS_ADMIN_PASSWORD"),
    ) else {
        return Ok(());
    };

    let email = email.trim().to_lowercase();
    if db.get_user_by_email(&email)?.is_some() {
        return Ok(());
    }

    let username = std::env::var("STRATUS_ADMIN_USERNAME").unwrap_or_else(|_| "admin".into());
    let hash = auth::hash_password(&password)?;
    db.create_user(
        &Uuid::new_v4().to_string(),
        &username,
        &email,
        &hash,
        Role::Admin.as_str(),
    )?;
    info!("Seeded admin account {}", email);

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
