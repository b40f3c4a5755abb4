use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{
    ActivityKind, AlertKind, ChatSender, DeliveryStatus, LogLevel, NotifyFrequency, Role, Severity,
    TipCategory,
};

// -- JWT Claims --

/// JWT claims shared between the REST middleware and the page guards.
/// Canonical definition lives here in stratus-types to eliminate duplication.
/// `sid` keys the server-side session row that holds per-session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    pub sid: Uuid,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    pub token: String,
}

// -- Chat --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub success: bool,
    pub response: String,
    pub session_id: Uuid,
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather_info: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Serialize)]
pub struct ChatHistoryMessage {
    pub id: Uuid,
    pub sender: ChatSender,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_queried: Option<String>,
    pub created_at: DateTime<Utc>,
}

// -- Weather queries --

/// Shared by the current/forecast endpoints; accepted as query string or JSON
/// body. Either `city` or the `lat`/`lon` pair must be present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WeatherParams {
    pub city: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub days: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub limit: Option<u8>,
}

// -- Health tips --

#[derive(Debug, Clone, Deserialize)]
pub struct TipsRequest {
    pub temperature: f64,
    pub feels_like: Option<f64>,
    pub humidity: Option<f64>,
    pub condition: Option<String>,
    pub wind_speed: Option<f64>,
    pub aqi: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthTip {
    pub title: String,
    pub description: String,
    pub category: TipCategory,
}

// -- Temperature alerts --

#[derive(Debug, Deserialize)]
pub struct TemperatureAlertRequest {
    pub temperature: Option<f64>,
    pub location: Option<String>,
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemperatureAlert {
    pub level: String,
    pub severity: String,
    pub message: String,
    pub recommendations: Vec<String>,
    pub temperature: f64,
    pub location: String,
}

// -- Settings --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsUpdate {
    pub phone: Option<String>,
    pub home_location: Option<String>,
    pub alerts_enabled: Option<bool>,
    pub safety_tips_enabled: Option<bool>,
    pub notification_frequency: Option<NotifyFrequency>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub phone: Option<String>,
    pub home_location: Option<String>,
    pub alerts_enabled: bool,
    pub safety_tips_enabled: bool,
    pub notification_frequency: NotifyFrequency,
    pub updated_at: DateTime<Utc>,
}

// -- User locations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationReport {
    pub latitude: f64,
    pub longitude: f64,
    pub label: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserLocationEntry {
    pub user_id: Uuid,
    pub username: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub updated_at: DateTime<Utc>,
}

// -- Weather alerts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateAlertRequest {
    pub title: String,
    pub description: String,
    pub alert_type: AlertKind,
    pub severity: Severity,
    pub location: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AlertResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub alert_type: AlertKind,
    pub severity: Severity,
    pub location: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryStatus>,
}

#[derive(Debug, Serialize)]
pub struct AdminAlertSummary {
    pub id: Uuid,
    pub title: String,
    pub alert_type: AlertKind,
    pub severity: Severity,
    pub location: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub pending: i64,
    pub delivered: i64,
    pub read: i64,
}

// -- Admin --

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub last_active: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_location: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserStats {
    pub total: i64,
    pub active: i64,
    pub new_today: i64,
    pub inactive: i64,
}

#[derive(Debug, Serialize)]
pub struct AdminUsersResponse {
    pub success: bool,
    pub users: Vec<UserSummary>,
    pub stats: UserStats,
}

#[derive(Debug, Serialize)]
pub struct SystemLogEntry {
    pub id: Uuid,
    pub level: LogLevel,
    pub message: String,
    pub module: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub activity: ActivityKind,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}
