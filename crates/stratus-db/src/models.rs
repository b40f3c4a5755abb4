//! Row types mapping directly onto SQLite rows. Timestamps stay as the
//! TEXT SQLite hands back; callers parse them.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub created_at: String,
    pub last_active: Option<String>,
}

pub struct ProfileRow {
    pub user_id: String,
    pub phone: Option<String>,
    pub home_location: Option<String>,
    pub alerts_enabled: bool,
    pub safety_tips_enabled: bool,
    pub notification_frequency: String,
    pub updated_at: String,
}

pub struct SessionRow {
    pub id: String,
    pub user_id: String,
    pub created_at: String,
    pub expires_at: String,
}

pub struct ChatSessionRow {
    pub id: String,
    pub user_id: String,
    pub started_at: String,
    pub is_active: bool,
}

pub struct ChatMessageRow {
    pub id: String,
    pub session_id: String,
    pub sender: String,
    pub content: String,
    pub weather_json: Option<String>,
    pub location_queried: Option<String>,
    pub created_at: String,
}

pub struct AlertRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub alert_type: String,
    pub severity: String,
    pub location: String,
    pub issued_at: String,
    pub expires_at: String,
    pub is_active: bool,
}

/// An active alert joined with the caller's delivery status.
pub struct UserAlertRow {
    pub alert: AlertRow,
    pub status: String,
}

/// Admin view: one alert with its delivery counts.
pub struct AlertCountsRow {
    pub alert: AlertRow,
    pub pending: i64,
    pub delivered: i64,
    pub read: i64,
}

pub struct SystemLogRow {
    pub id: String,
    pub level: String,
    pub message: String,
    pub module: String,
    pub user_id: Option<String>,
    pub extra: Option<String>,
    pub created_at: String,
}

pub struct ActivityRow {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub activity: String,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: String,
}

pub struct LocationRow {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub label: Option<String>,
    pub updated_at: String,
}

/// Admin map view: one latest location per non-admin user.
pub struct UserLocationRow {
    pub location: LocationRow,
    pub username: String,
}

pub struct UserStatsRow {
    pub total: i64,
    pub active: i64,
    pub new_today: i64,
    pub inactive: i64,
}
