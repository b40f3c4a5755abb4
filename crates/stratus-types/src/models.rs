use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Domain enums stored as lowercase strings in SQLite. Each carries an
/// `as_str`/`parse` pair so the DB layer never round-trips through serde.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatSender {
    User,
    Bot,
    System,
}

impl ChatSender {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatSender::User => "user",
            ChatSender::Bot => "bot",
            ChatSender::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(ChatSender::User),
            "bot" => Some(ChatSender::Bot),
            "system" => Some(ChatSender::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Warning,
    Watch,
    Advisory,
    Emergency,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Warning => "warning",
            AlertKind::Watch => "watch",
            AlertKind::Advisory => "advisory",
            AlertKind::Emergency => "emergency",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "warning" => Some(AlertKind::Warning),
            "watch" => Some(AlertKind::Watch),
            "advisory" => Some(AlertKind::Advisory),
            "emergency" => Some(AlertKind::Emergency),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Moderate,
    High,
    Extreme,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Moderate => "moderate",
            Severity::High => "high",
            Severity::Extreme => "extreme",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Severity::Low),
            "moderate" => Some(Severity::Moderate),
            "high" => Some(Severity::High),
            "extreme" => Some(Severity::Extreme),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Read,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Read => "read",
            DeliveryStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DeliveryStatus::Pending),
            "delivered" => Some(DeliveryStatus::Delivered),
            "read" => Some(DeliveryStatus::Read),
            "failed" => Some(DeliveryStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(LogLevel::Info),
            "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            "critical" => Some(LogLevel::Critical),
            _ => None,
        }
    }
}

/// What an authenticated user did, as recorded by the activity middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Login,
    Logout,
    Signup,
    Chat,
    WeatherQuery,
    AlertView,
    SettingsChange,
    MapView,
    ApiCall,
    Error,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Login => "login",
            ActivityKind::Logout => "logout",
            ActivityKind::Signup => "signup",
            ActivityKind::Chat => "chat",
            ActivityKind::WeatherQuery => "weather_query",
            ActivityKind::AlertView => "alert_view",
            ActivityKind::SettingsChange => "settings_change",
            ActivityKind::MapView => "map_view",
            ActivityKind::ApiCall => "api_call",
            ActivityKind::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "login" => Some(ActivityKind::Login),
            "logout" => Some(ActivityKind::Logout),
            "signup" => Some(ActivityKind::Signup),
            "chat" => Some(ActivityKind::Chat),
            "weather_query" => Some(ActivityKind::WeatherQuery),
            "alert_view" => Some(ActivityKind::AlertView),
            "settings_change" => Some(ActivityKind::SettingsChange),
            "map_view" => Some(ActivityKind::MapView),
            "api_call" => Some(ActivityKind::ApiCall),
            "error" => Some(ActivityKind::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyFrequency {
    Realtime,
    Hourly,
    Daily,
}

impl NotifyFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyFrequency::Realtime => "realtime",
            NotifyFrequency::Hourly => "hourly",
            NotifyFrequency::Daily => "daily",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "realtime" => Some(NotifyFrequency::Realtime),
            "hourly" => Some(NotifyFrequency::Hourly),
            "daily" => Some(NotifyFrequency::Daily),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TipCategory {
    Temperature,
    Humidity,
    Air,
    Uv,
    General,
}

impl TipCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TipCategory::Temperature => "temperature",
            TipCategory::Humidity => "humidity",
            TipCategory::Air => "air",
            TipCategory::Uv => "uv",
            TipCategory::General => "general",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "temperature" => Some(TipCategory::Temperature),
            "humidity" => Some(TipCategory::Humidity),
            "air" => Some(TipCategory::Air),
            "uv" => Some(TipCategory::Uv),
            "general" => Some(TipCategory::General),
            _ => None,
        }
    }
}

/// Parse a timestamp column into UTC.
///
/// SQLite stores `datetime('now')` as "YYYY-MM-DD HH:MM:SS" without timezone,
/// so fall back to parsing as naive UTC when RFC 3339 parsing fails.
pub fn parse_db_timestamp(s: &str) -> Option<DateTime<Utc>> {
    s.parse::<DateTime<Utc>>()
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
                .ok()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_strings_round_trip() {
        for kind in [
            ActivityKind::Login,
            ActivityKind::WeatherQuery,
            ActivityKind::SettingsChange,
            ActivityKind::Error,
        ] {
            assert_eq!(ActivityKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(Severity::parse("extreme"), Some(Severity::Extreme));
        assert_eq!(Severity::parse("catastrophic"), None);
        assert_eq!(DeliveryStatus::parse("read"), Some(DeliveryStatus::Read));
    }

    #[test]
    fn parses_sqlite_and_rfc3339_timestamps() {
        let naive = parse_db_timestamp("2025-03-14 09:26:53").unwrap();
        assert_eq!(naive.to_rfc3339(), "2025-03-14T09:26:53+00:00");

        let rfc = parse_db_timestamp("2025-03-14T09:26:53Z").unwrap();
        assert_eq!(naive, rfc);

        assert!(parse_db_timestamp("yesterday").is_none());
    }
}
