use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Where to look the weather up. The provider accepts either a free-form
/// city string or a coordinate pair.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    City(String),
    Coords { lat: f64, lon: f64 },
}

impl fmt::Display for LocationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationQuery::City(name) => write!(f, "{}", name),
            LocationQuery::Coords { lat, lon } => write!(f, "{:.4},{:.4}", lat, lon),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationInfo {
    pub name: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
}

/// Current conditions reshaped into the units the UI shows: °C rounded,
/// wind in km/h, visibility in km, sunrise/sunset as local HH:MM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub location: LocationInfo,
    pub temperature: i32,
    pub feels_like: i32,
    pub humidity: u8,
    pub pressure: u32,
    pub visibility_km: f64,
    pub wind_speed_kmh: f64,
    pub wind_direction: u16,
    pub cloud_cover: u8,
    pub condition: String,
    pub condition_main: String,
    pub icon: String,
    pub precipitation_mm: f64,
    pub sunrise: String,
    pub sunset: String,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: String,
    pub temp_min: i32,
    pub temp_max: i32,
    pub temperature: i32,
    pub condition: String,
    pub icon: String,
    pub humidity: u8,
    pub wind_speed_kmh: f64,
    pub precipitation_chance: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub location: LocationInfo,
    pub days: Vec<ForecastDay>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirQuality {
    pub aqi: u8,
    pub label: String,
    pub components: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoMatch {
    pub name: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

/// Provider wind speeds arrive in m/s; the UI shows km/h to one decimal.
pub(crate) fn ms_to_kmh(ms: f64) -> f64 {
    (ms * 3.6 * 10.0).round() / 10.0
}

/// Visibility arrives in metres.
pub(crate) fn m_to_km(m: f64) -> f64 {
    (m / 1000.0 * 10.0).round() / 10.0
}

/// "scattered clouds" -> "Scattered Clouds".
pub(crate) fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Provider AQI scale is 1..=5.
pub(crate) fn aqi_label(aqi: u8) -> &'static str {
    match aqi {
        1 => "Good",
        2 => "Fair",
        3 => "Moderate",
        4 => "Poor",
        5 => "Very Poor",
        _ => "Unknown",
    }
}

/// Render a unix timestamp as HH:MM local to the observed location.
/// `tz_offset` is the provider's shift from UTC in seconds.
pub(crate) fn local_hhmm(unix: i64, tz_offset: i64) -> String {
    DateTime::<Utc>::from_timestamp(unix + tz_offset, 0)
        .map(|dt| dt.format("%H:%M").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_conversions() {
        assert_eq!(ms_to_kmh(5.0), 18.0);
        assert_eq!(ms_to_kmh(3.09), 11.1);
        assert_eq!(m_to_km(10000.0), 10.0);
        assert_eq!(m_to_km(8450.0), 8.5);
    }

    #[test]
    fn condition_title_casing() {
        assert_eq!(title_case("scattered clouds"), "Scattered Clouds");
        assert_eq!(title_case("mist"), "Mist");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn aqi_labels_cover_scale_and_out_of_range() {
        assert_eq!(aqi_label(1), "Good");
        assert_eq!(aqi_label(3), "Moderate");
        assert_eq!(aqi_label(5), "Very Poor");
        assert_eq!(aqi_label(0), "Unknown");
        assert_eq!(aqi_label(9), "Unknown");
    }

    #[test]
    fn hhmm_applies_timezone_shift() {
        // 2025-06-01 21:00:00 UTC, +8h shift -> 05:00 next day local
        assert_eq!(local_hhmm(1748811600, 8 * 3600), "05:00");
        assert_eq!(local_hhmm(1748811600, 0), "21:00");
    }

    #[test]
    fn coords_query_formats_to_four_decimals() {
        let q = LocationQuery::Coords { lat: 14.59951, lon: 120.98422 };
        assert_eq!(q.to_string(), "14.5995,120.9842");
    }
}
