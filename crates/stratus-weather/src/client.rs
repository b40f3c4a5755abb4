//! Weather provider client (OpenWeather-compatible API).

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::WeatherError;
use crate::types::{
    AirQuality, CurrentConditions, Forecast, ForecastDay, GeoMatch, LocationInfo, LocationQuery,
    aqi_label, local_hhmm, m_to_km, ms_to_kmh, title_case,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Country suffixes retried, in order, when a bare city lookup 404s.
/// Covers the deployments' common ambiguous city names.
const COUNTRY_SUFFIXES: [&str; 5] = [",US", ",PH", ",JP", ",UK", ",CA"];

#[derive(Clone)]
pub struct WeatherClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    geo_url: String,
}

impl WeatherClient {
    pub fn new(api_key: &str, base_url: &str, geo_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            geo_url: geo_url.trim_end_matches('/').to_string(),
        }
    }

    fn location_params(&self, query: &LocationQuery) -> Vec<(&'static str, String)> {
        let mut params = match query {
            LocationQuery::City(name) => vec![("q", name.clone())],
            LocationQuery::Coords { lat, lon } => {
                vec![("lat", lat.to_string()), ("lon", lon.to_string())]
            }
        };
        params.push(("appid", self.api_key.clone()));
        params.push(("units", "metric".to_string()));
        params
    }

    /// Current conditions for a city or coordinate pair.
    #[instrument(skip(self), level = "debug")]
    pub async fn current(&self, query: &LocationQuery) -> Result<CurrentConditions, WeatherError> {
        let response = self
            .client
            .get(format!("{}/weather", self.base_url))
            .query(&self.location_params(query))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let raw: RawCurrent = decode(query, response).await?;
        let weather = raw
            .weather
            .first()
            .ok_or_else(|| WeatherError::Payload("missing weather block".into()))?;
        let tz = raw.timezone.unwrap_or(0);

        Ok(CurrentConditions {
            location: LocationInfo {
                name: raw.name,
                country: raw.sys.country.unwrap_or_default(),
                lat: raw.coord.lat,
                lon: raw.coord.lon,
            },
            temperature: raw.main.temp.round() as i32,
            feels_like: raw.main.feels_like.round() as i32,
            humidity: raw.main.humidity,
            pressure: raw.main.pressure,
            visibility_km: m_to_km(raw.visibility.unwrap_or(0) as f64),
            wind_speed_kmh: ms_to_kmh(raw.wind.speed),
            wind_direction: raw.wind.deg.unwrap_or(0),
            cloud_cover: raw.clouds.all,
            condition: title_case(&weather.description),
            condition_main: weather.main.clone(),
            icon: weather.icon.clone(),
            precipitation_mm: raw.rain.and_then(|r| r.one_hour).unwrap_or(0.0),
            sunrise: raw.sys.sunrise.map(|t| local_hhmm(t, tz)).unwrap_or_default(),
            sunset: raw.sys.sunset.map(|t| local_hhmm(t, tz)).unwrap_or_default(),
            observed_at: chrono::DateTime::from_timestamp(raw.dt, 0)
                .ok_or_else(|| WeatherError::Payload("bad observation timestamp".into()))?,
        })
    }

    /// City lookup with the country-suffix walk: when the bare name 404s,
    /// retry each suffix in order and stop at the first hit. Anything other
    /// than a not-found (timeouts, 5xx) aborts the walk immediately.
    /// Returns the conditions plus the query string that resolved.
    pub async fn current_with_fallback(
        &self,
        city: &str,
    ) -> Result<(CurrentConditions, String), WeatherError> {
        match self.current(&LocationQuery::City(city.to_string())).await {
            Ok(conditions) => return Ok((conditions, city.to_string())),
            Err(WeatherError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let mut last = WeatherError::NotFound(city.to_string());
        for suffix in COUNTRY_SUFFIXES {
            let candidate = format!("{city}{suffix}");
            match self.current(&LocationQuery::City(candidate.clone())).await {
                Ok(conditions) => {
                    debug!("city '{}' resolved as '{}'", city, candidate);
                    return Ok((conditions, candidate));
                }
                Err(WeatherError::NotFound(_)) => last = WeatherError::NotFound(candidate),
                Err(e) => return Err(e),
            }
        }
        Err(last)
    }

    /// Daily forecast derived from the provider's 3-hour series: one entry
    /// per day, taken at the same hour each day (every 8th step).
    #[instrument(skip(self), level = "debug")]
    pub async fn forecast(
        &self,
        query: &LocationQuery,
        days: u8,
    ) -> Result<Forecast, WeatherError> {
        let days = days.clamp(1, 5);
        let response = self
            .client
            .get(format!("{}/forecast", self.base_url))
            .query(&self.location_params(query))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let raw: RawForecast = decode(query, response).await?;
        let entries = raw
            .list
            .iter()
            .step_by(8)
            .take(days as usize)
            .map(|entry| {
                let weather = entry
                    .weather
                    .first()
                    .ok_or_else(|| WeatherError::Payload("missing weather block".into()))?;
                Ok(ForecastDay {
                    date: entry
                        .dt_txt
                        .split_whitespace()
                        .next()
                        .unwrap_or(&entry.dt_txt)
                        .to_string(),
                    temp_min: entry.main.temp_min.round() as i32,
                    temp_max: entry.main.temp_max.round() as i32,
                    temperature: entry.main.temp.round() as i32,
                    condition: title_case(&weather.description),
                    icon: weather.icon.clone(),
                    humidity: entry.main.humidity,
                    wind_speed_kmh: ms_to_kmh(entry.wind.speed),
                    precipitation_chance: (entry.pop.unwrap_or(0.0) * 100.0).round() as u8,
                })
            })
            .collect::<Result<Vec<_>, WeatherError>>()?;

        Ok(Forecast {
            location: LocationInfo {
                name: raw.city.name,
                country: raw.city.country.unwrap_or_default(),
                lat: raw.city.coord.lat,
                lon: raw.city.coord.lon,
            },
            days: entries,
        })
    }

    /// Air quality index for a coordinate pair.
    #[instrument(skip(self), level = "debug")]
    pub async fn air_quality(&self, lat: f64, lon: f64) -> Result<AirQuality, WeatherError> {
        let response = self
            .client
            .get(format!("{}/air_pollution", self.base_url))
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("appid", self.api_key.clone()),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let query = LocationQuery::Coords { lat, lon };
        let raw: RawAir = decode(&query, response).await?;
        let entry = raw
            .list
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::Payload("empty air quality series".into()))?;

        Ok(AirQuality {
            aqi: entry.main.aqi,
            label: aqi_label(entry.main.aqi).to_string(),
            components: entry.components,
        })
    }

    /// Direct geocoding search, at most 10 matches.
    #[instrument(skip(self), level = "debug")]
    pub async fn search(&self, query: &str, limit: u8) -> Result<Vec<GeoMatch>, WeatherError> {
        let limit = limit.clamp(1, 10);
        let response = self
            .client
            .get(format!("{}/direct", self.geo_url))
            .query(&[
                ("q", query.to_string()),
                ("limit", limit.to_string()),
                ("appid", self.api_key.clone()),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let location = LocationQuery::City(query.to_string());
        let raw: Vec<RawGeo> = decode(&location, response).await?;
        Ok(raw
            .into_iter()
            .map(|m| GeoMatch {
                name: m.name,
                country: m.country.unwrap_or_default(),
                state: m.state,
                lat: m.lat,
                lon: m.lon,
            })
            .collect())
    }
}

/// Map provider status codes onto the error taxonomy, then deserialize.
async fn decode<T: serde::de::DeserializeOwned>(
    query: &LocationQuery,
    response: reqwest::Response,
) -> Result<T, WeatherError> {
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(WeatherError::NotFound(query.to_string()));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(WeatherError::Api {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json()
        .await
        .map_err(|e| WeatherError::Payload(e.to_string()))
}

// ── Raw provider payloads ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawCurrent {
    name: String,
    coord: RawCoord,
    weather: Vec<RawWeather>,
    main: RawMain,
    visibility: Option<u32>,
    wind: RawWind,
    clouds: RawClouds,
    rain: Option<RawRain>,
    dt: i64,
    timezone: Option<i64>,
    sys: RawSys,
}

#[derive(Debug, Deserialize)]
struct RawCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct RawWeather {
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct RawMain {
    temp: f64,
    feels_like: f64,
    #[serde(default)]
    temp_min: f64,
    #[serde(default)]
    temp_max: f64,
    pressure: u32,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct RawWind {
    speed: f64,
    deg: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct RawClouds {
    all: u8,
}

#[derive(Debug, Deserialize)]
struct RawRain {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawSys {
    country: Option<String>,
    sunrise: Option<i64>,
    sunset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawForecast {
    list: Vec<RawForecastEntry>,
    city: RawCity,
}

#[derive(Debug, Deserialize)]
struct RawForecastEntry {
    dt_txt: String,
    main: RawMain,
    weather: Vec<RawWeather>,
    wind: RawWind,
    pop: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawCity {
    name: String,
    country: Option<String>,
    coord: RawCoord,
}

#[derive(Debug, Deserialize)]
struct RawAir {
    list: Vec<RawAirEntry>,
}

#[derive(Debug, Deserialize)]
struct RawAirEntry {
    main: RawAqi,
    components: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct RawAqi {
    aqi: u8,
}

#[derive(Debug, Deserialize)]
struct RawGeo {
    name: String,
    country: Option<String>,
    state: Option<String>,
    lat: f64,
    lon: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> WeatherClient {
        WeatherClient::new("test-key", &server.uri(), &server.uri())
    }

    fn manila_payload() -> serde_json::Value {
        json!({
            "name": "Manila",
            "coord": {"lat": 14.6042, "lon": 120.9822},
            "weather": [{"id": 803, "main": "Clouds", "description": "broken clouds", "icon": "04d"}],
            "main": {"temp": 30.4, "feels_like": 36.1, "temp_min": 29.0, "temp_max": 31.2,
                     "pressure": 1008, "humidity": 75},
            "visibility": 8450,
            "wind": {"speed": 4.12, "deg": 240},
            "clouds": {"all": 75},
            "rain": {"1h": 0.4},
            "dt": 1748811600,
            "timezone": 28800,
            "sys": {"country": "PH", "sunrise": 1748812020, "sunset": 1748857620}
        })
    }

    #[tokio::test]
    async fn current_reshapes_provider_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "Manila"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(manila_payload()))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let conditions = client
            .current(&LocationQuery::City("Manila".into()))
            .await
            .unwrap();

        assert_eq!(conditions.location.country, "PH");
        assert_eq!(conditions.temperature, 30);
        assert_eq!(conditions.feels_like, 36);
        assert_eq!(conditions.wind_speed_kmh, 14.8);
        assert_eq!(conditions.visibility_km, 8.5);
        assert_eq!(conditions.condition, "Broken Clouds");
        assert_eq!(conditions.precipitation_mm, 0.4);
        // Local sunrise: 21:07 UTC + 8h shift
        assert_eq!(conditions.sunrise, "05:07");
    }

    #[tokio::test]
    async fn unknown_city_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "cod": "404", "message": "city not found"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = client
            .current(&LocationQuery::City("Atlantis".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::NotFound(city) if city == "Atlantis"));
    }

    #[tokio::test]
    async fn fallback_walks_suffixes_in_order_and_stops_at_first_hit() {
        let server = MockServer::start().await;
        for q in ["Springfield", "Springfield,US", "Springfield,PH", "Springfield,JP"] {
            Mock::given(method("GET"))
                .and(path("/weather"))
                .and(query_param("q", q))
                .respond_with(ResponseTemplate::new(404))
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "Springfield,UK"))
            .respond_with(ResponseTemplate::new(200).set_body_json(manila_payload()))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let (_, resolved) = client.current_with_fallback("Springfield").await.unwrap();

        assert_eq!(resolved, "Springfield,UK");
        // Bare name + four suffixes; ",CA" never tried
        assert_eq!(server.received_requests().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn fallback_exhausts_suffixes_and_returns_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = client.current_with_fallback("Nowhere").await.unwrap_err();

        assert!(matches!(err, WeatherError::NotFound(_)));
        assert_eq!(server.received_requests().await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn provider_errors_do_not_trigger_the_suffix_walk() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = client.current_with_fallback("Manila").await.unwrap_err();

        assert!(matches!(err, WeatherError::Api { status: 500, .. }));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn forecast_takes_every_eighth_step_and_clamps_days() {
        let server = MockServer::start().await;
        let entries: Vec<_> = (0..40)
            .map(|i| {
                json!({
                    "dt_txt": format!("2025-06-{:02} 12:00:00", 1 + i / 8),
                    "main": {"temp": 20.0 + i as f64, "feels_like": 20.0,
                             "temp_min": 18.0, "temp_max": 24.0,
                             "pressure": 1010, "humidity": 60},
                    "weather": [{"id": 800, "main": "Clear", "description": "clear sky", "icon": "01d"}],
                    "wind": {"speed": 2.0, "deg": 90},
                    "pop": 0.25
                })
            })
            .collect();
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "list": entries,
                "city": {"name": "Tokyo", "country": "JP", "coord": {"lat": 35.68, "lon": 139.65}}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let forecast = client
            .forecast(&LocationQuery::City("Tokyo".into()), 9)
            .await
            .unwrap();

        assert_eq!(forecast.days.len(), 5); // clamped from 9
        assert_eq!(forecast.days[0].temperature, 20);
        assert_eq!(forecast.days[1].temperature, 28); // entry index 8
        assert_eq!(forecast.days[0].precipitation_chance, 25);
    }

    #[tokio::test]
    async fn air_quality_labels_the_index() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/air_pollution"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "list": [{"main": {"aqi": 3}, "components": {"co": 201.9, "pm2_5": 12.4}}]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let air = client.air_quality(14.6, 120.98).await.unwrap();

        assert_eq!(air.aqi, 3);
        assert_eq!(air.label, "Moderate");
        assert_eq!(air.components.get("pm2_5"), Some(&12.4));
    }

    #[tokio::test]
    async fn search_clamps_the_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/direct"))
            .and(query_param("limit", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "London", "country": "GB", "state": "England", "lat": 51.5, "lon": -0.12}
            ])))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let matches = client.search("London", 200).await.unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].state.as_deref(), Some("England"));
    }
}
