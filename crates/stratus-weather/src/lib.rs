pub mod client;
pub mod error;
pub mod types;

pub use client::WeatherClient;
pub use error::WeatherError;
pub use types::{
    AirQuality, CurrentConditions, Forecast, ForecastDay, GeoMatch, LocationInfo, LocationQuery,
};
